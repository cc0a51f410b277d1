//! CORS header set
//!
//! Built once from configuration and never mutated afterwards. Responses get
//! their own copy through [`CorsHeaders::fresh`], so per-request additions
//! (such as the OPTIONS method list) cannot leak into later responses.

use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
};

use crate::config::CorsConfig;
use crate::logger;

#[derive(Debug, Clone)]
pub struct CorsHeaders {
    defaults: HeaderMap,
    allow_methods: HeaderValue,
}

impl CorsHeaders {
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut defaults = HeaderMap::new();
        insert_checked(&mut defaults, ACCESS_CONTROL_ALLOW_ORIGIN, &config.allow_origin);
        insert_checked(&mut defaults, ACCESS_CONTROL_ALLOW_METHODS, &config.allow_methods);
        insert_checked(&mut defaults, ACCESS_CONTROL_ALLOW_HEADERS, &config.allow_headers);
        defaults.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(config.max_age));

        let allow_methods = defaults
            .get(ACCESS_CONTROL_ALLOW_METHODS)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"));

        Self {
            defaults,
            allow_methods,
        }
    }

    /// A new header map holding only the default CORS set
    pub fn fresh(&self) -> HeaderMap {
        self.defaults.clone()
    }

    /// Method list advertised on OPTIONS responses
    pub fn allow_methods(&self) -> &HeaderValue {
        &self.allow_methods
    }
}

fn insert_checked(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => logger::log_warning(&format!("Ignoring invalid CORS value for {name}: {e}")),
    }
}
