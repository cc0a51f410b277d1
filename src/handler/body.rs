//! POST body intake
//!
//! The body is buffered in full (up to the configured limit) and parsed once,
//! however many chunks the connection delivers it in.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, CONTENT_LENGTH};
use serde_json::Value;

use super::error::DispatchError;
use crate::logger;
use crate::store::Message;

/// Reject early when the declared Content-Length is over the limit
pub fn check_content_length(headers: &HeaderMap, max_body_size: u64) -> Result<(), DispatchError> {
    let Some(content_length) = headers.get(CONTENT_LENGTH) else {
        return Ok(());
    };

    let Ok(size_str) = content_length.to_str() else {
        logger::log_warning("Content-Length header contains non-ASCII characters");
        return Ok(());
    };

    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Err(DispatchError::BodyTooLarge {
                limit: max_body_size,
            })
        }
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Collect the whole body, then decode it as one message record
pub async fn read_message<B>(body: B, max_body_size: u64) -> Result<Message, DispatchError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            DispatchError::BodyTooLarge {
                limit: max_body_size,
            }
        } else {
            DispatchError::BodyRead(e.to_string())
        }
    })?;

    parse_message(&collected.to_bytes())
}

pub fn parse_message(bytes: &[u8]) -> Result<Message, DispatchError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(record) => Ok(record),
        _ => Err(DispatchError::NotAnObject),
    }
}
