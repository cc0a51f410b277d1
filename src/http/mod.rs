//! HTTP protocol layer module
//!
//! Response builders and the CORS header set, decoupled from the dispatch logic.

pub mod cors;
pub mod response;

// Re-export commonly used types
pub use cors::CorsHeaders;
pub use response::{build_error_response, build_results_response};
