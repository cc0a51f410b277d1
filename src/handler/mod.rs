//! Request handler module
//!
//! Dispatches requests for the message resource to the store and builds the
//! JSON responses.

mod body;
pub mod error;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
