//! HTTP protocol layer module
//!
//! Protocol-level helpers for the file engine: content types, cache
//! validation, byte ranges, and response builders.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use mime::MimeTable;
pub use range::{resolve_range, ByteRange, RangeOutcome};
pub use response::{
    build_301_response, build_304_response, build_416_response, build_error_response,
    build_file_response, build_html_response, build_partial_response,
};
