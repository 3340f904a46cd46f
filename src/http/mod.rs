//! HTTP response helpers.

mod response;

pub use response::ApiResponse;
