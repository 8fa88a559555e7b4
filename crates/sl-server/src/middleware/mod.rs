//! HTTP middleware: request ID propagation.

pub mod request_id;
