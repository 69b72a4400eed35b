//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): the failure taxonomy raised by the chain
//! - [`cancel`]: cancellation token plumbing for suspension points
//! - [`context`]: `io::Error` context helpers for connection layers

pub mod cancel;
pub mod context;
pub mod neterror;
