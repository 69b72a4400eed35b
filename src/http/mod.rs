pub mod codec;
pub mod request;
pub mod requestbody;
pub mod response;
pub mod responsebody;
pub mod reuse;

// Re-exports for convenience
pub use codec::WireCodec;
pub use request::ExecRequest;
pub use requestbody::RequestBody;
pub use response::HttpResponse;
pub use responsebody::ResponseBody;
pub use reuse::{DefaultKeepAliveStrategy, DefaultReuseStrategy, KeepAliveStrategy, ReuseStrategy};
