//! The request execution chain.
//!
//! Layers wrap each other decorator-style, outermost first:
//! [`RetryExec`] → [`BackoffExec`] → [`MainExec`].

pub mod backoff;
pub mod config;
pub mod context;
mod establish;
pub mod mainexec;
pub mod retry;
pub mod usertoken;

use crate::base::neterror::NetError;
use crate::http::request::ExecRequest;
use crate::http::response::HttpResponse;
use crate::route::plan::Route;
use futures::future::BoxFuture;

pub use backoff::{
    AimdBackoffManager, AimdConfig, BackoffExec, BackoffManager, BackoffStrategy,
    DefaultBackoffStrategy, NoopBackoffManager,
};
pub use config::RequestConfig;
pub use context::ExecContext;
pub use mainexec::MainExec;
pub use retry::{DefaultRetryStrategy, RetryConfig, RetryExec, RetryStrategy};
pub use usertoken::{DefaultUserTokenHandler, NoopUserTokenHandler, UserTokenHandler};

/// One layer of the chain: executes `request` along `route`.
pub trait ExecChain: Send + Sync {
    fn execute<'a>(
        &'a self,
        route: &'a Route,
        request: &'a mut ExecRequest,
        ctx: &'a mut ExecContext,
    ) -> BoxFuture<'a, Result<HttpResponse, NetError>>;
}
