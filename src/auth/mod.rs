//! HTTP authentication for target servers and proxies.
//!
//! - [`challenge`]: `WWW-Authenticate` / `Proxy-Authenticate` parsing
//! - [`state`]: the per-endpoint exchange and its transition table
//! - [`strategy`]: challenge recognition and scheme ranking
//! - [`authenticator`]: drives the exchange from responses onto requests

pub mod authenticator;
pub mod basic;
pub mod challenge;
pub mod credentials;
pub mod scheme;
pub mod state;
pub mod strategy;

pub use authenticator::HttpAuthenticator;
pub use basic::BasicScheme;
pub use challenge::{AuthChallenge, ChallengeMap};
pub use credentials::{AuthScope, BasicCredentialsProvider, Credentials, CredentialsProvider};
pub use scheme::{AuthOption, AuthScheme, AuthSchemeFactory, SchemeRegistry};
pub use state::{AuthExchange, AuthProtocolState};
pub use strategy::{AuthStrategy, AuthTarget, DefaultAuthStrategy};
