//! # hopnet
//!
//! A layered HTTP request execution chain for Rust.
//!
//! `hopnet` turns a prepared request plus a planned network route into a
//! completed response. Along the way it establishes the route hop by hop
//! (including CONNECT tunnels through a proxy), answers target and proxy
//! authentication challenges, keeps connections alive for reuse, retries
//! transient failures and throttles overloaded routes.
//!
//! The wire codec and the transport are pluggable: the chain drives any
//! [`WireCodec`](crate::http::WireCodec) over any
//! [`ManagedConnection`](socket::ManagedConnection).
//!
//! ## Features
//!
//! - **Route Establishment**: direct, proxied, tunnelled and layered routes
//! - **Authentication**: per-endpoint challenge/response state machine, Basic scheme bundled
//! - **Connection Pooling**: 6 connections per route, state-affine reuse
//! - **Retry**: 503 with `Retry-After`, optional idempotent transport retries
//! - **Backoff**: AIMD adjustment of per-route connection limits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hopnet::{Client, socket::RoutePool};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = Arc::new(RoutePool::new(my_connection_factory));
//!     let client = Client::builder()
//!         .connection_manager(pool)
//!         .codec(Arc::new(MyCodec))
//!         .build()
//!         .unwrap();
//!     let response = client.get("http://example.com/").send().await.unwrap();
//!     println!("Status: {}", response.status());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`auth`] - Challenge parsing, auth schemes and the per-endpoint exchange
//! - [`base`] - Error taxonomy and cancellation
//! - [`exec`] - The execution chain: retry, backoff, main executor
//! - [`http`] - Request/response messages, codec seam, reuse strategies
//! - [`route`] - Hosts, routes, tracker, director and planner
//! - [`socket`] - Connection leases, holder and the route pool

pub mod auth;
pub mod base;
pub mod client;
pub mod exec;
pub mod http;
pub mod route;
pub mod socket;

pub use base::neterror::NetError;
pub use client::{Client, ClientBuilder, RequestBuilder};
pub use exec::{ExecChain, ExecContext, RequestConfig};
pub use crate::http::{HttpResponse, RequestBody};
