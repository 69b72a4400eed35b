//! Route planning and establishment bookkeeping.
//!
//! - [`Route`]: immutable plan (target, proxies, tunnel/layer flags)
//! - [`RouteTracker`]: what has been physically established so far
//! - [`director`]: next-step decision function
//! - [`planner`]: proxy selection with NO_PROXY bypass

pub mod director;
pub mod host;
pub mod matcher;
pub mod plan;
pub mod planner;
pub mod proxy;
pub mod tracker;

pub use director::{BasicRouteDirector, RouteDirector, RouteStep};
pub use host::HttpHost;
pub use plan::{LayerType, Route, TunnelType};
pub use planner::{DefaultRoutePlanner, RoutePlanner};
pub use proxy::ProxySettings;
pub use tracker::RouteTracker;
