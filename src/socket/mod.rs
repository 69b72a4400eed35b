//! Connection leasing and pooling.
//!
//! - [`connection`]: the managed connection and manager seams
//! - [`pool`]: route-keyed pool with affinity-aware reuse (6 per route, 256 total)
//! - [`holder`]: single-release ownership of a lease during a call

pub mod connection;
pub mod holder;
pub mod pool;

pub use connection::{
    AffinityToken, ConnectionFactory, ConnectionIo, ConnectionManager, Lease, ManagedConnection,
};
pub use holder::ConnectionHolder;
pub use pool::{PoolConfig, PoolControl, PoolStats, RoutePool};
