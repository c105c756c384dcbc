//! Keyed, concurrency-bounded pools for expensive render resources.
//!
//! A loaded map/stylesheet is costly to construct (style parsing,
//! datasource connection) and is not safe for unbounded concurrent use.
//! [`KeyedPool`] mediates access: one bounded sub-pool per resource
//! identity, FIFO waiter queues, lazy construction, time-driven idle
//! eviction, and a drain sequence for graceful shutdown. Acquired
//! resources come wrapped in a [`PoolGuard`] that hands them back on
//! drop, so cancelled callers cannot leak a checked-out slot.
//!
//! [`RoundRobinPool`] is a contrasting lower-overhead policy: a fixed,
//! pre-constructed set reused by index rotation, with no exclusivity
//! guarantee. See its module docs for the trade-off.

pub mod config;
pub mod error;
pub mod factory;
pub mod keyed;
pub mod round_robin;

pub use config::PoolConfig;
pub use error::PoolError;
pub use factory::ResourceFactory;
pub use keyed::{KeyedPool, PoolGuard, PoolStatus};
pub use round_robin::RoundRobinPool;
