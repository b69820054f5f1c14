//! hoard-pool — size-bounded in-memory array pool
//!
//! Recycles typed arrays (`Vec<u8>`, `Vec<i32>`, ...) keyed by exact shape
//! under a byte budget. Retrieval is exact-size; eviction drops the
//! least-recently-inserted array once the budget is exceeded. A released
//! pool is terminal: it recycles every later put immediately.
//!
//! Use a typed façade (`BytePool`, `IntPool`, ...) when one element type is
//! enough, or `ArrayPool` directly to share one budget across types.

mod grouped;
mod key_pool;
mod kind;
mod pool;
mod strategy;
mod typed;

pub use kind::{ArrayKind, PoolElement, PooledArray};
pub use pool::{ArrayPool, Factory, PoolStats};
pub use strategy::SizeKey;
pub use typed::{BytePool, DoublePool, FloatPool, IntPool, LongPool, TypedPool};
