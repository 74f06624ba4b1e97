// src/store/mod.rs - Store handle and backend primitives

pub mod backend;
pub mod handle;
pub mod memory;
pub mod redis_backend;

pub use backend::{KeyTtl, KvBackend, ScanPage, ServerStats};
pub use handle::{KeepAliveGuard, StoreHandle};
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
