//! 翻译与翻译缓存

mod cache;
mod cleanup;
mod languages;
mod service;

pub use cache::*;
pub use cleanup::*;
pub use languages::*;
pub use service::*;
