//! 长期 API key
//!
//! 格式为 `qapp_` 加 32 位十六进制，库里只保存前缀和 argon2 哈希

mod model;
mod repository;
mod service;

pub use model::*;
pub use repository::*;
pub use service::*;
