//! 用户反馈

mod model;
mod repository;
mod service;

pub use model::*;
pub use repository::*;
pub use service::*;
