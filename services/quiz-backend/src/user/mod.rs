//! 用户模块
//!
//! 用户资料、角色、AI 设置、iOS 设备令牌与注册策略

mod model;
mod repository;
mod service;
mod signup;

pub use model::*;
pub use repository::*;
pub use service::*;
pub use signup::*;
