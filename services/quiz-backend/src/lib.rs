//! Quiz backend service library
//!
//! 模块划分：
//! - `user`: 用户、角色、设备令牌、注册策略
//! - `api_key`: 长期 API key
//! - `feedback`: 用户反馈
//! - `usage`: 月度用量与配额
//! - `translation`: 翻译与翻译缓存
//! - `prompt`: AI 出题、对话与修题
//! - `notification`: iOS 推送
//! - `api`: HTTP 路由与中间件

pub mod api;
pub mod api_key;
pub mod error;
pub mod feedback;
pub mod migrations;
pub mod notification;
pub mod prompt;
pub mod translation;
pub mod usage;
pub mod user;
