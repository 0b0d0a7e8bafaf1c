//! iOS 推送通知

mod service;

pub use service::*;
