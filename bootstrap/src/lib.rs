//! quiz-bootstrap - 统一服务启动骨架
//!
//! 配置加载、日志、数据库、迁移、健康检查与优雅关闭

mod health;
mod infrastructure;
mod runtime;
mod shutdown;
mod starter;

pub use health::*;
pub use infrastructure::*;
pub use runtime::*;
pub use shutdown::*;
pub use starter::*;
