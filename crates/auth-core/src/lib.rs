//! quiz-auth-core - 认证核心库
//!
//! 会话 JWT 与口令哈希

mod password;
mod token;

pub use password::*;
pub use token::*;
