//! Argon2 口令哈希
//!
//! 用户密码与 API key 共用同一套哈希

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use quiz_errors::{AppError, AppResult};

/// 明文最大长度，避免超长输入拖慢哈希
pub const MAX_SECRET_LENGTH: usize = 128;

/// 计算 PHC 格式的哈希
pub fn hash_password(plain: &str) -> AppResult<String> {
    if plain.is_empty() {
        return Err(AppError::validation("password cannot be empty"));
    }
    if plain.len() > MAX_SECRET_LENGTH {
        return Err(AppError::validation(format!(
            "password must be at most {} characters",
            MAX_SECRET_LENGTH
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("Failed to hash secret: {}", e)))
}

/// 校验明文与哈希是否匹配
///
/// 哈希格式无效时视为不匹配
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
