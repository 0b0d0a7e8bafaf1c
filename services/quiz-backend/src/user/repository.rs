//! 用户 Repository

use async_trait::async_trait;
use quiz_adapter_postgres::{is_unique_violation, map_sqlx_error};
use quiz_common::{Pagination, UserId};
use quiz_errors::{AppError, AppResult};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::model::{DeviceToken, NewUserRecord, Role, User, UserFilter, UserSettings};

const USER_COLUMNS: &str = "id, username, email, password_hash, timezone, preferred_language, \
     current_level, ai_enabled, ai_provider, ai_model, last_active, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &NewUserRecord) -> AppResult<User>;

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// 更新用户名、邮箱与时区，返回受影响行数
    async fn update_profile(
        &self,
        id: UserId,
        username: &str,
        email: Option<String>,
        timezone: &str,
    ) -> AppResult<u64>;

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> AppResult<u64>;

    /// 更新学习与 AI 设置，需要时在同一事务内写入用户的 AI key
    async fn update_settings(&self, id: UserId, settings: &UserSettings) -> AppResult<u64>;

    /// 用户为某个 AI 服务商保存的 key
    async fn api_key_for(&self, id: UserId, provider: &str) -> AppResult<Option<String>>;

    async fn touch_last_active(&self, id: UserId) -> AppResult<()>;

    async fn delete(&self, id: UserId) -> AppResult<u64>;

    /// 分页查询，返回 (当前页, 总数)
    async fn list(&self, pagination: Pagination, filter: &UserFilter) -> AppResult<(Vec<User>, i64)>;

    async fn roles_for(&self, id: UserId) -> AppResult<Vec<Role>>;

    async fn find_role(&self, name: &str) -> AppResult<Option<Role>>;

    /// 重复分配不报错
    async fn assign_role(&self, id: UserId, role_id: i64) -> AppResult<()>;

    async fn remove_role(&self, id: UserId, role_id: i64) -> AppResult<u64>;

    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    async fn upsert_device_token(&self, id: UserId, token: &str) -> AppResult<DeviceToken>;

    async fn device_tokens(&self, id: UserId) -> AppResult<Vec<DeviceToken>>;

    async fn delete_device_token(&self, id: UserId, token: &str) -> AppResult<u64>;
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 追加过滤条件，只使用绑定参数
fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a UserFilter) {
    builder.push(" WHERE 1=1");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder
            .push(" AND (username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(language) = filter.language.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND preferred_language = ").push_bind(language);
    }
    if let Some(level) = filter.level.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND current_level = ").push_bind(level);
    }
    if let Some(ai_enabled) = filter.ai_enabled {
        builder.push(" AND ai_enabled = ").push_bind(ai_enabled);
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn insert(&self, user: &NewUserRecord) -> AppResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, timezone, preferred_language,
                               current_level, ai_enabled)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.timezone)
            .bind(&user.language)
            .bind(&user.level)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::conflict("username already exists")
                } else {
                    AppError::database(format!("Failed to create user: {}", e))
                }
            })
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to find user: {}", e)))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to find user: {}", e)))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to find user: {}", e)))
    }

    async fn update_profile(
        &self,
        id: UserId,
        username: &str,
        email: Option<String>,
        timezone: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $1, email = $2, timezone = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(timezone)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update user profile", e))?;
        Ok(result.rows_affected())
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update password: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn update_settings(&self, id: UserId, settings: &UserSettings) -> AppResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET preferred_language = $1, current_level = $2, ai_provider = $3,
                ai_model = $4, ai_enabled = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(&settings.language)
        .bind(&settings.level)
        .bind(&settings.ai_provider)
        .bind(&settings.ai_model)
        .bind(settings.ai_enabled)
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to update user settings: {}", e)))?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }

        if let (true, Some(provider), Some(key)) = (
            settings.ai_enabled,
            settings.ai_provider.as_deref(),
            settings.api_key.as_deref(),
        ) {
            sqlx::query(
                r#"
                INSERT INTO user_ai_api_keys (user_id, provider, api_key)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, provider)
                DO UPDATE SET api_key = EXCLUDED.api_key, updated_at = NOW()
                "#,
            )
            .bind(id.as_i64())
            .bind(provider)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to save AI API key: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit transaction: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn api_key_for(&self, id: UserId, provider: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT api_key FROM user_ai_api_keys WHERE user_id = $1 AND provider = $2",
        )
        .bind(id.as_i64())
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load AI API key: {}", e)))
    }

    async fn touch_last_active(&self, id: UserId) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_active = NOW() WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update last active: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, id: UserId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete user: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn list(&self, pagination: Pagination, filter: &UserFilter) -> AppResult<(Vec<User>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count users: {}", e)))?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit_i64())
            .push(" OFFSET ")
            .push_bind(pagination.offset_i64());

        let users = query
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list users: {}", e)))?;

        Ok((users, total))
    }

    async fn roles_for(&self, id: UserId) -> AppResult<Vec<Role>> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.description, r.created_at
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load user roles: {}", e)))
    }

    async fn find_role(&self, name: &str) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find role: {}", e)))
    }

    async fn assign_role(&self, id: UserId, role_id: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(id.as_i64())
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to assign role: {}", e)))?;
        Ok(())
    }

    async fn remove_role(&self, id: UserId, role_id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(id.as_i64())
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to remove role: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        sqlx::query_as::<_, Role>("SELECT id, name, description, created_at FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list roles: {}", e)))
    }

    async fn upsert_device_token(&self, id: UserId, token: &str) -> AppResult<DeviceToken> {
        sqlx::query_as::<_, DeviceToken>(
            r#"
            INSERT INTO ios_device_tokens (user_id, device_token)
            VALUES ($1, $2)
            ON CONFLICT (user_id, device_token)
            DO UPDATE SET updated_at = NOW()
            RETURNING id, user_id, device_token, created_at, updated_at
            "#,
        )
        .bind(id.as_i64())
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to register device token: {}", e)))
    }

    async fn device_tokens(&self, id: UserId) -> AppResult<Vec<DeviceToken>> {
        sqlx::query_as::<_, DeviceToken>(
            r#"
            SELECT id, user_id, device_token, created_at, updated_at
            FROM ios_device_tokens
            WHERE user_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load device tokens: {}", e)))
    }

    async fn delete_device_token(&self, id: UserId, token: &str) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM ios_device_tokens WHERE user_id = $1 AND device_token = $2")
                .bind(id.as_i64())
                .bind(token)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to delete device token: {}", e)))?;
        Ok(result.rows_affected())
    }
}
