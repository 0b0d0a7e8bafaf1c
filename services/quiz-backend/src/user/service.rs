//! 用户服务

use std::sync::Arc;

use quiz_auth_core::{hash_password, verify_password};
use quiz_common::{PagedResult, Pagination, UserId};
use quiz_errors::{AppError, AppResult};
use tracing::{info, warn};

use super::model::{
    DeviceToken, NewUser, NewUserRecord, ROLE_ADMIN, ROLE_USER, Role, User, UserAiConfig,
    UserFilter, UserSettings,
};
use super::repository::UserRepository;
use crate::error::AuthError;

const DEFAULT_TIMEZONE: &str = "UTC";

pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// 创建用户并分配 `user` 角色
    pub async fn create_user(&self, input: NewUser) -> AppResult<User> {
        let username = input.username.trim();
        if username.is_empty() {
            return Err(AppError::validation("username is required"));
        }

        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let record = NewUserRecord {
            username: username.to_string(),
            email: input.email.filter(|e| !e.trim().is_empty()),
            password_hash,
            timezone: input
                .timezone
                .filter(|tz| !tz.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            language: input.language,
            level: input.level,
        };

        let mut user = self.repo.insert(&record).await?;
        let user_id = UserId(user.id);
        info!(user_id = user.id, username = %user.username, "User created");

        if let Err(e) = self.assign_role_by_name(user_id, ROLE_USER).await {
            warn!(user_id = user.id, error = %e, "Failed to assign default role");
        }
        user.roles = self.repo.roles_for(user_id).await.unwrap_or_default();
        Ok(user)
    }

    /// 校验用户名密码
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<User> {
        let Some(mut user) = self.repo.find_by_username(username).await? else {
            info!(username, reason = "unknown_user", "Authentication failed");
            return Err(AuthError::InvalidCredentials.into());
        };

        let Some(hash) = user.password_hash.as_deref() else {
            info!(username, reason = "no_password", "Authentication failed");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verify_password(password, hash) {
            info!(username, reason = "wrong_password", "Authentication failed");
            return Err(AuthError::InvalidCredentials.into());
        }

        self.attach_roles(&mut user).await;
        Ok(user)
    }

    /// 按 ID 查询，角色加载失败时返回空角色列表
    pub async fn get_user_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let Some(mut user) = self.repo.find_by_id(id).await? else {
            return Ok(None);
        };
        self.attach_roles(&mut user).await;
        Ok(Some(user))
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let Some(mut user) = self.repo.find_by_username(username).await? else {
            return Ok(None);
        };
        self.attach_roles(&mut user).await;
        Ok(Some(user))
    }

    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let Some(mut user) = self.repo.find_by_email(email).await? else {
            return Ok(None);
        };
        self.attach_roles(&mut user).await;
        Ok(Some(user))
    }

    async fn attach_roles(&self, user: &mut User) {
        match self.repo.roles_for(UserId(user.id)).await {
            Ok(roles) => user.roles = roles,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Failed to load user roles");
                user.roles = Vec::new();
            }
        }
    }

    pub async fn update_profile(
        &self,
        id: UserId,
        username: &str,
        email: Option<String>,
        timezone: Option<String>,
    ) -> AppResult<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::validation("username is required"));
        }
        let timezone = timezone
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let email = email.filter(|e| !e.trim().is_empty());

        let rows = self
            .repo
            .update_profile(id, username, email, &timezone)
            .await?;
        if rows == 0 {
            return Err(AppError::not_found("user not found"));
        }
        Ok(())
    }

    pub async fn update_password(&self, id: UserId, new_password: &str) -> AppResult<()> {
        if new_password.is_empty() {
            return Err(AppError::validation("password is required"));
        }
        let hash = hash_password(new_password)?;
        if self.repo.update_password_hash(id, &hash).await? == 0 {
            return Err(AppError::not_found("user not found"));
        }
        info!(user_id = %id, "Password updated");
        Ok(())
    }

    pub async fn update_settings(&self, id: UserId, settings: UserSettings) -> AppResult<()> {
        let settings = settings.normalized();
        if self.repo.update_settings(id, &settings).await? == 0 {
            return Err(AppError::not_found("user not found"));
        }
        Ok(())
    }

    /// 组装调用 AI 服务所需的配置
    pub async fn ai_config_for(&self, user: &User) -> AppResult<UserAiConfig> {
        if !user.ai_enabled {
            return Err(AppError::validation("AI is not enabled for this user"));
        }
        let (Some(provider), Some(model)) = (
            user.ai_provider.as_deref().filter(|p| !p.is_empty()),
            user.ai_model.as_deref().filter(|m| !m.is_empty()),
        ) else {
            return Err(AppError::validation("AI provider and model are not configured"));
        };

        let api_key = self.repo.api_key_for(UserId(user.id), provider).await?;
        Ok(UserAiConfig {
            username: user.username.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    pub async fn update_last_active(&self, id: UserId) -> AppResult<()> {
        self.repo.touch_last_active(id).await
    }

    pub async fn delete_user(&self, id: UserId) -> AppResult<()> {
        if self.repo.delete(id).await? == 0 {
            return Err(AppError::not_found("user not found"));
        }
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn list_users(
        &self,
        pagination: Pagination,
        filter: &UserFilter,
    ) -> AppResult<PagedResult<User>> {
        let (mut users, total) = self.repo.list(pagination, filter).await?;
        for user in users.iter_mut() {
            self.attach_roles(user).await;
        }
        Ok(PagedResult::new(users, total.max(0) as u64, &pagination))
    }

    // 角色

    pub async fn get_user_roles(&self, id: UserId) -> AppResult<Vec<Role>> {
        self.repo.roles_for(id).await
    }

    pub async fn assign_role_by_name(&self, id: UserId, role: &str) -> AppResult<()> {
        let role = self
            .repo
            .find_role(role)
            .await?
            .ok_or_else(|| AppError::not_found(format!("role not found: {}", role)))?;
        self.repo.assign_role(id, role.id).await
    }

    pub async fn remove_role(&self, id: UserId, role: &str) -> AppResult<()> {
        let role = self
            .repo
            .find_role(role)
            .await?
            .ok_or_else(|| AppError::not_found(format!("role not found: {}", role)))?;
        self.repo.remove_role(id, role.id).await?;
        Ok(())
    }

    pub async fn has_role(&self, id: UserId, role: &str) -> AppResult<bool> {
        Ok(self.repo.roles_for(id).await?.iter().any(|r| r.name == role))
    }

    pub async fn is_admin(&self, id: UserId) -> AppResult<bool> {
        self.has_role(id, ROLE_ADMIN).await
    }

    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.repo.list_roles().await
    }

    /// 确保管理员账号存在、密码匹配且拥有 `admin` 角色
    pub async fn ensure_admin_user(&self, username: &str, password: &str) -> AppResult<()> {
        match self.repo.find_by_username(username).await? {
            Some(user) => {
                let id = UserId(user.id);
                let verified = user
                    .password_hash
                    .as_deref()
                    .is_some_and(|hash| verify_password(password, hash));
                if !verified {
                    self.update_password(id, password).await?;
                    info!(username, "Admin password reset from configuration");
                }
                self.assign_role_by_name(id, ROLE_ADMIN).await
            }
            None => {
                let user = self
                    .create_user(NewUser {
                        username: username.to_string(),
                        password: Some(password.to_string()),
                        ..Default::default()
                    })
                    .await?;
                if let Err(e) = self.assign_role_by_name(UserId(user.id), ROLE_ADMIN).await {
                    warn!(username, error = %e, "Failed to assign admin role");
                }
                info!(username, "Admin user created");
                Ok(())
            }
        }
    }

    // 设备令牌

    pub async fn register_device_token(&self, id: UserId, token: &str) -> AppResult<DeviceToken> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::validation("device token is required"));
        }
        self.repo.upsert_device_token(id, token).await
    }

    pub async fn list_device_tokens(&self, id: UserId) -> AppResult<Vec<DeviceToken>> {
        self.repo.device_tokens(id).await
    }

    pub async fn remove_device_token(&self, id: UserId, token: &str) -> AppResult<()> {
        if self.repo.delete_device_token(id, token.trim()).await? == 0 {
            return Err(AppError::not_found("device token not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::repository::MockUserRepository;
    use chrono::Utc;
    use mockall::predicate::*;

    fn user(id: i64, username: &str, password: Option<&str>) -> User {
        User {
            id,
            username: username.to_string(),
            email: None,
            password_hash: password.map(|p| hash_password(p).unwrap()),
            timezone: "UTC".to_string(),
            preferred_language: Some("italian".to_string()),
            current_level: Some("B1".to_string()),
            ai_enabled: false,
            ai_provider: None,
            ai_model: None,
            last_active: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            roles: vec![],
        }
    }

    fn role(id: i64, name: &str) -> Role {
        Role {
            id,
            name: name.to_string(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_user_defaults_timezone_and_assigns_role() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert()
            .withf(|r| r.username == "alice" && r.timezone == "UTC" && r.password_hash.is_some())
            .returning(|r| Ok(user(7, &r.username, None)));
        repo.expect_find_role()
            .with(eq("user"))
            .returning(|_| Ok(Some(role(1, "user"))));
        repo.expect_assign_role()
            .with(eq(UserId(7)), eq(1))
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_roles_for()
            .returning(|_| Ok(vec![role(1, "user")]));

        let service = UserService::new(Arc::new(repo));
        let created = service
            .create_user(NewUser {
                username: "  alice ".to_string(),
                password: Some("secret".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, 7);
        assert!(created.has_role("user"));
    }

    #[tokio::test]
    async fn test_create_user_rejects_blank_username() {
        let service = UserService::new(Arc::new(MockUserRepository::new()));
        let err = service
            .create_user(NewUser {
                username: "   ".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_user_survives_role_failure() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert().returning(|r| Ok(user(3, &r.username, None)));
        repo.expect_find_role()
            .returning(|_| Err(AppError::database("boom")));
        repo.expect_roles_for().returning(|_| Ok(vec![]));

        let service = UserService::new(Arc::new(repo));
        let created = service
            .create_user(NewUser {
                username: "bob".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(created.roles.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_uses_single_public_message() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username()
            .with(eq("ghost"))
            .returning(|_| Ok(None));
        repo.expect_find_by_username()
            .with(eq("nopass"))
            .returning(|_| Ok(Some(user(1, "nopass", None))));
        repo.expect_find_by_username()
            .with(eq("alice"))
            .returning(|_| Ok(Some(user(2, "alice", Some("right")))));

        let service = UserService::new(Arc::new(repo));
        for (name, password) in [("ghost", "x"), ("nopass", "x"), ("alice", "wrong")] {
            let err = service.authenticate(name, password).await.unwrap_err();
            assert_eq!(err.to_string(), "Unauthorized: invalid username or password");
        }
    }

    #[tokio::test]
    async fn test_authenticate_success_loads_roles() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username()
            .returning(|_| Ok(Some(user(2, "alice", Some("right")))));
        repo.expect_roles_for()
            .returning(|_| Ok(vec![role(2, "admin")]));

        let service = UserService::new(Arc::new(repo));
        let user = service.authenticate("alice", "right").await.unwrap();
        assert!(user.has_role("admin"));
    }

    #[tokio::test]
    async fn test_get_user_degrades_when_roles_fail() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(user(id.as_i64(), "carol", None))));
        repo.expect_roles_for()
            .returning(|_| Err(AppError::database("roles table missing")));

        let service = UserService::new(Arc::new(repo));
        let user = service.get_user_by_id(UserId(5)).await.unwrap().unwrap();
        assert!(user.roles.is_empty());
    }

    #[tokio::test]
    async fn test_update_settings_not_found() {
        let mut repo = MockUserRepository::new();
        repo.expect_update_settings()
            .withf(|_, s| s.ai_provider.is_none() && s.ai_model.is_none())
            .returning(|_, _| Ok(0));

        let service = UserService::new(Arc::new(repo));
        let err = service
            .update_settings(
                UserId(9),
                UserSettings {
                    ai_provider: Some("openai".to_string()),
                    ai_model: Some("gpt".to_string()),
                    ai_enabled: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ai_config_requires_enabled_ai() {
        let service = UserService::new(Arc::new(MockUserRepository::new()));
        let err = service
            .ai_config_for(&user(1, "dave", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ai_config_loads_key() {
        let mut repo = MockUserRepository::new();
        repo.expect_api_key_for()
            .with(eq(UserId(1)), eq("openai"))
            .returning(|_, _| Ok(Some("sk-test".to_string())));

        let mut u = user(1, "dave", None);
        u.ai_enabled = true;
        u.ai_provider = Some("openai".to_string());
        u.ai_model = Some("gpt-4o-mini".to_string());

        let service = UserService::new(Arc::new(repo));
        let config = service.ai_config_for(&u).await.unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn test_assign_unknown_role() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_role().returning(|_| Ok(None));

        let service = UserService::new(Arc::new(repo));
        let err = service
            .assign_role_by_name(UserId(1), "superuser")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ensure_admin_resets_mismatched_password() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username()
            .returning(|_| Ok(Some(user(1, "admin", Some("old")))));
        repo.expect_update_password_hash()
            .times(1)
            .returning(|_, _| Ok(1));
        repo.expect_find_role()
            .with(eq("admin"))
            .returning(|_| Ok(Some(role(2, "admin"))));
        repo.expect_assign_role()
            .with(eq(UserId(1)), eq(2))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = UserService::new(Arc::new(repo));
        service.ensure_admin_user("admin", "new").await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_admin_keeps_matching_password() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username()
            .returning(|_| Ok(Some(user(1, "admin", Some("same")))));
        repo.expect_update_password_hash().never();
        repo.expect_find_role()
            .returning(|_| Ok(Some(role(2, "admin"))));
        repo.expect_assign_role().returning(|_, _| Ok(()));

        let service = UserService::new(Arc::new(repo));
        service.ensure_admin_user("admin", "same").await.unwrap();
    }

    #[tokio::test]
    async fn test_register_blank_device_token() {
        let service = UserService::new(Arc::new(MockUserRepository::new()));
        let err = service
            .register_device_token(UserId(1), "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_remove_missing_device_token() {
        let mut repo = MockUserRepository::new();
        repo.expect_delete_device_token().returning(|_, _| Ok(0));

        let service = UserService::new(Arc::new(repo));
        let err = service
            .remove_device_token(UserId(1), "abc")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not found: device token not found");
    }
}
