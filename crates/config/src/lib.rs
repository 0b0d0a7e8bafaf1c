//! quiz-config - 配置加载库

use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 启动时自动执行迁移
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

fn default_true() -> bool {
    true
}

/// JWT 配置
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default = "default_refresh_expires_in")]
    pub refresh_expires_in: u64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_expires_in() -> u64 {
    3600
}

fn default_refresh_expires_in() -> u64 {
    604800
}

fn default_issuer() -> String {
    "quizapp".to_string()
}

fn default_audience() -> String {
    "quizapp-api".to_string()
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 请求体上限（截图随反馈一起上传）
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_password: Option<Secret<String>>,
}

fn default_request_timeout_secs() -> u64 {
    180
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// 注册策略
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub signups_disabled: bool,
    pub allowed_domains: Vec<String>,
    pub allowed_emails: Vec<String>,
}

/// 翻译配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub enabled: bool,
    pub default_provider: String,
    pub providers: HashMap<String, TranslationProviderConfig>,
    pub quota: QuotaConfig,
    /// 缓存有效期（天）
    pub cache_ttl_days: i64,
    /// 过期缓存清理间隔（小时）
    pub cleanup_interval_hours: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_provider: "google".to_string(),
            providers: HashMap::new(),
            quota: QuotaConfig::default(),
            cache_ttl_days: 30,
            cleanup_interval_hours: 24,
        }
    }
}

/// 翻译服务商配置
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationProviderConfig {
    pub name: String,
    pub code: String,
    pub base_url: String,
    pub api_endpoint: String,
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_text_length() -> usize {
    5000
}

fn default_provider_timeout_secs() -> u64 {
    10
}

/// 月度配额配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub enabled: bool,
    pub default_monthly_quota: i64,
    pub google_monthly_quota: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_monthly_quota: 500_000,
            google_monthly_quota: 500_000,
        }
    }
}

/// APNs 推送配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApnsConfig {
    pub enabled: bool,
    /// .p8 文件路径
    pub key_path: Option<String>,
    /// 直接提供的密钥内容（PEM 或 base64）
    pub key: Option<Secret<String>>,
    pub key_id: String,
    pub team_id: String,
    pub bundle_id: String,
    pub production: bool,
}

/// AI 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub providers: Vec<AiProviderConfig>,
    pub max_concurrent: usize,
    pub max_per_user: usize,
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            max_concurrent: 10,
            max_per_user: 3,
            request_timeout_secs: 115,
        }
    }
}

impl AiConfig {
    /// 按 code 查找服务商
    pub fn provider(&self, code: &str) -> Option<&AiProviderConfig> {
        self.providers.iter().find(|p| p.code == code)
    }
}

/// AI 服务商配置
#[derive(Debug, Clone, Deserialize)]
pub struct AiProviderConfig {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub supports_grammar: bool,
    #[serde(default = "default_batch_size")]
    pub question_batch_size: usize,
    #[serde(default)]
    pub models: Vec<AiModelConfig>,
}

fn default_batch_size() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiModelConfig {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// 语言与等级配置
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageLevelConfig {
    /// ISO 语言代码
    pub code: String,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub descriptions: HashMap<String, String>,
}

/// 出题多样性配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VarietyConfig {
    pub topic_categories: Vec<String>,
    pub grammar_focus: Vec<String>,
    pub grammar_focus_by_level: HashMap<String, Vec<String>>,
    pub vocabulary_domains: Vec<String>,
    pub scenarios: Vec<String>,
    pub style_modifiers: Vec<String>,
    pub difficulty_modifiers: Vec<String>,
    pub time_contexts: Vec<String>,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub apns: ApnsConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub language_levels: HashMap<String, LanguageLevelConfig>,
    #[serde(default)]
    pub variety: Option<VarietyConfig>,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 环境变量使用 `APP_` 前缀，`__` 表示层级，例如 `APP_DATABASE__URL`
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
