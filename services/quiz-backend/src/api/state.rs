//! 路由共享状态

use std::sync::Arc;

use quiz_auth_core::TokenService;

use crate::api_key::ApiKeyService;
use crate::feedback::FeedbackService;
use crate::notification::NotificationService;
use crate::prompt::QuestionGenerator;
use crate::translation::TranslationService;
use crate::usage::UsageTracker;
use crate::user::{SignupPolicy, UserService};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub users: Arc<UserService>,
    pub signup: Arc<SignupPolicy>,
    pub api_keys: Arc<ApiKeyService>,
    pub feedback: Arc<FeedbackService>,
    pub usage: Arc<dyn UsageTracker>,
    pub translation: Arc<TranslationService>,
    pub questions: Arc<QuestionGenerator>,
    pub notifications: Arc<NotificationService>,
}
