//! AI 出题、对话与题目修复
//!
//! 所有 AI 调用都受全局信号量和单用户并发数两层限制

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quiz_adapter_ai::{CompletionBackend, CompletionRequest, clean_json_response};
use quiz_config::{AiConfig, AiProviderConfig, LanguageLevelConfig, VarietyConfig};
use quiz_errors::{AppError, AppResult};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::schema::QuestionType;
use super::templates::{
    BatchPromptContext, ChatMessageContext, ChatPromptContext, FixPromptContext, PromptTemplates,
    example_for,
};
use super::validate::{GeneratedQuestion, validate_question};
use super::variety::{VarietyElements, VarietySelector};
use crate::user::UserAiConfig;

pub const DEFAULT_MAX_TOKENS: u32 = 4000;
/// 单次请求最多生成的题目数
pub const MAX_BATCH_SIZE: usize = 10;

/// 出题请求
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub language: String,
    pub level: String,
    pub question_type: QuestionType,
    /// 为空时使用服务商的批量大小
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub recent_question_history: Vec<String>,
    #[serde(default)]
    pub high_priority_topics: Vec<String>,
    #[serde(default)]
    pub weak_areas: Vec<String>,
    #[serde(default)]
    pub gap_analysis: HashMap<String, u32>,
}

/// 围绕某道题的对话请求
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub language: String,
    pub level: String,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub passage: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub user_answer: Option<usize>,
    #[serde(default)]
    pub correct_answer: Option<usize>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessageContext>,
    pub user_message: String,
}

/// 题目修复请求
#[derive(Debug, Clone, Deserialize)]
pub struct FixRequest {
    pub language: String,
    pub level: String,
    pub question_type: QuestionType,
    pub content: Value,
    #[serde(default)]
    pub report_reasons: Vec<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
}

/// 单用户并发占位，析构时释放
struct UserSlot {
    counts: Arc<Mutex<HashMap<String, usize>>>,
    username: String,
}

impl Drop for UserSlot {
    fn drop(&mut self) {
        if let Ok(mut counts) = self.counts.lock() {
            if let Some(n) = counts.get_mut(&self.username) {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    counts.remove(&self.username);
                }
            }
        }
    }
}

/// 一次 AI 调用期间持有的并发许可
struct CallPermit {
    _global: OwnedSemaphorePermit,
    _user: UserSlot,
}

pub struct QuestionGenerator {
    config: AiConfig,
    backend: Arc<dyn CompletionBackend>,
    templates: PromptTemplates,
    variety: Option<VarietySelector>,
    language_levels: HashMap<String, LanguageLevelConfig>,
    global: Arc<Semaphore>,
    per_user: Arc<Mutex<HashMap<String, usize>>>,
}

impl QuestionGenerator {
    pub fn new(
        config: AiConfig,
        backend: Arc<dyn CompletionBackend>,
        variety: Option<VarietyConfig>,
        language_levels: HashMap<String, LanguageLevelConfig>,
    ) -> AppResult<Self> {
        let global = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Ok(Self {
            config,
            backend,
            templates: PromptTemplates::new()?,
            variety: variety.map(VarietySelector::new),
            language_levels,
            global,
            per_user: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn provider(&self, code: &str) -> AppResult<&AiProviderConfig> {
        self.config
            .provider(code)
            .ok_or_else(|| AppError::validation(format!("unknown AI provider: {}", code)))
    }

    pub fn supports_grammar(&self, provider: &str) -> bool {
        self.config
            .provider(provider)
            .is_some_and(|p| p.supports_grammar)
    }

    pub fn batch_size(&self, provider: &str) -> usize {
        self.config
            .provider(provider)
            .map(|p| p.question_batch_size.max(1))
            .unwrap_or(1)
    }

    pub fn max_tokens(&self, provider: &str, model: &str) -> u32 {
        self.config
            .provider(provider)
            .and_then(|p| p.models.iter().find(|m| m.code == model))
            .and_then(|m| m.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn provider_url(&self, provider: &str) -> AppResult<String> {
        let provider = self.provider(provider)?;
        if provider.url.trim().is_empty() {
            return Err(AppError::validation("no base URL configured for provider"));
        }
        Ok(provider.url.clone())
    }

    /// 等级说明，语言可以用名称或代码
    fn level_description(&self, language: &str, level: &str) -> Option<String> {
        self.language_levels
            .get(language)
            .or_else(|| self.language_levels.values().find(|l| l.code == language))
            .and_then(|l| l.descriptions.get(level))
            .cloned()
    }

    fn acquire(&self, username: &str) -> AppResult<CallPermit> {
        let global = self.global.clone().try_acquire_owned().map_err(|_| {
            warn!(username, "AI concurrency limit reached");
            AppError::service_unavailable("AI service at capacity")
        })?;

        let mut counts = self
            .per_user
            .lock()
            .map_err(|_| AppError::internal("AI user slot lock poisoned"))?;
        let current = counts.entry(username.to_string()).or_insert(0);
        if *current >= self.config.max_per_user.max(1) {
            warn!(username, active = *current, "AI per-user concurrency limit reached");
            return Err(AppError::service_unavailable(
                "user concurrency limit exceeded",
            ));
        }
        *current += 1;
        drop(counts);

        Ok(CallPermit {
            _global: global,
            _user: UserSlot {
                counts: self.per_user.clone(),
                username: username.to_string(),
            },
        })
    }

    async fn complete(
        &self,
        ai: &UserAiConfig,
        prompt: String,
        grammar: Option<String>,
    ) -> AppResult<String> {
        let request = CompletionRequest {
            base_url: self.provider_url(&ai.provider)?,
            api_key: ai.api_key.clone(),
            model: ai.model.clone(),
            prompt,
            max_tokens: self.max_tokens(&ai.provider, &ai.model),
            grammar,
            username: ai.username.clone(),
        };
        let _permit = self.acquire(&ai.username)?;
        self.backend.complete(&request).await
    }

    /// 按用户的 AI 设置批量生成题目
    pub async fn generate(
        &self,
        ai: &UserAiConfig,
        request: &GenerationRequest,
    ) -> AppResult<Vec<GeneratedQuestion>> {
        let provider = self.provider(&ai.provider)?;
        let count = request
            .count
            .filter(|c| *c > 0)
            .unwrap_or(provider.question_batch_size.max(1))
            .min(MAX_BATCH_SIZE);

        let variety = match &self.variety {
            Some(selector) => selector.select(
                &request.level,
                &request.high_priority_topics,
                &request.weak_areas,
                &request.gap_analysis,
            ),
            None => VarietyElements::default(),
        };

        let question_type = request.question_type;
        let context = BatchPromptContext {
            language: request.language.clone(),
            level: request.level.clone(),
            level_description: self.level_description(&request.language, &request.level),
            question_type: question_type.as_str(),
            question_type_label: question_type.label(),
            count,
            recent_question_history: request.recent_question_history.clone(),
            example: Some(example_for(question_type).trim().to_string()),
            variety,
        };
        let mut prompt = self.templates.batch_question_prompt(&context)?;

        let schema = question_type.batch_schema();
        let grammar = if provider.supports_grammar {
            Some(schema)
        } else {
            prompt.push_str("\n\n");
            prompt.push_str(&self.templates.json_structure_guidance(&schema)?);
            None
        };

        debug!(
            username = %ai.username,
            provider = %ai.provider,
            question_type = %question_type,
            count,
            "Generating questions"
        );
        let response = self.complete(ai, prompt, grammar).await?;

        let items = parse_items(&response)?;
        let received = items.len();
        let mut questions = Vec::with_capacity(received);
        for (index, mut item) in items.into_iter().enumerate() {
            match validate_question(question_type, &mut item) {
                Ok(()) => questions.push(GeneratedQuestion {
                    question_type,
                    language: request.language.clone(),
                    level: request.level.clone(),
                    content: Value::Object(item),
                }),
                Err(reason) => {
                    warn!(index, reason = %reason, question_type = %question_type, "Discarding invalid generated question");
                }
            }
        }
        questions.truncate(count);

        if questions.is_empty() {
            return Err(AppError::external_service(
                "AI response contained no valid questions",
            ));
        }
        info!(
            username = %ai.username,
            question_type = %question_type,
            received,
            accepted = questions.len(),
            "Questions generated"
        );
        Ok(questions)
    }

    /// 针对当前题目回答学习者的问题
    pub async fn chat(&self, ai: &UserAiConfig, request: &ChatRequest) -> AppResult<String> {
        if request.user_message.trim().is_empty() {
            return Err(AppError::validation("message is required"));
        }
        let context = ChatPromptContext {
            language: request.language.clone(),
            level: request.level.clone(),
            question_type: request
                .question_type
                .map(|t| t.label().to_string())
                .unwrap_or_else(|| "practice".to_string()),
            passage: request.passage.clone(),
            question: request.question.clone(),
            options: request.options.clone(),
            answer_feedback: answer_feedback(request),
            conversation_history: request.conversation_history.clone(),
            user_message: request.user_message.trim().to_string(),
        };
        let prompt = self.templates.chat_prompt(&context)?;
        let reply = self.complete(ai, prompt, None).await?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(AppError::external_service("empty response from AI provider"));
        }
        Ok(reply.to_string())
    }

    /// 让 AI 修复被举报的题目，返回通过校验的新版本
    pub async fn fix_question(
        &self,
        ai: &UserAiConfig,
        request: &FixRequest,
    ) -> AppResult<GeneratedQuestion> {
        let question_type = request.question_type;
        let current_question = serde_json::to_string_pretty(&request.content)
            .map_err(|e| AppError::internal(format!("Failed to encode question: {}", e)))?;
        let schema = question_type.single_schema();

        let context = FixPromptContext {
            language: request.language.clone(),
            level: request.level.clone(),
            question_type: question_type.as_str(),
            current_question,
            report_reasons: request.report_reasons.clone(),
            additional_context: request
                .additional_context
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            schema,
        };
        let prompt = self.templates.ai_fix_prompt(&context)?;
        let grammar = self
            .supports_grammar(&ai.provider)
            .then(|| schema.to_string());
        let response = self.complete(ai, prompt, grammar).await?;

        let mut item = parse_items(&response)?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service("AI returned no fixed question"))?;
        validate_question(question_type, &mut item).map_err(|reason| {
            AppError::external_service(format!("AI returned an invalid question: {}", reason))
        })?;

        Ok(GeneratedQuestion {
            question_type,
            language: request.language.clone(),
            level: request.level.clone(),
            content: Value::Object(item),
        })
    }
}

fn answer_feedback(request: &ChatRequest) -> Option<String> {
    let (Some(user), Some(correct)) = (request.user_answer, request.correct_answer) else {
        return None;
    };
    if user == correct {
        Some(format!(
            "The learner chose option {} which is correct.",
            user
        ))
    } else {
        Some(format!(
            "The learner chose option {} but the correct answer is option {}.",
            user, correct
        ))
    }
}

/// 解析模型输出，接受数组或单个对象
fn parse_items(response: &str) -> AppResult<Vec<Map<String, Value>>> {
    let cleaned = clean_json_response(response);
    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        warn!(error = %e, "AI response is not valid JSON");
        AppError::external_service(format!("failed to parse AI response: {}", e))
    })?;

    match value {
        Value::Array(values) => Ok(values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()),
        Value::Object(map) => Ok(vec![map]),
        _ => Err(AppError::external_service(
            "AI response is not a JSON array or object",
        )),
    }
}
