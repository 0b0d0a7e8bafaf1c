//! 提示词模板（tera，编译期内嵌）

use quiz_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

use super::schema::QuestionType;
use super::variety::VarietyElements;

pub const BATCH_QUESTION_PROMPT: &str = "batch_question_prompt";
pub const CHAT_PROMPT: &str = "chat_prompt";
pub const JSON_STRUCTURE_GUIDANCE: &str = "json_structure_guidance";
pub const AI_FIX_PROMPT: &str = "ai_fix_prompt";

const TEMPLATES: [(&str, &str); 4] = [
    (
        BATCH_QUESTION_PROMPT,
        include_str!("../../templates/batch_question_prompt.tera"),
    ),
    (CHAT_PROMPT, include_str!("../../templates/chat_prompt.tera")),
    (
        JSON_STRUCTURE_GUIDANCE,
        include_str!("../../templates/json_structure_guidance.tera"),
    ),
    (AI_FIX_PROMPT, include_str!("../../templates/ai_fix_prompt.tera")),
];

/// 每种题型的示例 JSON
pub fn example_for(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Vocabulary => include_str!("../../templates/examples/vocabulary.json"),
        QuestionType::FillBlank => include_str!("../../templates/examples/fill_blank.json"),
        QuestionType::Qa => include_str!("../../templates/examples/qa.json"),
        QuestionType::ReadingComprehension => {
            include_str!("../../templates/examples/reading_comprehension.json")
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchPromptContext {
    pub language: String,
    pub level: String,
    pub level_description: Option<String>,
    pub question_type: &'static str,
    pub question_type_label: &'static str,
    pub count: usize,
    pub recent_question_history: Vec<String>,
    pub example: Option<String>,
    #[serde(flatten)]
    pub variety: VarietyElements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageContext {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatPromptContext {
    pub language: String,
    pub level: String,
    pub question_type: String,
    pub passage: Option<String>,
    pub question: Option<String>,
    pub options: Vec<String>,
    pub answer_feedback: Option<String>,
    pub conversation_history: Vec<ChatMessageContext>,
    pub user_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixPromptContext {
    pub language: String,
    pub level: String,
    pub question_type: &'static str,
    pub current_question: String,
    pub report_reasons: Vec<String>,
    pub additional_context: Option<String>,
    pub schema: &'static str,
}

#[derive(Serialize)]
struct GuidanceContext<'a> {
    schema: &'a str,
}

/// 提示词模板集合
pub struct PromptTemplates {
    tera: Tera,
}

impl PromptTemplates {
    pub fn new() -> AppResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())
            .map_err(|e| AppError::internal(format!("Failed to load prompt templates: {}", e)))?;
        Ok(Self { tera })
    }

    fn render<T: Serialize>(&self, name: &str, data: &T) -> AppResult<String> {
        let context = Context::from_serialize(data).map_err(|e| {
            AppError::internal(format!("Failed to build context for {}: {}", name, e))
        })?;
        self.tera
            .render(name, &context)
            .map_err(|e| AppError::internal(format!("Failed to render template {}: {:?}", name, e)))
    }

    pub fn batch_question_prompt(&self, data: &BatchPromptContext) -> AppResult<String> {
        self.render(BATCH_QUESTION_PROMPT, data)
    }

    pub fn chat_prompt(&self, data: &ChatPromptContext) -> AppResult<String> {
        self.render(CHAT_PROMPT, data)
    }

    pub fn ai_fix_prompt(&self, data: &FixPromptContext) -> AppResult<String> {
        self.render(AI_FIX_PROMPT, data)
    }

    /// 不支持 grammar 字段的服务商，在提示词末尾附上 schema 说明
    pub fn json_structure_guidance(&self, schema: &str) -> AppResult<String> {
        self.render(JSON_STRUCTURE_GUIDANCE, &GuidanceContext { schema })
    }
}
