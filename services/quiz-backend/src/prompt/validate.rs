//! AI 生成题目的校验与规范化

use serde::Serialize;
use serde_json::{Map, Value};

use super::schema::QuestionType;

/// 每道题的选项数
pub const OPTION_COUNT: usize = 4;

/// 通过校验的题目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedQuestion {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub language: String,
    pub level: String,
    pub content: Value,
}

fn default_explanation(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Vocabulary => {
            "This vocabulary question tests your knowledge of words in context."
        }
        QuestionType::ReadingComprehension => {
            "This reading comprehension question tests your understanding of the passage."
        }
        QuestionType::FillBlank => {
            "This fill-in-the-blank question tests your grammar and vocabulary knowledge."
        }
        QuestionType::Qa => "This question tests your conversational and practical language skills.",
    }
}

fn required_fields(question_type: QuestionType) -> &'static [&'static str] {
    match question_type {
        QuestionType::Vocabulary => &["sentence", "question"],
        QuestionType::ReadingComprehension => &["passage", "question"],
        QuestionType::FillBlank | QuestionType::Qa => &["question"],
    }
}

fn non_empty_str<'a>(item: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 校验单道题并就地规范化
///
/// `correct_answer` 可以是索引、数字字符串或选项原文，统一成整数索引；缺少解析时补默认解析
pub fn validate_question(
    question_type: QuestionType,
    item: &mut Map<String, Value>,
) -> Result<(), String> {
    for field in required_fields(question_type) {
        if non_empty_str(item, field).is_none() {
            return Err(format!("missing or empty field: {}", field));
        }
    }

    let options: Vec<String> = match item.get("options") {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| v.as_str().map(str::trim).unwrap_or_default().to_string())
            .collect(),
        _ => return Err("options must be an array".to_string()),
    };
    if options.len() != OPTION_COUNT {
        return Err(format!(
            "expected {} options, got {}",
            OPTION_COUNT,
            options.len()
        ));
    }
    if options.iter().any(String::is_empty) {
        return Err("options must be non-empty strings".to_string());
    }

    let index = correct_answer_index(item.get("correct_answer"), &options)?;
    item.insert("correct_answer".to_string(), Value::from(index as u64));

    if question_type == QuestionType::Vocabulary {
        let word = non_empty_str(item, "question").unwrap_or_default().to_lowercase();
        let sentence = non_empty_str(item, "sentence").unwrap_or_default().to_lowercase();
        if !sentence.contains(&word) {
            return Err(format!("target word '{}' does not appear in sentence", word));
        }
    }

    if non_empty_str(item, "explanation").is_none() {
        item.insert(
            "explanation".to_string(),
            Value::from(default_explanation(question_type)),
        );
    }
    Ok(())
}

fn correct_answer_index(value: Option<&Value>, options: &[String]) -> Result<usize, String> {
    let index = match value {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(i) => i as usize,
            None => match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 => f as usize,
                _ => return Err("correct_answer must be a non-negative integer".to_string()),
            },
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.parse::<usize>() {
                Ok(i) => i,
                Err(_) => options
                    .iter()
                    .position(|o| o.eq_ignore_ascii_case(s))
                    .ok_or_else(|| format!("correct_answer '{}' matches no option", s))?,
            }
        }
        _ => return Err("missing correct_answer".to_string()),
    };
    if index >= options.len() {
        return Err(format!("correct_answer {} out of range", index));
    }
    Ok(index)
}
