//! 题型与 JSON schema

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Vocabulary,
    FillBlank,
    Qa,
    ReadingComprehension,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [
        Self::Vocabulary,
        Self::FillBlank,
        Self::Qa,
        Self::ReadingComprehension,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vocabulary => "vocabulary",
            Self::FillBlank => "fill_blank",
            Self::Qa => "qa",
            Self::ReadingComprehension => "reading_comprehension",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// 提示词中使用的名称
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vocabulary => "vocabulary",
            Self::FillBlank => "fill-in-the-blank",
            Self::Qa => "question and answer",
            Self::ReadingComprehension => "reading comprehension",
        }
    }

    /// 单题 schema
    pub fn single_schema(&self) -> &'static str {
        match self {
            Self::ReadingComprehension => SINGLE_READING_COMPREHENSION_SCHEMA,
            Self::Vocabulary => SINGLE_VOCABULARY_SCHEMA,
            Self::FillBlank | Self::Qa => SINGLE_QUESTION_SCHEMA,
        }
    }

    /// 批量 schema，外层为数组
    pub fn batch_schema(&self) -> String {
        format!(r#"{{"type":"array","items":{}}}"#, self.single_schema())
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SINGLE_QUESTION_SCHEMA: &str = r#"{"type":"object","properties":{"question":{"type":"string"},"options":{"type":"array","items":{"type":"string"},"minItems":4,"maxItems":4},"correct_answer":{"type":"integer"},"explanation":{"type":"string"},"topic":{"type":"string"}},"required":["question","options","correct_answer","explanation"]}"#;

const SINGLE_READING_COMPREHENSION_SCHEMA: &str = r#"{"type":"object","properties":{"passage":{"type":"string"},"question":{"type":"string"},"options":{"type":"array","items":{"type":"string"},"minItems":4,"maxItems":4},"correct_answer":{"type":"integer"},"explanation":{"type":"string"},"topic":{"type":"string"}},"required":["passage","question","options","correct_answer","explanation"]}"#;

const SINGLE_VOCABULARY_SCHEMA: &str = r#"{"type":"object","properties":{"sentence":{"type":"string"},"question":{"type":"string"},"options":{"type":"array","items":{"type":"string"},"minItems":4,"maxItems":4},"correct_answer":{"type":"integer"},"explanation":{"type":"string"},"topic":{"type":"string"}},"required":["sentence","question","options","correct_answer","explanation"]}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_parse_and_serde_names_agree() {
        for t in QuestionType::ALL {
            assert_eq!(QuestionType::parse(t.as_str()), Some(t));
            assert_eq!(serde_json::to_value(t).unwrap(), Value::String(t.to_string()));
        }
        assert_eq!(QuestionType::parse("essay"), None);
    }

    #[test]
    fn test_schemas_are_valid_json() {
        for t in QuestionType::ALL {
            let single: Value = serde_json::from_str(t.single_schema()).unwrap();
            assert_eq!(single["type"], "object");
            let batch: Value = serde_json::from_str(&t.batch_schema()).unwrap();
            assert_eq!(batch["type"], "array");
            assert_eq!(batch["items"], single);
        }
    }

    #[test]
    fn test_type_specific_fields() {
        let reading: Value =
            serde_json::from_str(QuestionType::ReadingComprehension.single_schema()).unwrap();
        assert!(reading["required"].as_array().unwrap().contains(&Value::from("passage")));
        let vocab: Value = serde_json::from_str(QuestionType::Vocabulary.single_schema()).unwrap();
        assert!(vocab["properties"].get("sentence").is_some());
    }
}
