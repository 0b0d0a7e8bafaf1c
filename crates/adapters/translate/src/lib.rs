//! 翻译服务商适配器
//!
//! - Google Translate v2
//! - Noop（原样返回，开发与测试用）

mod google;

pub use google::GoogleTranslateClient;

use async_trait::async_trait;
use quiz_errors::AppResult;

/// 翻译服务商接口
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 服务商代码，用于配额统计
    fn code(&self) -> &str;

    /// 翻译文本，语言参数为 ISO 代码
    async fn translate(&self, text: &str, source: &str, target: &str) -> AppResult<String>;
}

/// 原样返回输入的翻译器
#[derive(Debug, Clone, Default)]
pub struct NoopTranslator;

#[async_trait]
impl TranslationProvider for NoopTranslator {
    fn code(&self) -> &str {
        "noop"
    }

    async fn translate(&self, text: &str, _source: &str, _target: &str) -> AppResult<String> {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_echoes_input() {
        let translator = NoopTranslator;
        let out = translator.translate("hola", "es", "en").await.unwrap();
        assert_eq!(out, "hola");
        assert_eq!(translator.code(), "noop");
    }
}
