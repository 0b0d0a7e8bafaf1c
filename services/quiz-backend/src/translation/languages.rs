//! 语言代码

use std::collections::HashMap;

use quiz_config::LanguageLevelConfig;
use quiz_errors::{AppError, AppResult};

/// 翻译服务商接受的语言代码
const SUPPORTED_LANGUAGES: &[&str] = &[
    "af", "sq", "am", "ar", "hy", "az", "eu", "be", "bn", "bs", "bg", "ca", "ceb", "ny", "zh",
    "zh-CN", "zh-TW", "co", "hr", "cs", "da", "nl", "en", "eo", "et", "tl", "fi", "fr", "fy", "gl",
    "ka", "de", "el", "gu", "ht", "ha", "haw", "iw", "hi", "hmn", "hu", "is", "ig", "id", "ga",
    "it", "ja", "jw", "kn", "kk", "km", "ko", "ku", "ky", "lo", "la", "lv", "lt", "lb", "mk", "mg",
    "ms", "ml", "mt", "mi", "mr", "mn", "my", "ne", "no", "ps", "fa", "pl", "pt", "pa", "ro", "ru",
    "sm", "gd", "sr", "st", "sn", "sd", "si", "sk", "sl", "so", "es", "su", "sw", "sv", "tg", "ta",
    "te", "th", "tr", "uk", "ur", "uz", "vi", "cy", "xh", "yi", "yo", "zu",
];

pub fn supported_languages() -> &'static [&'static str] {
    SUPPORTED_LANGUAGES
}

/// 语言名（如 `italian`）转为配置里的代码，未知的原样返回
pub fn normalize_language<'a>(
    language: &'a str,
    language_levels: &'a HashMap<String, LanguageLevelConfig>,
) -> &'a str {
    let language = language.trim();
    language_levels
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(language))
        .map(|(_, config)| config.code.as_str())
        .unwrap_or(language)
}

/// 2-10 个字符，只允许字母、数字和连字符
pub fn validate_language_code(code: &str) -> AppResult<()> {
    let len = code.chars().count();
    if !(2..=10).contains(&len) {
        return Err(AppError::validation("Language code must be 2-10 characters"));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AppError::validation("Invalid language code format"));
    }
    Ok(())
}
