//! 通知 payload 组装

use serde_json::{Map, Value};

const APS_KEYS: [&str; 3] = ["alert", "sound", "badge"];

/// 将调用方提供的 JSON 整理为 APNs payload
///
/// 支持两种输入：
/// - 带 `aps` 对象：从中取 alert/sound/badge，其余顶层字段作为自定义数据
/// - 扁平结构：alert/sound/badge 提升到 `aps`，其余字段作为自定义数据
///
/// sound 缺省为 `"default"`
pub fn build_payload(input: &Value) -> Value {
    let empty = Map::new();
    let root = input.as_object().unwrap_or(&empty);

    let (aps_source, custom): (&Map<String, Value>, Vec<(&String, &Value)>) =
        match root.get("aps").and_then(Value::as_object) {
            Some(aps) => (aps, root.iter().filter(|(k, _)| *k != "aps").collect()),
            None => (
                root,
                root.iter()
                    .filter(|(k, _)| !APS_KEYS.contains(&k.as_str()))
                    .collect(),
            ),
        };

    let mut aps = Map::new();
    match aps_source.get("alert") {
        Some(Value::String(text)) => {
            aps.insert("alert".to_string(), Value::String(text.clone()));
        }
        Some(Value::Object(alert)) => {
            let mut out = Map::new();
            for key in ["title", "body"] {
                if let Some(Value::String(v)) = alert.get(key) {
                    out.insert(key.to_string(), Value::String(v.clone()));
                }
            }
            aps.insert("alert".to_string(), Value::Object(out));
        }
        _ => {}
    }

    let sound = aps_source
        .get("sound")
        .and_then(Value::as_str)
        .unwrap_or("default");
    aps.insert("sound".to_string(), Value::String(sound.to_string()));

    if let Some(badge) = aps_source.get("badge").and_then(Value::as_i64) {
        aps.insert("badge".to_string(), Value::from(badge));
    }

    let mut payload = Map::new();
    payload.insert("aps".to_string(), Value::Object(aps));
    for (key, value) in custom {
        payload.insert(key.clone(), value.clone());
    }
    Value::Object(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_aps() {
        let input = json!({
            "aps": {
                "alert": { "title": "Time for your daily quiz! 🧠", "body": "Tap to continue" },
                "sound": "chime"
            },
            "deep_link": "daily"
        });
        let out = build_payload(&input);
        assert_eq!(out["aps"]["alert"]["title"], "Time for your daily quiz! 🧠");
        assert_eq!(out["aps"]["sound"], "chime");
        assert_eq!(out["deep_link"], "daily");
        assert!(out["aps"].get("badge").is_none());
    }

    #[test]
    fn test_flat_payload_lifts_aps_fields() {
        let input = json!({ "alert": "hello", "badge": 3, "question_id": 42 });
        let out = build_payload(&input);
        assert_eq!(out["aps"]["alert"], "hello");
        assert_eq!(out["aps"]["sound"], "default");
        assert_eq!(out["aps"]["badge"], 3);
        assert_eq!(out["question_id"], 42);
        assert!(out.get("alert").is_none());
        assert!(out.get("badge").is_none());
    }

    #[test]
    fn test_non_object_input() {
        let out = build_payload(&json!("oops"));
        assert_eq!(out, json!({ "aps": { "sound": "default" } }));
    }
}
