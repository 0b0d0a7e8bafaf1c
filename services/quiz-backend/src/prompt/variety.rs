//! 出题多样性元素的随机选择
//!
//! 每次只应用 2 个（多于两个维度时 30% 概率 3 个）维度，避免提示词过长

use std::collections::HashMap;
use std::sync::LazyLock;

use quiz_config::VarietyConfig;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

/// 选中的多样性元素
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VarietyElements {
    pub topic_category: Option<String>,
    pub grammar_focus: Option<String>,
    pub vocabulary_domain: Option<String>,
    pub scenario: Option<String>,
    pub style_modifier: Option<String>,
    pub difficulty_modifier: Option<String>,
    pub time_context: Option<String>,
}

impl VarietyElements {
    pub fn selected_count(&self) -> usize {
        [
            &self.topic_category,
            &self.grammar_focus,
            &self.vocabulary_domain,
            &self.scenario,
            &self.style_modifier,
            &self.difficulty_modifier,
            &self.time_context,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    TopicCategory,
    GrammarFocus,
    VocabularyDomain,
    Scenario,
    StyleModifier,
    DifficultyModifier,
    TimeContext,
}

/// 用户的薄弱点等偏好输入
#[derive(Debug, Clone, Copy)]
pub struct VarietyBias<'a> {
    pub high_priority_topics: &'a [String],
    pub weak_areas: &'a [String],
    /// 键为 `{维度}_{选项}`，值为缺口数量
    pub gap_analysis: &'a HashMap<String, u32>,
}

static NO_GAPS: LazyLock<HashMap<String, u32>> = LazyLock::new(HashMap::new);

impl Default for VarietyBias<'_> {
    fn default() -> Self {
        Self {
            high_priority_topics: &[],
            weak_areas: &[],
            gap_analysis: &NO_GAPS,
        }
    }
}

pub struct VarietySelector {
    config: VarietyConfig,
}

impl VarietySelector {
    pub fn new(config: VarietyConfig) -> Self {
        Self { config }
    }

    pub fn select(
        &self,
        level: &str,
        high_priority_topics: &[String],
        weak_areas: &[String],
        gap_analysis: &HashMap<String, u32>,
    ) -> VarietyElements {
        let bias = VarietyBias {
            high_priority_topics,
            weak_areas,
            gap_analysis,
        };
        self.select_with(&mut rand::thread_rng(), level, bias)
    }

    pub fn select_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        level: &str,
        bias: VarietyBias<'_>,
    ) -> VarietyElements {
        let grammar = self
            .config
            .grammar_focus_by_level
            .get(level)
            .filter(|g| !g.is_empty())
            .unwrap_or(&self.config.grammar_focus);

        let mut dimensions = Vec::with_capacity(7);
        for (dimension, options) in [
            (Dimension::TopicCategory, &self.config.topic_categories),
            (Dimension::GrammarFocus, grammar),
            (Dimension::VocabularyDomain, &self.config.vocabulary_domains),
            (Dimension::Scenario, &self.config.scenarios),
            (Dimension::StyleModifier, &self.config.style_modifiers),
            (Dimension::DifficultyModifier, &self.config.difficulty_modifiers),
            (Dimension::TimeContext, &self.config.time_contexts),
        ] {
            if !options.is_empty() {
                dimensions.push((dimension, options));
            }
        }

        let count = if dimensions.len() > 2 && rng.gen_bool(0.3) { 3 } else { 2 };
        dimensions.shuffle(rng);

        let mut elements = VarietyElements::default();
        for (dimension, options) in dimensions.into_iter().take(count) {
            let value = match dimension {
                Dimension::TopicCategory => pick_topic(rng, options, &bias),
                Dimension::GrammarFocus => weighted_or_random(rng, "grammar_focus", options, &bias),
                Dimension::VocabularyDomain => {
                    weighted_or_random(rng, "vocabulary_domain", options, &bias)
                }
                Dimension::Scenario => weighted_or_random(rng, "scenario", options, &bias),
                _ => options.choose(rng).cloned(),
            };
            let slot = match dimension {
                Dimension::TopicCategory => &mut elements.topic_category,
                Dimension::GrammarFocus => &mut elements.grammar_focus,
                Dimension::VocabularyDomain => &mut elements.vocabulary_domain,
                Dimension::Scenario => &mut elements.scenario,
                Dimension::StyleModifier => &mut elements.style_modifier,
                Dimension::DifficultyModifier => &mut elements.difficulty_modifier,
                Dimension::TimeContext => &mut elements.time_context,
            };
            *slot = value;
        }
        elements
    }
}

/// 主题优先级：薄弱点 → 高优先级主题 → 缺口分析 → 随机
fn pick_topic<R: Rng + ?Sized>(
    rng: &mut R,
    topics: &[String],
    bias: &VarietyBias<'_>,
) -> Option<String> {
    for preferred in [bias.weak_areas, bias.high_priority_topics] {
        let matching: Vec<&String> = topics.iter().filter(|t| preferred.contains(t)).collect();
        if let Some(topic) = matching.choose(rng) {
            return Some((*topic).clone());
        }
    }
    weighted_or_random(rng, "topic_category", topics, bias)
}

/// 按缺口数量的平方加权选择，没有缺口时均匀随机
fn weighted_or_random<R: Rng + ?Sized>(
    rng: &mut R,
    gap_type: &str,
    options: &[String],
    bias: &VarietyBias<'_>,
) -> Option<String> {
    let weights: Vec<(&String, u64)> = options
        .iter()
        .filter_map(|option| {
            let count = *bias.gap_analysis.get(&format!("{}_{}", gap_type, option))?;
            (count > 0).then(|| (option, u64::from(count) * u64::from(count)))
        })
        .collect();

    let total: u64 = weights.iter().map(|(_, w)| w).sum();
    if total > 0 {
        let mut roll = rng.gen_range(0..total);
        for (option, weight) in &weights {
            if roll < *weight {
                return Some((*option).clone());
            }
            roll -= weight;
        }
    }
    options.choose(rng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn full_config() -> VarietyConfig {
        VarietyConfig {
            topic_categories: strings(&["travel", "food", "work"]),
            grammar_focus: strings(&["present tense"]),
            grammar_focus_by_level: HashMap::from([(
                "B1".to_string(),
                strings(&["subjunctive"]),
            )]),
            vocabulary_domains: strings(&["kitchen"]),
            scenarios: strings(&["at the station"]),
            style_modifiers: strings(&["formal"]),
            difficulty_modifiers: strings(&["tricky distractors"]),
            time_contexts: strings(&["past weekend"]),
        }
    }

    #[test]
    fn test_selects_two_or_three_elements() {
        let selector = VarietySelector::new(full_config());
        let gaps = HashMap::new();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let elements = selector.select_with(
                &mut rng,
                "A1",
                VarietyBias {
                    gap_analysis: &gaps,
                    ..Default::default()
                },
            );
            let n = elements.selected_count();
            assert!(n == 2 || n == 3, "seed {seed} selected {n}");
        }
    }

    #[test]
    fn test_default_bias_is_neutral() {
        let bias = VarietyBias::default();
        assert!(bias.high_priority_topics.is_empty());
        assert!(bias.weak_areas.is_empty());
        assert!(bias.gap_analysis.is_empty());

        let selector = VarietySelector::new(full_config());
        let mut rng = StdRng::seed_from_u64(3);
        let n = selector.select_with(&mut rng, "B2", bias).selected_count();
        assert!(n == 2 || n == 3);
    }

    #[test]
    fn test_empty_config_selects_nothing() {
        let selector = VarietySelector::new(VarietyConfig::default());
        let elements = selector.select("A1", &[], &[], &HashMap::new());
        assert_eq!(elements, VarietyElements::default());
    }

    #[test]
    fn test_level_specific_grammar() {
        let config = VarietyConfig {
            grammar_focus: strings(&["present tense"]),
            grammar_focus_by_level: HashMap::from([(
                "B1".to_string(),
                strings(&["subjunctive"]),
            )]),
            topic_categories: strings(&["travel"]),
            ..Default::default()
        };
        let selector = VarietySelector::new(config);
        let elements = selector.select("B1", &[], &[], &HashMap::new());
        assert_eq!(elements.grammar_focus.as_deref(), Some("subjunctive"));
        let elements = selector.select("A1", &[], &[], &HashMap::new());
        assert_eq!(elements.grammar_focus.as_deref(), Some("present tense"));
    }

    #[test]
    fn test_topic_prefers_weak_areas() {
        let config = VarietyConfig {
            topic_categories: strings(&["travel", "food", "work"]),
            scenarios: strings(&["at the station"]),
            ..Default::default()
        };
        let selector = VarietySelector::new(config);
        let weak = strings(&["food"]);
        let high = strings(&["work"]);
        for _ in 0..20 {
            let elements = selector.select("A1", &high, &weak, &HashMap::new());
            assert_eq!(elements.topic_category.as_deref(), Some("food"));
        }
        let elements = selector.select("A1", &high, &[], &HashMap::new());
        assert_eq!(elements.topic_category.as_deref(), Some("work"));
    }

    #[test]
    fn test_gap_analysis_weighting() {
        let options = strings(&["kitchen", "office"]);
        let gaps = HashMap::from([("vocabulary_domain_office".to_string(), 3)]);
        let bias = VarietyBias {
            gap_analysis: &gaps,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(
                weighted_or_random(&mut rng, "vocabulary_domain", &options, &bias).as_deref(),
                Some("office")
            );
        }
    }
}
