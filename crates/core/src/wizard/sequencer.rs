use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::wizard::form::ClassificationFacts;
use crate::wizard::steps::{StepId, CANONICAL_ORDER};

/// Operator-editable wizard layout, read once when a session opens.
///
/// Tokens are kept as raw strings so that a malformed or outdated configuration never
/// fails to load; unknown tokens are dropped when the effective steps are computed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardConfig {
    #[serde(default)]
    pub steps_order: Vec<String>,
    #[serde(default)]
    pub steps_enabled: BTreeMap<String, bool>,
    #[serde(default)]
    pub use_catalog_wizard: bool,
}

impl WizardConfig {
    /// Tokens compare case-insensitively, the same way [`StepId::parse`] reads them.
    pub fn is_enabled(&self, token: &str) -> bool {
        let token = token.trim();
        !self
            .steps_enabled
            .iter()
            .any(|(key, enabled)| !*enabled && key.trim().eq_ignore_ascii_case(token))
    }

    /// Configured order (canonical order when unset) minus explicitly disabled steps.
    fn configured_tokens(&self) -> Vec<String> {
        let base: Vec<String> = if self.steps_order.is_empty() {
            CANONICAL_ORDER.iter().map(|step| step.as_str().to_string()).collect()
        } else {
            self.steps_order.clone()
        };
        base.into_iter().filter(|token| self.is_enabled(token)).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrandLine {
    Apple,
    Samsung,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    Phone,
    Tablet,
    Laptop,
    Console,
    Watch,
    Other,
}

const APPLE_TOKENS: &[&str] = &["apple", "iphone"];
const SAMSUNG_TOKENS: &[&str] = &["samsung"];
const DEVICE_KIND_TOKENS: &[(&str, DeviceKind)] = &[
    ("tablet", DeviceKind::Tablet),
    ("ipad", DeviceKind::Tablet),
    ("laptop", DeviceKind::Laptop),
    ("macbook", DeviceKind::Laptop),
    ("notebook", DeviceKind::Laptop),
    ("console", DeviceKind::Console),
    ("watch", DeviceKind::Watch),
    ("phone", DeviceKind::Phone),
    ("celular", DeviceKind::Phone),
];

fn contains_any(haystack: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| haystack.contains(token))
}

pub fn normalize_brand(brand: &str) -> BrandLine {
    let brand = brand.to_lowercase();
    if contains_any(&brand, APPLE_TOKENS) {
        BrandLine::Apple
    } else if contains_any(&brand, SAMSUNG_TOKENS) {
        BrandLine::Samsung
    } else {
        BrandLine::Other
    }
}

/// First matching token wins, so "iPad" resolves to a tablet before the phone token is tried.
pub fn normalize_device_kind(subcategory: &str) -> DeviceKind {
    let subcategory = subcategory.to_lowercase();
    DEVICE_KIND_TOKENS
        .iter()
        .find(|(token, _)| subcategory.contains(token))
        .map(|(_, kind)| *kind)
        .unwrap_or(DeviceKind::Other)
}

/// Computes the steps shown for the current session. Pure; safe to call on every edit.
///
/// The result is always a subsequence of [`CANONICAL_ORDER`]. An empty result is possible
/// with a degenerate configuration; rejecting it is the caller's job.
pub fn compute_effective_steps(config: &WizardConfig, facts: &ClassificationFacts) -> Vec<StepId> {
    let mut working = config.configured_tokens();
    let brand = normalize_brand(&facts.brand_name);
    let device_kind = normalize_device_kind(&facts.subcategory_name);

    if facts.catalog_device_selected {
        working.retain(|token| {
            !matches!(StepId::parse(token), Some(StepId::Subcategory | StepId::Family | StepId::Model))
        });
    } else if brand == BrandLine::Apple {
        remove_step(&mut working, StepId::Family);
    } else if brand == BrandLine::Samsung {
        ensure_family_before_model(&mut working);
    } else if device_kind == DeviceKind::Phone {
        remove_step(&mut working, StepId::Family);
    }

    let mut effective: Vec<StepId> = working
        .iter()
        .filter_map(|token| {
            let step = StepId::parse(token);
            if step.is_none() {
                debug!(event_name = "wizard.sequencer.unknown_step", token = %token, "dropping unknown step token");
            }
            step
        })
        .collect();
    effective.sort_unstable();
    effective.dedup();
    effective
}

fn remove_step(working: &mut Vec<String>, step: StepId) {
    working.retain(|token| StepId::parse(token) != Some(step));
}

fn ensure_family_before_model(working: &mut Vec<String>) {
    if working.iter().any(|token| StepId::parse(token) == Some(StepId::Family)) {
        return;
    }
    let insert_at = working
        .iter()
        .position(|token| StepId::parse(token) == Some(StepId::Model))
        .unwrap_or(working.len());
    working.insert(insert_at, StepId::Family.as_str().to_string());
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::wizard::form::ClassificationFacts;
    use crate::wizard::steps::{StepId, CANONICAL_ORDER};

    use super::{
        compute_effective_steps, normalize_brand, normalize_device_kind, BrandLine, DeviceKind,
        WizardConfig,
    };

    fn facts(brand: &str, subcategory: &str, catalog: bool) -> ClassificationFacts {
        ClassificationFacts {
            brand_name: brand.to_string(),
            subcategory_name: subcategory.to_string(),
            catalog_device_selected: catalog,
        }
    }

    fn is_canonical_subsequence(steps: &[StepId]) -> bool {
        steps.windows(2).all(|pair| pair[0] < pair[1])
    }

    fn disabled(tokens: &[&str]) -> BTreeMap<String, bool> {
        tokens.iter().map(|token| (token.to_string(), false)).collect()
    }

    #[test]
    fn default_config_yields_canonical_order() {
        let steps = compute_effective_steps(&WizardConfig::default(), &ClassificationFacts::default());
        assert_eq!(steps, CANONICAL_ORDER.to_vec());
    }

    #[test]
    fn configured_order_is_resorted_and_unknown_tokens_dropped() {
        let config = WizardConfig {
            steps_order: vec![
                "summary".to_string(),
                "comments_media".to_string(),
                "customer".to_string(),
                "problem".to_string(),
                "Customer".to_string(),
                "teleport".to_string(),
            ],
            ..WizardConfig::default()
        };
        let steps = compute_effective_steps(&config, &ClassificationFacts::default());
        assert_eq!(steps, vec![StepId::Customer, StepId::Problem, StepId::Summary]);
    }

    #[test]
    fn summary_present_iff_enabled() {
        let enabled = compute_effective_steps(&WizardConfig::default(), &facts("Apple", "", false));
        assert!(enabled.contains(&StepId::Summary));

        let config = WizardConfig { steps_enabled: disabled(&["summary"]), ..WizardConfig::default() };
        for facts in [facts("Apple", "", false), facts("Samsung", "Smartphone", false), facts("", "", true)] {
            let steps = compute_effective_steps(&config, &facts);
            assert!(!steps.contains(&StepId::Summary));
            assert!(is_canonical_subsequence(&steps));
        }
    }

    #[test]
    fn enabled_flags_match_tokens_regardless_of_case() {
        let config = WizardConfig {
            steps_order: vec!["Customer".into(), "Problem".into(), "Summary".into()],
            steps_enabled: disabled(&["summary"]),
            ..WizardConfig::default()
        };
        let steps = compute_effective_steps(&config, &facts("", "", false));
        assert_eq!(steps, vec![StepId::Customer, StepId::Problem]);

        let config = WizardConfig {
            steps_order: vec!["customer".into(), "problem".into(), "summary".into()],
            steps_enabled: disabled(&[" Summary "]),
            ..WizardConfig::default()
        };
        let steps = compute_effective_steps(&config, &facts("", "", false));
        assert_eq!(steps, vec![StepId::Customer, StepId::Problem]);
    }

    #[test]
    fn catalog_selection_removes_device_tiers_regardless_of_brand() {
        for brand in ["Samsung", "Apple", "Motorola"] {
            let steps = compute_effective_steps(&WizardConfig::default(), &facts(brand, "Smartphone", true));
            assert!(!steps.contains(&StepId::Subcategory));
            assert!(!steps.contains(&StepId::Family));
            assert!(!steps.contains(&StepId::Model));
            assert!(steps.contains(&StepId::Brand));
        }
    }

    #[test]
    fn apple_never_shows_family_even_when_configured() {
        let config = WizardConfig {
            steps_order: vec!["customer".into(), "brand".into(), "family".into(), "model".into(), "summary".into()],
            ..WizardConfig::default()
        };
        for brand in ["Apple", "APPLE INC", "iPhone"] {
            let steps = compute_effective_steps(&config, &facts(brand, "Tablet", false));
            assert!(!steps.contains(&StepId::Family), "{brand} should drop family");
        }
    }

    #[test]
    fn phone_subcategory_drops_family_for_other_brands() {
        let steps = compute_effective_steps(&WizardConfig::default(), &facts("Motorola", "Smartphone", false));
        assert!(!steps.contains(&StepId::Family));

        let steps = compute_effective_steps(&WizardConfig::default(), &facts("Lenovo", "Laptop", false));
        assert!(steps.contains(&StepId::Family));
    }

    #[test]
    fn samsung_inserts_family_immediately_before_model() {
        let config = WizardConfig { steps_enabled: disabled(&["family"]), ..WizardConfig::default() };
        for subcategory in ["", "Smartphone", "Tablet"] {
            let steps = compute_effective_steps(&config, &facts("Samsung", subcategory, false));
            let model = steps.iter().position(|step| *step == StepId::Model).expect("model present");
            assert!(model > 0);
            assert_eq!(steps[model - 1], StepId::Family);
        }
    }

    #[test]
    fn samsung_without_model_appends_family_in_canonical_position() {
        let config = WizardConfig {
            steps_order: vec!["customer".into(), "brand".into(), "problem".into(), "summary".into()],
            ..WizardConfig::default()
        };
        let steps = compute_effective_steps(&config, &facts("samsung", "", false));
        assert_eq!(
            steps,
            vec![StepId::Customer, StepId::Brand, StepId::Family, StepId::Problem, StepId::Summary]
        );
    }

    #[test]
    fn normalization_is_substring_and_case_insensitive() {
        assert_eq!(normalize_brand("Apple Inc."), BrandLine::Apple);
        assert_eq!(normalize_brand("SAMSUNG Electronics"), BrandLine::Samsung);
        assert_eq!(normalize_brand("Xiaomi"), BrandLine::Other);
        assert_eq!(normalize_device_kind("iPad Pro"), DeviceKind::Tablet);
        assert_eq!(normalize_device_kind("Smartphone"), DeviceKind::Phone);
        assert_eq!(normalize_device_kind("Drone"), DeviceKind::Other);
    }

    #[test]
    fn everything_disabled_produces_an_empty_sequence() {
        let tokens: Vec<&str> = CANONICAL_ORDER.iter().map(|step| step.as_str()).collect();
        let config = WizardConfig { steps_enabled: disabled(&tokens), ..WizardConfig::default() };
        assert!(compute_effective_steps(&config, &ClassificationFacts::default()).is_empty());
    }
}
