use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one wizard screen. Declaration order is the canonical (logical) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Customer,
    Brand,
    Subcategory,
    Family,
    Model,
    Problem,
    Security,
    Checklist,
    Assignment,
    Signature,
    Summary,
}

pub const CANONICAL_ORDER: [StepId; 11] = [
    StepId::Customer,
    StepId::Brand,
    StepId::Subcategory,
    StepId::Family,
    StepId::Model,
    StepId::Problem,
    StepId::Security,
    StepId::Checklist,
    StepId::Assignment,
    StepId::Signature,
    StepId::Summary,
];

impl StepId {
    pub fn logical_order(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Brand => "brand",
            Self::Subcategory => "subcategory",
            Self::Family => "family",
            Self::Model => "model",
            Self::Problem => "problem",
            Self::Security => "security",
            Self::Checklist => "checklist",
            Self::Assignment => "assignment",
            Self::Signature => "signature",
            Self::Summary => "summary",
        }
    }

    /// Unknown tokens (including retired ones such as `comments_media`) yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        CANONICAL_ORDER.into_iter().find(|step| step.as_str() == token)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Brand => "Brand",
            Self::Subcategory => "Device Type",
            Self::Family => "Family",
            Self::Model => "Model",
            Self::Problem => "Diagnosis, Parts and Photos",
            Self::Security => "Device Security",
            Self::Checklist => "Intake Checklist",
            Self::Assignment => "Assignment",
            Self::Signature => "Signature and Terms",
            Self::Summary => "Summary",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{StepId, CANONICAL_ORDER};

    #[test]
    fn canonical_order_matches_logical_order() {
        for (index, step) in CANONICAL_ORDER.iter().enumerate() {
            assert_eq!(step.logical_order(), index);
        }
        assert!(StepId::Customer < StepId::Brand);
        assert!(StepId::Signature < StepId::Summary);
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown_tokens() {
        assert_eq!(StepId::parse("Summary"), Some(StepId::Summary));
        assert_eq!(StepId::parse(" family "), Some(StepId::Family));
        assert_eq!(StepId::parse("comments_media"), None);
        assert_eq!(StepId::parse("device"), None);
    }
}
