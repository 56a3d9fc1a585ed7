use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::work_order::WorkOrderId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderEventKind {
    Create,
    Note,
    StatusChange,
}

impl WorkOrderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Note => "note",
            Self::StatusChange => "status_change",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "note" => Some(Self::Note),
            "status_change" => Some(Self::StatusChange),
            _ => None,
        }
    }
}

/// The person operating the intake counter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Operator {
    pub fn display_name(&self) -> &str {
        [self.full_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
            .unwrap_or("System")
    }

    pub fn role_or_default(&self) -> &str {
        self.role.as_deref().filter(|role| !role.trim().is_empty()).unwrap_or("system")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderEvent {
    pub id: String,
    pub order_id: WorkOrderId,
    pub order_number: String,
    pub kind: WorkOrderEventKind,
    pub description: String,
    pub user_id: Option<String>,
    pub user_name: String,
    pub user_role: String,
    pub for_customer: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{Operator, WorkOrderEventKind};

    #[test]
    fn display_name_falls_back_to_email_then_system() {
        let named = Operator {
            full_name: Some("Luis Rivera".to_string()),
            email: Some("luis@shop.test".to_string()),
            ..Operator::default()
        };
        assert_eq!(named.display_name(), "Luis Rivera");

        let email_only = Operator { email: Some("luis@shop.test".to_string()), ..Operator::default() };
        assert_eq!(email_only.display_name(), "luis@shop.test");

        assert_eq!(Operator::default().display_name(), "System");
        assert_eq!(Operator::default().role_or_default(), "system");
    }

    #[test]
    fn event_kind_round_trips_through_str() {
        for kind in [WorkOrderEventKind::Create, WorkOrderEventKind::Note] {
            assert_eq!(WorkOrderEventKind::parse(kind.as_str()), Some(kind));
        }
    }
}
