use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkOrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Intake,
    Diagnosing,
    InRepair,
    ReadyForPickup,
    Delivered,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Diagnosing => "diagnosing",
            Self::InRepair => "in_repair",
            Self::ReadyForPickup => "ready_for_pickup",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "intake" => Some(Self::Intake),
            "diagnosing" => Some(Self::Diagnosing),
            "in_repair" => Some(Self::InRepair),
            "ready_for_pickup" => Some(Self::ReadyForPickup),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Anything that is not explicitly `video/*` is treated as an image.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video") {
            Self::Video
        } else {
            Self::Image
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    pub kind: MediaKind,
    pub mime: String,
    pub filename: String,
    pub public_url: String,
    pub thumb_url: String,
}

/// Device credentials after reversible obfuscation. These values are NOT encrypted;
/// anyone holding the record can decode them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObfuscatedSecurity {
    pub device_password: Option<String>,
    pub device_pin: Option<String>,
    pub pattern_vector: Option<String>,
    pub pattern_image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Product,
    Service,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Option<String>,
    pub kind: LineItemKind,
    pub name: String,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl LineItem {
    pub fn extended_price(&self) -> Decimal {
        self.price * self.quantity
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_type: Option<String>,
    pub brand: String,
    pub model: String,
    pub subcategory: Option<String>,
    pub serial: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub technician_id: String,
    pub technician_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub order_number: String,
    pub status: WorkOrderStatus,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub device: DeviceIdentity,
    pub initial_problem: String,
    pub photos: Vec<MediaMetadata>,
    pub customer_signature: Option<String>,
    pub security: ObfuscatedSecurity,
    pub checklist_items: Vec<String>,
    pub checklist_notes: String,
    pub line_items: Vec<LineItem>,
    pub totals: Totals,
    pub cost_estimate: Decimal,
    pub assignment: Assignment,
    pub terms_accepted: bool,
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// `WO-` plus the last eight digits of the millisecond timestamp.
pub fn order_number_at(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().unsigned_abs().to_string();
    let tail = &millis[millis.len().saturating_sub(8)..];
    format!("WO-{tail}")
}
