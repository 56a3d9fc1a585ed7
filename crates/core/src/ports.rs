//! Contracts for the external collaborators the intake pipeline depends on.
//!
//! Every call may fail; callers never assume a retry happened.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::event::WorkOrderEvent;
use crate::domain::work_order::{WorkOrder, WorkOrderId};
use crate::wizard::sequencer::WizardConfig;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, PortError>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>, PortError>;
    async fn save(&self, customer: Customer) -> Result<(), PortError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub url: String,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores the file and returns a stable URL for it. Not idempotent.
    async fn upload(&self, file: UploadFile) -> Result<StoredFile, PortError>;
}

#[async_trait]
pub trait WorkOrderStore: Send + Sync {
    async fn find_by_id(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, PortError>;
    async fn create(&self, order: WorkOrder) -> Result<(), PortError>;
}

#[async_trait]
pub trait WorkOrderEventLog: Send + Sync {
    async fn append(&self, event: WorkOrderEvent) -> Result<(), PortError>;
    async fn list_for_order(&self, order_id: &WorkOrderId) -> Result<Vec<WorkOrderEvent>, PortError>;
}

/// Operator-editable settings store (key/value). `None` means the key is not set.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn wizard_config(&self) -> Result<Option<WizardConfig>, PortError>;
    async fn tax_rate(&self) -> Result<Option<Decimal>, PortError>;
}
