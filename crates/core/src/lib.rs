pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod submission;
pub mod wizard;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use domain::customer::{Customer, CustomerId};
pub use domain::event::{Operator, WorkOrderEvent, WorkOrderEventKind};
pub use domain::work_order::{WorkOrder, WorkOrderId, WorkOrderStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use ports::{
    CustomerDirectory, FileStore, PortError, SettingsSource, StoredFile, UploadFile,
    WorkOrderEventLog, WorkOrderStore,
};
pub use submission::{
    SubmissionAssembler, SubmissionContext, SubmissionError, SubmissionResult, SubmissionStage,
};
pub use wizard::{
    AdvanceOutcome, ConfirmOutcome, FieldUpdate, FormState, RetreatOutcome, SessionSettings,
    StepId, WizardConfig, WizardSession,
};
