//! Scripted intake: replays a JSON document through one wizard session, then confirms
//! every step until the work order is submitted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use repairdesk_core::audit::InMemoryAuditSink;
use repairdesk_core::config::AppConfig;
use repairdesk_core::domain::customer::CustomerId;
use repairdesk_core::domain::event::Operator;
use repairdesk_core::domain::work_order::Assignment;
use repairdesk_core::errors::ApplicationError;
use repairdesk_core::ports::{
    CustomerDirectory, FileStore, SettingsSource, WorkOrderEventLog, WorkOrderStore,
};
use repairdesk_core::submission::{SubmissionAssembler, SubmissionResult};
use repairdesk_core::wizard::{
    AdvanceOutcome, CatalogDevice, CatalogSelection, ConfirmOutcome, CustomerFields, DeviceRef,
    FieldUpdate, MediaFile, SecurityFields, SessionSettings, SignatureImage, SuggestedItem,
    WizardSession, CANONICAL_ORDER,
};
use repairdesk_db::repositories::{
    InMemoryCustomerDirectory, InMemoryFileStore, InMemorySettingsSource,
    InMemoryWorkOrderEventLog, InMemoryWorkOrderStore, SqlCustomerRepository,
    SqlSettingsSource, SqlWorkOrderEventLog, SqlWorkOrderRepository,
};
use repairdesk_db::{connect, DbPool, LocalFileStore};

use crate::commands::{build_runtime, load_config, CommandResult};

type Failure = (&'static str, String, u8);

#[derive(Debug, Default, Deserialize)]
pub struct IntakeDocument {
    #[serde(default)]
    pub operator: Option<Operator>,
    /// Opens the session for an existing customer instead of an empty form.
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerFields>,
    #[serde(default)]
    pub device: DeviceDocument,
    #[serde(default)]
    pub catalog: Option<CatalogDocument>,
    #[serde(default)]
    pub problem_description: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub suggested_items: Vec<SuggestedItem>,
    #[serde(default)]
    pub security: SecurityDocument,
    #[serde(default)]
    pub media: Vec<MediaDocument>,
    #[serde(default)]
    pub checklist_items: Vec<String>,
    #[serde(default)]
    pub checklist_notes: String,
    #[serde(default)]
    pub signature: Option<SignatureDocument>,
    #[serde(default)]
    pub terms_accepted: bool,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceDocument {
    #[serde(default)]
    pub category: Option<DeviceRef>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub brand: Option<DeviceRef>,
    #[serde(default)]
    pub subcategory: Option<DeviceRef>,
    #[serde(default)]
    pub family: Option<DeviceRef>,
    #[serde(default)]
    pub model: Option<DeviceRef>,
    #[serde(default)]
    pub serial: String,
}

#[derive(Debug, Deserialize)]
pub struct CatalogDocument {
    pub device: CatalogDevice,
    #[serde(default)]
    pub suggested_items: Vec<SuggestedItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecurityDocument {
    #[serde(default)]
    pub device_password: String,
    #[serde(default)]
    pub device_pin: String,
    #[serde(default)]
    pub pattern_vector: Option<String>,
    #[serde(default)]
    pub pattern_image: Option<String>,
}

/// A photo either already hosted (`url`) or read from disk (`path`, relative to the document).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MediaDocument {
    Hosted {
        url: String,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        mime: Option<String>,
        #[serde(default)]
        filename: Option<String>,
        #[serde(default)]
        thumb_url: Option<String>,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        mime: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignatureDocument {
    DataUri {
        data_uri: String,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        mime: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct IntakeReport {
    dry_run: bool,
    result: SubmissionResult,
    audit_events: Vec<String>,
}

struct Ports {
    customers: Arc<dyn CustomerDirectory>,
    files: Arc<dyn FileStore>,
    orders: Arc<dyn WorkOrderStore>,
    events: Arc<dyn WorkOrderEventLog>,
    settings: Arc<dyn SettingsSource>,
    pool: Option<DbPool>,
}

impl Ports {
    fn in_memory() -> Self {
        Self {
            customers: Arc::new(InMemoryCustomerDirectory::default()),
            files: Arc::new(InMemoryFileStore::default()),
            orders: Arc::new(InMemoryWorkOrderStore::default()),
            events: Arc::new(InMemoryWorkOrderEventLog::default()),
            settings: Arc::new(InMemorySettingsSource::default()),
            pool: None,
        }
    }

    async fn database(config: &AppConfig) -> Result<Self, Failure> {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        Ok(Self {
            customers: Arc::new(SqlCustomerRepository::new(pool.clone())),
            files: Arc::new(LocalFileStore::new(config.storage.upload_dir.clone())),
            orders: Arc::new(SqlWorkOrderRepository::new(pool.clone())),
            events: Arc::new(SqlWorkOrderEventLog::new(pool.clone())),
            settings: Arc::new(SqlSettingsSource::new(pool.clone())),
            pool: Some(pool),
        })
    }
}

pub fn run(file: &Path, dry_run: bool) -> CommandResult {
    let config = match load_config("intake") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let document = match read_document(file) {
        Ok(document) => document,
        Err(error) => {
            return CommandResult::failure("intake", "intake_document", format!("{error:#}"), 2);
        }
    };
    let base_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
    let runtime = match build_runtime("intake") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let outcome = runtime.block_on(async {
        let ports = if dry_run { Ports::in_memory() } else { Ports::database(&config).await? };
        let result = submit(&config, &ports, document, &base_dir).await;
        if let Some(pool) = &ports.pool {
            pool.close().await;
        }
        result
    });

    match outcome {
        Ok((result, audit_events)) => {
            let message = format!(
                "work order {} created for customer {}",
                result.order_number, result.customer_id.0
            );
            CommandResult::success_with_data(
                "intake",
                message,
                IntakeReport { dry_run, result, audit_events },
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("intake", error_class, message, exit_code)
        }
    }
}

pub fn read_document(path: &Path) -> anyhow::Result<IntakeDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read intake document `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("could not parse intake document `{}`", path.display()))
}

async fn submit(
    config: &AppConfig,
    ports: &Ports,
    document: IntakeDocument,
    base_dir: &Path,
) -> Result<(SubmissionResult, Vec<String>), Failure> {
    let settings = SessionSettings::resolve(ports.settings.as_ref(), &config.intake).await;
    let operator = document.operator.clone().unwrap_or_else(|| Operator {
        full_name: config.intake.default_operator.clone(),
        ..Operator::default()
    });
    let audit = Arc::new(InMemoryAuditSink::default());

    let session = match &document.customer_id {
        Some(id) => {
            let customer = ports
                .customers
                .find_by_id(&CustomerId(id.clone()))
                .await
                .map_err(|error| ("persistence", error.to_string(), 4u8))?
                .ok_or_else(|| ("customer_not_found", format!("customer `{id}` does not exist"), 2u8))?;
            WizardSession::open_for_customer(settings, operator, &customer)
        }
        None => WizardSession::open(settings, operator),
    };
    let mut session =
        session.map_err(|error| ("wizard", error.to_string(), 6u8))?.with_audit_sink(audit.clone());

    apply_document(&mut session, document, base_dir).await?;

    let assembler = SubmissionAssembler::new(
        ports.customers.clone(),
        ports.files.clone(),
        ports.orders.clone(),
        ports.events.clone(),
    )
    .with_audit_sink(audit.clone());

    // Each confirm either moves one step or submits; the bound guards against a stalled wizard.
    for _ in 0..=CANONICAL_ORDER.len() {
        match session.confirm(&assembler).await {
            Ok(ConfirmOutcome::Submitted(result)) => {
                info!(
                    event_name = "intake.submitted",
                    order_id = %result.order_id.0,
                    order_number = %result.order_number,
                    "scripted intake submitted"
                );
                return Ok((result, audit.event_types()));
            }
            Ok(ConfirmOutcome::Navigated(AdvanceOutcome::Moved { .. })) => {}
            Ok(ConfirmOutcome::Navigated(AdvanceOutcome::Blocked { step, missing })) => {
                return Err((
                    "validation",
                    format!("step `{step}` is incomplete: missing {}", missing.join(", ")),
                    2,
                ));
            }
            Ok(ConfirmOutcome::Navigated(other)) => {
                return Err(("navigation", format!("wizard did not advance: {other:?}"), 6));
            }
            Err(error) => {
                let message = error.to_string();
                let interface = ApplicationError::from(error).into_interface(session.session_id());
                return Err((interface.class(), message, 5));
            }
        }
    }

    Err(("navigation", "wizard did not reach the last step".to_string(), 6))
}

async fn apply_document(
    session: &mut WizardSession,
    document: IntakeDocument,
    base_dir: &Path,
) -> Result<(), Failure> {
    let IntakeDocument {
        customer,
        device,
        catalog,
        problem_description,
        comments,
        suggested_items,
        security,
        media,
        checklist_items,
        checklist_notes,
        signature,
        terms_accepted,
        assignment,
        custom_fields,
        ..
    } = document;

    let media_files = load_media(media, base_dir).await?;
    let signature = match signature {
        Some(signature) => Some(load_signature(signature, base_dir).await?),
        None => None,
    };

    let mut updates = Vec::new();
    if let Some(customer) = customer {
        updates.push(FieldUpdate::Customer(customer));
    }
    updates.extend([
        FieldUpdate::DeviceCategory(device.category),
        FieldUpdate::DeviceType(device.device_type),
        FieldUpdate::DeviceBrand(device.brand),
        FieldUpdate::DeviceSubcategory(device.subcategory),
        FieldUpdate::DeviceFamily(device.family),
        FieldUpdate::DeviceModel(device.model),
        FieldUpdate::DeviceSerial(device.serial),
    ]);
    for update in updates {
        session.update_field(update).map_err(|error| ("wizard", error.to_string(), 6u8))?;
    }

    if let Some(catalog) = catalog {
        session
            .select_catalog_device(CatalogSelection {
                device: catalog.device,
                suggested_items: catalog.suggested_items,
            })
            .map_err(|error| ("wizard", error.to_string(), 6u8))?;
    }

    let mut updates = vec![
        FieldUpdate::ProblemDescription(problem_description),
        FieldUpdate::Comments(comments),
    ];
    updates.extend(suggested_items.into_iter().map(FieldUpdate::AddSuggestedItem));
    updates.extend([
        FieldUpdate::Security(SecurityFields {
            device_password: SecretString::from(security.device_password),
            device_pin: SecretString::from(security.device_pin),
            pattern_vector: security.pattern_vector.map(SecretString::from),
            pattern_image: security.pattern_image,
        }),
        FieldUpdate::MediaFiles(media_files),
        FieldUpdate::ChecklistItems(checklist_items),
        FieldUpdate::ChecklistNotes(checklist_notes),
        FieldUpdate::Signature(signature),
        FieldUpdate::TermsAccepted(terms_accepted),
        FieldUpdate::Assignment(assignment),
    ]);
    updates.extend(
        custom_fields.into_iter().map(|(key, value)| FieldUpdate::CustomField { key, value }),
    );
    for update in updates {
        session.update_field(update).map_err(|error| ("wizard", error.to_string(), 6u8))?;
    }

    Ok(())
}

async fn load_media(media: Vec<MediaDocument>, base_dir: &Path) -> Result<Vec<MediaFile>, Failure> {
    let mut files = Vec::with_capacity(media.len());
    for entry in media {
        files.push(match entry {
            MediaDocument::Hosted { url, id, mime, filename, thumb_url } => {
                MediaFile::Uploaded { id, mime, filename, url, thumb_url }
            }
            MediaDocument::File { path, mime } => {
                let (filename, bytes) = read_attachment(&path, base_dir).await?;
                MediaFile::Local { filename, mime, bytes }
            }
        });
    }
    Ok(files)
}

async fn load_signature(signature: SignatureDocument, base_dir: &Path) -> Result<SignatureImage, Failure> {
    match signature {
        SignatureDocument::DataUri { data_uri } => Ok(SignatureImage::DataUri(data_uri)),
        SignatureDocument::File { path, mime } => {
            let (filename, bytes) = read_attachment(&path, base_dir).await?;
            Ok(SignatureImage::File { filename, mime, bytes })
        }
    }
}

async fn read_attachment(path: &Path, base_dir: &Path) -> Result<(Option<String>, Vec<u8>), Failure> {
    let resolved = if path.is_absolute() { path.to_path_buf() } else { base_dir.join(path) };
    let bytes = tokio::fs::read(&resolved).await.map_err(|error| {
        ("intake_document", format!("could not read attachment `{}`: {error}", resolved.display()), 2u8)
    })?;
    let filename = resolved.file_name().map(|name| name.to_string_lossy().into_owned());
    Ok((filename, bytes))
}
