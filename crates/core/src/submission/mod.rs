//! Turns a completed intake form into persisted records.
//!
//! Stages run strictly in order: customer resolution, media, signature, security
//! encoding, totals, order creation, events. A failing stage stops the pipeline and is
//! reported together with the stages that already completed. Completed side effects are
//! not rolled back.

#[cfg(test)]
pub(crate) mod fakes;
pub mod media;
pub mod obfuscation;
pub mod totals;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::customer::{Customer, CustomerChanges, CustomerId};
use crate::domain::event::{Operator, WorkOrderEvent, WorkOrderEventKind};
use crate::domain::work_order::{
    order_number_at, DeviceIdentity, LineItem, MediaMetadata, ObfuscatedSecurity, Totals,
    WorkOrder, WorkOrderId, WorkOrderStatus,
};
use crate::ports::{CustomerDirectory, FileStore, PortError, WorkOrderEventLog, WorkOrderStore};
use crate::wizard::form::{DeviceRef, FormState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStage {
    CustomerResolution,
    MediaPersistence,
    SignaturePersistence,
    SecurityEncoding,
    TotalsComputation,
    OrderCreation,
    EventEmission,
}

impl SubmissionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerResolution => "customer_resolution",
            Self::MediaPersistence => "media_persistence",
            Self::SignaturePersistence => "signature_persistence",
            Self::SecurityEncoding => "security_encoding",
            Self::TotalsComputation => "totals_computation",
            Self::OrderCreation => "order_creation",
            Self::EventEmission => "event_emission",
        }
    }
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("work order submission failed at {stage}: {cause}")]
pub struct SubmissionError {
    pub stage: SubmissionStage,
    pub cause: PortError,
    /// Stages whose side effects already happened.
    pub completed: Vec<SubmissionStage>,
}

#[derive(Clone, Debug)]
pub struct SubmissionContext {
    pub session_id: String,
    pub operator: Operator,
    pub tax_rate: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub order_id: WorkOrderId,
    pub order_number: String,
    pub customer_id: CustomerId,
    pub signature_ref: Option<String>,
    pub media: Vec<MediaMetadata>,
    pub totals: Totals,
}

pub struct SubmissionAssembler {
    customers: Arc<dyn CustomerDirectory>,
    files: Arc<dyn FileStore>,
    orders: Arc<dyn WorkOrderStore>,
    events: Arc<dyn WorkOrderEventLog>,
    audit: Option<Arc<dyn AuditSink>>,
}

/// Tracks stage completion for one submission and reports each stage to logs and audit.
struct PipelineRun<'a> {
    audit: Option<&'a dyn AuditSink>,
    context: AuditContext,
    completed: Vec<SubmissionStage>,
}

impl<'a> PipelineRun<'a> {
    fn new(audit: Option<&'a dyn AuditSink>, context: &SubmissionContext) -> Self {
        Self {
            audit,
            context: AuditContext::new(
                None,
                Some(context.session_id.clone()),
                Uuid::new_v4().to_string(),
                context.operator.display_name(),
            ),
            completed: Vec::new(),
        }
    }

    fn finish<T>(
        &mut self,
        stage: SubmissionStage,
        result: Result<T, PortError>,
    ) -> Result<T, SubmissionError> {
        match result {
            Ok(value) => {
                debug!(
                    event_name = "submission.stage.completed",
                    session_id = ?self.context.session_id,
                    correlation_id = %self.context.correlation_id,
                    stage = %stage,
                    "submission stage completed"
                );
                self.emit(
                    format!("submission.{stage}.completed"),
                    AuditOutcome::Success,
                    &[("stage", stage.as_str().to_string())],
                );
                self.completed.push(stage);
                Ok(value)
            }
            Err(cause) => {
                warn!(
                    event_name = "submission.stage.failed",
                    session_id = ?self.context.session_id,
                    correlation_id = %self.context.correlation_id,
                    stage = %stage,
                    completed = self.completed.len(),
                    error = %cause,
                    "submission stage failed"
                );
                self.emit(
                    "submission.failed",
                    AuditOutcome::Failed,
                    &[("stage", stage.as_str().to_string()), ("cause", cause.to_string())],
                );
                Err(SubmissionError { stage, cause, completed: std::mem::take(&mut self.completed) })
            }
        }
    }

    fn emit(&self, event_type: impl Into<String>, outcome: AuditOutcome, metadata: &[(&str, String)]) {
        let Some(sink) = self.audit else {
            return;
        };
        let event = metadata.iter().fold(
            self.context.event(event_type, AuditCategory::Submission, outcome),
            |event, (key, value)| event.with_metadata(*key, value.clone()),
        );
        sink.emit(event);
    }
}

impl SubmissionAssembler {
    pub fn new(
        customers: Arc<dyn CustomerDirectory>,
        files: Arc<dyn FileStore>,
        orders: Arc<dyn WorkOrderStore>,
        events: Arc<dyn WorkOrderEventLog>,
    ) -> Self {
        Self { customers, files, orders, events, audit: None }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub async fn assemble(
        &self,
        form: &FormState,
        context: &SubmissionContext,
    ) -> Result<SubmissionResult, SubmissionError> {
        let mut run = PipelineRun::new(self.audit.as_deref(), context);
        let now = Utc::now();
        info!(
            event_name = "submission.started",
            session_id = %context.session_id,
            correlation_id = %run.context.correlation_id,
            "assembling work order"
        );

        let customer_id =
            run.finish(SubmissionStage::CustomerResolution, self.resolve_customer(form, now).await)?;
        let media = run.finish(SubmissionStage::MediaPersistence, self.persist_media(form, now).await)?;
        let signature_ref =
            run.finish(SubmissionStage::SignaturePersistence, self.persist_signature(form, now).await)?;
        let security = run.finish(
            SubmissionStage::SecurityEncoding,
            Ok(obfuscation::obfuscate_security(&form.security)),
        )?;
        let line_items: Vec<LineItem> = form.suggested_items.iter().map(|item| item.to_line_item()).collect();
        let totals = run.finish(
            SubmissionStage::TotalsComputation,
            Ok(totals::compute_totals(&line_items, context.tax_rate)),
        )?;

        let order = build_order(OrderParts {
            form,
            operator: &context.operator,
            customer_id: customer_id.clone(),
            media: media.clone(),
            signature_ref: signature_ref.clone(),
            security,
            line_items,
            totals: totals.clone(),
            now,
        });
        let order = run.finish(SubmissionStage::OrderCreation, self.create_order(order).await)?;
        run.context.order_id = Some(order.id.clone());

        run.finish(SubmissionStage::EventEmission, self.emit_events(form, &order, &context.operator, now).await)?;

        info!(
            event_name = "submission.completed",
            session_id = %context.session_id,
            order_id = %order.id.0,
            order_number = %order.order_number,
            total = %totals.total,
            "work order created"
        );
        run.emit("submission.completed", AuditOutcome::Success, &[("order_number", order.order_number.clone())]);

        Ok(SubmissionResult {
            order_id: order.id,
            order_number: order.order_number,
            customer_id,
            signature_ref,
            media,
            totals,
        })
    }

    async fn resolve_customer(&self, form: &FormState, now: DateTime<Utc>) -> Result<CustomerId, PortError> {
        let changes = CustomerChanges {
            name: form.customer.full_name(),
            email: form.customer.email.trim().to_string(),
            additional_phones: form.customer.additional_phones.clone(),
        };

        if let Some(id) = &form.existing_customer_id {
            let mut customer = self
                .customers
                .find_by_id(id)
                .await?
                .ok_or_else(|| PortError::NotFound(format!("customer `{}`", id.0)))?;
            customer.apply_changes(changes, now);
            customer.record_order();
            self.customers.save(customer).await?;
            return Ok(id.clone());
        }

        let phone = form.customer.phone.trim();
        if let Some(mut customer) = self.customers.find_by_phone(phone).await? {
            debug!(
                event_name = "submission.customer.matched_by_phone",
                customer_id = %customer.id.0,
                "reusing customer with matching phone"
            );
            let id = customer.id.clone();
            customer.apply_changes(changes, now);
            customer.record_order();
            self.customers.save(customer).await?;
            return Ok(id);
        }

        let customer = Customer {
            id: CustomerId(Uuid::new_v4().to_string()),
            name: changes.name,
            phone: phone.to_string(),
            email: changes.email,
            additional_phones: changes.additional_phones,
            total_orders: 1,
            created_at: now,
            updated_at: now,
        };
        let id = customer.id.clone();
        self.customers.save(customer).await?;
        Ok(id)
    }

    async fn persist_media(&self, form: &FormState, now: DateTime<Utc>) -> Result<Vec<MediaMetadata>, PortError> {
        let mut stored = Vec::with_capacity(form.media_files.len());
        for (position, file) in form.media_files.iter().enumerate() {
            if let Some(metadata) = media::existing_metadata(file) {
                stored.push(metadata);
                continue;
            }
            if let Some(upload) = media::media_upload(file, position, now) {
                let location = self.files.upload(upload.clone()).await?;
                stored.push(media::uploaded_metadata(&upload, &location));
            }
        }
        Ok(stored)
    }

    async fn persist_signature(&self, form: &FormState, now: DateTime<Utc>) -> Result<Option<String>, PortError> {
        let Some(signature) = &form.signature else {
            return Ok(None);
        };
        let upload = media::signature_upload(signature, now)?;
        let stored = self.files.upload(upload).await?;
        Ok(Some(stored.url))
    }

    async fn create_order(&self, order: WorkOrder) -> Result<WorkOrder, PortError> {
        self.orders.create(order.clone()).await?;
        Ok(order)
    }

    async fn emit_events(
        &self,
        form: &FormState,
        order: &WorkOrder,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> Result<(), PortError> {
        let author = operator.display_name().to_string();
        let event = |kind: WorkOrderEventKind, description: String, for_customer: bool| WorkOrderEvent {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            kind,
            description,
            user_id: operator.id.clone(),
            user_name: author.clone(),
            user_role: operator.role_or_default().to_string(),
            for_customer,
            created_at: now,
        };

        let comments = form.comments.trim();
        if !comments.is_empty() {
            self.events.append(event(WorkOrderEventKind::Note, comments.to_string(), true)).await?;
        }
        self.events
            .append(event(
                WorkOrderEventKind::Create,
                format!("Order created by {author}. Data and attachments saved from the intake wizard."),
                false,
            ))
            .await
    }
}

struct OrderParts<'a> {
    form: &'a FormState,
    operator: &'a Operator,
    customer_id: CustomerId,
    media: Vec<MediaMetadata>,
    signature_ref: Option<String>,
    security: ObfuscatedSecurity,
    line_items: Vec<LineItem>,
    totals: Totals,
    now: DateTime<Utc>,
}

fn ref_name(value: Option<&DeviceRef>) -> Option<String> {
    value.map(|value| value.name().trim().to_string()).filter(|name| !name.is_empty())
}

fn build_order(parts: OrderParts<'_>) -> WorkOrder {
    let OrderParts { form, operator, customer_id, media, signature_ref, security, line_items, totals, now } =
        parts;

    let device_type = ref_name(form.device_category.as_ref())
        .or_else(|| ref_name(form.device_subcategory.as_ref()))
        .or_else(|| form.device_type.clone().filter(|kind| !kind.trim().is_empty()));

    let mut custom_fields = form.custom_fields.clone();
    if let Some(device) = &form.catalog_device {
        if let Ok(value) = serde_json::to_value(device) {
            custom_fields.insert("catalog_device".to_string(), value);
        }
    }

    WorkOrder {
        id: WorkOrderId(Uuid::new_v4().to_string()),
        order_number: order_number_at(now),
        status: WorkOrderStatus::Intake,
        customer_id,
        customer_name: form.customer.full_name(),
        customer_phone: form.customer.phone.trim().to_string(),
        customer_email: form.customer.email.trim().to_string(),
        device: DeviceIdentity {
            device_type,
            brand: ref_name(form.device_brand.as_ref()).unwrap_or_default(),
            model: ref_name(form.device_model.as_ref()).unwrap_or_default(),
            subcategory: ref_name(form.device_subcategory.as_ref()),
            serial: form.device_serial.trim().to_string(),
        },
        initial_problem: form.problem_description.trim().to_string(),
        photos: media,
        customer_signature: signature_ref,
        security,
        checklist_items: form.checklist_items.clone(),
        checklist_notes: form.checklist_notes.clone(),
        line_items,
        cost_estimate: totals.total,
        totals,
        assignment: form.assignment.clone().unwrap_or_default(),
        terms_accepted: form.terms_accepted,
        custom_fields,
        created_by: operator.id.clone().unwrap_or_else(|| operator.display_name().to_string()),
        created_at: now,
    }
}
