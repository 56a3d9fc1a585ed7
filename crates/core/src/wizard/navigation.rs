use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::customer::Customer;
use crate::domain::event::Operator;
use crate::errors::DomainError;
use crate::submission::{SubmissionAssembler, SubmissionContext, SubmissionError, SubmissionResult};
use crate::wizard::form::{
    CatalogSelection, ClassificationFacts, DeviceRef, FieldUpdate, FormState,
};
use crate::wizard::gate::{can_advance, missing_requirements};
use crate::wizard::sequencer::compute_effective_steps;
use crate::wizard::settings::SessionSettings;
use crate::wizard::steps::StepId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavDirection {
    Next,
    Back,
}

/// Position within the effective steps plus the back-navigation stack.
///
/// `history` holds raw indices as they were when pushed. They are not rewritten when the
/// effective steps change; a popped index is only clamped into range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub effective_steps: Vec<StepId>,
    pub current_index: usize,
    pub history: Vec<usize>,
    pub last_direction: Option<NavDirection>,
}

impl NavigationState {
    fn new(effective_steps: Vec<StepId>) -> Self {
        Self { effective_steps, current_index: 0, history: Vec::new(), last_direction: None }
    }

    pub fn current_step(&self) -> Option<StepId> {
        self.effective_steps.get(self.current_index).copied()
    }

    pub fn is_last(&self) -> bool {
        self.current_index + 1 >= self.effective_steps.len()
    }

    fn clamp(&self, index: usize) -> usize {
        index.min(self.effective_steps.len().saturating_sub(1))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { from: StepId, to: StepId },
    Blocked { step: StepId, missing: Vec<&'static str> },
    /// The last step passed its gate; the submission pipeline should run.
    ReadyToSubmit,
    /// Auto-advance never submits; it stops on the last step.
    AtLastStep,
    /// A submission started and never finished. See [`WizardSession::is_busy`].
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetreatOutcome {
    Moved { from: StepId, to: StepId },
    AtStart,
    /// A submission started and never finished. See [`WizardSession::is_busy`].
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Navigated(AdvanceOutcome),
    Submitted(SubmissionResult),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub position: usize,
    pub total: usize,
    pub percent: u8,
}

/// One intake wizard session. Owns the form, the derived device facts, and navigation.
pub struct WizardSession {
    session_id: String,
    settings: SessionSettings,
    operator: Operator,
    form: FormState,
    facts: ClassificationFacts,
    navigation: NavigationState,
    submitting: bool,
    audit: Option<Arc<dyn AuditSink>>,
}

impl WizardSession {
    pub fn open(settings: SessionSettings, operator: Operator) -> Result<Self, DomainError> {
        Self::open_with_form(settings, operator, FormState::default())
    }

    pub fn open_for_customer(
        settings: SessionSettings,
        operator: Operator,
        customer: &Customer,
    ) -> Result<Self, DomainError> {
        Self::open_with_form(settings, operator, FormState::preloaded(customer))
    }

    fn open_with_form(
        settings: SessionSettings,
        operator: Operator,
        form: FormState,
    ) -> Result<Self, DomainError> {
        let facts = ClassificationFacts::derive(&form, settings.wizard.use_catalog_wizard);
        let steps = compute_effective_steps(&settings.wizard, &facts);
        if steps.is_empty() {
            return Err(DomainError::EmptyStepSequence);
        }

        let session = Self {
            session_id: Uuid::new_v4().to_string(),
            settings,
            operator,
            form,
            facts,
            navigation: NavigationState::new(steps),
            submitting: false,
            audit: None,
        };
        info!(
            event_name = "wizard.session.opened",
            session_id = %session.session_id,
            steps = session.navigation.effective_steps.len(),
            catalog_mode = session.catalog_mode(),
            "intake wizard session opened"
        );
        Ok(session)
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn facts(&self) -> &ClassificationFacts {
        &self.facts
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn effective_steps(&self) -> &[StepId] {
        &self.navigation.effective_steps
    }

    pub fn current_step(&self) -> Option<StepId> {
        self.navigation.current_step()
    }

    /// While [`confirm`](Self::confirm) runs it holds `&mut self`, so nothing else can
    /// touch the session. The flag only stays set when an in-flight confirm future is
    /// dropped; a started submission cannot be rolled back, so the session then refuses
    /// navigation and edits until [`reset`](Self::reset).
    pub fn is_busy(&self) -> bool {
        self.submitting
    }

    pub fn catalog_mode(&self) -> bool {
        self.settings.wizard.use_catalog_wizard
    }

    pub fn progress(&self) -> Progress {
        let total = self.navigation.effective_steps.len();
        let position = (self.navigation.current_index + 1).min(total);
        let percent = if total == 0 { 0 } else { ((position * 100 + total / 2) / total) as u8 };
        Progress { position, total, percent }
    }

    /// Whether the "Continue" affordance should be enabled.
    pub fn can_continue(&self) -> bool {
        !self.submitting
            && self
                .current_step()
                .is_some_and(|step| can_advance(step, &self.form, self.catalog_mode()))
    }

    pub fn missing_requirements(&self) -> Vec<&'static str> {
        self.current_step()
            .map(|step| missing_requirements(step, &self.form, self.catalog_mode()))
            .unwrap_or_default()
    }

    /// The single mutation entry point for step components.
    pub fn update_field(&mut self, update: FieldUpdate) -> Result<(), DomainError> {
        if self.submitting {
            return Err(DomainError::SessionBusy);
        }
        let recompute = update.affects_classification();
        debug!(
            event_name = "wizard.form.field_updated",
            session_id = %self.session_id,
            field = update.field_name(),
            "form field updated"
        );
        self.form.apply(update);
        if recompute {
            self.recompute()?;
        }
        Ok(())
    }

    /// Re-derives device facts and the effective steps, keeping the current position
    /// (clamped) rather than restarting the wizard.
    pub fn recompute(&mut self) -> Result<(), DomainError> {
        let facts = ClassificationFacts::derive(&self.form, self.catalog_mode());
        let steps = compute_effective_steps(&self.settings.wizard, &facts);
        if steps.is_empty() {
            warn!(
                event_name = "wizard.sequencer.empty",
                session_id = %self.session_id,
                "effective step list became empty; session cannot continue"
            );
            return Err(DomainError::EmptyStepSequence);
        }

        self.facts = facts;
        if steps != self.navigation.effective_steps {
            debug!(
                event_name = "wizard.sequencer.recomputed",
                session_id = %self.session_id,
                steps = ?steps,
                "effective steps changed"
            );
        }
        self.navigation.effective_steps = steps;
        self.navigation.current_index = self.navigation.clamp(self.navigation.current_index);
        Ok(())
    }

    pub fn advance(&mut self) -> AdvanceOutcome {
        self.step_forward(true)
    }

    /// Programmatic advance requested by a step component. Same gate and history
    /// handling as [`Self::advance`], but never triggers submission.
    pub fn auto_advance(&mut self) -> AdvanceOutcome {
        self.step_forward(false)
    }

    fn step_forward(&mut self, may_submit: bool) -> AdvanceOutcome {
        if self.submitting {
            return AdvanceOutcome::Busy;
        }
        let Some(step) = self.current_step() else {
            return AdvanceOutcome::AtLastStep;
        };

        let missing = missing_requirements(step, &self.form, self.catalog_mode());
        if !missing.is_empty() {
            debug!(
                event_name = "wizard.navigation.blocked",
                session_id = %self.session_id,
                step = %step,
                missing = ?missing,
                "advance rejected by gate"
            );
            return AdvanceOutcome::Blocked { step, missing };
        }

        self.navigation.last_direction = Some(NavDirection::Next);
        if self.navigation.is_last() {
            return if may_submit { AdvanceOutcome::ReadyToSubmit } else { AdvanceOutcome::AtLastStep };
        }

        let from_index = self.navigation.current_index;
        self.navigation.history.push(from_index);
        self.navigation.current_index = from_index + 1;
        let to = self.navigation.effective_steps[self.navigation.current_index];
        self.record_navigation("wizard.step_advanced", step, to);
        AdvanceOutcome::Moved { from: step, to }
    }

    pub fn retreat(&mut self) -> RetreatOutcome {
        if self.submitting {
            return RetreatOutcome::Busy;
        }
        let Some(from) = self.current_step() else {
            return RetreatOutcome::AtStart;
        };

        let target = match self.navigation.history.pop() {
            Some(index) => self.navigation.clamp(index),
            None if self.navigation.current_index > 0 => self.navigation.current_index - 1,
            None => return RetreatOutcome::AtStart,
        };

        self.navigation.last_direction = Some(NavDirection::Back);
        self.navigation.current_index = target;
        let to = self.navigation.effective_steps[target];
        self.record_navigation("wizard.step_retreated", from, to);
        RetreatOutcome::Moved { from, to }
    }

    /// Applies one catalog pick (brand, family, optional series and model) as a single
    /// action. A fully specified pick made on the brand step auto-advances; picks made
    /// from any other step only update the form. Returns the auto-advance outcome, or
    /// `None` when nothing advanced.
    pub fn select_catalog_device(
        &mut self,
        selection: CatalogSelection,
    ) -> Result<Option<AdvanceOutcome>, DomainError> {
        if self.submitting {
            return Err(DomainError::SessionBusy);
        }
        let CatalogSelection { device, suggested_items } = selection;

        let model_name = device.model.as_ref().map(|model| match &device.series {
            Some(series) => format!("{} {}", series.label, model.label),
            None => model.label.clone(),
        });
        let device_type = device
            .family
            .kind
            .clone()
            .unwrap_or_else(|| device.family.label.to_lowercase());
        let fully_specified = model_name.is_some();
        let on_brand_step = self.current_step() == Some(StepId::Brand);

        self.form.apply(FieldUpdate::DeviceBrand(Some(DeviceRef::Named(device.brand.label.clone()))));
        self.form.apply(FieldUpdate::DeviceFamily(Some(DeviceRef::Named(device.family.label.clone()))));
        self.form.apply(FieldUpdate::DeviceModel(model_name.map(DeviceRef::Named)));
        self.form.apply(FieldUpdate::DeviceSubcategory(Some(DeviceRef::Named(
            device.family.label.clone(),
        ))));
        self.form.apply(FieldUpdate::DeviceCategory(Some(DeviceRef::Named(device_type.clone()))));
        self.form.apply(FieldUpdate::DeviceType(Some(device_type)));
        if !suggested_items.is_empty() {
            self.form.apply(FieldUpdate::SuggestedItems(suggested_items));
        }
        self.form.apply(FieldUpdate::CatalogDevice(Some(device)));
        self.recompute()?;

        info!(
            event_name = "wizard.catalog.selected",
            session_id = %self.session_id,
            fully_specified,
            "catalog device selected"
        );

        Ok((fully_specified && on_brand_step).then(|| self.auto_advance()))
    }

    /// Advance, and when the last step is confirmed run the submission pipeline.
    /// On success the session is reset; on failure it stays on the last step so the
    /// operator can retry.
    pub async fn confirm(
        &mut self,
        assembler: &SubmissionAssembler,
    ) -> Result<ConfirmOutcome, SubmissionError> {
        match self.advance() {
            AdvanceOutcome::ReadyToSubmit => {}
            other => return Ok(ConfirmOutcome::Navigated(other)),
        }

        let context = SubmissionContext {
            session_id: self.session_id.clone(),
            operator: self.operator.clone(),
            tax_rate: self.settings.tax_rate,
        };

        self.submitting = true;
        let result = assembler.assemble(&self.form, &context).await;
        self.submitting = false;

        match result {
            Ok(result) => {
                info!(
                    event_name = "wizard.session.submitted",
                    session_id = %self.session_id,
                    order_id = %result.order_id.0,
                    "work order submitted; resetting session"
                );
                self.reset();
                Ok(ConfirmOutcome::Submitted(result))
            }
            Err(error) => {
                warn!(
                    event_name = "wizard.session.submission_failed",
                    session_id = %self.session_id,
                    stage = %error.stage,
                    error = %error,
                    "work order submission failed; session left open"
                );
                Err(error)
            }
        }
    }

    /// Clears form, facts and navigation. Used for cancel and after a successful submission.
    pub fn reset(&mut self) {
        self.form = FormState::default();
        self.facts = ClassificationFacts::derive(&self.form, self.catalog_mode());
        let steps = compute_effective_steps(&self.settings.wizard, &self.facts);
        self.navigation = NavigationState::new(steps);
        self.submitting = false;
        debug!(event_name = "wizard.session.reset", session_id = %self.session_id, "session reset");
    }

    fn record_navigation(&self, event_type: &str, from: StepId, to: StepId) {
        debug!(
            event_name = event_type,
            session_id = %self.session_id,
            from = %from,
            to = %to,
            history_depth = self.navigation.history.len(),
            "wizard navigation"
        );
        if let Some(sink) = &self.audit {
            sink.emit(
                AuditEvent::new(
                    None,
                    Some(self.session_id.clone()),
                    self.session_id.clone(),
                    event_type,
                    AuditCategory::Navigation,
                    self.operator.display_name(),
                    AuditOutcome::Success,
                )
                .with_metadata("from", from.as_str())
                .with_metadata("to", to.as_str()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::audit::InMemoryAuditSink;
    use crate::domain::customer::{Customer, CustomerId};
    use crate::domain::event::Operator;
    use crate::errors::DomainError;
    use crate::ports::{CustomerDirectory, PortError};
    use crate::submission::fakes::{assembler, Fakes};
    use crate::submission::{SubmissionAssembler, SubmissionStage};
    use crate::wizard::form::{
        CatalogDevice, CatalogEntry, CatalogSelection, CustomerFields, DeviceRef, FieldUpdate,
    };
    use crate::wizard::sequencer::WizardConfig;
    use crate::wizard::settings::SessionSettings;
    use crate::wizard::steps::StepId;

    use super::{AdvanceOutcome, ConfirmOutcome, RetreatOutcome, WizardSession};

    fn settings(wizard: WizardConfig) -> SessionSettings {
        SessionSettings::new(wizard, Decimal::new(115, 3))
    }

    fn ordered(tokens: &[&str]) -> WizardConfig {
        WizardConfig {
            steps_order: tokens.iter().map(|token| token.to_string()).collect(),
            ..WizardConfig::default()
        }
    }

    fn customer_fields() -> CustomerFields {
        CustomerFields {
            name: "Ana".to_string(),
            last_name: "Diaz".to_string(),
            phone: "787-555-0101".to_string(),
            email: String::new(),
            additional_phones: Vec::new(),
        }
    }

    fn entry(id: &str, label: &str) -> CatalogEntry {
        CatalogEntry { id: id.to_string(), label: label.to_string(), kind: None }
    }

    #[test]
    fn apple_smartphone_path_skips_family() {
        let mut session =
            WizardSession::open(settings(WizardConfig::default()), Operator::default()).expect("open");
        assert_eq!(session.effective_steps().len(), 11);

        session.update_field(FieldUpdate::Customer(customer_fields())).expect("update");
        assert!(matches!(
            session.advance(),
            AdvanceOutcome::Moved { from: StepId::Customer, to: StepId::Brand }
        ));

        session.update_field(FieldUpdate::DeviceBrand(Some(DeviceRef::from("Apple")))).expect("update");
        assert!(!session.effective_steps().contains(&StepId::Family));
        assert!(matches!(session.advance(), AdvanceOutcome::Moved { to: StepId::Subcategory, .. }));

        session
            .update_field(FieldUpdate::DeviceSubcategory(Some(DeviceRef::from("Smartphone"))))
            .expect("update");
        assert!(matches!(session.advance(), AdvanceOutcome::Moved { to: StepId::Model, .. }));
        assert_eq!(
            session.effective_steps(),
            &[
                StepId::Customer,
                StepId::Brand,
                StepId::Subcategory,
                StepId::Model,
                StepId::Problem,
                StepId::Security,
                StepId::Checklist,
                StepId::Assignment,
                StepId::Signature,
                StepId::Summary,
            ]
        );
        assert_eq!(session.navigation().history, vec![0, 1, 2]);
    }

    #[test]
    fn blocked_advance_changes_nothing() {
        let mut session =
            WizardSession::open(settings(WizardConfig::default()), Operator::default()).expect("open");
        let before = session.navigation().clone();

        match session.advance() {
            AdvanceOutcome::Blocked { step, missing } => {
                assert_eq!(step, StepId::Customer);
                assert_eq!(missing, vec!["customer.name", "customer.phone"]);
            }
            other => panic!("expected blocked advance, got {other:?}"),
        }
        assert_eq!(session.navigation(), &before);
        assert!(!session.can_continue());
    }

    #[test]
    fn retreat_walks_history_back_to_start() {
        let mut session =
            WizardSession::open(settings(WizardConfig::default()), Operator::default()).expect("open");
        session.update_field(FieldUpdate::Customer(customer_fields())).expect("update");
        session.update_field(FieldUpdate::DeviceBrand(Some(DeviceRef::from("Motorola")))).expect("update");
        session.advance();
        session.advance();
        assert_eq!(session.current_step(), Some(StepId::Subcategory));

        assert!(matches!(session.retreat(), RetreatOutcome::Moved { to: StepId::Brand, .. }));
        assert!(matches!(session.retreat(), RetreatOutcome::Moved { to: StepId::Customer, .. }));
        assert_eq!(session.retreat(), RetreatOutcome::AtStart);
        assert_eq!(session.navigation().current_index, 0);
        assert!(session.navigation().history.is_empty());
    }

    #[test]
    fn shrinking_steps_clamps_position_instead_of_restarting() {
        let config = ordered(&["customer", "brand", "family", "model"]);
        let mut session = WizardSession::open(settings(config), Operator::default()).expect("open");
        session.update_field(FieldUpdate::Customer(customer_fields())).expect("update");
        session.update_field(FieldUpdate::DeviceBrand(Some(DeviceRef::from("Motorola")))).expect("update");
        session.update_field(FieldUpdate::DeviceFamily(Some(DeviceRef::from("Moto G")))).expect("update");
        session.advance();
        session.advance();
        session.advance();
        assert_eq!(session.navigation().current_index, 3);

        session.update_field(FieldUpdate::DeviceBrand(Some(DeviceRef::from("Apple")))).expect("update");
        assert_eq!(session.effective_steps(), &[StepId::Customer, StepId::Brand, StepId::Model]);
        assert_eq!(session.navigation().current_index, 2);
        assert_eq!(session.current_step(), Some(StepId::Model));

        // history index 2 now names the last step; it is clamped, not rewritten
        assert!(matches!(session.retreat(), RetreatOutcome::Moved { to: StepId::Model, .. }));
    }

    #[test]
    fn catalog_pick_auto_advances_past_collapsed_tiers() {
        let config = WizardConfig { use_catalog_wizard: true, ..WizardConfig::default() };
        let sink = InMemoryAuditSink::default();
        let mut session = WizardSession::open(settings(config), Operator::default())
            .expect("open")
            .with_audit_sink(Arc::new(sink.clone()));
        session.update_field(FieldUpdate::Customer(customer_fields())).expect("update");
        session.advance();
        assert_eq!(session.current_step(), Some(StepId::Brand));
        assert!(matches!(session.advance(), AdvanceOutcome::Blocked { .. }));

        let outcome = session
            .select_catalog_device(CatalogSelection {
                device: CatalogDevice {
                    brand: entry("b-1", "Apple"),
                    family: CatalogEntry { kind: Some("phone".to_string()), ..entry("f-1", "iPhone") },
                    series: Some(entry("s-1", "iPhone 13")),
                    model: Some(entry("m-1", "Pro Max")),
                },
                suggested_items: Vec::new(),
            })
            .expect("select");

        assert_eq!(outcome, Some(AdvanceOutcome::Moved { from: StepId::Brand, to: StepId::Problem }));
        assert!(!session.effective_steps().contains(&StepId::Subcategory));
        assert!(!session.effective_steps().contains(&StepId::Model));
        assert_eq!(session.form().device_model.as_ref().map(|model| model.name()), Some("iPhone 13 Pro Max"));
        assert_eq!(session.form().device_type.as_deref(), Some("phone"));
        assert!(sink.event_types().iter().any(|kind| kind == "wizard.step_advanced"));
    }

    #[test]
    fn partial_catalog_pick_does_not_advance() {
        let config = WizardConfig { use_catalog_wizard: true, ..WizardConfig::default() };
        let mut session = WizardSession::open(settings(config), Operator::default()).expect("open");
        let outcome = session
            .select_catalog_device(CatalogSelection {
                device: CatalogDevice {
                    brand: entry("b-2", "Samsung"),
                    family: entry("f-2", "Galaxy S"),
                    series: None,
                    model: None,
                },
                suggested_items: Vec::new(),
            })
            .expect("select");
        assert_eq!(outcome, None);
        assert_eq!(session.current_step(), Some(StepId::Customer));
        assert!(session.effective_steps().contains(&StepId::Family));
    }

    #[test]
    fn catalog_pick_off_the_brand_step_does_not_advance() {
        let config = WizardConfig {
            use_catalog_wizard: true,
            ..ordered(&["customer", "brand", "problem", "security", "checklist", "assignment", "signature", "summary"])
        };
        let mut session = WizardSession::open(settings(config), Operator::default()).expect("open");
        session.update_field(FieldUpdate::Customer(customer_fields())).expect("update");
        session.advance();
        let partial = session
            .select_catalog_device(CatalogSelection {
                device: CatalogDevice {
                    brand: entry("b-2", "Samsung"),
                    family: entry("f-2", "Galaxy S"),
                    series: None,
                    model: None,
                },
                suggested_items: Vec::new(),
            })
            .expect("select");
        assert_eq!(partial, None);
        assert!(matches!(session.advance(), AdvanceOutcome::Moved { to: StepId::Problem, .. }));
        session.update_field(FieldUpdate::ProblemDescription("Cracked screen".to_string())).expect("update");
        let before = session.navigation().clone();

        let outcome = session
            .select_catalog_device(CatalogSelection {
                device: CatalogDevice {
                    brand: entry("b-2", "Samsung"),
                    family: entry("f-2", "Galaxy S"),
                    series: Some(entry("s-2", "Galaxy S24")),
                    model: Some(entry("m-2", "Ultra")),
                },
                suggested_items: Vec::new(),
            })
            .expect("select");

        assert_eq!(outcome, None);
        assert_eq!(session.current_step(), Some(StepId::Problem));
        assert_eq!(session.navigation().history, before.history);
        assert_eq!(session.form().device_model.as_ref().map(|model| model.name()), Some("Galaxy S24 Ultra"));
    }

    #[test]
    fn disabling_every_step_fails_to_open() {
        let mut config = WizardConfig::default();
        for step in crate::wizard::steps::CANONICAL_ORDER {
            config.steps_enabled.insert(step.as_str().to_string(), false);
        }
        assert!(matches!(
            WizardSession::open(settings(config), Operator::default()),
            Err(DomainError::EmptyStepSequence)
        ));
    }

    #[test]
    fn preloaded_customer_can_advance_immediately() {
        let now = chrono::Utc::now();
        let customer = Customer {
            id: CustomerId("cust-1".to_string()),
            name: "Ana Maria Diaz".to_string(),
            phone: "787-555-0101".to_string(),
            email: "ana@mail.test".to_string(),
            additional_phones: Vec::new(),
            total_orders: 3,
            created_at: now,
            updated_at: now,
        };
        let mut session =
            WizardSession::open_for_customer(settings(WizardConfig::default()), Operator::default(), &customer)
                .expect("open");
        assert_eq!(session.form().customer.name, "Ana");
        assert_eq!(session.form().customer.last_name, "Maria Diaz");
        assert!(session.can_continue());
        assert!(matches!(session.advance(), AdvanceOutcome::Moved { .. }));
    }

    #[test]
    fn progress_reports_one_based_position() {
        let session =
            WizardSession::open(settings(ordered(&["customer", "problem", "summary", "signature"])), Operator::default())
                .expect("open");
        let progress = session.progress();
        assert_eq!(progress.position, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percent, 25);
        assert_eq!(session.effective_steps().last(), Some(&StepId::Summary));
    }

    fn ready_session() -> WizardSession {
        let mut session =
            WizardSession::open(settings(ordered(&["customer", "problem", "summary"])), Operator::default())
                .expect("open");
        session.update_field(FieldUpdate::Customer(customer_fields())).expect("update");
        session.advance();
        session.update_field(FieldUpdate::ProblemDescription("Battery drains fast".to_string())).expect("update");
        session.advance();
        session.update_field(FieldUpdate::TermsAccepted(true)).expect("update");
        session
    }

    #[tokio::test]
    async fn confirm_on_last_step_submits_and_resets() {
        let fakes = Arc::new(Fakes::default());
        let mut session = ready_session();
        assert_eq!(session.current_step(), Some(StepId::Summary));

        let outcome = session.confirm(&assembler(&fakes)).await.expect("submitted");
        let ConfirmOutcome::Submitted(result) = outcome else {
            panic!("expected submission");
        };
        assert!(result.order_number.starts_with("WO-"));
        assert_eq!(fakes.orders.lock().expect("lock").len(), 1);

        assert_eq!(session.current_step(), Some(StepId::Customer));
        assert!(session.navigation().history.is_empty());
        assert!(session.form().customer.name.is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn confirm_before_last_step_only_navigates() {
        let fakes = Arc::new(Fakes::default());
        let mut session =
            WizardSession::open(settings(ordered(&["customer", "summary"])), Operator::default()).expect("open");
        session.update_field(FieldUpdate::Customer(customer_fields())).expect("update");

        let outcome = session.confirm(&assembler(&fakes)).await.expect("navigated");
        assert!(matches!(outcome, ConfirmOutcome::Navigated(AdvanceOutcome::Moved { to: StepId::Summary, .. })));
        assert!(fakes.orders.lock().expect("lock").is_empty());
    }

    struct StalledDirectory;

    #[async_trait]
    impl CustomerDirectory for StalledDirectory {
        async fn find_by_id(&self, _id: &CustomerId) -> Result<Option<Customer>, PortError> {
            std::future::pending().await
        }

        async fn find_by_phone(&self, _phone: &str) -> Result<Option<Customer>, PortError> {
            std::future::pending().await
        }

        async fn save(&self, _customer: Customer) -> Result<(), PortError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn abandoned_submission_keeps_session_busy_until_reset() {
        let fakes = Arc::new(Fakes::default());
        let assembler =
            SubmissionAssembler::new(Arc::new(StalledDirectory), fakes.clone(), fakes.clone(), fakes.clone());
        let mut session = ready_session();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), session.confirm(&assembler)).await;
        assert!(abandoned.is_err());

        assert!(session.is_busy());
        assert!(!session.can_continue());
        assert_eq!(session.advance(), AdvanceOutcome::Busy);
        assert_eq!(session.retreat(), RetreatOutcome::Busy);
        assert!(matches!(
            session.update_field(FieldUpdate::Comments("late edit".to_string())),
            Err(DomainError::SessionBusy)
        ));
        assert!(fakes.orders.lock().expect("lock").is_empty());

        session.reset();
        assert!(!session.is_busy());
        assert_eq!(session.current_step(), Some(StepId::Customer));
    }

    #[tokio::test]
    async fn failed_submission_keeps_session_on_last_step() {
        let fakes = Arc::new(Fakes { fail_events: true, ..Fakes::default() });
        let mut session = ready_session();

        let error = session.confirm(&assembler(&fakes)).await.expect_err("fails");
        assert_eq!(error.stage, SubmissionStage::EventEmission);
        assert_eq!(session.current_step(), Some(StepId::Summary));
        assert_eq!(session.form().problem_description, "Battery drains fast");
        assert!(!session.is_busy());
        assert!(session.update_field(FieldUpdate::Comments("retrying".to_string())).is_ok());
    }
}
