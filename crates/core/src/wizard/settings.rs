use rust_decimal::Decimal;
use tracing::warn;

use crate::config::IntakeConfig;
use crate::ports::SettingsSource;
use crate::wizard::sequencer::WizardConfig;

/// Read-only snapshot taken when a session opens. Nothing in the wizard polls for
/// configuration afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub wizard: WizardConfig,
    pub tax_rate: Decimal,
}

impl SessionSettings {
    pub fn new(wizard: WizardConfig, tax_rate: Decimal) -> Self {
        Self { wizard, tax_rate }
    }

    pub fn from_config(intake: &IntakeConfig) -> Self {
        Self::new(intake.wizard.clone(), intake.tax_rate)
    }

    /// Prefers values stored in the settings source and falls back to the local
    /// configuration when a value is absent or the source fails. Never errors, so a
    /// broken settings store cannot block order intake.
    pub async fn resolve(source: &dyn SettingsSource, fallback: &IntakeConfig) -> Self {
        let wizard = match source.wizard_config().await {
            Ok(Some(wizard)) => wizard,
            Ok(None) => fallback.wizard.clone(),
            Err(error) => {
                warn!(
                    event_name = "wizard.settings.wizard_config_fallback",
                    error = %error,
                    "could not load wizard config; using local configuration"
                );
                fallback.wizard.clone()
            }
        };

        let tax_rate = match source.tax_rate().await {
            Ok(Some(rate)) if rate >= Decimal::ZERO && rate < Decimal::ONE => rate,
            Ok(Some(rate)) => {
                warn!(
                    event_name = "wizard.settings.tax_rate_rejected",
                    tax_rate = %rate,
                    "stored tax rate out of range; using local configuration"
                );
                fallback.tax_rate
            }
            Ok(None) => fallback.tax_rate,
            Err(error) => {
                warn!(
                    event_name = "wizard.settings.tax_rate_fallback",
                    error = %error,
                    "could not load tax rate; using local configuration"
                );
                fallback.tax_rate
            }
        };

        Self { wizard, tax_rate }
    }
}
