use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use repairdesk_core::config::AppConfig;
use repairdesk_core::errors::DomainError;
use repairdesk_core::wizard::form::ClassificationFacts;
use repairdesk_core::wizard::sequencer::compute_effective_steps;
use repairdesk_core::wizard::settings::SessionSettings;
use repairdesk_core::wizard::steps::StepId;
use repairdesk_db::connect;
use repairdesk_db::repositories::SqlSettingsSource;

use crate::commands::{build_runtime, load_config, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct StepsArgs {
    pub brand: Option<String>,
    pub subcategory: Option<String>,
    /// Turns the catalog wizard on for the preview and treats the device as fully picked.
    pub catalog: bool,
    pub offline: bool,
}

#[derive(Debug, Serialize)]
struct StepPreview {
    position: usize,
    id: StepId,
    title: &'static str,
}

#[derive(Debug, Serialize)]
struct StepsReport {
    steps: Vec<StepPreview>,
    facts: ClassificationFacts,
    catalog_mode: bool,
    tax_rate: Decimal,
}

pub fn run(args: StepsArgs) -> CommandResult {
    let config = match load_config("steps") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let mut settings = if args.offline {
        SessionSettings::from_config(&config.intake)
    } else {
        let runtime = match build_runtime("steps") {
            Ok(runtime) => runtime,
            Err(failure) => return failure,
        };
        runtime.block_on(resolve_settings(&config))
    };
    if args.catalog {
        settings.wizard.use_catalog_wizard = true;
    }

    let facts = ClassificationFacts {
        brand_name: args.brand.unwrap_or_default(),
        subcategory_name: args.subcategory.unwrap_or_default(),
        catalog_device_selected: args.catalog,
    };
    let steps = compute_effective_steps(&settings.wizard, &facts);
    if steps.is_empty() {
        return CommandResult::failure(
            "steps",
            "empty_step_sequence",
            DomainError::EmptyStepSequence.to_string(),
            6,
        );
    }

    let message = steps.iter().map(|step| step.as_str()).collect::<Vec<_>>().join(" > ");
    let report = StepsReport {
        steps: steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepPreview { position: index + 1, id: *step, title: step.title() })
            .collect(),
        facts,
        catalog_mode: settings.wizard.use_catalog_wizard,
        tax_rate: settings.tax_rate,
    };
    CommandResult::success_with_data("steps", message, report)
}

/// Reads the stored snapshot when the database is reachable, else the local configuration.
async fn resolve_settings(config: &AppConfig) -> SessionSettings {
    match connect(&config.database).await {
        Ok(pool) => {
            let source = SqlSettingsSource::new(pool.clone());
            let settings = SessionSettings::resolve(&source, &config.intake).await;
            pool.close().await;
            settings
        }
        Err(error) => {
            warn!(
                event_name = "wizard.settings.store_unreachable",
                error = %error,
                "settings store unreachable; previewing with local configuration"
            );
            SessionSettings::from_config(&config.intake)
        }
    }
}
