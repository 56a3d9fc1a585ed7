use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use repairdesk_core::config::resolve_config_path;
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let sources = SourceLookup::detect();
    let steps_order = if config.intake.wizard.steps_order.is_empty() {
        "<canonical>".to_string()
    } else {
        config.intake.wizard.steps_order.join(",")
    };
    let disabled: Vec<&str> = config
        .intake
        .wizard
        .steps_enabled
        .iter()
        .filter(|(_, enabled)| !**enabled)
        .map(|(token, _)| token.as_str())
        .collect();

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        sources.line("database.url", &config.database.url, &["REPAIRDESK_DATABASE_URL"]),
        sources.line(
            "database.max_connections",
            &config.database.max_connections.to_string(),
            &["REPAIRDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        sources.line(
            "database.timeout_secs",
            &config.database.timeout_secs.to_string(),
            &["REPAIRDESK_DATABASE_TIMEOUT_SECS"],
        ),
        sources.line(
            "storage.upload_dir",
            &config.storage.upload_dir.display().to_string(),
            &["REPAIRDESK_STORAGE_UPLOAD_DIR"],
        ),
        sources.line(
            "intake.tax_rate",
            &config.intake.tax_rate.to_string(),
            &["REPAIRDESK_INTAKE_TAX_RATE"],
        ),
        sources.line(
            "intake.default_operator",
            config.intake.default_operator.as_deref().unwrap_or("<unset>"),
            &["REPAIRDESK_INTAKE_DEFAULT_OPERATOR"],
        ),
        sources.line(
            "intake.wizard.use_catalog_wizard",
            &config.intake.wizard.use_catalog_wizard.to_string(),
            &["REPAIRDESK_INTAKE_USE_CATALOG_WIZARD"],
        ),
        sources.line("intake.wizard.steps_order", &steps_order, &[]),
        sources.line(
            "intake.wizard.steps_enabled",
            &if disabled.is_empty() { "<all>".to_string() } else { format!("disabled: {}", disabled.join(",")) },
            &[],
        ),
        sources.line(
            "logging.level",
            &config.logging.level,
            &["REPAIRDESK_LOGGING_LEVEL", "REPAIRDESK_LOG_LEVEL"],
        ),
        sources.line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            &["REPAIRDESK_LOGGING_FORMAT", "REPAIRDESK_LOG_FORMAT"],
        ),
    ];

    CommandResult::success_with_data("config", lines.join("\n"), &config)
}

struct SourceLookup {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl SourceLookup {
    fn detect() -> Self {
        let path = resolve_config_path(None);
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        format!("- {key_path} = {value} (source: {})", self.source(key_path, env_keys))
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
