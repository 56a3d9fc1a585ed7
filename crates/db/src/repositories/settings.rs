use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use repairdesk_core::ports::{PortError, SettingsSource};
use repairdesk_core::wizard::sequencer::WizardConfig;

use super::{decode_err, RepositoryError};
use crate::DbPool;

pub const WIZARD_CONFIG_KEY: &str = "wizard_config";
pub const GLOBAL_SETTINGS_KEY: &str = "global_settings";

#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalSettings {
    #[serde(default, alias = "taxRate")]
    tax_rate: Option<Decimal>,
}

/// Key/value settings kept in `system_config`. Values are JSON documents.
pub struct SqlSettingsSource {
    pool: DbPool,
}

impl SqlSettingsSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM system_config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("value").map_err(decode_err)?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|error| RepositoryError::Decode(format!("system_config `{key}`: {error}")))
    }

    pub async fn put(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO system_config (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_wizard_config(&self, config: &WizardConfig) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(config).map_err(decode_err)?;
        self.put(WIZARD_CONFIG_KEY, &value).await
    }

    /// Replaces only the tax rate inside the global settings document.
    pub async fn set_tax_rate(&self, tax_rate: Decimal) -> Result<(), RepositoryError> {
        let mut document = match self.get(GLOBAL_SETTINGS_KEY).await? {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        document.remove("taxRate");
        document.insert("tax_rate".to_string(), serde_json::to_value(tax_rate).map_err(decode_err)?);
        self.put(GLOBAL_SETTINGS_KEY, &serde_json::Value::Object(document)).await
    }

    async fn load_wizard_config(&self) -> Result<Option<WizardConfig>, RepositoryError> {
        match self.get(WIZARD_CONFIG_KEY).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|error| RepositoryError::Decode(format!("{WIZARD_CONFIG_KEY}: {error}"))),
            None => Ok(None),
        }
    }

    async fn load_tax_rate(&self) -> Result<Option<Decimal>, RepositoryError> {
        match self.get(GLOBAL_SETTINGS_KEY).await? {
            Some(value) => serde_json::from_value::<GlobalSettings>(value)
                .map(|settings| settings.tax_rate)
                .map_err(|error| RepositoryError::Decode(format!("{GLOBAL_SETTINGS_KEY}: {error}"))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SettingsSource for SqlSettingsSource {
    async fn wizard_config(&self) -> Result<Option<WizardConfig>, PortError> {
        Ok(self.load_wizard_config().await?)
    }

    async fn tax_rate(&self) -> Result<Option<Decimal>, PortError> {
        Ok(self.load_tax_rate().await?)
    }
}
