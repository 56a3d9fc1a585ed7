use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sqlx::Row;

use repairdesk_core::domain::customer::CustomerId;
use repairdesk_core::domain::work_order::{
    Assignment, DeviceIdentity, Totals, WorkOrder, WorkOrderId, WorkOrderStatus,
};
use repairdesk_core::ports::{PortError, WorkOrderStore};

use super::{decode_err, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlWorkOrderRepository {
    pool: DbPool,
}

impl SqlWorkOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM work_order WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_work_order).transpose()
    }

    pub async fn insert(&self, order: &WorkOrder) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO work_order (
                 id, order_number, status, customer_id, customer_name, customer_phone,
                 customer_email, device_type, device_brand, device_model, device_subcategory,
                 device_serial, initial_problem, photos_json, customer_signature, security_json,
                 checklist_items_json, checklist_notes, line_items_json, subtotal, tax, total,
                 cost_estimate, technician_id, technician_name, terms_accepted,
                 custom_fields_json, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(&order.customer_id.0)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_email)
        .bind(&order.device.device_type)
        .bind(&order.device.brand)
        .bind(&order.device.model)
        .bind(&order.device.subcategory)
        .bind(&order.device.serial)
        .bind(&order.initial_problem)
        .bind(to_json(&order.photos)?)
        .bind(&order.customer_signature)
        .bind(to_json(&order.security)?)
        .bind(to_json(&order.checklist_items)?)
        .bind(&order.checklist_notes)
        .bind(to_json(&order.line_items)?)
        .bind(order.totals.subtotal.to_string())
        .bind(order.totals.tax.to_string())
        .bind(order.totals.total.to_string())
        .bind(order.cost_estimate.to_string())
        .bind(&order.assignment.technician_id)
        .bind(&order.assignment.technician_name)
        .bind(order.terms_accepted)
        .bind(to_json(&order.custom_fields)?)
        .bind(&order.created_by)
        .bind(order.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(decode_err)
}

fn json_column<T: DeserializeOwned>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError> {
    let raw: String = row.try_get(column).map_err(decode_err)?;
    serde_json::from_str(&raw).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

fn decimal_column(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(column).map_err(decode_err)?;
    Decimal::from_str(&raw).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

fn row_to_work_order(row: &sqlx::sqlite::SqliteRow) -> Result<WorkOrder, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(WorkOrder {
        id: WorkOrderId(row.try_get("id").map_err(decode_err)?),
        order_number: row.try_get("order_number").map_err(decode_err)?,
        status: WorkOrderStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown work order status `{status}`")))?,
        customer_id: CustomerId(row.try_get("customer_id").map_err(decode_err)?),
        customer_name: row.try_get("customer_name").map_err(decode_err)?,
        customer_phone: row.try_get("customer_phone").map_err(decode_err)?,
        customer_email: row.try_get("customer_email").map_err(decode_err)?,
        device: DeviceIdentity {
            device_type: row.try_get("device_type").map_err(decode_err)?,
            brand: row.try_get("device_brand").map_err(decode_err)?,
            model: row.try_get("device_model").map_err(decode_err)?,
            subcategory: row.try_get("device_subcategory").map_err(decode_err)?,
            serial: row.try_get("device_serial").map_err(decode_err)?,
        },
        initial_problem: row.try_get("initial_problem").map_err(decode_err)?,
        photos: json_column(row, "photos_json")?,
        customer_signature: row.try_get("customer_signature").map_err(decode_err)?,
        security: json_column(row, "security_json")?,
        checklist_items: json_column(row, "checklist_items_json")?,
        checklist_notes: row.try_get("checklist_notes").map_err(decode_err)?,
        line_items: json_column(row, "line_items_json")?,
        totals: Totals {
            subtotal: decimal_column(row, "subtotal")?,
            tax: decimal_column(row, "tax")?,
            total: decimal_column(row, "total")?,
        },
        cost_estimate: decimal_column(row, "cost_estimate")?,
        assignment: Assignment {
            technician_id: row.try_get("technician_id").map_err(decode_err)?,
            technician_name: row.try_get("technician_name").map_err(decode_err)?,
        },
        terms_accepted: row.try_get("terms_accepted").map_err(decode_err)?,
        custom_fields: json_column(row, "custom_fields_json")?,
        created_by: row.try_get("created_by").map_err(decode_err)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait]
impl WorkOrderStore for SqlWorkOrderRepository {
    async fn find_by_id(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, PortError> {
        Ok(SqlWorkOrderRepository::find_by_id(self, id).await?)
    }

    async fn create(&self, order: WorkOrder) -> Result<(), PortError> {
        Ok(self.insert(&order).await?)
    }
}
