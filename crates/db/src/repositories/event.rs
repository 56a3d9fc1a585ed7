use async_trait::async_trait;
use sqlx::Row;

use repairdesk_core::domain::event::{WorkOrderEvent, WorkOrderEventKind};
use repairdesk_core::domain::work_order::WorkOrderId;
use repairdesk_core::ports::{PortError, WorkOrderEventLog};

use super::{decode_err, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlWorkOrderEventLog {
    pool: DbPool,
}

impl SqlWorkOrderEventLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, event: &WorkOrderEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO work_order_event (id, order_id, order_number, kind, description, user_id,
                                           user_name, user_role, for_customer, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.order_id.0)
        .bind(&event.order_number)
        .bind(event.kind.as_str())
        .bind(&event.description)
        .bind(&event.user_id)
        .bind(&event.user_name)
        .bind(&event.user_role)
        .bind(event.for_customer)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Events in insertion order.
    pub async fn list_for_order(
        &self,
        order_id: &WorkOrderId,
    ) -> Result<Vec<WorkOrderEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, order_id, order_number, kind, description, user_id, user_name, user_role,
                    for_customer, created_at
             FROM work_order_event WHERE order_id = ? ORDER BY rowid ASC",
        )
        .bind(&order_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<WorkOrderEvent, RepositoryError> {
    let kind: String = row.try_get("kind").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(WorkOrderEvent {
        id: row.try_get("id").map_err(decode_err)?,
        order_id: WorkOrderId(row.try_get("order_id").map_err(decode_err)?),
        order_number: row.try_get("order_number").map_err(decode_err)?,
        kind: WorkOrderEventKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown event kind `{kind}`")))?,
        description: row.try_get("description").map_err(decode_err)?,
        user_id: row.try_get("user_id").map_err(decode_err)?,
        user_name: row.try_get("user_name").map_err(decode_err)?,
        user_role: row.try_get("user_role").map_err(decode_err)?,
        for_customer: row.try_get("for_customer").map_err(decode_err)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait]
impl WorkOrderEventLog for SqlWorkOrderEventLog {
    async fn append(&self, event: WorkOrderEvent) -> Result<(), PortError> {
        Ok(SqlWorkOrderEventLog::append(self, &event).await?)
    }

    async fn list_for_order(&self, order_id: &WorkOrderId) -> Result<Vec<WorkOrderEvent>, PortError> {
        Ok(SqlWorkOrderEventLog::list_for_order(self, order_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use repairdesk_core::domain::event::{WorkOrderEvent, WorkOrderEventKind};
    use repairdesk_core::domain::work_order::WorkOrderId;

    use super::SqlWorkOrderEventLog;
    use crate::repositories::migrated_pool;

    fn event(id: &str, order_id: &WorkOrderId, kind: WorkOrderEventKind) -> WorkOrderEvent {
        WorkOrderEvent {
            id: id.to_string(),
            order_id: order_id.clone(),
            order_number: "WO-00123456".to_string(),
            kind,
            description: format!("event {id}"),
            user_id: None,
            user_name: "System".to_string(),
            user_role: "system".to_string(),
            for_customer: id == "ev-1",
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn events_require_an_existing_order() {
        let log = SqlWorkOrderEventLog::new(migrated_pool().await);
        let orphan = event("ev-1", &WorkOrderId("missing".to_string()), WorkOrderEventKind::Note);
        assert!(log.append(&orphan).await.is_err());
    }

    #[tokio::test]
    async fn events_list_in_insertion_order() {
        let pool = migrated_pool().await;
        sqlx::query(
            "INSERT INTO customer (id, name, phone, created_at, updated_at)
             VALUES ('c-1', 'Ana', '1', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("customer");
        sqlx::query(
            "INSERT INTO work_order (id, order_number, status, customer_id, customer_name,
                                     customer_phone, subtotal, tax, total, cost_estimate,
                                     created_by, created_at)
             VALUES ('wo-1', 'WO-00123456', 'intake', 'c-1', 'Ana', '1', '0', '0', '0', '0',
                     'system', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("order");

        let log = SqlWorkOrderEventLog::new(pool);
        let order_id = WorkOrderId("wo-1".to_string());
        log.append(&event("ev-1", &order_id, WorkOrderEventKind::Note)).await.expect("note");
        log.append(&event("ev-2", &order_id, WorkOrderEventKind::Create)).await.expect("create");

        let events = log.list_for_order(&order_id).await.expect("list");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, WorkOrderEventKind::Note);
        assert!(events[0].for_customer);
        assert_eq!(events[1].kind, WorkOrderEventKind::Create);
    }
}
