use async_trait::async_trait;
use sqlx::Row;

use repairdesk_core::domain::customer::{Customer, CustomerId};
use repairdesk_core::ports::{CustomerDirectory, PortError};

use super::{decode_err, parse_timestamp, RepositoryError};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, additional_phones, total_orders, created_at, updated_at";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    /// Exact match on the trimmed phone. When several customers share a phone the
    /// oldest record wins.
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>, RepositoryError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE phone = ? ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    pub async fn save(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let additional_phones =
            serde_json::to_string(&customer.additional_phones).map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO customer (id, name, phone, email, additional_phones, total_orders,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 phone = excluded.phone,
                 email = excluded.email,
                 additional_phones = excluded.additional_phones,
                 total_orders = excluded.total_orders,
                 updated_at = excluded.updated_at",
        )
        .bind(&customer.id.0)
        .bind(&customer.name)
        .bind(customer.phone.trim())
        .bind(&customer.email)
        .bind(additional_phones)
        .bind(i64::from(customer.total_orders))
        .bind(customer.created_at.to_rfc3339())
        .bind(customer.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let additional_phones: String = row.try_get("additional_phones").map_err(decode_err)?;
    let total_orders: i64 = row.try_get("total_orders").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(Customer {
        id: CustomerId(id),
        name: row.try_get("name").map_err(decode_err)?,
        phone: row.try_get("phone").map_err(decode_err)?,
        email: row.try_get("email").map_err(decode_err)?,
        additional_phones: serde_json::from_str(&additional_phones).map_err(decode_err)?,
        total_orders: u32::try_from(total_orders).map_err(decode_err)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl CustomerDirectory for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, PortError> {
        Ok(SqlCustomerRepository::find_by_id(self, id).await?)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>, PortError> {
        Ok(SqlCustomerRepository::find_by_phone(self, phone).await?)
    }

    async fn save(&self, customer: Customer) -> Result<(), PortError> {
        Ok(SqlCustomerRepository::save(self, &customer).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use repairdesk_core::domain::customer::{Customer, CustomerId};

    use super::SqlCustomerRepository;
    use crate::repositories::migrated_pool;

    fn customer(id: &str, phone: &str) -> Customer {
        let now = Utc::now();
        Customer {
            id: CustomerId(id.to_string()),
            name: "Ana Diaz".to_string(),
            phone: phone.to_string(),
            email: "ana@mail.test".to_string(),
            additional_phones: vec!["787-555-0202".to_string()],
            total_orders: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_then_find_by_id_and_phone() {
        let repo = SqlCustomerRepository::new(migrated_pool().await);
        let stored = customer("cust-1", "787-555-0101");
        repo.save(&stored).await.expect("save");

        let by_id = repo.find_by_id(&stored.id).await.expect("find").expect("present");
        assert_eq!(by_id.additional_phones, stored.additional_phones);
        assert_eq!(by_id.total_orders, 1);

        let by_phone = repo.find_by_phone(" 787-555-0101 ").await.expect("find").expect("present");
        assert_eq!(by_phone.id, stored.id);
        assert!(repo.find_by_phone("").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn save_updates_existing_record() {
        let repo = SqlCustomerRepository::new(migrated_pool().await);
        let mut stored = customer("cust-2", "787-555-0303");
        repo.save(&stored).await.expect("save");

        stored.email = "new@mail.test".to_string();
        stored.total_orders = 2;
        repo.save(&stored).await.expect("update");

        let found = repo.find_by_id(&stored.id).await.expect("find").expect("present");
        assert_eq!(found.email, "new@mail.test");
        assert_eq!(found.total_orders, 2);
    }

    #[tokio::test]
    async fn shared_phone_resolves_to_oldest_customer() {
        let repo = SqlCustomerRepository::new(migrated_pool().await);
        let mut older = customer("cust-old", "787-555-0404");
        older.created_at = Utc::now() - Duration::days(30);
        repo.save(&customer("cust-new", "787-555-0404")).await.expect("save");
        repo.save(&older).await.expect("save");

        let found = repo.find_by_phone("787-555-0404").await.expect("find").expect("present");
        assert_eq!(found.id.0, "cust-old");
    }
}
