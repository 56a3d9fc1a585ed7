use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub additional_phones: Vec<String>,
    pub total_orders: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an intake is allowed to overwrite on an existing customer record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerChanges {
    pub name: String,
    pub email: String,
    pub additional_phones: Vec<String>,
}

impl Customer {
    pub fn apply_changes(&mut self, changes: CustomerChanges, now: DateTime<Utc>) {
        self.name = changes.name;
        self.email = changes.email;
        self.additional_phones = changes.additional_phones;
        self.updated_at = now;
    }

    pub fn record_order(&mut self) {
        self.total_orders = self.total_orders.saturating_add(1);
    }

    /// Splits the stored full name at the first space into (first, last).
    pub fn split_name(&self) -> (String, String) {
        match self.name.trim().split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (self.name.trim().to_string(), String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Customer, CustomerChanges, CustomerId};

    fn customer(name: &str) -> Customer {
        let now = Utc::now();
        Customer {
            id: CustomerId("C-1".to_string()),
            name: name.to_string(),
            phone: "787-555-0101".to_string(),
            email: String::new(),
            additional_phones: Vec::new(),
            total_orders: 2,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn split_name_keeps_compound_last_names_together() {
        let (first, last) = customer("Ana Maria de Jesus").split_name();
        assert_eq!(first, "Ana");
        assert_eq!(last, "Maria de Jesus");

        let (first, last) = customer("Cher").split_name();
        assert_eq!(first, "Cher");
        assert!(last.is_empty());
    }

    #[test]
    fn changes_overwrite_mutable_fields_but_not_phone() {
        let mut customer = customer("Old Name");
        customer.apply_changes(
            CustomerChanges {
                name: "New Name".to_string(),
                email: "new@example.com".to_string(),
                additional_phones: vec!["787-555-0199".to_string()],
            },
            Utc::now(),
        );
        customer.record_order();

        assert_eq!(customer.name, "New Name");
        assert_eq!(customer.phone, "787-555-0101");
        assert_eq!(customer.additional_phones.len(), 1);
        assert_eq!(customer.total_orders, 3);
    }
}
