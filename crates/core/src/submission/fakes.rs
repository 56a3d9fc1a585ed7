//! In-memory port doubles shared by the submission and wizard tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::event::WorkOrderEvent;
use crate::domain::work_order::{WorkOrder, WorkOrderId};
use crate::ports::{
    CustomerDirectory, FileStore, PortError, StoredFile, UploadFile, WorkOrderEventLog,
    WorkOrderStore,
};

#[derive(Default)]
pub(crate) struct Fakes {
    pub(crate) customers: Mutex<HashMap<String, Customer>>,
    pub(crate) uploads: Mutex<Vec<UploadFile>>,
    pub(crate) orders: Mutex<Vec<WorkOrder>>,
    pub(crate) events: Mutex<Vec<WorkOrderEvent>>,
    pub(crate) fail_uploads: bool,
    pub(crate) fail_events: bool,
}

#[async_trait]
impl CustomerDirectory for Fakes {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, PortError> {
        Ok(self.customers.lock().expect("lock").get(&id.0).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>, PortError> {
        Ok(self.customers.lock().expect("lock").values().find(|c| c.phone == phone).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), PortError> {
        self.customers.lock().expect("lock").insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

#[async_trait]
impl FileStore for Fakes {
    async fn upload(&self, file: UploadFile) -> Result<StoredFile, PortError> {
        if self.fail_uploads {
            return Err(PortError::Storage("bucket unavailable".to_string()));
        }
        let url = format!("https://files.shop.test/{}", file.filename);
        self.uploads.lock().expect("lock").push(file);
        Ok(StoredFile { url })
    }
}

#[async_trait]
impl WorkOrderStore for Fakes {
    async fn find_by_id(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, PortError> {
        Ok(self.orders.lock().expect("lock").iter().find(|order| &order.id == id).cloned())
    }

    async fn create(&self, order: WorkOrder) -> Result<(), PortError> {
        self.orders.lock().expect("lock").push(order);
        Ok(())
    }
}

#[async_trait]
impl WorkOrderEventLog for Fakes {
    async fn append(&self, event: WorkOrderEvent) -> Result<(), PortError> {
        if self.fail_events {
            return Err(PortError::Storage("event log offline".to_string()));
        }
        self.events.lock().expect("lock").push(event);
        Ok(())
    }

    async fn list_for_order(&self, order_id: &WorkOrderId) -> Result<Vec<WorkOrderEvent>, PortError> {
        Ok(self
            .events
            .lock()
            .expect("lock")
            .iter()
            .filter(|event| &event.order_id == order_id)
            .cloned()
            .collect())
    }
}

pub(crate) fn assembler(fakes: &std::sync::Arc<Fakes>) -> super::SubmissionAssembler {
    super::SubmissionAssembler::new(fakes.clone(), fakes.clone(), fakes.clone(), fakes.clone())
}
