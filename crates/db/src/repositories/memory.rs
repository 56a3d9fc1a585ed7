use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use repairdesk_core::domain::customer::{Customer, CustomerId};
use repairdesk_core::domain::event::WorkOrderEvent;
use repairdesk_core::domain::work_order::{WorkOrder, WorkOrderId};
use repairdesk_core::ports::{
    CustomerDirectory, FileStore, PortError, SettingsSource, StoredFile, UploadFile,
    WorkOrderEventLog, WorkOrderStore,
};
use repairdesk_core::wizard::sequencer::WizardConfig;

#[derive(Default)]
pub struct InMemoryCustomerDirectory {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, PortError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Customer>, PortError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Ok(None);
        }
        let customers = self.customers.read().await;
        Ok(customers
            .values()
            .filter(|customer| customer.phone == phone)
            .min_by_key(|customer| customer.created_at)
            .cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), PortError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWorkOrderStore {
    orders: RwLock<HashMap<String, WorkOrder>>,
}

#[async_trait::async_trait]
impl WorkOrderStore for InMemoryWorkOrderStore {
    async fn find_by_id(&self, id: &WorkOrderId) -> Result<Option<WorkOrder>, PortError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn create(&self, order: WorkOrder) -> Result<(), PortError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id.0) {
            return Err(PortError::Storage(format!("work order {} already exists", order.id.0)));
        }
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWorkOrderEventLog {
    events: RwLock<Vec<WorkOrderEvent>>,
}

#[async_trait::async_trait]
impl WorkOrderEventLog for InMemoryWorkOrderEventLog {
    async fn append(&self, event: WorkOrderEvent) -> Result<(), PortError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn list_for_order(&self, order_id: &WorkOrderId) -> Result<Vec<WorkOrderEvent>, PortError> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| &event.order_id == order_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemorySettingsSource {
    wizard: RwLock<Option<WizardConfig>>,
    tax_rate: RwLock<Option<Decimal>>,
}

impl InMemorySettingsSource {
    pub fn new(wizard: Option<WizardConfig>, tax_rate: Option<Decimal>) -> Self {
        Self { wizard: RwLock::new(wizard), tax_rate: RwLock::new(tax_rate) }
    }

    pub async fn set_wizard_config(&self, config: WizardConfig) {
        *self.wizard.write().await = Some(config);
    }

    pub async fn set_tax_rate(&self, tax_rate: Decimal) {
        *self.tax_rate.write().await = Some(tax_rate);
    }
}

#[async_trait::async_trait]
impl SettingsSource for InMemorySettingsSource {
    async fn wizard_config(&self) -> Result<Option<WizardConfig>, PortError> {
        Ok(self.wizard.read().await.clone())
    }

    async fn tax_rate(&self) -> Result<Option<Decimal>, PortError> {
        Ok(*self.tax_rate.read().await)
    }
}

/// Keeps uploads in memory and hands out `memory://` URLs. Used by dry runs.
#[derive(Default)]
pub struct InMemoryFileStore {
    files: RwLock<Vec<(String, UploadFile)>>,
}

impl InMemoryFileStore {
    pub async fn get(&self, url: &str) -> Option<UploadFile> {
        let files = self.files.read().await;
        files.iter().find(|(stored, _)| stored == url).map(|(_, file)| file.clone())
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }
}

#[async_trait::async_trait]
impl FileStore for InMemoryFileStore {
    async fn upload(&self, file: UploadFile) -> Result<StoredFile, PortError> {
        let mut files = self.files.write().await;
        let url = format!("memory://{}/{}", files.len() + 1, file.filename);
        files.push((url.clone(), file));
        Ok(StoredFile { url })
    }
}
