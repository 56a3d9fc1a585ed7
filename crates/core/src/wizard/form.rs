use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::work_order::{Assignment, LineItem, LineItemKind};

/// A device classification value: either picked from a managed list or typed by the operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceRef {
    Catalog { id: String, name: String },
    Named(String),
}

impl DeviceRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Catalog { name, .. } => name,
            Self::Named(name) => name,
        }
    }
}

impl From<&str> for DeviceRef {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub additional_phones: Vec<String>,
}

impl CustomerFields {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name).trim().to_string()
    }
}

/// A price or quantity as entered by a step component; may be a number or loose text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(Decimal),
    Text(String),
}

impl RawAmount {
    pub fn coerce(&self, fallback: Decimal) -> Decimal {
        match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<Decimal>().unwrap_or(fallback),
        }
    }
}

impl From<Decimal> for RawAmount {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedItem {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: LineItemKind,
    pub name: String,
    #[serde(default)]
    pub price: Option<RawAmount>,
    #[serde(default)]
    pub quantity: Option<RawAmount>,
}

impl SuggestedItem {
    /// Missing or unparseable prices count as zero, missing quantities as one.
    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            id: self.id.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            price: self.price.as_ref().map_or(Decimal::ZERO, |price| price.coerce(Decimal::ZERO)),
            quantity: self
                .quantity
                .as_ref()
                .map_or(Decimal::ONE, |quantity| quantity.coerce(Decimal::ONE)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SecurityFields {
    pub device_password: SecretString,
    pub device_pin: SecretString,
    pub pattern_vector: Option<SecretString>,
    pub pattern_image: Option<String>,
}

impl Default for SecurityFields {
    fn default() -> Self {
        Self {
            device_password: SecretString::from(String::new()),
            device_pin: SecretString::from(String::new()),
            pattern_vector: None,
            pattern_image: None,
        }
    }
}

impl SecurityFields {
    pub fn has_credentials(&self) -> bool {
        !self.device_password.expose_secret().is_empty()
            || !self.device_pin.expose_secret().is_empty()
            || self.pattern_vector.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaFile {
    /// Already stored by the step component; passed through unchanged.
    Uploaded {
        id: Option<String>,
        mime: Option<String>,
        filename: Option<String>,
        url: String,
        thumb_url: Option<String>,
    },
    /// Captured locally; uploaded during submission.
    Local { filename: Option<String>, mime: Option<String>, bytes: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureImage {
    DataUri(String),
    File { filename: Option<String>, mime: Option<String>, bytes: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// The structured catalog pick recorded on the form once brand/family/model were chosen together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDevice {
    pub brand: CatalogEntry,
    pub family: CatalogEntry,
    pub series: Option<CatalogEntry>,
    pub model: Option<CatalogEntry>,
}

/// One catalog action as emitted by the catalog picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSelection {
    pub device: CatalogDevice,
    pub suggested_items: Vec<SuggestedItem>,
}

#[derive(Clone, Debug, Default)]
pub struct FormState {
    pub customer: CustomerFields,
    pub existing_customer_id: Option<CustomerId>,
    pub device_category: Option<DeviceRef>,
    pub device_type: Option<String>,
    pub device_brand: Option<DeviceRef>,
    pub device_subcategory: Option<DeviceRef>,
    pub device_family: Option<DeviceRef>,
    pub device_model: Option<DeviceRef>,
    pub device_serial: String,
    pub catalog_device: Option<CatalogDevice>,
    pub problem_description: String,
    pub comments: String,
    pub suggested_items: Vec<SuggestedItem>,
    pub security: SecurityFields,
    pub media_files: Vec<MediaFile>,
    pub checklist_items: Vec<String>,
    pub checklist_notes: String,
    pub signature: Option<SignatureImage>,
    pub terms_accepted: bool,
    pub assignment: Option<Assignment>,
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

impl FormState {
    pub fn preloaded(customer: &Customer) -> Self {
        let (name, last_name) = customer.split_name();
        Self {
            customer: CustomerFields {
                name,
                last_name,
                phone: customer.phone.clone(),
                email: customer.email.clone(),
                additional_phones: customer.additional_phones.clone(),
            },
            existing_customer_id: Some(customer.id.clone()),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Customer(customer) => self.customer = customer,
            FieldUpdate::ExistingCustomer(id) => self.existing_customer_id = id,
            FieldUpdate::DeviceCategory(value) => self.device_category = value,
            FieldUpdate::DeviceType(value) => self.device_type = value,
            FieldUpdate::DeviceBrand(value) => self.device_brand = value,
            FieldUpdate::DeviceSubcategory(value) => self.device_subcategory = value,
            FieldUpdate::DeviceFamily(value) => self.device_family = value,
            FieldUpdate::DeviceModel(value) => self.device_model = value,
            FieldUpdate::DeviceSerial(value) => self.device_serial = value,
            FieldUpdate::CatalogDevice(value) => self.catalog_device = value,
            FieldUpdate::ProblemDescription(value) => self.problem_description = value,
            FieldUpdate::Comments(value) => self.comments = value,
            FieldUpdate::SuggestedItems(items) => self.suggested_items = items,
            FieldUpdate::AddSuggestedItem(item) => self.suggested_items.push(item),
            FieldUpdate::Security(security) => self.security = security,
            FieldUpdate::MediaFiles(files) => self.media_files = files,
            FieldUpdate::ChecklistItems(items) => self.checklist_items = items,
            FieldUpdate::ChecklistNotes(notes) => self.checklist_notes = notes,
            FieldUpdate::Signature(signature) => self.signature = signature,
            FieldUpdate::TermsAccepted(accepted) => self.terms_accepted = accepted,
            FieldUpdate::Assignment(assignment) => self.assignment = assignment,
            FieldUpdate::CustomField { key, value } => {
                self.custom_fields.insert(key, value);
            }
        }
    }
}

/// Every mutation a step component may request. Routed through the session so that
/// classification-affecting changes re-run the sequencer.
#[derive(Clone, Debug)]
pub enum FieldUpdate {
    Customer(CustomerFields),
    ExistingCustomer(Option<CustomerId>),
    DeviceCategory(Option<DeviceRef>),
    DeviceType(Option<String>),
    DeviceBrand(Option<DeviceRef>),
    DeviceSubcategory(Option<DeviceRef>),
    DeviceFamily(Option<DeviceRef>),
    DeviceModel(Option<DeviceRef>),
    DeviceSerial(String),
    CatalogDevice(Option<CatalogDevice>),
    ProblemDescription(String),
    Comments(String),
    SuggestedItems(Vec<SuggestedItem>),
    AddSuggestedItem(SuggestedItem),
    Security(SecurityFields),
    MediaFiles(Vec<MediaFile>),
    ChecklistItems(Vec<String>),
    ChecklistNotes(String),
    Signature(Option<SignatureImage>),
    TermsAccepted(bool),
    Assignment(Option<Assignment>),
    CustomField { key: String, value: serde_json::Value },
}

impl FieldUpdate {
    pub fn affects_classification(&self) -> bool {
        matches!(
            self,
            Self::DeviceBrand(_) | Self::DeviceSubcategory(_) | Self::CatalogDevice(_)
        )
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customer",
            Self::ExistingCustomer(_) => "existing_customer_id",
            Self::DeviceCategory(_) => "device_category",
            Self::DeviceType(_) => "device_type",
            Self::DeviceBrand(_) => "device_brand",
            Self::DeviceSubcategory(_) => "device_subcategory",
            Self::DeviceFamily(_) => "device_family",
            Self::DeviceModel(_) => "device_model",
            Self::DeviceSerial(_) => "device_serial",
            Self::CatalogDevice(_) => "catalog_device",
            Self::ProblemDescription(_) => "problem_description",
            Self::Comments(_) => "comments",
            Self::SuggestedItems(_) | Self::AddSuggestedItem(_) => "suggested_items",
            Self::Security(_) => "security",
            Self::MediaFiles(_) => "media_files",
            Self::ChecklistItems(_) => "checklist_items",
            Self::ChecklistNotes(_) => "checklist_notes",
            Self::Signature(_) => "signature",
            Self::TermsAccepted(_) => "terms_accepted",
            Self::Assignment(_) => "assignment",
            Self::CustomField { .. } => "custom_fields",
        }
    }
}

/// Device facts the sequencer keys on. Recomputed from the form after every relevant update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationFacts {
    pub brand_name: String,
    pub subcategory_name: String,
    pub catalog_device_selected: bool,
}

impl ClassificationFacts {
    pub fn derive(form: &FormState, catalog_mode: bool) -> Self {
        Self {
            brand_name: form.device_brand.as_ref().map(|brand| brand.name().to_string()).unwrap_or_default(),
            subcategory_name: form
                .device_subcategory
                .as_ref()
                .map(|subcategory| subcategory.name().to_string())
                .unwrap_or_default(),
            catalog_device_selected: catalog_mode
                && form.catalog_device.as_ref().is_some_and(|device| device.model.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use crate::domain::customer::{Customer, CustomerId};
    use crate::domain::work_order::LineItemKind;

    use super::{
        CatalogDevice, CatalogEntry, ClassificationFacts, DeviceRef, FieldUpdate, FormState,
        RawAmount, SecurityFields, SuggestedItem,
    };

    fn entry(label: &str) -> CatalogEntry {
        CatalogEntry { id: label.to_ascii_lowercase(), label: label.to_string(), kind: None }
    }

    #[test]
    fn suggested_item_coerces_loose_amounts() {
        let item = SuggestedItem {
            id: None,
            kind: LineItemKind::Product,
            name: "Battery".to_string(),
            price: Some(RawAmount::Text(" 39.90 ".to_string())),
            quantity: None,
        };
        let line = item.to_line_item();
        assert_eq!(line.price, Decimal::new(3990, 2));
        assert_eq!(line.quantity, Decimal::ONE);

        let garbage = SuggestedItem {
            price: Some(RawAmount::Text("n/a".to_string())),
            quantity: Some(RawAmount::Text("".to_string())),
            ..item
        };
        let line = garbage.to_line_item();
        assert_eq!(line.price, Decimal::ZERO);
        assert_eq!(line.quantity, Decimal::ONE);
    }

    #[test]
    fn raw_amount_accepts_json_numbers_and_strings() {
        let parsed: Vec<RawAmount> =
            serde_json::from_str(r#"[10, "2.5", "abc"]"#).expect("amounts should deserialize");
        assert_eq!(parsed[0].coerce(Decimal::ZERO), Decimal::from(10));
        assert_eq!(parsed[1].coerce(Decimal::ZERO), Decimal::new(25, 1));
        assert_eq!(parsed[2].coerce(Decimal::ONE), Decimal::ONE);
    }

    #[test]
    fn preloaded_form_binds_existing_customer() {
        let now = Utc::now();
        let customer = Customer {
            id: CustomerId("C-9".to_string()),
            name: "Maria Lopez Diaz".to_string(),
            phone: "787-555-0142".to_string(),
            email: "maria@example.com".to_string(),
            additional_phones: vec!["787-555-0143".to_string()],
            total_orders: 4,
            created_at: now,
            updated_at: now,
        };

        let form = FormState::preloaded(&customer);
        assert_eq!(form.customer.name, "Maria");
        assert_eq!(form.customer.last_name, "Lopez Diaz");
        assert_eq!(form.customer.full_name(), "Maria Lopez Diaz");
        assert_eq!(form.existing_customer_id, Some(CustomerId("C-9".to_string())));
    }

    #[test]
    fn facts_require_catalog_mode_and_a_model() {
        let mut form = FormState::default();
        form.apply(FieldUpdate::DeviceBrand(Some(DeviceRef::Catalog {
            id: "b-1".to_string(),
            name: "Apple".to_string(),
        })));
        form.apply(FieldUpdate::DeviceSubcategory(Some("Smartphone".into())));
        form.apply(FieldUpdate::CatalogDevice(Some(CatalogDevice {
            brand: entry("Apple"),
            family: entry("iPhone"),
            series: None,
            model: None,
        })));

        let facts = ClassificationFacts::derive(&form, true);
        assert_eq!(facts.brand_name, "Apple");
        assert_eq!(facts.subcategory_name, "Smartphone");
        assert!(!facts.catalog_device_selected, "no model picked yet");

        if let Some(device) = form.catalog_device.as_mut() {
            device.model = Some(entry("iPhone 15"));
        }
        assert!(ClassificationFacts::derive(&form, true).catalog_device_selected);
        assert!(!ClassificationFacts::derive(&form, false).catalog_device_selected);
    }

    #[test]
    fn security_debug_output_redacts_credentials() {
        let security = SecurityFields {
            device_password: SecretString::from("hunter2".to_string()),
            device_pin: SecretString::from("4321".to_string()),
            pattern_vector: None,
            pattern_image: None,
        };
        let debug = format!("{security:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("4321"));
        assert!(security.has_credentials());
        assert!(!SecurityFields::default().has_credentials());
    }

    #[test]
    fn only_device_fields_affect_classification() {
        assert!(FieldUpdate::DeviceBrand(None).affects_classification());
        assert!(FieldUpdate::CatalogDevice(None).affects_classification());
        assert!(!FieldUpdate::DeviceModel(None).affects_classification());
        assert!(!FieldUpdate::TermsAccepted(true).affects_classification());
    }
}
