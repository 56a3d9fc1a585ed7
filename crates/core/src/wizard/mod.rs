pub mod form;
pub mod gate;
pub mod navigation;
pub mod sequencer;
pub mod settings;
pub mod steps;

pub use form::{
    CatalogDevice, CatalogEntry, CatalogSelection, ClassificationFacts, CustomerFields, DeviceRef,
    FieldUpdate, FormState, MediaFile, RawAmount, SecurityFields, SignatureImage, SuggestedItem,
};
pub use gate::{can_advance, missing_requirements};
pub use navigation::{
    AdvanceOutcome, ConfirmOutcome, NavDirection, NavigationState, Progress, RetreatOutcome,
    WizardSession,
};
pub use sequencer::{compute_effective_steps, WizardConfig};
pub use settings::SessionSettings;
pub use steps::{StepId, CANONICAL_ORDER};
