use crate::wizard::form::FormState;
use crate::wizard::steps::StepId;

/// Names of the requirements that keep `step` from being completed. Empty means the
/// wizard may advance. Steps without rules never block.
pub fn missing_requirements(step: StepId, form: &FormState, catalog_mode: bool) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let mut require = |satisfied: bool, field: &'static str| {
        if !satisfied {
            missing.push(field);
        }
    };

    match step {
        StepId::Customer => {
            require(!form.customer.name.trim().is_empty(), "customer.name");
            require(!form.customer.phone.trim().is_empty(), "customer.phone");
        }
        StepId::Brand => {
            if catalog_mode {
                require(form.catalog_device.is_some(), "catalog_device.brand");
            } else {
                require(form.device_brand.is_some(), "device_brand");
            }
        }
        StepId::Subcategory => require(form.device_subcategory.is_some(), "device_subcategory"),
        StepId::Family => require(form.device_family.is_some(), "device_family"),
        StepId::Model => require(form.device_model.is_some(), "device_model"),
        StepId::Problem => require(
            !form.problem_description.trim().is_empty() || !form.suggested_items.is_empty(),
            "problem_description|suggested_items",
        ),
        StepId::Signature => {
            require(form.signature.is_some(), "signature");
            require(form.terms_accepted, "terms_accepted");
        }
        StepId::Summary => require(form.terms_accepted, "terms_accepted"),
        StepId::Security | StepId::Checklist | StepId::Assignment => {}
    }

    missing
}

pub fn can_advance(step: StepId, form: &FormState, catalog_mode: bool) -> bool {
    missing_requirements(step, form, catalog_mode).is_empty()
}
