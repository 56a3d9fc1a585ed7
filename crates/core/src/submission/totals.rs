use rust_decimal::Decimal;

use crate::domain::work_order::{LineItem, Totals};

pub fn subtotal(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::extended_price).sum()
}

/// No rounding is applied; rounding is a presentation concern.
pub fn compute_totals(items: &[LineItem], tax_rate: Decimal) -> Totals {
    let subtotal = subtotal(items);
    let tax = subtotal * tax_rate;
    Totals { subtotal, tax, total: subtotal + tax }
}
