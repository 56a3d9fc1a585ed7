pub mod customer;
pub mod event;
pub mod work_order;
