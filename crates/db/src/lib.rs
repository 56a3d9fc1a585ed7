pub mod connection;
pub mod files;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use files::LocalFileStore;
