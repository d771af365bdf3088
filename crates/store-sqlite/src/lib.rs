//! Persistence for hosts, the service catalogue and host-service bindings.

mod error;
mod open;
mod models;
mod insert;
mod query;
mod schema;
mod store;

pub use error::{Result, StoreError};
pub use open::Db;
pub use models::*;
pub use store::HostStore;
