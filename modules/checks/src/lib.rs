//! Check execution and read-side aggregation over a [`HostStore`].

mod aggregator;
mod dispatcher;
mod error;
mod store_call;

pub use aggregator::StatusAggregator;
pub use dispatcher::{CheckResponse, Dispatcher, DispatcherConfig, StatusChange};
pub use error::CheckError;

pub use store_sqlite::HostStore;
