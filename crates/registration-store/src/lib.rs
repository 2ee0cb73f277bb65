//! Registration records for community membership applications.
//!
//! Records are kept in an in-memory [`Registry`] that enforces one
//! registration per (lowercased) email and one per access token, and are
//! written through to a [`Persistence`] backend on every change.

mod error;
mod page;
mod persistence;
mod registry;
mod store;
mod types;
pub mod validate;

pub use error::StoreError;
pub use page::{Page, PageRequest};
pub use persistence::{FilePersistence, MemoryPersistence, Persistence};
pub use registry::{Entry, Registry, Snapshot};
pub use store::{RegistrationRepository, RegistrationStore};
pub use types::*;
