//! Community membership registration service.
//!
//! Applicants submit contact details with a proof-of-payment image. The image
//! is uploaded to remote object storage and a pending registration record
//! referencing it is stored locally. Staff can list, fetch, update and remove
//! records; every change keeps the record and the stored image in step.

pub mod api;
pub mod config;
pub mod error;
pub mod service;

pub use config::Config;
pub use error::{ApiError, RegistrationError};
pub use service::RegistrationService;
