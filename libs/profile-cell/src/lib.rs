//! # Profile Cell
//!
//! The clinical dashboard: the profile form, BMI derivation, the validation
//! gate, the risk analysis client and the profile record store.
//!
//! ## API Endpoints
//!
//! - `POST /profiles/form` - Apply one field edit, returns the form and BMI category
//! - `POST /profiles/analyze` - Validate and send the profile for risk analysis
//! - `POST /profiles` - Save the profile as a new record
//! - `GET /profiles` - The caller's records, newest first
//! - `PATCH /profiles/{id}` - Edit one of the caller's records

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::{ProfileError, ValidationError};
pub use router::profile_routes;
pub use services::analysis::AnalysisClient;
pub use services::dashboard::Dashboard;
pub use services::profile::ProfileStore;
pub use services::validation::validate;
