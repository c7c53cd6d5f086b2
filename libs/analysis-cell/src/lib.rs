//! # Analysis Cell
//!
//! A stand-in for the risk predictor the dashboard calls. It scores a profile
//! from BMI and age only and is meant for local runs and tests.
//!
//! - `GET /ping` - Liveness
//! - `POST /analyze` - Risk score, band and recommendation for one profile

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::analysis_routes;
