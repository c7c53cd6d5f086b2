pub mod analysis;
pub mod bmi;
pub mod dashboard;
pub mod form;
pub mod profile;
pub mod validation;
