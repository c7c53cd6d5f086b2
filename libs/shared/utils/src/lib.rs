pub mod extractor;
pub mod in_flight;
pub mod jwt;
pub mod test_utils;
