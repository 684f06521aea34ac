//! Multi-factor service test suite

mod service_tests;
