//! Session service test suite
