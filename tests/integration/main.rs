//! Integration tests for humidor
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! transport and the full harvest cycle end-to-end.

mod harvest_tests;
mod transport_tests;
