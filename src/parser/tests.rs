//! Unit tests for the inbound parsers.

mod response_tests;
