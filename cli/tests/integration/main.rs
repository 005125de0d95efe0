//! Integration tests for the vmtools CLI
//!
//! These tests talk HTTP to a loopback fake of the management API, and
//! spawn the actual binary for end-to-end behavior.

mod cli_tests;
