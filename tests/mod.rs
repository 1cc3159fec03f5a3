//! Integration tests for the calibration session
//!
//! Unit tests live next to the code in src/; these drive the public API the
//! way the binary does.

// Test modules organized by category
pub mod config;
pub mod engine;
