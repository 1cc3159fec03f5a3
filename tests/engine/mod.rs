//! Engine tests
//!
//! The simulated engine, background sampling and start-up sequence.

pub mod startup_test;
