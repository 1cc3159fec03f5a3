//! Configuration and calibration storage tests
