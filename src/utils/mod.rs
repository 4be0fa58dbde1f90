//! Utility functions shared across the sensor.
//!
//! - [`domain_validator`] - Syntactic checks for candidate domain names

pub mod domain_validator;
