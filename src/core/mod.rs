//! Core data types.
//!
//! - [`types::Command`]: what we send to the arm
//! - [`types::Response`]: what the arm sends back

pub mod types;
