//! HarveStar IO - Serial link gateway for the HarveStar robot arm
//!
//! This library provides the pieces between application logic and the arm's
//! microcontroller: a line-oriented JSON transport, a single worker thread
//! that serializes every exchange on the link, a typed device API and a
//! host-side replay sequencer.
//!
//! ## Layers
//!
//! - [`transport`]: byte link (serial port or in-memory mock), newline framing
//! - [`link`]: [`LinkWorker`], the one owner of the transport
//! - [`device`]: [`Arm`], move / ping / readiness / listen
//! - [`replay`]: catalog, sequencer and pollable status
//! - [`gateway`]: [`Gateway`], what request handlers call

pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod gateway;
pub mod link;
pub mod replay;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use core::types::{Command, Coords, Response};
pub use device::Arm;
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use link::LinkWorker;
