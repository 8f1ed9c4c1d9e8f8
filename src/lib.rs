//! iQua water softener poller
//!
//! This crate polls a water softener's cloud API and exposes a typed set of
//! readings derived from the latest device snapshot.
//!
//! # Features
//!
//! - Single-flight [`PollingCoordinator`] with a last-known-good snapshot cache
//! - Fixed-interval schedule with clean shutdown
//! - Nine derived readings with unit normalisation (m³ / gallons)
//! - HTTP device client and an adapter for blocking vendor libraries

// Core modules
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod models;
pub mod readings;

// Re-export main types for convenience
pub use client::{DeviceClient, HttpDeviceClient};
pub use config::SoftenerConfig;
pub use coordinator::PollingCoordinator;
pub use error::{Result, SoftenerError};
pub use models::{DeviceState, RawSnapshot, VolumeUnit};
pub use readings::{derive, DerivedReading, ReadingKey, ReadingValue, Unit};
