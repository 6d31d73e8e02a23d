//! # Span Gateway
//!
//! A small read-only HTTP gateway serving Bor span records out of Postgres,
//! plus a stub for the Heimdall clerk (state sync) endpoint.
//!
//! The interesting part is [`connection`]: one shared store handle behind a
//! single lock that survives database outages, reconnecting in the
//! background with capped exponential backoff while requests wait.
//!
//! ## Modules
//!
//! - [`config`] - Versioned YAML configuration with environment overrides
//! - [`connection`] - Connection cell, reconnection task and backoff policy
//! - [`db`] - Store handle and connector traits, Postgres implementation
//! - [`repositories`] - The span lookup query
//! - [`router`] - HTTP routes and handlers
//! - [`types`] - Validated span identifiers
//! - [`utils`] - Hex payload decoding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//!
//! use span_gateway::{config::GatewayConfig, router};
//!
//! # async fn example() -> eyre::Result<()> {
//! let config = GatewayConfig::load("/etc/span-gateway/config.yml")?;
//! router::initialize_router(&config, Arc::new(AtomicBool::new(false))).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod db;
pub mod repositories;
pub mod router;
pub mod types;
pub mod utils;
