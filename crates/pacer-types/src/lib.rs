//! # Pacer Types
//!
//! Core types and error definitions for the Pacer rate-limiting subsystem.
//!
//! This crate provides the foundational type system shared across the
//! Pacer ecosystem:
//!
//! - **`error`** - Typed error hierarchy for upstream calls and retry classification
//! - **`config`** - Immutable limiter configuration
//!
//! ## Architecture Role
//!
//! `pacer-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!       pacer-types (this crate)
//!              │
//!              ▼
//!         pacer-core
//!              │
//!              ▼
//!     collaborators (task executor, plan runner, ...)
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for API/IPC
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod config;
pub mod error;

// Re-export error types for convenience
pub use error::{ErrorSignal, UpstreamError};

// Re-export config
pub use config::PacerConfig;
