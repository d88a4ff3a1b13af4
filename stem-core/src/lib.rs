//! Core Borchert–Honda tree growth simulation library.
//!
//! Main components:
//! - [`internode`] — internode/bud graph and the segment-linkage builder.
//! - [`resource`] — light resource nodes and the snapshot registry.
//! - [`solver`] — per-bud optimal growth directions and light assignment.
//! - [`distribution`] — two-pass BH light/resource propagation.
//! - [`engine`] — discrete growth steps with per-iteration memoization.
//! - [`lsystem`] — translation to and from the external grammar engine.
//! - [`config`] — global configuration for the growth algorithm.
//! - [`error`] — error kinds surfaced to callers.
//! - [`types`] — shared type aliases and IDs.

pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod internode;
pub mod lsystem;
pub mod resource;
pub mod solver;
pub mod types;
