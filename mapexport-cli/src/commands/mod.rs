//! CLI command implementations.
//!
//! - [`run`] - Scheduled exports with a stdin console
//! - [`now`] - One export pass
//! - [`tile`] - Single tile export
//! - [`worldtomap`] - World position to tile lookup
//! - [`debug`] - Loaded configuration dump

pub mod debug;
pub mod now;
pub mod run;
pub mod tile;
pub mod worldtomap;
