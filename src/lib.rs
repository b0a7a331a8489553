//! `maf-curves` library crate.
//!
//! The binary (`maf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the table transforms and fitter are reusable from bench tooling

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
