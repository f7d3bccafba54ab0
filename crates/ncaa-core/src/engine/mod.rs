//! # Engine Module
//!
//! Runs the per-residue parameterization pipeline around the external programs.
//!
//! ## Overview
//!
//! A capped residue is handed to a [`tools::ParameterizationEngine`], which derives atom types,
//! charges and bonded parameters. The engine's output is then reconciled with the input in
//! [`postprocess`]: atom names and formal charges are restored by graph matching, backbone atoms
//! receive the canonical peptide types, parameters are duplicated and pruned to match, and a
//! residue template is generated through a [`tools::TemplateToolchain`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Method selection, failure policy, timeouts and tool names
//! - **External Programs** ([`tools`]) - Availability checks, process execution and the engine
//!   and toolchain traits with their command-line implementations
//! - **Post-Processing** ([`postprocess`]) - Everything between the engine run and the final files
//! - **Progress Monitoring** ([`progress`]) - Callback events for user interfaces
//! - **Error Handling** ([`error`]) - The engine-wide error taxonomy

pub mod config;
pub mod error;
pub mod postprocess;
pub mod progress;
#[cfg(test)]
pub(crate) mod testing;
pub mod tools;
