//! # Workflows Module
//!
//! The top-level entry points of the library.
//!
//! ## Overview
//!
//! A workflow takes residue structure files and a validated configuration and drives every
//! step needed to turn them into Amber parameter and residue template files: reading, capping,
//! the engine run, post-processing, and batch bookkeeping.
//!
//! ## Architecture
//!
//! - **Parameterization Workflow** ([`parameterize`]) - Batch parameterization of
//!   non-canonical residues with a fail-fast or continue-on-error policy.
//!
//! ## Key Capabilities
//!
//! - **Per-residue isolation** through a temporary working directory per residue
//! - **Progress monitoring** through [`crate::engine::progress::ProgressReporter`]
//! - **Pluggable external programs** through the engine and toolchain traits

pub mod parameterize;
