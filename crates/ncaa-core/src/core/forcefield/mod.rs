//! # Force Field Parameters Module
//!
//! Bonded parameter sets keyed by atom-type tuples, and the editing operations used to
//! reconcile engine-assigned atom types with the canonical backbone types.
//!
//! ## Key Components
//!
//! - [`params`] - Parameter tables with reversible or directed key equality, and the record
//!   types for atom types, bonds, angles, dihedrals and impropers
//! - [`editor`] - Rename-driven duplication and relevance pruning of parameter entries

pub mod editor;
pub mod params;
