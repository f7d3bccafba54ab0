//! # ncaaparam Core Library
//!
//! Force-field parameterization of non-canonical amino-acid residues for Amber-style
//! simulation builders.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that the chemistry, the pipeline around
//! the external programs, and the user-facing entry points can be tested separately.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MolecularStructure`), file formats
//!   (chem-comp CIF, mol2, frcmod, prep templates), graph matching, bonded parameter editing,
//!   and cap construction by rigid superposition.
//!
//! - **[`engine`]: The Pipeline.** Configuration, the traits behind which the parameterization
//!   engine and the AmberTools programs sit, and the post-processing that reconciles engine
//!   output with the fixed peptide backbone.
//!
//! - **[`workflows`]: The Public API.** Batch parameterization of residue files with explicit
//!   per-residue failure handling.

pub mod core;
pub mod engine;
pub mod workflows;
