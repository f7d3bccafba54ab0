//! # Core Module
//!
//! Stateless data models and algorithms behind residue parameterization.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds and ordered molecular structures
//! - **File I/O** ([`io`]) - Chem-comp CIF, Tripos mol2, Amber frcmod and prep templates
//! - **Structural Knowledge** ([`topology`]) - Backbone naming and bonded-term enumeration
//! - **Graph Matching** ([`graph`]) - Atom correspondence between renumbered structures
//! - **Force Field Parameters** ([`forcefield`]) - Bonded parameter tables and their editing
//! - **Capping** ([`building`]) - ACE/NME terminal caps placed by superposition
//! - **Utilities** ([`utils`]) - Rigid-body geometry

pub mod building;
pub mod forcefield;
pub mod graph;
pub mod io;
pub mod models;
pub mod topology;
pub mod utils;
