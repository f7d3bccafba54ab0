//! # Core Models Module
//!
//! Data structures for representing a single residue (or capped residue) structure: atoms with
//! their names, elements, charges and force field types, the bonds between them, and the
//! positional order that file formats and index-based algorithms rely on.
//!
//! ## Key Components
//!
//! - [`atom`] - Individual atom representation with coordinates, charges, and atom type
//! - [`structure`] - Ordered atom collection with bond connectivity and editing operations
//! - [`topology`] - Bond and bond order definitions
//! - [`ids`] - Stable identifier type for atoms
//!
//! ## Usage
//!
//! ```ignore
//! use ncaaparam::core::models::{atom::Atom, structure::MolecularStructure};
//!
//! let mut structure = MolecularStructure::new();
//! let n = structure.add_atom(Atom::new("N", "N", "ALA", Point3::new(0.0, 0.0, 0.0)));
//! let ca = structure.add_atom(Atom::new("CA", "C", "ALA", Point3::new(1.46, 0.0, 0.0)));
//! structure.add_bond(n, ca, BondOrder::Single);
//! ```

pub mod atom;
pub mod ids;
pub mod structure;
pub mod topology;
