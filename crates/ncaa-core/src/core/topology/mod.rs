//! # Topology Module
//!
//! Peptide backbone conventions and connectivity-derived topology.
//!
//! - [`backbone`] - The fixed backbone naming table (atom name to canonical atom type)
//! - [`connectivity`] - Angle, dihedral, ring and rotatable-bond enumeration from bonds

pub mod backbone;
pub mod connectivity;
