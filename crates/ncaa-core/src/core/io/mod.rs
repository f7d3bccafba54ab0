//! Provides input/output functionality for the file formats of the parameterization pipeline.
//!
//! Structure formats (chem-comp CIF, Tripos mol2) share the [`traits::StructureFile`]
//! interface. Amber force field modification files are handled by [`frcmod`], and the
//! prepgen residue templates and their control files by [`prepi`].

pub mod cif;
pub(crate) mod elements;
pub mod frcmod;
pub mod mol2;
pub mod prepi;
pub mod traits;
