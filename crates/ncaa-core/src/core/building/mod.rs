//! Terminal capping of residues with ACE and NME fragments.

pub mod caps;
