use super::ids::AtomId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
    Amide,
    Unknown,
}

#[derive(Debug, Error)]
#[error("Invalid bond order string")]
pub struct ParseBondOrderError;

impl FromStr for BondOrder {
    type Err = ParseBondOrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "s" | "single" | "sing" => Ok(Self::Single),
            "2" | "d" | "double" | "doub" => Ok(Self::Double),
            "3" | "t" | "triple" | "trip" => Ok(Self::Triple),
            "ar" | "arom" | "aromatic" => Ok(Self::Aromatic),
            "am" | "amide" => Ok(Self::Amide),
            "un" | "nc" | "unknown" => Ok(Self::Unknown),
            _ => Err(ParseBondOrderError),
        }
    }
}

impl BondOrder {
    /// The bond type token used in Tripos mol2 `@<TRIPOS>BOND` records.
    pub fn mol2_token(self) -> &'static str {
        match self {
            Self::Single => "1",
            Self::Double => "2",
            Self::Triple => "3",
            Self::Aromatic => "ar",
            Self::Amide => "am",
            Self::Unknown => "un",
        }
    }

    /// The `value_order` token used in chem-comp CIF bond loops.
    pub fn cif_token(self) -> &'static str {
        match self {
            Self::Single | Self::Amide | Self::Unknown => "SING",
            Self::Double => "DOUB",
            Self::Triple => "TRIP",
            Self::Aromatic => "AROM",
        }
    }
}

impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Single => "Single",
                Self::Double => "Double",
                Self::Triple => "Triple",
                Self::Aromatic => "Aromatic",
                Self::Amide => "Amide",
                Self::Unknown => "Unknown",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1_id: AtomId, // ID of the first atom
    pub atom2_id: AtomId, // ID of the second atom
    pub order: BondOrder, // Bond order (e.g., single, double, etc.)
}

impl Bond {
    pub fn new(atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Self {
        Self {
            atom1_id,
            atom2_id,
            order,
        }
    }

    pub fn contains(&self, atom_id: AtomId) -> bool {
        self.atom1_id == atom_id || self.atom2_id == atom_id
    }

    /// Returns `true` if this bond joins the two atoms, in either direction.
    pub fn connects(&self, a: AtomId, b: AtomId) -> bool {
        (self.atom1_id == a && self.atom2_id == b) || (self.atom1_id == b && self.atom2_id == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_atom_id(n: u64) -> AtomId {
        AtomId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn bond_order_from_str_parses_valid_strings() {
        assert_eq!("1".parse::<BondOrder>().unwrap(), BondOrder::Single);
        assert_eq!("SING".parse::<BondOrder>().unwrap(), BondOrder::Single);
        assert_eq!("2".parse::<BondOrder>().unwrap(), BondOrder::Double);
        assert_eq!("doub".parse::<BondOrder>().unwrap(), BondOrder::Double);
        assert_eq!("TRIP".parse::<BondOrder>().unwrap(), BondOrder::Triple);
        assert_eq!("ar".parse::<BondOrder>().unwrap(), BondOrder::Aromatic);
        assert_eq!("AROM".parse::<BondOrder>().unwrap(), BondOrder::Aromatic);
        assert_eq!("am".parse::<BondOrder>().unwrap(), BondOrder::Amide);
        assert_eq!("un".parse::<BondOrder>().unwrap(), BondOrder::Unknown);
    }

    #[test]
    fn bond_order_from_str_rejects_invalid_strings() {
        assert!("".parse::<BondOrder>().is_err());
        assert!("quadruple".parse::<BondOrder>().is_err());
        assert!("0".parse::<BondOrder>().is_err());
    }

    #[test]
    fn bond_order_tokens_match_file_formats() {
        assert_eq!(BondOrder::Single.mol2_token(), "1");
        assert_eq!(BondOrder::Aromatic.mol2_token(), "ar");
        assert_eq!(BondOrder::Double.cif_token(), "DOUB");
        assert_eq!(BondOrder::Amide.cif_token(), "SING");
    }

    #[test]
    fn bond_order_default_is_single() {
        assert_eq!(BondOrder::default(), BondOrder::Single);
    }

    #[test]
    fn bond_contains_and_connects_are_direction_agnostic() {
        let a1 = dummy_atom_id(10);
        let a2 = dummy_atom_id(20);
        let unrelated = dummy_atom_id(30);
        let bond = Bond::new(a1, a2, BondOrder::Single);
        assert!(bond.contains(a1));
        assert!(bond.contains(a2));
        assert!(!bond.contains(unrelated));
        assert!(bond.connects(a2, a1));
        assert!(!bond.connects(a1, unrelated));
    }
}
