use core::fmt;
use shrinkwraprs::Shrinkwrap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OidError {
    #[error("An object identifier needs at least two arcs, got {0}")]
    TooShort(usize),
    #[error("First arc must be 0, 1 or 2, got {0}")]
    InvalidFirstArc(u32),
    #[error("Second arc must be below 40 when the first arc is {first}, got {second}")]
    InvalidSecondArc { first: u32, second: u32 },
    #[error("`{0}` is not a numeric arc")]
    InvalidArc(String),
}

/// An SNMP object identifier, e.g. `1.3.6.1.4.1.99999.1.1.0`.
///
/// Always holds at least two arcs that satisfy the X.690 first-octet packing rules, so every
/// `Oid` can be encoded. Orders lexicographically by arc, which is the MIB walk order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Shrinkwrap)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Result<Self, OidError> {
        match arcs.as_slice() {
            [] | [_] => Err(OidError::TooShort(arcs.len())),
            [first, ..] if *first > 2 => Err(OidError::InvalidFirstArc(*first)),
            [first, second, ..] if *first < 2 && *second >= 40 => Err(OidError::InvalidSecondArc {
                first: *first,
                second: *second,
            }),
            _ => Ok(Oid(arcs)),
        }
    }

    /// For arcs known to be valid, such as compile-time constants.
    pub(crate) fn from_arcs_unchecked(arcs: &[u32]) -> Self {
        debug_assert!(Oid::new(arcs.to_vec()).is_ok());
        Oid(arcs.to_vec())
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Returns a new OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Oid(arcs)
    }

    /// Returns the OID without its last arc, if it still has two arcs left.
    pub fn parent(&self) -> Option<Oid> {
        (self.0.len() > 2).then(|| Oid(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Whether `self` lies in the subtree rooted at `root` (including `root` itself).
    pub fn starts_with(&self, root: &Oid) -> bool {
        self.0.starts_with(&root.0)
    }
}

impl FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s
            .trim()
            .trim_start_matches('.')
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| OidError::InvalidArc(arc.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Oid::new(arcs)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.0.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
        }
        for arc in arcs {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}
