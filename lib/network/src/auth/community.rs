use bytes::Bytes;
use core::fmt;

/// The community string a request must carry to be answered.
#[derive(Clone, PartialEq, Eq)]
pub struct Community(Bytes);

impl Community {
    pub fn new(community: impl Into<String>) -> Self {
        Community(Bytes::from(community.into()))
    }

    /// Compares in time independent of where the first mismatch is.
    pub fn permits(&self, presented: &[u8]) -> bool {
        if presented.len() != self.0.len() {
            return false;
        }
        self.0
            .iter()
            .zip(presented)
            .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }
}

impl fmt::Debug for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Community").field(&"<redacted>").finish()
    }
}
