//! Subscribable instrument identity

use crate::encoder::EncodeError;
use crate::protocol::{ExchangeSegment, SECURITY_ID_FIELD_SIZE};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An (exchange segment, security id) pair.
///
/// Two instruments are the same subscription whenever both fields are equal.
/// The security id is validated on construction so every instrument fits a
/// request slot.
#[derive(Debug, Clone)]
pub struct Instrument {
    segment: ExchangeSegment,
    security_id: String,
}

impl Instrument {
    pub fn new(
        segment: impl Into<ExchangeSegment>,
        security_id: impl Into<String>,
    ) -> Result<Self, EncodeError> {
        let security_id = security_id.into();
        if security_id.is_empty() || security_id.len() > SECURITY_ID_FIELD_SIZE {
            return Err(EncodeError::InvalidSecurityId {
                len: security_id.len(),
                max: SECURITY_ID_FIELD_SIZE,
            });
        }
        Ok(Instrument {
            segment: segment.into(),
            security_id,
        })
    }

    pub fn segment(&self) -> ExchangeSegment {
        self.segment
    }

    pub fn security_id(&self) -> &str {
        &self.security_id
    }

    /// Registry key
    pub fn key(&self) -> (u8, &str) {
        (self.segment.as_u8(), &self.security_id)
    }
}

// Equality goes through the wire codes so `Other(1)` and `NseEq` are one key.
impl PartialEq for Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Instrument {}

impl Hash for Instrument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Instrument {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instrument {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment.as_u8(), self.security_id)
    }
}
