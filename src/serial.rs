//! Certificate serial numbers.
//!
//! This module provides [`Serial`], the canonical form of a certificate
//! serial number used as the unit of revocation identity.

use std::{cmp, error, fmt, str};
use serde::{Deserialize, Deserializer, Serialize, Serializer};


//------------ Serial --------------------------------------------------------

/// A certificate serial number in canonical form.
///
/// ```text
/// CertificateSerialNumber  ::=  INTEGER
/// ```
///
/// Serial numbers are encoded as DER INTEGERs and conventionally are
/// non-negative. Encoders are not always careful about this, so the same
/// number may show up with a superfluous leading zero octet or without the
/// zero octet that marks a value with the high bit set as positive.
///
/// A serial is therefore kept as the minimal encoding of a non-negative
/// integer: all leading zero octets are removed and a single zero octet is
/// put in front again if the first remaining octet has its high bit set.
/// A value of zero is represented by no octets at all.
///
/// Two serials are equal if and only if their canonical octets are equal.
/// The identity key returned by [`id`](Self::id) is the lowercase hex
/// representation of these octets.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Serial(Box<[u8]>);

impl Serial {
    /// Creates a serial from its big-endian octets.
    ///
    /// This never fails. Any sequence of octets, including an empty one,
    /// has a canonical form.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let start = raw.iter().position(|&ch| ch != 0).unwrap_or(raw.len());
        let raw = &raw[start..];
        match raw.first() {
            Some(&first) if first & 0x80 != 0 => {
                let mut res = Vec::with_capacity(raw.len() + 1);
                res.push(0);
                res.extend_from_slice(raw);
                Serial(res.into_boxed_slice())
            }
            _ => Serial(raw.into())
        }
    }

    /// Creates a serial from a string of hex digits.
    ///
    /// Both upper and lower case digits are accepted. The string must
    /// contain an even number of digits.
    pub fn from_hex(hex: &str) -> Result<Self, InvalidHex> {
        let raw = hex::decode(hex).map_err(|_| InvalidHex)?;
        Ok(Self::from_bytes(&raw))
    }

    /// Returns the identity key of the serial.
    ///
    /// This is the canonical octets in lowercase hex without separators.
    pub fn id(&self) -> String {
        hex::encode(&self.0)
    }

    /// Returns the canonical octets.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns the number of canonical octets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether this is the serial number zero.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}


//--- AsRef

impl AsRef<[u8]> for Serial {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}


//--- FromStr

impl str::FromStr for Serial {
    type Err = InvalidHex;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}


//--- PartialOrd and Ord
//
// Since the octets are minimal, comparing the length first and the octets
// second orders serials numerically.

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Serial {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
    }
}


//--- Display and Debug

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for ch in self.0.iter() {
            write!(f, "{:02x}", ch)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Serial({})", self)
    }
}


//--- Serialize and Deserialize

impl Serialize for Serial {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Serial {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}


//------------ InvalidHex ----------------------------------------------------

/// A string was not a valid hex representation of a serial number.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidHex;

impl fmt::Display for InvalidHex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid hex string")
    }
}

impl error::Error for InvalidHex { }


//============ Tests =========================================================
