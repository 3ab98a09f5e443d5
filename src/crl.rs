//! Certificate revocation lists.
//!
//! This module decodes the to-be-signed part of an X.509 certificate
//! revocation list as defined in section 5.1 of RFC 5280:
//!
//! ```text
//! TBSCertList  ::=  SEQUENCE  {
//!      version                 Version OPTIONAL,
//!                                   -- if present, MUST be v2
//!      signature               AlgorithmIdentifier,
//!      issuer                  Name,
//!      thisUpdate              Time,
//!      nextUpdate              Time OPTIONAL,
//!      revokedCertificates     SEQUENCE OF SEQUENCE  {
//!           userCertificate         CertificateSerialNumber,
//!           revocationDate          Time,
//!           crlEntryExtensions      Extensions OPTIONAL
//!                                    -- if present, version MUST be v2
//!                                }  OPTIONAL,
//!      crlExtensions           [0]  EXPLICIT Extensions OPTIONAL
//!                                    -- if present, version MUST be v2
//!                                }
//! ```
//!
//! The signed envelope around it, i.e., the signature algorithm and value,
//! is not part of the input. Neither is any PEM or base64 framing.
//!
//! The signature algorithm and issuer are kept as their raw encoding. All
//! data is copied out of the input, so a decoded list does not borrow from
//! it.

use std::slice;
use chrono::{DateTime, Utc};
use crate::der::{Cursor, DecodeError, Tag};
use crate::serial::Serial;
use crate::x509::{Extensions, Time, oid};


//------------ CertificateList -----------------------------------------------

/// A decoded certificate revocation list body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateList {
    version: Version,
    signature: Box<[u8]>,
    issuer: Box<[u8]>,
    this_update: Time,
    next_update: Option<Time>,
    revoked: Vec<RevokedEntry>,
    extensions: Option<Extensions>,
}

impl CertificateList {
    /// Decodes a list body from its DER encoding.
    ///
    /// The data must contain exactly one `TBSCertList` and nothing else.
    /// Decoding is all or nothing: if anything is wrong anywhere, an error
    /// is returned.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(data);
        let res = Self::take_from(&mut cursor)?;
        cursor.finish()?;
        Ok(res)
    }

    /// Takes a list body from the beginning of a cursor.
    pub fn take_from(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        cursor.enter(Tag::SEQUENCE)?;
        let res = CertificateList {
            version: Version::take_opt_from(cursor)?,
            signature: cursor.take_element_if(Tag::SEQUENCE)?.raw.into(),
            issuer: cursor.take_element_if(Tag::SEQUENCE)?.raw.into(),
            this_update: Time::take_from(cursor)?,
            next_update: Time::take_opt_from(cursor)?,
            revoked: Self::take_revoked(cursor)?,
            extensions: Self::take_extensions(cursor)?,
        };
        cursor.leave()?;
        Ok(res)
    }

    /// Takes the revoked certificates if present.
    ///
    /// The entries are read in a flat loop until the end of the list.
    fn take_revoked(
        cursor: &mut Cursor
    ) -> Result<Vec<RevokedEntry>, DecodeError> {
        if cursor.peek_tag()? != Some(Tag::SEQUENCE) {
            return Ok(Vec::new())
        }
        cursor.enter(Tag::SEQUENCE)?;
        let mut res = Vec::with_capacity(
            cursor.remaining() / RevokedEntry::MIN_ENCODED_LEN
        );
        while cursor.remaining() > 0 {
            res.push(RevokedEntry::take_from(cursor)?);
        }
        cursor.leave()?;
        Ok(res)
    }

    /// Takes the explicitly tagged CRL extensions if present.
    fn take_extensions(
        cursor: &mut Cursor
    ) -> Result<Option<Extensions>, DecodeError> {
        if cursor.peek_tag()? != Some(Tag::CTX_CON_0) {
            return Ok(None)
        }
        cursor.enter(Tag::CTX_CON_0)?;
        let res = Extensions::take_from(cursor)?;
        cursor.leave()?;
        Ok(Some(res))
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the encoded signature algorithm identifier.
    pub fn signature(&self) -> &[u8] {
        self.signature.as_ref()
    }

    /// Returns the encoded issuer name.
    pub fn issuer(&self) -> &[u8] {
        self.issuer.as_ref()
    }

    pub fn this_update(&self) -> Time {
        self.this_update
    }

    pub fn next_update(&self) -> Option<Time> {
        self.next_update
    }

    /// Returns the revoked entries in the order they were encoded.
    pub fn revoked(&self) -> &[RevokedEntry] {
        &self.revoked
    }

    /// Returns the number of revoked entries.
    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    /// Returns whether there are no revoked entries.
    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }

    pub fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    /// Returns an iterator over the serials of all revoked entries.
    ///
    /// The serials are returned in list order and may contain duplicates.
    pub fn serials(&self) -> Serials {
        Serials(self.revoked.iter())
    }

    /// Returns the CRL number if the list has one.
    ///
    /// ```text
    /// CRLNumber ::= INTEGER (0..MAX)
    /// ```
    pub fn crl_number(&self) -> Result<Option<Serial>, DecodeError> {
        let extension = match self.extensions.as_ref() {
            Some(extensions) => extensions.find(oid::CE_CRL_NUMBER)?,
            None => None
        };
        let extension = match extension {
            Some(extension) => extension,
            None => return Ok(None)
        };
        let mut cursor = Cursor::new(extension.value);
        let number = cursor.take_integer()?;
        cursor.finish()?;
        Ok(Some(Serial::from_bytes(number)))
    }

    /// Returns whether the next update time has passed at `now`.
    ///
    /// A list without a next update time is never stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.next_update {
            Some(next_update) => next_update.date_time() < now,
            None => false
        }
    }
}


//------------ Serials -------------------------------------------------------

/// An iterator over the serials of a revocation list’s entries.
#[derive(Clone, Debug)]
pub struct Serials<'a>(slice::Iter<'a, RevokedEntry>);

impl<'a> Iterator for Serials<'a> {
    type Item = &'a Serial;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(RevokedEntry::serial)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> ExactSizeIterator for Serials<'a> { }


//------------ Version -------------------------------------------------------

/// The version of a revocation list.
///
/// ```text
/// Version  ::=  INTEGER  {  v1(0), v2(1), v3(2)  }
/// ```
///
/// If the version is missing, the list is v1.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Version {
    V1,
    V2,
}

impl Version {
    /// Takes the version if the next element is an INTEGER.
    pub fn take_opt_from(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        if cursor.peek_tag()? != Some(Tag::INTEGER) {
            return Ok(Version::V1)
        }
        match cursor.take_integer()? {
            [0] => Ok(Version::V1),
            [1] => Ok(Version::V2),
            _ => Err(DecodeError::Malformed)
        }
    }

    /// Returns the version number as shown to humans.
    pub fn number(self) -> u8 {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::V1
    }
}


//------------ RevokedEntry --------------------------------------------------

/// A single entry of the revoked certificates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevokedEntry {
    serial: Serial,
    revocation_date: Time,
    extensions: Option<Extensions>,
}

impl RevokedEntry {
    /// The smallest possible encoding of an entry.
    ///
    /// That is a two octet sequence header, a one octet INTEGER, and a
    /// UTCTime.
    const MIN_ENCODED_LEN: usize = 2 + 3 + 15;

    /// Takes a single entry from the beginning of the cursor.
    pub fn take_from(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        cursor.enter(Tag::SEQUENCE)?;
        let serial = Serial::from_bytes(cursor.take_integer()?);
        let revocation_date = Time::take_from(cursor)?;
        let extensions = if cursor.peek_tag()? == Some(Tag::SEQUENCE) {
            Some(Extensions::take_from(cursor)?)
        }
        else {
            None
        };
        cursor.leave()?;
        Ok(RevokedEntry { serial, revocation_date, extensions })
    }

    pub fn serial(&self) -> &Serial {
        &self.serial
    }

    pub fn revocation_date(&self) -> Time {
        self.revocation_date
    }

    pub fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    /// Returns the reason code of the entry if it has one.
    ///
    /// ```text
    /// reasonCode ::= { CRLReason }
    /// ```
    pub fn reason(&self) -> Result<Option<CrlReason>, DecodeError> {
        let extension = match self.extensions.as_ref() {
            Some(extensions) => extensions.find(oid::CE_CRL_REASONS)?,
            None => None
        };
        let extension = match extension {
            Some(extension) => extension,
            None => return Ok(None)
        };
        let mut cursor = Cursor::new(extension.value);
        let value = cursor.take_value_if(Tag::ENUMERATED)?;
        cursor.finish()?;
        CrlReason::from_value(value).map(Some)
    }
}


//------------ CrlReason -----------------------------------------------------

/// The reason a certificate was revoked.
///
/// ```text
/// CRLReason ::= ENUMERATED {
///      unspecified             (0),
///      keyCompromise           (1),
///      cACompromise            (2),
///      affiliationChanged      (3),
///      superseded              (4),
///      cessationOfOperation    (5),
///      certificateHold         (6),
///           -- value 7 is not used
///      removeFromCRL           (8),
///      privilegeWithdrawn      (9),
///      aACompromise           (10) }
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CrlReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl CrlReason {
    /// Converts the content octets of the ENUMERATED value.
    fn from_value(value: &[u8]) -> Result<Self, DecodeError> {
        match value {
            [0] => Ok(CrlReason::Unspecified),
            [1] => Ok(CrlReason::KeyCompromise),
            [2] => Ok(CrlReason::CaCompromise),
            [3] => Ok(CrlReason::AffiliationChanged),
            [4] => Ok(CrlReason::Superseded),
            [5] => Ok(CrlReason::CessationOfOperation),
            [6] => Ok(CrlReason::CertificateHold),
            [8] => Ok(CrlReason::RemoveFromCrl),
            [9] => Ok(CrlReason::PrivilegeWithdrawn),
            [10] => Ok(CrlReason::AaCompromise),
            _ => Err(DecodeError::Malformed)
        }
    }
}


//============ Tests =========================================================
