//! Types shared by various parts of X.509.

use std::fmt;
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use crate::der::{Cursor, DecodeError, Oid, Tag};


//------------ Time ----------------------------------------------------------

/// A point in time as used in X.509.
///
/// ```text
/// Time ::= CHOICE {
///     utcTime        UTCTime,
///     generalTime    GeneralizedTime }
/// ```
///
/// RFC 5280 restricts both choices to UTC with a resolution of seconds,
/// i.e., `YYMMDDHHMMSSZ` and `YYYYMMDDHHMMSSZ`, respectively. We insist on
/// that.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    /// Takes a time value from the beginning of the cursor.
    pub fn take_from(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let (tag, len) = cursor.read_header()?;
        let value = cursor.read_value(len)?;
        match tag {
            Tag::UTC_TIME => Self::from_utc_time(value),
            Tag::GENERALIZED_TIME => Self::from_generalized_time(value),
            _ => Err(DecodeError::Malformed)
        }
    }

    /// Takes a time value if the next element is one.
    pub fn take_opt_from(
        cursor: &mut Cursor
    ) -> Result<Option<Self>, DecodeError> {
        match cursor.peek_tag()? {
            Some(Tag::UTC_TIME) | Some(Tag::GENERALIZED_TIME) => {
                Self::take_from(cursor).map(Some)
            }
            _ => Ok(None)
        }
    }

    /// Converts the content of a UTCTime value.
    pub fn from_utc_time(value: &[u8]) -> Result<Self, DecodeError> {
        if value.len() != 13 {
            return Err(DecodeError::Malformed)
        }
        let year = read_digits(&value[..2])? as i32;
        let year = if year >= 50 { year + 1900 } else { year + 2000 };
        Self::from_parts(year, &value[2..])
    }

    /// Converts the content of a GeneralizedTime value.
    pub fn from_generalized_time(value: &[u8]) -> Result<Self, DecodeError> {
        if value.len() != 15 {
            return Err(DecodeError::Malformed)
        }
        let year = read_digits(&value[..4])? as i32;
        Self::from_parts(year, &value[4..])
    }

    /// Converts the `MMDDHHMMSSZ` part common to both encodings.
    fn from_parts(year: i32, rest: &[u8]) -> Result<Self, DecodeError> {
        if rest.len() != 11 || rest[10] != b'Z' {
            return Err(DecodeError::Malformed)
        }
        NaiveDate::from_ymd_opt(
            year, read_digits(&rest[0..2])?, read_digits(&rest[2..4])?
        ).and_then(|date| {
            date.and_hms_opt(
                read_digits(&rest[4..6]).ok()?,
                read_digits(&rest[6..8]).ok()?,
                read_digits(&rest[8..10]).ok()?,
            )
        }).map(|dt| Time(Utc.from_utc_datetime(&dt))).ok_or(
            DecodeError::Malformed
        )
    }

    pub fn date_time(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// Converts a string of ASCII digits into a number.
fn read_digits(digits: &[u8]) -> Result<u32, DecodeError> {
    digits.iter().try_fold(0u32, |res, &ch| {
        if ch.is_ascii_digit() {
            Ok(res * 10 + u32::from(ch - b'0'))
        }
        else {
            Err(DecodeError::Malformed)
        }
    })
}


//------------ Extensions ----------------------------------------------------

/// A sequence of extensions.
///
/// ```text
/// Extensions ::= SEQUENCE SIZE (1..MAX) OF Extension
/// ```
///
/// Extensions are kept in their encoded form. Decoding a CRL only checks
/// that there is a SEQUENCE. The individual extensions are parsed when
/// iterating over them.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Extensions(Box<[u8]>);

impl Extensions {
    /// Takes the extensions SEQUENCE from the beginning of the cursor.
    pub fn take_from(cursor: &mut Cursor) -> Result<Self, DecodeError> {
        let element = cursor.take_element_if(Tag::SEQUENCE)?;
        Ok(Extensions(element.raw.into()))
    }

    /// Returns the complete encoded SEQUENCE.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns an iterator over the extensions.
    pub fn iter(&self) -> ExtensionIter {
        ExtensionIter {
            cursor: Cursor::new(self.as_slice()),
            started: false,
            done: false,
        }
    }

    /// Returns the first extension with the given OID.
    pub fn find(&self, oid: Oid) -> Result<Option<Extension>, DecodeError> {
        for extension in self.iter() {
            let extension = extension?;
            if extension.oid == oid {
                return Ok(Some(extension))
            }
        }
        Ok(None)
    }
}

impl<'a> IntoIterator for &'a Extensions {
    type Item = Result<Extension<'a>, DecodeError>;
    type IntoIter = ExtensionIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


//------------ ExtensionIter -------------------------------------------------

/// An iterator over extensions.
///
/// If the encoding turns out to be broken, the iterator returns an error
/// once and then stops.
#[derive(Clone, Debug)]
pub struct ExtensionIter<'a> {
    cursor: Cursor<'a>,
    started: bool,
    done: bool,
}

impl<'a> ExtensionIter<'a> {
    fn step(&mut self) -> Result<Option<Extension<'a>>, DecodeError> {
        if !self.started {
            self.cursor.enter(Tag::SEQUENCE)?;
            self.started = true;
        }
        if self.cursor.remaining() == 0 {
            self.cursor.leave()?;
            self.cursor.finish()?;
            return Ok(None)
        }
        Extension::take_from(&mut self.cursor).map(Some)
    }
}

impl<'a> Iterator for ExtensionIter<'a> {
    type Item = Result<Extension<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None
        }
        match self.step() {
            Ok(Some(extension)) => Some(Ok(extension)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}


//------------ Extension -----------------------------------------------------

/// A single extension.
///
/// ```text
/// Extension  ::=  SEQUENCE  {
///      extnID      OBJECT IDENTIFIER,
///      critical    BOOLEAN DEFAULT FALSE,
///      extnValue   OCTET STRING }
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Extension<'a> {
    pub oid: Oid<'a>,
    pub critical: bool,

    /// The content of the extnValue OCTET STRING.
    pub value: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn take_from(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError> {
        cursor.enter(Tag::SEQUENCE)?;
        let oid = Oid(cursor.take_value_if(Tag::OID)?);
        let critical = match cursor.take_opt_value_if(Tag::BOOLEAN)? {
            Some([0x00]) => false,
            Some([0xFF]) => true,
            Some(_) => return Err(DecodeError::Malformed),
            None => false,
        };
        let value = cursor.take_value_if(Tag::OCTET_STRING)?;
        cursor.leave()?;
        Ok(Extension { oid, critical, value })
    }
}


//------------ OIDs ----------------------------------------------------------

pub mod oid {
    use crate::der::Oid;

    pub const CE_CRL_NUMBER: Oid = Oid(&[85, 29, 20]);
    pub const CE_CRL_REASONS: Oid = Oid(&[85, 29, 21]);
    pub const CE_AUTHORITY_KEY_IDENTIFIER: Oid = Oid(&[85, 29, 35]);
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::der::test::tlv;

    fn time(tag: u8, value: &str) -> Result<Time, DecodeError> {
        let data = tlv(tag, value.as_bytes());
        let mut cursor = Cursor::new(&data);
        let res = Time::take_from(&mut cursor)?;
        cursor.finish()?;
        Ok(res)
    }

    #[test]
    fn utc_time() {
        let t = time(0x17, "190903160014Z").unwrap();
        assert_eq!(t.to_string(), "2019-09-03T16:00:14Z");
        let t = time(0x17, "500101000000Z").unwrap();
        assert_eq!(t.to_string(), "1950-01-01T00:00:00Z");
        let t = time(0x17, "491231235959Z").unwrap();
        assert_eq!(t.to_string(), "2049-12-31T23:59:59Z");
    }

    #[test]
    fn generalized_time() {
        let t = time(0x18, "20500101000000Z").unwrap();
        assert_eq!(t.to_string(), "2050-01-01T00:00:00Z");
        assert_eq!(t.timestamp(), 2524608000);
    }

    #[test]
    fn bad_times() {
        // No seconds.
        assert_eq!(time(0x17, "1909031600Z"), Err(DecodeError::Malformed));
        // Time zone offset.
        assert_eq!(
            time(0x17, "190903160014+0100"), Err(DecodeError::Malformed)
        );
        // Fractional seconds.
        assert_eq!(
            time(0x18, "20190903160014.5Z"), Err(DecodeError::Malformed)
        );
        // Not a date.
        assert_eq!(time(0x17, "190230000000Z"), Err(DecodeError::Malformed));
        assert_eq!(time(0x17, "190903250000Z"), Err(DecodeError::Malformed));
        // Sign characters.
        assert_eq!(time(0x17, "+9090316001Z4"), Err(DecodeError::Malformed));
        // Wrong tag.
        assert_eq!(time(0x04, "190903160014Z"), Err(DecodeError::Malformed));
    }

    #[test]
    fn opt_time() {
        let data = tlv(0x30, b"");
        let mut cursor = Cursor::new(&data);
        assert_eq!(Time::take_opt_from(&mut cursor), Ok(None));
        assert_eq!(cursor.position(), 0);

        let data = tlv(0x18, b"20190903160014Z");
        let mut cursor = Cursor::new(&data);
        assert!(Time::take_opt_from(&mut cursor).unwrap().is_some());
        cursor.finish().unwrap();
    }

    fn extension(oid: &[u8], critical: Option<u8>, value: &[u8]) -> Vec<u8> {
        let mut content = tlv(0x06, oid);
        if let Some(critical) = critical {
            content.extend(tlv(0x01, &[critical]));
        }
        content.extend(tlv(0x04, value));
        tlv(0x30, &content)
    }

    fn extensions(items: &[Vec<u8>]) -> Extensions {
        let data = tlv(0x30, &items.concat());
        let mut cursor = Cursor::new(&data);
        let res = Extensions::take_from(&mut cursor).unwrap();
        cursor.finish().unwrap();
        res
    }

    #[test]
    fn iterate_extensions() {
        let ext = extensions(&[
            extension(&[85, 29, 35], None, b"\x30\x00"),
            extension(&[85, 29, 20], Some(0xFF), b"\x02\x01\x07"),
        ]);
        let items = ext.iter().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].oid, oid::CE_AUTHORITY_KEY_IDENTIFIER);
        assert!(!items[0].critical);
        assert_eq!(items[1].oid, oid::CE_CRL_NUMBER);
        assert!(items[1].critical);
        assert_eq!(items[1].value, b"\x02\x01\x07");

        let found = ext.find(oid::CE_CRL_NUMBER).unwrap().unwrap();
        assert_eq!(found.value, b"\x02\x01\x07");
        assert!(ext.find(oid::CE_CRL_REASONS).unwrap().is_none());
    }

    #[test]
    fn broken_extension() {
        let ext = extensions(&[
            extension(&[85, 29, 20], Some(0x01), b"\x02\x01\x07"),
            extension(&[85, 29, 35], None, b"\x30\x00"),
        ]);
        let mut iter = ext.iter();
        assert_eq!(iter.next().unwrap().unwrap_err(), DecodeError::Malformed);
        assert!(iter.next().is_none());
        assert_eq!(
            ext.find(oid::CE_AUTHORITY_KEY_IDENTIFIER).unwrap_err(),
            DecodeError::Malformed
        );
    }

    #[test]
    fn empty_extensions() {
        let ext = extensions(&[]);
        assert_eq!(ext.iter().count(), 0);
        assert_eq!(ext.as_slice(), b"\x30\x00");
    }
}
