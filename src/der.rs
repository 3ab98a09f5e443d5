//! DER parsing.
//!
//! This module provides a minimal cursor over DER encoded data. It reads
//! one element at a time, i.e., a tag, a length, and a value window, and
//! keeps track of nested constructed values through an explicit stack of
//! end offsets rather than through recursion. This keeps stack usage
//! constant no matter how the input is nested.
//!
//! Every length is checked against the data actually available before
//! anything is sliced, so a crafted length can never make us read or
//! allocate beyond the input.

use std::{error, fmt};


//------------ Class ---------------------------------------------------------

/// The class of an ASN.1 tag.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Class {
    Universal,
    Application,
    Context,
    Private,
}

impl Class {
    fn from_bits(byte: u8) -> Self {
        match byte >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::Context,
            _ => Class::Private,
        }
    }
}


//------------ Tag -----------------------------------------------------------

/// An ASN.1 tag.
///
/// Tags consist of a class, a flag whether the value is constructed, and
/// the tag number. Tag numbers of 31 and above use the multi-octet form
/// on the wire which we support for reading even if X.509 never uses it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Tag {
    class: Class,
    constructed: bool,
    number: u32,
}

impl Tag {
    pub const BOOLEAN: Self = Tag::universal(1, false);
    pub const INTEGER: Self = Tag::universal(2, false);
    pub const BIT_STRING: Self = Tag::universal(3, false);
    pub const OCTET_STRING: Self = Tag::universal(4, false);
    pub const NULL: Self = Tag::universal(5, false);
    pub const OID: Self = Tag::universal(6, false);
    pub const ENUMERATED: Self = Tag::universal(10, false);
    pub const UTC_TIME: Self = Tag::universal(23, false);
    pub const GENERALIZED_TIME: Self = Tag::universal(24, false);
    pub const SEQUENCE: Self = Tag::universal(16, true);
    pub const SET: Self = Tag::universal(17, true);

    pub const CTX_CON_0: Self = Tag::new(Class::Context, true, 0);

    /// Creates a new tag from its components.
    pub const fn new(class: Class, constructed: bool, number: u32) -> Self {
        Tag { class, constructed, number }
    }

    const fn universal(number: u32, constructed: bool) -> Self {
        Tag::new(Class::Universal, constructed, number)
    }

    pub fn class(self) -> Class {
        self.class
    }

    pub fn is_constructed(self) -> bool {
        self.constructed
    }

    pub fn number(self) -> u32 {
        self.number
    }

    /// Parses a tag from `data` starting at `pos`.
    ///
    /// Returns the tag and the position right after it. The tag may not
    /// extend beyond `end`.
    fn parse(
        data: &[u8], pos: usize, end: usize
    ) -> Result<(Self, usize), DecodeError> {
        if pos >= end {
            return Err(DecodeError::Truncated)
        }
        let first = data[pos];
        let mut pos = pos + 1;
        let mut number = u32::from(first & 0x1F);
        if number == 0x1F {
            // Multi-octet tag number: base 128, most significant group
            // first, high bit set on all but the last octet.
            number = 0;
            loop {
                if pos >= end {
                    return Err(DecodeError::Malformed)
                }
                let byte = data[pos];
                if number == 0 && byte == 0x80 {
                    // Leading zero group.
                    return Err(DecodeError::Malformed)
                }
                if number > (u32::MAX >> 7) {
                    return Err(DecodeError::Malformed)
                }
                number = (number << 7) | u32::from(byte & 0x7F);
                pos += 1;
                if byte & 0x80 == 0 {
                    break
                }
            }
            if number < 0x1F {
                // Should have used the single octet form.
                return Err(DecodeError::Malformed)
            }
        }
        Ok((
            Tag {
                class: Class::from_bits(first),
                constructed: first & 0x20 != 0,
                number
            },
            pos
        ))
    }
}


//------------ Oid -----------------------------------------------------------

/// An object identifier in its encoded form.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Oid<'a>(pub &'a [u8]);

impl<'a> Oid<'a> {
    pub fn as_slice(&self) -> &'a [u8] {
        self.0
    }
}

impl<'a> fmt::Display for Oid<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut components = Vec::new();
        let mut value = 0u64;
        for &byte in self.0 {
            value = (value << 7) | u64::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                components.push(value);
                value = 0;
            }
        }
        let mut components = components.into_iter();
        match components.next() {
            Some(first) => {
                let (arc1, arc2) = match first {
                    0..=39 => (0, first),
                    40..=79 => (1, first - 40),
                    _ => (2, first - 80),
                };
                write!(f, "{}.{}", arc1, arc2)?;
            }
            None => return Ok(())
        }
        for item in components {
            write!(f, ".{}", item)?;
        }
        Ok(())
    }
}


//------------ Element -------------------------------------------------------

/// A complete encoded element.
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    /// The tag of the element.
    pub tag: Tag,

    /// The content octets.
    pub value: &'a [u8],

    /// The full encoding, i.e., tag, length, and content octets.
    pub raw: &'a [u8],
}


//------------ Cursor --------------------------------------------------------

/// A sequential reader over DER encoded data.
///
/// The cursor always operates within a window of the underlying data. At
/// first, this window is all of the data. Entering a constructed value via
/// [`enter`](Self::enter) narrows the window to that value’s content until
/// the matching [`leave`](Self::leave) call. Leaving requires the content
/// to have been read completely.
///
/// Failing to find expected data at the end of a window results in
/// [`DecodeError::Truncated`]. A declared length that fits the remaining
/// data but overruns the window of the enclosing value results in
/// [`DecodeError::Malformed`].
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    /// The complete data.
    data: &'a [u8],

    /// The current read position in `data`.
    pos: usize,

    /// The end offsets of all currently entered constructed values.
    ///
    /// The last element is the end of the current window. If the stack is
    /// empty, the window extends to the end of `data`.
    ends: Vec<usize>,
}

impl<'a> Cursor<'a> {
    /// Creates a new cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0, ends: Vec::new() }
    }

    /// Returns the end offset of the current window.
    fn end(&self) -> usize {
        self.ends.last().copied().unwrap_or(self.data.len())
    }

    /// Returns the number of unread bytes in the current window.
    pub fn remaining(&self) -> usize {
        self.end() - self.pos
    }

    /// Returns the absolute position of the cursor in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of currently entered constructed values.
    pub fn depth(&self) -> usize {
        self.ends.len()
    }

    /// Reads the next tag.
    pub fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        let (tag, pos) = Tag::parse(self.data, self.pos, self.end())?;
        self.pos = pos;
        Ok(tag)
    }

    /// Returns the next tag without advancing the cursor.
    ///
    /// Returns `Ok(None)` if the current window is exhausted.
    pub fn peek_tag(&self) -> Result<Option<Tag>, DecodeError> {
        if self.remaining() == 0 {
            return Ok(None)
        }
        Tag::parse(self.data, self.pos, self.end()).map(|(tag, _)| Some(tag))
    }

    /// Reads a length.
    ///
    /// Only the definite form is allowed and it must be minimal. The
    /// length is checked against the available data and the current
    /// window.
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let len = match self.read_byte()? {
            // Bit 7 clear: the rest is the length.
            n if n & 0x80 == 0 => usize::from(n),

            // Indefinite form, forbidden in DER.
            0x80 => return Err(DecodeError::Malformed),

            // Reserved.
            0xFF => return Err(DecodeError::Malformed),

            // Bit 7 set: the rest is the number of length octets.
            n => {
                let count = usize::from(n & 0x7F);
                if count > std::mem::size_of::<usize>() {
                    return Err(DecodeError::Malformed)
                }
                let mut len = 0usize;
                for i in 0..count {
                    let byte = self.read_byte()?;
                    if i == 0 && byte == 0 {
                        return Err(DecodeError::Malformed)
                    }
                    len = (len << 8) | usize::from(byte);
                }
                if len < 0x80 {
                    // Should have used the short form.
                    return Err(DecodeError::Malformed)
                }
                len
            }
        };
        if len > self.data.len() - self.pos {
            Err(DecodeError::Truncated)
        }
        else if len > self.remaining() {
            Err(DecodeError::Malformed)
        }
        else {
            Ok(len)
        }
    }

    /// Reads exactly `len` bytes and returns them.
    pub fn read_value(
        &mut self, len: usize
    ) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated)
        }
        let res = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(res)
    }

    /// Reads a single byte from the current window.
    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        if self.remaining() == 0 {
            return Err(DecodeError::Truncated)
        }
        let res = self.data[self.pos];
        self.pos += 1;
        Ok(res)
    }

    /// Reads the tag and length of the next element.
    pub fn read_header(&mut self) -> Result<(Tag, usize), DecodeError> {
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        Ok((tag, len))
    }

    /// Reads a complete element.
    pub fn read_element(&mut self) -> Result<Element<'a>, DecodeError> {
        let start = self.pos;
        let (tag, len) = self.read_header()?;
        let value = self.read_value(len)?;
        Ok(Element { tag, value, raw: &self.data[start..self.pos] })
    }

    /// Reads a complete element which must have the given tag.
    pub fn take_element_if(
        &mut self, expected: Tag
    ) -> Result<Element<'a>, DecodeError> {
        let element = self.read_element()?;
        if element.tag != expected {
            return Err(DecodeError::Malformed)
        }
        Ok(element)
    }

    /// Reads the content of an element which must have the given tag.
    pub fn take_value_if(
        &mut self, expected: Tag
    ) -> Result<&'a [u8], DecodeError> {
        self.take_element_if(expected).map(|element| element.value)
    }

    /// Reads the content of an element if it has the given tag.
    pub fn take_opt_value_if(
        &mut self, expected: Tag
    ) -> Result<Option<&'a [u8]>, DecodeError> {
        if self.peek_tag()? == Some(expected) {
            self.take_value_if(expected).map(Some)
        }
        else {
            Ok(None)
        }
    }

    /// Reads the content octets of an INTEGER.
    ///
    /// The content is returned as is. It must not be empty.
    pub fn take_integer(&mut self) -> Result<&'a [u8], DecodeError> {
        let res = self.take_value_if(Tag::INTEGER)?;
        if res.is_empty() {
            return Err(DecodeError::Malformed)
        }
        Ok(res)
    }

    /// Enters a constructed value with the given tag.
    ///
    /// Afterwards, the window of the cursor is limited to the content of
    /// the value. It must be left again via [`leave`](Self::leave).
    pub fn enter(&mut self, expected: Tag) -> Result<(), DecodeError> {
        let (tag, len) = self.read_header()?;
        if tag != expected || !tag.is_constructed() {
            return Err(DecodeError::Malformed)
        }
        self.ends.push(self.pos + len);
        Ok(())
    }

    /// Leaves the most recently entered constructed value.
    ///
    /// The content must have been read completely.
    pub fn leave(&mut self) -> Result<(), DecodeError> {
        let end = match self.ends.pop() {
            Some(end) => end,
            None => return Err(DecodeError::Malformed)
        };
        if self.pos != end {
            return Err(DecodeError::TrailingData)
        }
        Ok(())
    }

    /// Checks that all data has been read and all values have been left.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if !self.ends.is_empty() {
            return Err(DecodeError::Malformed)
        }
        if self.pos != self.data.len() {
            return Err(DecodeError::TrailingData)
        }
        Ok(())
    }
}


//------------ DecodeError ---------------------------------------------------

/// Decoding DER data has failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DecodeError {
    /// The data is not correctly encoded DER or not what we expected.
    Malformed,

    /// A declared length exceeds the available data.
    Truncated,

    /// There is data left after a value was read completely.
    TrailingData,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            DecodeError::Malformed => "malformed DER data",
            DecodeError::Truncated => "truncated DER data",
            DecodeError::TrailingData => "trailing data after DER value",
        })
    }
}

impl error::Error for DecodeError { }


//============ Tests =========================================================

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Encodes a value with a single octet tag.
    pub(crate) fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut res = vec![tag];
        let len = content.len();
        if len < 0x80 {
            res.push(len as u8);
        }
        else {
            let bytes = len.to_be_bytes();
            let skip = bytes.iter().position(|&b| b != 0).unwrap();
            res.push(0x80 | (bytes.len() - skip) as u8);
            res.extend_from_slice(&bytes[skip..]);
        }
        res.extend_from_slice(content);
        res
    }

    #[test]
    fn tlv_helper() {
        assert_eq!(tlv(0x04, b"ab"), b"\x04\x02ab");
        let long = tlv(0x04, &[0; 300]);
        assert_eq!(&long[..4], b"\x04\x82\x01\x2c");
        assert_eq!(long.len(), 304);
    }

    #[test]
    fn read_simple_tags() {
        let mut cursor = Cursor::new(b"\x30\x00\xa0\x00\x02\x00");
        assert_eq!(cursor.read_tag().unwrap(), Tag::SEQUENCE);
        cursor.read_length().unwrap();
        let tag = cursor.read_tag().unwrap();
        assert_eq!(tag, Tag::CTX_CON_0);
        assert_eq!(tag.class(), Class::Context);
        assert!(tag.is_constructed());
        assert_eq!(tag.number(), 0);
        cursor.read_length().unwrap();
        let tag = cursor.read_tag().unwrap();
        assert_eq!(tag, Tag::INTEGER);
        assert!(!tag.is_constructed());
    }

    #[test]
    fn read_high_tag_number() {
        let mut cursor = Cursor::new(b"\x9f\x81\x00\x00");
        let tag = cursor.read_tag().unwrap();
        assert_eq!(tag.class(), Class::Context);
        assert_eq!(tag.number(), 128);

        // Cut off in the middle of the tag.
        assert_eq!(
            Cursor::new(b"\x9f\x81").read_tag(), Err(DecodeError::Malformed)
        );
        // Leading zero group.
        assert_eq!(
            Cursor::new(b"\x9f\x80\x01\x00").read_tag(),
            Err(DecodeError::Malformed)
        );
        // Number fits into a single octet.
        assert_eq!(
            Cursor::new(b"\x9f\x1e\x00").read_tag(),
            Err(DecodeError::Malformed)
        );
    }

    #[test]
    fn read_tag_at_end() {
        assert_eq!(Cursor::new(b"").read_tag(), Err(DecodeError::Truncated));
    }

    #[test]
    fn read_lengths() {
        let mut data = vec![0x04, 0x81, 0x80];
        data.extend_from_slice(&[0; 0x80]);
        let mut cursor = Cursor::new(&data);
        cursor.read_tag().unwrap();
        assert_eq!(cursor.read_length(), Ok(0x80));

        let mut data = vec![0x04, 0x82, 0x01, 0x00];
        data.extend_from_slice(&[0; 0x100]);
        let mut cursor = Cursor::new(&data);
        cursor.read_tag().unwrap();
        assert_eq!(cursor.read_length(), Ok(0x100));
    }

    #[test]
    fn reject_bad_lengths() {
        // Indefinite.
        assert_eq!(
            Cursor::new(b"\x30\x80\x00\x00").read_header(),
            Err(DecodeError::Malformed)
        );
        // Long form for a short length.
        assert_eq!(
            Cursor::new(b"\x04\x81\x01\x00").read_header(),
            Err(DecodeError::Malformed)
        );
        // Leading zero in long form.
        assert_eq!(
            Cursor::new(b"\x04\x82\x00\x81").read_header(),
            Err(DecodeError::Malformed)
        );
        // Too many length octets.
        assert_eq!(
            Cursor::new(b"\x04\x89\x01\x00\x00\x00\x00\x00\x00\x00\x00")
                .read_header(),
            Err(DecodeError::Malformed)
        );
        // Length beyond the data.
        assert_eq!(
            Cursor::new(b"\x04\x05abc").read_header(),
            Err(DecodeError::Truncated)
        );
        // Length octets missing.
        assert_eq!(
            Cursor::new(b"\x04\x82\x01").read_header(),
            Err(DecodeError::Truncated)
        );
        assert_eq!(
            Cursor::new(b"\x04").read_header(),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn length_overrunning_window() {
        // The inner value claims three bytes but the sequence only has
        // two left even though the data has more.
        let mut cursor = Cursor::new(b"\x30\x03\x04\x03ab\x00");
        cursor.enter(Tag::SEQUENCE).unwrap();
        assert_eq!(cursor.read_header(), Err(DecodeError::Malformed));
    }

    #[test]
    fn read_value_bounds() {
        let mut cursor = Cursor::new(b"abc");
        assert_eq!(cursor.read_value(2), Ok(&b"ab"[..]));
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.read_value(2), Err(DecodeError::Truncated));
        assert_eq!(cursor.read_value(1), Ok(&b"c"[..]));
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn peek_does_not_advance() {
        let cursor = Cursor::new(b"\x02\x01\x05");
        assert_eq!(cursor.peek_tag(), Ok(Some(Tag::INTEGER)));
        assert_eq!(cursor.position(), 0);
        assert_eq!(Cursor::new(b"").peek_tag(), Ok(None));
    }

    #[test]
    fn enter_and_leave() {
        let data = tlv(0x30, &[tlv(0x02, b"\x01"), tlv(0x05, b"")].concat());
        let mut cursor = Cursor::new(&data);
        cursor.enter(Tag::SEQUENCE).unwrap();
        assert_eq!(cursor.depth(), 1);
        assert_eq!(cursor.remaining(), 5);
        assert_eq!(cursor.take_integer(), Ok(&b"\x01"[..]));
        assert_eq!(cursor.take_opt_value_if(Tag::OID), Ok(None));
        assert_eq!(cursor.take_opt_value_if(Tag::NULL), Ok(Some(&b""[..])));
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.peek_tag(), Ok(None));
        cursor.leave().unwrap();
        assert_eq!(cursor.depth(), 0);
        cursor.finish().unwrap();
    }

    #[test]
    fn leave_with_content_left() {
        let data = tlv(0x30, &[tlv(0x02, b"\x01"), tlv(0x05, b"")].concat());
        let mut cursor = Cursor::new(&data);
        cursor.enter(Tag::SEQUENCE).unwrap();
        cursor.take_integer().unwrap();
        assert_eq!(cursor.leave(), Err(DecodeError::TrailingData));
    }

    #[test]
    fn finish_checks() {
        let mut cursor = Cursor::new(b"\x05\x00\x05\x00");
        cursor.take_value_if(Tag::NULL).unwrap();
        assert_eq!(cursor.finish(), Err(DecodeError::TrailingData));

        let mut cursor = Cursor::new(b"\x30\x00");
        cursor.enter(Tag::SEQUENCE).unwrap();
        assert_eq!(cursor.finish(), Err(DecodeError::Malformed));
        assert_eq!(Cursor::new(b"").leave(), Err(DecodeError::Malformed));
    }

    #[test]
    fn enter_wrong_tag() {
        assert_eq!(
            Cursor::new(b"\x31\x00").enter(Tag::SEQUENCE),
            Err(DecodeError::Malformed)
        );
        assert_eq!(
            Cursor::new(b"\x02\x00").take_integer(),
            Err(DecodeError::Malformed)
        );
    }

    #[test]
    fn element_raw() {
        let data = tlv(0x30, &tlv(0x06, b"\x55\x1d\x14"));
        let mut cursor = Cursor::new(&data);
        let element = cursor.read_element().unwrap();
        assert_eq!(element.tag, Tag::SEQUENCE);
        assert_eq!(element.raw, data.as_slice());
        assert_eq!(element.value, &data[2..]);
    }

    #[test]
    fn oid_display() {
        assert_eq!(Oid(b"\x55\x1d\x14").to_string(), "2.5.29.20");
        assert_eq!(
            Oid(b"\x2a\x86\x48\x86\xf7\x0d\x01\x01\x0b").to_string(),
            "1.2.840.113549.1.1.11"
        );
        assert_eq!(Oid(b"").to_string(), "");
    }
}
