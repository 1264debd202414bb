//! Off-circuit DER reader for certificates and revocation lists.
//!
//! Follows the same length rules as the in-circuit navigation (short form,
//! one or two long-form length bytes) and computes the offsets the circuit
//! is given as hints.

use crate::error::HintError;
use crate::types::statement::{EcdsaSignature, PublicKey};

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_CONTEXT_0: u8 = 0xa0;

/// Content bytes of an uncompressed P-256 key BIT STRING: unused-bits byte,
/// format byte, two coordinates.
pub const KEY_BIT_STRING_LEN: u8 = 0x42;

/// Longest serial number content compared by the revocation check.
pub const MAX_SERIAL_LEN: usize = 20;

/// The fixed prefix of the confirmation claim inside a credential header.
pub const CNF_PREFIX: &[u8] = br#""cnf":""#;
/// Hex characters of a SHA-256 digest.
pub const CNF_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub offset: usize,
    pub tag: u8,
    pub header_len: usize,
    pub content_len: usize,
}

impl Element {
    pub fn content_offset(&self) -> usize {
        self.offset + self.header_len
    }

    pub fn end(&self) -> usize {
        self.content_offset() + self.content_len
    }

    pub fn total_len(&self) -> usize {
        self.header_len + self.content_len
    }

    pub fn content<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.content_offset()..self.end()]
    }

    pub fn bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.offset..self.end()]
    }
}

fn byte_at(buf: &[u8], offset: usize) -> Result<u8, HintError> {
    buf.get(offset).copied().ok_or(HintError::Truncated { offset })
}

/// Reads the TLV header at `offset` and checks the element fits in `buf`.
pub fn parse_element(buf: &[u8], offset: usize) -> Result<Element, HintError> {
    let tag = byte_at(buf, offset)?;
    let len0 = byte_at(buf, offset + 1)?;
    let (header_len, content_len) = match len0 {
        l if l < 0x80 => (2, l as usize),
        0x81 => (3, byte_at(buf, offset + 2)? as usize),
        0x82 => {
            let hi = byte_at(buf, offset + 2)? as usize;
            let lo = byte_at(buf, offset + 3)? as usize;
            (4, (hi << 8) | lo)
        }
        byte => return Err(HintError::UnsupportedLength { offset, byte }),
    };
    let element = Element {
        offset,
        tag,
        header_len,
        content_len,
    };
    if element.end() > buf.len() {
        return Err(HintError::Truncated { offset });
    }
    Ok(element)
}

/// Like [`parse_element`] but also requires `tag`.
pub fn expect_element(buf: &[u8], offset: usize, tag: u8) -> Result<Element, HintError> {
    let element = parse_element(buf, offset)?;
    if element.tag != tag {
        return Err(HintError::UnexpectedTag {
            offset,
            expected: tag,
            found: element.tag,
        });
    }
    Ok(element)
}

/// Byte positions inside an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateLayout {
    pub tbs: Element,
    pub serial: Element,
    /// Offset of the subject public key BIT STRING element.
    pub key_offset: usize,
    pub subject_key: PublicKey,
    /// The authority's signature over the to-be-signed bytes.
    pub signature: EcdsaSignature,
}

impl CertificateLayout {
    pub fn locate(cert: &[u8]) -> Result<Self, HintError> {
        let outer = expect_element(cert, 0, TAG_SEQUENCE)?;
        let tbs = expect_element(cert, outer.content_offset(), TAG_SEQUENCE)?;

        let mut cursor = tbs.content_offset();
        if byte_at(cert, cursor)? == TAG_CONTEXT_0 {
            cursor = parse_element(cert, cursor)?.end();
        }
        let serial = expect_element(cert, cursor, TAG_INTEGER)?;
        if serial.content_len > MAX_SERIAL_LEN {
            return Err(HintError::SerialTooLong {
                len: serial.content_len,
                max: MAX_SERIAL_LEN,
            });
        }
        cursor = serial.end();

        // signature algorithm, issuer, validity, subject
        for _ in 0..4 {
            cursor = expect_element(cert, cursor, TAG_SEQUENCE)?.end();
        }

        let spki = expect_element(cert, cursor, TAG_SEQUENCE)?;
        let algorithm = expect_element(cert, spki.content_offset(), TAG_SEQUENCE)?;
        let key = expect_element(cert, algorithm.end(), TAG_BIT_STRING)?;
        let key_content = key.content(cert);
        if key.header_len != 2
            || key.content_len != KEY_BIT_STRING_LEN as usize
            || key_content[0] != 0x00
        {
            return Err(HintError::KeyShape);
        }
        let subject_key = PublicKey::from_sec1(&key_content[1..])?;

        let signature_algorithm = expect_element(cert, tbs.end(), TAG_SEQUENCE)?;
        let signature_value = expect_element(cert, signature_algorithm.end(), TAG_BIT_STRING)?;
        let signature_bits = signature_value.content(cert);
        match signature_bits.split_first() {
            Some((0x00, der)) => {
                let signature = EcdsaSignature::from_der(der)?;
                Ok(Self {
                    tbs,
                    serial,
                    key_offset: key.offset,
                    subject_key,
                    signature,
                })
            }
            _ => Err(HintError::Signature(
                "signature BIT STRING has unused bits".into(),
            )),
        }
    }

    pub fn tbs_bytes<'a>(&self, cert: &'a [u8]) -> &'a [u8] {
        self.tbs.bytes(cert)
    }

    pub fn serial_bytes<'a>(&self, cert: &'a [u8]) -> &'a [u8] {
        self.serial.content(cert)
    }
}

/// Byte positions inside a certificate revocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlLayout {
    /// Start of the first revoked entry, or the end of the optional fields
    /// when the list is absent.
    pub entries_start: usize,
    pub entries_end: usize,
    pub revoked_serials: Vec<Vec<u8>>,
}

impl CrlLayout {
    pub fn locate(crl: &[u8]) -> Result<Self, HintError> {
        let outer = expect_element(crl, 0, TAG_SEQUENCE)?;
        let tbs = expect_element(crl, outer.content_offset(), TAG_SEQUENCE)?;
        let tbs_end = tbs.end();

        let mut cursor = tbs.content_offset();
        if byte_at(crl, cursor)? == TAG_INTEGER {
            cursor = parse_element(crl, cursor)?.end();
        }
        // signature algorithm, issuer
        for _ in 0..2 {
            cursor = expect_element(crl, cursor, TAG_SEQUENCE)?.end();
        }
        let this_update = parse_element(crl, cursor)?;
        if !is_time(this_update.tag) {
            return Err(HintError::UnexpectedTag {
                offset: cursor,
                expected: TAG_UTC_TIME,
                found: this_update.tag,
            });
        }
        cursor = this_update.end();
        if cursor < tbs_end && is_time(byte_at(crl, cursor)?) {
            cursor = parse_element(crl, cursor)?.end();
        }

        if cursor >= tbs_end || byte_at(crl, cursor)? != TAG_SEQUENCE {
            return Ok(Self {
                entries_start: cursor,
                entries_end: cursor,
                revoked_serials: Vec::new(),
            });
        }

        let list = expect_element(crl, cursor, TAG_SEQUENCE)?;
        let mut revoked_serials = Vec::new();
        let mut entry_offset = list.content_offset();
        while entry_offset < list.end() {
            let entry = expect_element(crl, entry_offset, TAG_SEQUENCE)?;
            let serial = expect_element(crl, entry.content_offset(), TAG_INTEGER)?;
            if serial.header_len != 2 || serial.content_len > MAX_SERIAL_LEN {
                return Err(HintError::SerialTooLong {
                    len: serial.content_len,
                    max: MAX_SERIAL_LEN,
                });
            }
            revoked_serials.push(serial.content(crl).to_vec());
            entry_offset = entry.end();
        }

        Ok(Self {
            entries_start: list.content_offset(),
            entries_end: list.end(),
            revoked_serials,
        })
    }

    pub fn contains_serial(&self, serial: &[u8]) -> bool {
        self.revoked_serials.iter().any(|s| s == serial)
    }

    pub fn check_entries(&self, max_entries: usize) -> Result<(), HintError> {
        if self.revoked_serials.len() > max_entries {
            return Err(HintError::TooManyEntries {
                actual: self.revoked_serials.len(),
                max: max_entries,
            });
        }
        Ok(())
    }
}

fn is_time(tag: u8) -> bool {
    tag == TAG_UTC_TIME || tag == TAG_GENERALIZED_TIME
}

/// Offset of `"cnf":"<64 hex>` inside a decoded credential header.
pub fn find_cnf_claim(header_json: &[u8]) -> Result<usize, HintError> {
    let offset = header_json
        .windows(CNF_PREFIX.len())
        .position(|w| w == CNF_PREFIX)
        .ok_or(HintError::MissingClaim)?;
    let start = offset + CNF_PREFIX.len();
    let digest_hex = header_json
        .get(start..start + CNF_HEX_LEN)
        .ok_or(HintError::Truncated { offset: start })?;
    hex::decode(digest_hex)?;
    Ok(offset)
}
