//! Typed credential statements and the off-circuit preparation step.
//!
//! A statement is what a holder wants to prove. Preparing it parses the
//! certificate, revocation list and credential header off-circuit to find
//! the byte offsets the circuit re-derives, and fails early on malformed or
//! oversized input.

use log::debug;

use crate::der::{find_cnf_claim, CertificateLayout, CrlLayout};
use crate::error::HintError;

pub const CHALLENGE_LEN: usize = 32;
pub const DEFAULT_MAX_ENTRIES: usize = 8;

/// Uncompressed P-256 public key, big-endian coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl PublicKey {
    /// Accepts `0x04 || X || Y` or the bare 64 coordinate bytes.
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, HintError> {
        let coords = match bytes.len() {
            65 if bytes[0] == 0x04 => &bytes[1..],
            64 => bytes,
            _ => return Err(HintError::KeyShape),
        };
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&coords[..32]);
        y.copy_from_slice(&coords[32..]);
        Ok(Self { x, y })
    }

    pub fn to_sec1(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(65);
        out.push(0x04);
        out.extend_from_slice(&self.x);
        out.extend_from_slice(&self.y);
        out
    }
}

/// ECDSA signature as big-endian `r` and `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EcdsaSignature {
    /// Parses the fixed `r || s` encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HintError> {
        if bytes.len() != 64 {
            return Err(HintError::Signature(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Self { r, s })
    }

    /// Parses a DER `ECDSA-Sig-Value`.
    pub fn from_der(der: &[u8]) -> Result<Self, HintError> {
        let sig = p256::ecdsa::Signature::from_der(der)
            .map_err(|e| HintError::Signature(e.to_string()))?;
        Self::from_bytes(&sig.to_bytes())
    }
}

/// JWS-style envelope: the issuer signs `header_b64 '.' payload_b64`.
#[derive(Debug, Clone)]
pub struct CredentialEnvelope {
    /// Private. Carries the `cnf` claim.
    pub header_b64: Vec<u8>,
    /// Public.
    pub payload_b64: Vec<u8>,
    pub issuer_key: PublicKey,
    pub signature: EcdsaSignature,
}

#[derive(Debug, Clone)]
pub struct CredentialStatement {
    pub certificate: Vec<u8>,
    pub challenge: [u8; CHALLENGE_LEN],
    pub challenge_signature: EcdsaSignature,
    /// Authority whose signature over the certificate is checked.
    pub authority_key: Option<PublicKey>,
    pub envelope: Option<CredentialEnvelope>,
    /// Revocation list the certificate serial must be absent from.
    pub crl: Option<Vec<u8>>,
}

/// The part of a credential statement a verifier sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPublic {
    pub challenge: [u8; CHALLENGE_LEN],
    pub authority_key: Option<PublicKey>,
    pub issuer_key: Option<PublicKey>,
    pub payload_b64: Option<Vec<u8>>,
    pub crl: Option<Vec<u8>>,
}

impl CredentialStatement {
    pub fn public(&self) -> CredentialPublic {
        CredentialPublic {
            challenge: self.challenge,
            authority_key: self.authority_key,
            issuer_key: self.envelope.as_ref().map(|e| e.issuer_key),
            payload_b64: self.envelope.as_ref().map(|e| e.payload_b64.clone()),
            crl: self.crl.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeShape {
    pub header_b64_len: usize,
    pub payload_b64_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrlShape {
    pub crl_len: usize,
    pub max_entries: usize,
}

/// Compile-time sizes of a credential circuit variant.
///
/// `certificate_len` and `crl_len` are maxima (shorter input is zero padded).
/// `tbs_len` and the envelope lengths are exact since they are hashed. `tbs_len`
/// only constrains circuits with the authority layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialShape {
    pub certificate_len: usize,
    pub tbs_len: usize,
    pub authority: bool,
    pub envelope: Option<EnvelopeShape>,
    pub crl: Option<CrlShape>,
}

impl CredentialShape {
    pub fn possession(certificate_len: usize, tbs_len: usize) -> Self {
        Self {
            certificate_len,
            tbs_len,
            authority: false,
            envelope: None,
            crl: None,
        }
    }

    pub fn with_authority(mut self) -> Self {
        self.authority = true;
        self
    }

    pub fn with_envelope(mut self, envelope: EnvelopeShape) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_crl(mut self, crl: CrlShape) -> Self {
        self.crl = Some(crl);
        self
    }
}

/// A statement together with the hints derived from it.
#[derive(Debug, Clone)]
pub struct PreparedCredential {
    pub statement: CredentialStatement,
    pub certificate: CertificateLayout,
    /// Offset of the `cnf` needle inside the decoded header.
    pub cnf_offset: Option<usize>,
    pub header_json: Option<Vec<u8>>,
    pub crl: Option<CrlLayout>,
}

impl CredentialStatement {
    pub fn prepare(self) -> Result<PreparedCredential, HintError> {
        let certificate = CertificateLayout::locate(&self.certificate)?;
        debug!(
            "certificate layout: tbs at {} ({} bytes), serial at {}, key at {}",
            certificate.tbs.offset,
            certificate.tbs.total_len(),
            certificate.serial.offset,
            certificate.key_offset
        );

        let (cnf_offset, header_json) = match &self.envelope {
            Some(envelope) => {
                let header_json = decode_base64url(&envelope.header_b64)?;
                let offset = find_cnf_claim(&header_json)?;
                debug!("cnf claim at header offset {}", offset);
                (Some(offset), Some(header_json))
            }
            None => (None, None),
        };

        let crl = self.crl.as_deref().map(CrlLayout::locate).transpose()?;

        Ok(PreparedCredential {
            statement: self,
            certificate,
            cnf_offset,
            header_json,
            crl,
        })
    }
}

impl PreparedCredential {
    /// The tightest shape this statement fits.
    pub fn shape(&self) -> CredentialShape {
        let mut shape = CredentialShape::possession(
            self.statement.certificate.len(),
            self.certificate.tbs.total_len(),
        );
        if self.statement.authority_key.is_some() {
            shape = shape.with_authority();
        }
        if let Some(envelope) = &self.statement.envelope {
            shape = shape.with_envelope(EnvelopeShape {
                header_b64_len: envelope.header_b64.len(),
                payload_b64_len: envelope.payload_b64.len(),
            });
        }
        if let (Some(crl), Some(layout)) = (&self.statement.crl, &self.crl) {
            shape = shape.with_crl(CrlShape {
                crl_len: crl.len(),
                max_entries: layout.revoked_serials.len().max(DEFAULT_MAX_ENTRIES),
            });
        }
        shape
    }

    /// Rejects statements a circuit compiled for `shape` cannot represent.
    pub fn check_fits(&self, shape: &CredentialShape) -> Result<(), HintError> {
        fits_at_most("certificate", self.statement.certificate.len(), shape.certificate_len)?;
        if shape.authority != self.statement.authority_key.is_some() {
            return Err(HintError::Capacity {
                what: "authority key",
                actual: usize::from(self.statement.authority_key.is_some()),
                expected: usize::from(shape.authority),
            });
        }
        // only the authority layer hashes the TBSCertificate at a fixed size
        if shape.authority {
            let tbs_len = self.certificate.tbs.total_len();
            fits_exactly("to-be-signed certificate", tbs_len, shape.tbs_len)?;
        }
        match (&shape.envelope, &self.statement.envelope) {
            (Some(expected), Some(envelope)) => {
                let header_len = envelope.header_b64.len();
                let payload_len = envelope.payload_b64.len();
                fits_exactly("credential header", header_len, expected.header_b64_len)?;
                fits_exactly("credential payload", payload_len, expected.payload_b64_len)?;
            }
            (None, None) => {}
            (expected, actual) => {
                return Err(HintError::Capacity {
                    what: "credential envelope",
                    actual: usize::from(actual.is_some()),
                    expected: usize::from(expected.is_some()),
                })
            }
        }
        match (&shape.crl, &self.statement.crl, &self.crl) {
            (Some(expected), Some(crl), Some(layout)) => {
                fits_at_most("revocation list", crl.len(), expected.crl_len)?;
                layout.check_entries(expected.max_entries)?;
            }
            (None, None, _) => {}
            (expected, actual, _) => {
                return Err(HintError::Capacity {
                    what: "revocation list",
                    actual: usize::from(actual.is_some()),
                    expected: usize::from(expected.is_some()),
                })
            }
        }
        Ok(())
    }
}

/// Certificate and revocation list for the standalone not-revoked statement.
#[derive(Debug, Clone)]
pub struct RevocationStatement {
    pub certificate: Vec<u8>,
    pub crl: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationShape {
    pub certificate_len: usize,
    pub crl_len: usize,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct PreparedRevocation {
    pub statement: RevocationStatement,
    pub certificate: CertificateLayout,
    pub crl: CrlLayout,
}

impl RevocationStatement {
    pub fn prepare(self) -> Result<PreparedRevocation, HintError> {
        let certificate = CertificateLayout::locate(&self.certificate)?;
        let crl = CrlLayout::locate(&self.crl)?;
        debug!(
            "revocation list: {} entries in [{}, {})",
            crl.revoked_serials.len(),
            crl.entries_start,
            crl.entries_end
        );
        Ok(PreparedRevocation {
            statement: self,
            certificate,
            crl,
        })
    }
}

impl PreparedRevocation {
    pub fn shape(&self) -> RevocationShape {
        RevocationShape {
            certificate_len: self.statement.certificate.len(),
            crl_len: self.statement.crl.len(),
            max_entries: self.crl.revoked_serials.len().max(DEFAULT_MAX_ENTRIES),
        }
    }

    pub fn check_fits(&self, shape: &RevocationShape) -> Result<(), HintError> {
        fits_at_most("certificate", self.statement.certificate.len(), shape.certificate_len)?;
        fits_at_most("revocation list", self.statement.crl.len(), shape.crl_len)?;
        self.crl.check_entries(shape.max_entries)
    }
}

fn fits_at_most(what: &'static str, actual: usize, expected: usize) -> Result<(), HintError> {
    if actual > expected {
        return Err(HintError::Capacity { what, actual, expected });
    }
    Ok(())
}

fn fits_exactly(what: &'static str, actual: usize, expected: usize) -> Result<(), HintError> {
    if actual != expected {
        return Err(HintError::Capacity { what, actual, expected });
    }
    Ok(())
}

/// Unpadded base64url, as used by JWS compact serialization.
pub fn decode_base64url(text: &[u8]) -> Result<Vec<u8>, HintError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    Ok(URL_SAFE_NO_PAD.decode(text)?)
}

/// Zero-pads `bytes` to `len`.
pub fn pad_to(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(len.max(bytes.len()), 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{CertificateBuilder, Scenario};
    use anyhow::Result;

    #[test]
    fn test_prepare_derives_shape_and_hints() -> Result<()> {
        let scenario = Scenario::new(12345, &[1111, 2222, 3333])?;
        let prepared = scenario.credential_statement().prepare()?;
        let shape = prepared.shape();

        assert!(shape.authority);
        assert_eq!(shape.certificate_len, scenario.certificate.len());
        assert!(prepared.cnf_offset.is_some());
        assert_eq!(shape.crl.map(|c| c.max_entries), Some(DEFAULT_MAX_ENTRIES));
        prepared.check_fits(&shape)?;
        Ok(())
    }

    #[test]
    fn test_check_fits_reports_capacity() -> Result<()> {
        let scenario = Scenario::new(12345, &[1111, 2222, 3333])?;
        let prepared = scenario.credential_statement().prepare()?;

        let mut small = prepared.shape();
        small.certificate_len -= 1;
        assert!(matches!(
            prepared.check_fits(&small),
            Err(HintError::Capacity { what: "certificate", .. })
        ));

        let mut few_entries = prepared.shape();
        few_entries.crl = few_entries.crl.map(|c| CrlShape { max_entries: 2, ..c });
        assert!(matches!(
            prepared.check_fits(&few_entries),
            Err(HintError::TooManyEntries { actual: 3, max: 2 })
        ));
        Ok(())
    }

    #[test]
    fn test_possession_shape_accepts_other_tbs_lengths() -> Result<()> {
        let scenario = Scenario::new(12345, &[])?;
        let prepared = scenario.possession_statement().prepare()?;
        let mut shape = prepared.shape();
        shape.certificate_len += 8;

        // shorter names and a one-byte serial: smaller TBSCertificate, same key
        let certificate = CertificateBuilder::new(0x7f, scenario.holder.public_key())
            .issuer("CA")
            .subject("H")
            .build(&scenario.authority)?;
        let other = CredentialStatement {
            certificate,
            ..scenario.possession_statement()
        }
        .prepare()?;
        assert!(other.certificate.tbs.total_len() < shape.tbs_len);
        other.check_fits(&shape)?;

        // with the authority layer the TBS size is part of the circuit
        let mut with_authority = other.clone();
        with_authority.statement.authority_key = Some(scenario.authority.public_key());
        assert!(matches!(
            with_authority.check_fits(&shape.with_authority()),
            Err(HintError::Capacity { what: "to-be-signed certificate", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_malformed_certificate_is_rejected_before_proving() -> Result<()> {
        let scenario = Scenario::new(7, &[])?;
        let mut statement = scenario.credential_statement();
        statement.certificate[0] = 0x31;
        assert!(matches!(
            statement.prepare(),
            Err(HintError::UnexpectedTag { offset: 0, expected: 0x30, found: 0x31 })
        ));
        Ok(())
    }
}
