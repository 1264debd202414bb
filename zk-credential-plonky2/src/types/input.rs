//! JSON input documents for the prover.
//!
//! Bytes and P-256 values are hex strings. The credential envelope keeps its
//! base64url text as issued.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::fixtures::Scenario;
use crate::types::statement::{
    CredentialEnvelope, CredentialStatement, EcdsaSignature, PublicKey, RevocationStatement,
    CHALLENGE_LEN,
};
use crate::utils::parsing::{bytes_to_hex, hex_to_bytes, hex_to_bytes32};

/// Elliptic curve point (x, y coordinates as hex strings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub x: String,
    pub y: String,
}

/// ECDSA signature (r, s values as hex strings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub r: String,
    pub s: String,
}

/// JWS-style envelope: `header.payload` signed by the issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeInput {
    pub header: String,
    pub payload: String,
    pub issuer_key: Point,
    pub signature: Signature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialInput {
    /// DER certificate of the holder key.
    pub certificate: String,
    pub challenge: String,
    pub challenge_signature: Signature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_key: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<EnvelopeInput>,
    /// DER revocation list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crl: Option<String>,
}

impl Point {
    pub fn from_key(key: &PublicKey) -> Self {
        Self {
            x: bytes_to_hex(&key.x),
            y: bytes_to_hex(&key.y),
        }
    }

    pub fn to_key(&self) -> Result<PublicKey> {
        Ok(PublicKey {
            x: hex_to_bytes32(&self.x).context("point x")?,
            y: hex_to_bytes32(&self.y).context("point y")?,
        })
    }
}

impl Signature {
    pub fn from_signature(signature: &EcdsaSignature) -> Self {
        Self {
            r: bytes_to_hex(&signature.r),
            s: bytes_to_hex(&signature.s),
        }
    }

    pub fn to_signature(&self) -> Result<EcdsaSignature> {
        Ok(EcdsaSignature {
            r: hex_to_bytes32(&self.r).context("signature r")?,
            s: hex_to_bytes32(&self.s).context("signature s")?,
        })
    }
}

impl EnvelopeInput {
    pub fn from_envelope(envelope: &CredentialEnvelope) -> Result<Self> {
        Ok(Self {
            header: String::from_utf8(envelope.header_b64.clone())?,
            payload: String::from_utf8(envelope.payload_b64.clone())?,
            issuer_key: Point::from_key(&envelope.issuer_key),
            signature: Signature::from_signature(&envelope.signature),
        })
    }

    pub fn to_envelope(&self) -> Result<CredentialEnvelope> {
        Ok(CredentialEnvelope {
            header_b64: self.header.as_bytes().to_vec(),
            payload_b64: self.payload.as_bytes().to_vec(),
            issuer_key: self.issuer_key.to_key().context("issuer key")?,
            signature: self.signature.to_signature().context("envelope signature")?,
        })
    }
}

impl CredentialInput {
    /// Sample document for a freshly generated holder, authority and issuer.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        Ok(Self {
            certificate: bytes_to_hex(&scenario.certificate),
            challenge: bytes_to_hex(&scenario.challenge),
            challenge_signature: Signature::from_signature(&scenario.challenge_signature),
            authority_key: Some(Point::from_key(&scenario.authority.public_key())),
            envelope: Some(EnvelopeInput::from_envelope(&scenario.envelope)?),
            crl: Some(bytes_to_hex(&scenario.crl)),
        })
    }

    pub fn to_statement(&self) -> Result<CredentialStatement> {
        let challenge: [u8; CHALLENGE_LEN] = hex_to_bytes(&self.challenge)?
            .try_into()
            .map_err(|bytes: Vec<u8>| {
                anyhow!("challenge must be {} bytes, got {}", CHALLENGE_LEN, bytes.len())
            })?;
        Ok(CredentialStatement {
            certificate: hex_to_bytes(&self.certificate).context("certificate")?,
            challenge,
            challenge_signature: self
                .challenge_signature
                .to_signature()
                .context("challenge signature")?,
            authority_key: self
                .authority_key
                .as_ref()
                .map(|p| p.to_key().context("authority key"))
                .transpose()?,
            envelope: self.envelope.as_ref().map(EnvelopeInput::to_envelope).transpose()?,
            crl: self
                .crl
                .as_deref()
                .map(|crl| hex_to_bytes(crl).context("revocation list"))
                .transpose()?,
        })
    }

    pub fn to_revocation_statement(&self) -> Result<RevocationStatement> {
        let crl = self
            .crl
            .as_deref()
            .ok_or_else(|| anyhow!("input has no revocation list"))?;
        Ok(RevocationStatement {
            certificate: hex_to_bytes(&self.certificate).context("certificate")?,
            crl: hex_to_bytes(crl).context("revocation list")?,
        })
    }
}
