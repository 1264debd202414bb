//! Test-data generation: P-256 keys, X.509-shaped certificates, revocation
//! lists and JWS-style credential envelopes.
//!
//! Everything produced here is real DER signed with ES256, so the same data
//! drives the circuit tests and the `generate` command.

use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::der::{
    TAG_BIT_STRING, TAG_CONTEXT_0, TAG_INTEGER, TAG_SEQUENCE, TAG_UTC_TIME,
};
use crate::types::statement::{
    CredentialEnvelope, CredentialStatement, EcdsaSignature, PublicKey, RevocationStatement,
    CHALLENGE_LEN,
};

const TAG_OID: u8 = 0x06;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_SET: u8 = 0x31;

const OID_ECDSA_WITH_SHA256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];

const NOT_BEFORE: &str = "250101000000Z";
const NOT_AFTER: &str = "351231235959Z";

/// DER length encoding: short form, or one or two long-form bytes.
fn encode_length(len: usize) -> Vec<u8> {
    match len {
        0..=0x7f => vec![len as u8],
        0x80..=0xff => vec![0x81, len as u8],
        _ => {
            assert!(len <= 0xffff, "DER element too long");
            vec![0x82, (len >> 8) as u8, len as u8]
        }
    }
}

pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend(encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

fn sequence(parts: &[&[u8]]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &parts.concat())
}

/// Minimal two's-complement content bytes of a non-negative serial.
pub fn serial_content(serial: u64) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let mut out = bytes[first..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0);
    }
    out
}

fn name(common_name: &str) -> Vec<u8> {
    let attribute = sequence(&[
        &tlv(TAG_OID, OID_COMMON_NAME),
        &tlv(TAG_UTF8_STRING, common_name.as_bytes()),
    ]);
    sequence(&[&tlv(TAG_SET, &attribute)])
}

fn ecdsa_with_sha256() -> Vec<u8> {
    sequence(&[&tlv(TAG_OID, OID_ECDSA_WITH_SHA256)])
}

fn utc_time(time: &str) -> Vec<u8> {
    tlv(TAG_UTC_TIME, time.as_bytes())
}

/// Wraps to-be-signed bytes with the signature algorithm and an ES256 signature.
fn sign_structure(tbs: &[u8], signer: &TestKey) -> Result<Vec<u8>> {
    let mut signature_bits = vec![0x00];
    signature_bits.extend(signer.sign_der(tbs)?);
    Ok(sequence(&[
        tbs,
        &ecdsa_with_sha256(),
        &tlv(TAG_BIT_STRING, &signature_bits),
    ]))
}

/// A P-256 signing key with its cached public key.
#[derive(Clone)]
pub struct TestKey {
    signing: SigningKey,
    public: PublicKey,
}

impl TestKey {
    pub fn random() -> Result<Self> {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Deterministic key derived from a label.
    pub fn from_seed(label: &str) -> Result<Self> {
        let seed = Sha256::digest(label.as_bytes());
        Self::from_signing_key(SigningKey::from_slice(&seed)?)
    }

    fn from_signing_key(signing: SigningKey) -> Result<Self> {
        let point = signing.verifying_key().to_encoded_point(false);
        let public = PublicKey::from_sec1(point.as_bytes())?;
        Ok(Self { signing, public })
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// ES256 signature over `msg`.
    pub fn sign(&self, msg: &[u8]) -> Result<EcdsaSignature> {
        let signature: Signature = self.signing.try_sign(msg)?;
        Ok(EcdsaSignature::from_bytes(&signature.to_bytes())?)
    }

    pub fn sign_der(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self.signing.try_sign(msg)?;
        Ok(signature.to_der().as_bytes().to_vec())
    }

    pub fn verify(&self, msg: &[u8], signature: &EcdsaSignature) -> bool {
        let verifying: &VerifyingKey = self.signing.verifying_key();
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&signature.r);
        bytes[32..].copy_from_slice(&signature.s);
        match Signature::from_slice(&bytes) {
            Ok(sig) => verifying.verify(msg, &sig).is_ok(),
            Err(_) => false,
        }
    }
}

pub struct CertificateBuilder {
    serial: u64,
    subject_key: PublicKey,
    issuer: String,
    subject: String,
    with_version: bool,
}

impl CertificateBuilder {
    pub fn new(serial: u64, subject_key: PublicKey) -> Self {
        Self {
            serial,
            subject_key,
            issuer: "Test Authority".into(),
            subject: "Holder".into(),
            with_version: true,
        }
    }

    pub fn issuer(mut self, common_name: &str) -> Self {
        self.issuer = common_name.into();
        self
    }

    pub fn subject(mut self, common_name: &str) -> Self {
        self.subject = common_name.into();
        self
    }

    /// Omits the optional `[0]` version field.
    pub fn without_version(mut self) -> Self {
        self.with_version = false;
        self
    }

    pub fn tbs(&self) -> Vec<u8> {
        let version = if self.with_version {
            tlv(TAG_CONTEXT_0, &tlv(TAG_INTEGER, &[0x02]))
        } else {
            Vec::new()
        };
        let algorithm = sequence(&[
            &tlv(TAG_OID, OID_EC_PUBLIC_KEY),
            &tlv(TAG_OID, OID_PRIME256V1),
        ]);
        let mut key_bits = vec![0x00];
        key_bits.extend(self.subject_key.to_sec1());
        let spki = sequence(&[&algorithm, &tlv(TAG_BIT_STRING, &key_bits)]);

        sequence(&[
            &version,
            &tlv(TAG_INTEGER, &serial_content(self.serial)),
            &ecdsa_with_sha256(),
            &name(&self.issuer),
            &sequence(&[&utc_time(NOT_BEFORE), &utc_time(NOT_AFTER)]),
            &name(&self.subject),
            &spki,
        ])
    }

    pub fn build(&self, authority: &TestKey) -> Result<Vec<u8>> {
        sign_structure(&self.tbs(), authority)
    }
}

pub struct CrlBuilder {
    serials: Vec<u64>,
    issuer: String,
    with_next_update: bool,
}

impl CrlBuilder {
    pub fn new(serials: &[u64]) -> Self {
        Self {
            serials: serials.to_vec(),
            issuer: "Test Authority".into(),
            with_next_update: true,
        }
    }

    pub fn without_next_update(mut self) -> Self {
        self.with_next_update = false;
        self
    }

    pub fn build(&self, authority: &TestKey) -> Result<Vec<u8>> {
        let next_update = if self.with_next_update {
            utc_time(NOT_AFTER)
        } else {
            Vec::new()
        };
        let entries: Vec<Vec<u8>> = self
            .serials
            .iter()
            .map(|&serial| {
                sequence(&[
                    &tlv(TAG_INTEGER, &serial_content(serial)),
                    &utc_time(NOT_BEFORE),
                ])
            })
            .collect();
        let revoked = if entries.is_empty() {
            Vec::new()
        } else {
            tlv(TAG_SEQUENCE, &entries.concat())
        };

        let tbs = sequence(&[
            &tlv(TAG_INTEGER, &[0x01]),
            &ecdsa_with_sha256(),
            &name(&self.issuer),
            &utc_time(NOT_BEFORE),
            &next_update,
            &revoked,
        ]);
        sign_structure(&tbs, authority)
    }
}

/// Hex SHA-256 of the uncompressed key, as carried in the `cnf` claim.
pub fn key_digest_hex(key: &PublicKey) -> String {
    hex::encode(Sha256::digest(key.to_sec1()))
}

pub fn cnf_header(holder: &PublicKey) -> String {
    format!(
        r#"{{"alg":"ES256","typ":"vc+sd-jwt","cnf":"{}"}}"#,
        key_digest_hex(holder)
    )
}

/// Base64url-encodes header and payload and signs `header '.' payload`.
pub fn build_envelope(
    issuer: &TestKey,
    header_json: &str,
    payload_json: &str,
) -> Result<CredentialEnvelope> {
    let header_b64 = URL_SAFE_NO_PAD.encode(header_json);
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = issuer.sign(signing_input.as_bytes())?;
    Ok(CredentialEnvelope {
        header_b64: header_b64.into_bytes(),
        payload_b64: payload_b64.into_bytes(),
        issuer_key: issuer.public_key(),
        signature,
    })
}

/// A holder certified by an authority, holding an issuer-signed credential.
pub struct Scenario {
    pub holder: TestKey,
    pub authority: TestKey,
    pub issuer: TestKey,
    pub certificate: Vec<u8>,
    pub challenge: [u8; CHALLENGE_LEN],
    pub challenge_signature: EcdsaSignature,
    pub envelope: CredentialEnvelope,
    pub crl: Vec<u8>,
}

impl Scenario {
    /// Fresh holder key and challenge, fixed authority and issuer keys.
    pub fn new(serial: u64, revoked: &[u64]) -> Result<Self> {
        let holder = TestKey::random()?;
        let authority = TestKey::from_seed("test authority")?;
        let issuer = TestKey::from_seed("test issuer")?;

        let certificate = CertificateBuilder::new(serial, holder.public_key()).build(&authority)?;
        let challenge: [u8; CHALLENGE_LEN] = rand::random();
        let challenge_signature = holder.sign(&challenge)?;
        let envelope = build_envelope(
            &issuer,
            &cnf_header(&holder.public_key()),
            r#"{"iss":"https://issuer.example","vct":"eu.europa.ec.eudi.pid.1"}"#,
        )?;
        let crl = CrlBuilder::new(revoked).build(&authority)?;

        Ok(Self {
            holder,
            authority,
            issuer,
            certificate,
            challenge,
            challenge_signature,
            envelope,
            crl,
        })
    }

    pub fn possession_statement(&self) -> CredentialStatement {
        CredentialStatement {
            certificate: self.certificate.clone(),
            challenge: self.challenge,
            challenge_signature: self.challenge_signature,
            authority_key: None,
            envelope: None,
            crl: None,
        }
    }

    /// Possession, authority binding and credential binding.
    pub fn credential_statement(&self) -> CredentialStatement {
        CredentialStatement {
            authority_key: Some(self.authority.public_key()),
            envelope: Some(self.envelope.clone()),
            crl: Some(self.crl.clone()),
            ..self.possession_statement()
        }
    }

    pub fn revocation_statement(&self) -> RevocationStatement {
        RevocationStatement {
            certificate: self.certificate.clone(),
            crl: self.crl.clone(),
        }
    }
}
