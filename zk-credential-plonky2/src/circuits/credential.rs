//! Composed credential circuit.
//!
//! Layers, each enabled by the circuit shape:
//! - possession: the holder key is read out of the certificate and signs a
//!   public challenge
//! - authority binding: the to-be-signed certificate bytes are signed by a
//!   public authority key
//! - credential binding: a public issuer key signs `header '.' payload`, and
//!   the header's `cnf` claim is the SHA-256 of the certificate key
//! - not revoked: the certificate serial is absent from a public revocation list
//!
//! Public inputs, in order: challenge bytes, authority key limbs, issuer key
//! limbs, payload bytes, revocation list bytes.

use anyhow::{anyhow, bail, Result};
use log::{info, Level};
use plonky2::field::extension::Extendable;
use plonky2::field::types::Field;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::Target;
use plonky2::iop::witness::{PartialWitness, WitnessWrite};
use plonky2::plonk::circuit_builder::CircuitBuilder;
use plonky2::plonk::circuit_data::CircuitData;
use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};
use plonky2::plonk::proof::ProofWithPublicInputs;
use plonky2::plonk::prover::prove;
use plonky2::util::timing::TimingTree;
use plonky2_ecdsa::curve::p256::P256;
use plonky2_ecdsa::gadgets::curve::AffinePointTarget;
use plonky2_ecdsa::gadgets::ecdsa::ECDSASignatureTarget;

use crate::circuits::revocation::{add_not_revoked, NotRevokedTargets};
use crate::circuits::{check_public_inputs, circuit_config};
use crate::der::{CNF_HEX_LEN, CNF_PREFIX};
use crate::gadgets::bytes::{assert_equal_bytes, assert_subset_at};
use crate::gadgets::codec::{decode_base64url, decode_hex};
use crate::gadgets::der::{extract_key_bytes, navigate_certificate, CertificateOffsetsTargets};
use crate::gadgets::ecdsa::{
    add_virtual_public_key, add_virtual_signature, connect_key_bytes, register_public_key,
    verify_ecdsa, verify_jws_like,
};
use crate::gadgets::memory::{add_virtual_bytes, assert_window_equals, constant_bytes};
use crate::gadgets::sha256::sha256_bytes;
use crate::types::statement::{
    pad_to, CredentialPublic, CredentialShape, EnvelopeShape, PreparedCredential, CHALLENGE_LEN,
};
use crate::utils::parsing::{
    bytes_to_field_elements, public_key_limbs, set_byte_targets, set_public_key_target,
    set_signature_target,
};

const D: usize = 2;
type Cfg = PoseidonGoldilocksConfig;
type F = <Cfg as GenericConfig<D>>::F;

pub struct PossessionTargets {
    pub certificate: Vec<Target>,
    pub claimed_key_offset: Target,
    pub holder_key: AffinePointTarget<P256>,
    pub challenge: Vec<Target>,
    pub challenge_signature: ECDSASignatureTarget<P256>,
    pub offsets: CertificateOffsetsTargets,
    /// `X || Y` as read from the certificate.
    pub key_bytes: Vec<Target>,
}

pub struct AuthorityTargets {
    pub tbs: Vec<Target>,
    pub authority_key: AffinePointTarget<P256>,
    pub certificate_signature: ECDSASignatureTarget<P256>,
}

pub struct EnvelopeTargets {
    pub header_b64: Vec<Target>,
    pub payload_b64: Vec<Target>,
    pub issuer_key: AffinePointTarget<P256>,
    pub signature: ECDSASignatureTarget<P256>,
    pub claimed_cnf_offset: Target,
    pub cnf_hex: Vec<Target>,
}

pub struct CredentialTargets {
    pub possession: PossessionTargets,
    pub authority: Option<AuthorityTargets>,
    pub envelope: Option<EnvelopeTargets>,
    pub not_revoked: Option<NotRevokedTargets>,
}

pub struct CredentialCircuit {
    pub shape: CredentialShape,
    pub data: CircuitData<F, Cfg, D>,
    pub targets: CredentialTargets,
}

/// Holder possession: the certificate's subject key signed the public challenge.
pub fn add_possession<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    certificate_len: usize,
) -> PossessionTargets {
    let challenge = add_virtual_bytes(builder, CHALLENGE_LEN);
    for &b in &challenge {
        builder.register_public_input(b);
    }

    let certificate = add_virtual_bytes(builder, certificate_len);
    let offsets = navigate_certificate(builder, &certificate);
    let claimed_key_offset = builder.add_virtual_target();
    builder.connect(claimed_key_offset, offsets.key);
    let key_bytes = extract_key_bytes(builder, &certificate, offsets.key);

    let holder_key = add_virtual_public_key(builder);
    connect_key_bytes(builder, &key_bytes, &holder_key);

    let challenge_signature = add_virtual_signature(builder);
    verify_ecdsa(builder, &challenge, &holder_key, &challenge_signature);

    PossessionTargets {
        certificate,
        claimed_key_offset,
        holder_key,
        challenge,
        challenge_signature,
        offsets,
        key_bytes,
    }
}

/// Authority binding: the whole TBSCertificate element is signed by a public key.
pub fn add_authority_binding<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    possession: &PossessionTargets,
    tbs_len: usize,
) -> AuthorityTargets {
    let authority_key = add_virtual_public_key(builder);
    register_public_key(builder, &authority_key);

    let tbs_element = possession.offsets.tbs;
    let tbs = add_virtual_bytes(builder, tbs_len);
    assert_window_equals(builder, &possession.certificate, &tbs, tbs_element.offset);
    let span = builder.sub(tbs_element.next, tbs_element.offset);
    let expected_span = builder.constant(F::from_canonical_usize(tbs_len));
    builder.connect(span, expected_span);

    let certificate_signature = add_virtual_signature(builder);
    verify_ecdsa(builder, &tbs, &authority_key, &certificate_signature);

    AuthorityTargets {
        tbs,
        authority_key,
        certificate_signature,
    }
}

/// Credential binding: issuer signature over the envelope, and the header
/// `cnf` claim equal to SHA-256 of the uncompressed certificate key.
pub fn add_credential_binding<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    possession: &PossessionTargets,
    shape: &EnvelopeShape,
) -> EnvelopeTargets {
    let issuer_key = add_virtual_public_key(builder);
    register_public_key(builder, &issuer_key);
    let payload_b64 = add_virtual_bytes(builder, shape.payload_b64_len);
    for &b in &payload_b64 {
        builder.register_public_input(b);
    }
    let header_b64 = add_virtual_bytes(builder, shape.header_b64_len);

    let signature = add_virtual_signature(builder);
    verify_jws_like(builder, &header_b64, &payload_b64, &issuer_key, &signature);

    let header = decode_base64url(builder, &header_b64);
    let cnf_hex = add_virtual_bytes(builder, CNF_HEX_LEN);
    let mut needle = constant_bytes(builder, CNF_PREFIX);
    needle.extend_from_slice(&cnf_hex);
    let claimed_cnf_offset = builder.add_virtual_target();
    assert_subset_at(builder, &header, &needle, claimed_cnf_offset);

    let cnf_digest = decode_hex(builder, &cnf_hex);
    let mut sec1 = constant_bytes(builder, &[0x04]);
    sec1.extend_from_slice(&possession.key_bytes);
    let key_digest = sha256_bytes(builder, &sec1);
    assert_equal_bytes(builder, &cnf_digest, &key_digest);

    EnvelopeTargets {
        header_b64,
        payload_b64,
        issuer_key,
        signature,
        claimed_cnf_offset,
        cnf_hex,
    }
}

/// Build the credential circuit for `shape`.
pub fn build_credential_circuit(shape: &CredentialShape) -> CredentialCircuit {
    let mut builder = CircuitBuilder::<F, D>::new(circuit_config());

    let possession = add_possession(&mut builder, shape.certificate_len);
    let authority = shape
        .authority
        .then(|| add_authority_binding(&mut builder, &possession, shape.tbs_len));
    let envelope = shape
        .envelope
        .map(|envelope| add_credential_binding(&mut builder, &possession, &envelope));
    let not_revoked = shape.crl.map(|crl| {
        add_not_revoked(
            &mut builder,
            &possession.certificate,
            &possession.offsets.serial,
            crl.crl_len,
            crl.max_entries,
        )
    });

    let data = builder.build::<Cfg>();
    info!(
        "credential circuit built: 2^{} rows, {} public inputs \
         (authority: {}, envelope: {}, revocation: {})",
        data.common.degree_bits(),
        data.common.num_public_inputs,
        shape.authority,
        shape.envelope.is_some(),
        shape.crl.is_some()
    );

    CredentialCircuit {
        shape: *shape,
        data,
        targets: CredentialTargets {
            possession,
            authority,
            envelope,
            not_revoked,
        },
    }
}

impl CredentialTargets {
    pub fn set_witness(
        &self,
        pw: &mut PartialWitness<F>,
        prepared: &PreparedCredential,
    ) -> Result<()> {
        let statement = &prepared.statement;
        let layout = &prepared.certificate;

        let possession = &self.possession;
        set_byte_targets(pw, &possession.challenge, &statement.challenge)?;
        set_byte_targets(pw, &possession.certificate, &statement.certificate)?;
        pw.set_target(
            possession.claimed_key_offset,
            F::from_canonical_usize(layout.key_offset),
        )?;
        set_public_key_target(pw, &possession.holder_key, &layout.subject_key)?;
        set_signature_target(pw, &possession.challenge_signature, &statement.challenge_signature)?;

        if let Some(authority) = &self.authority {
            let authority_key = statement.authority_key.as_ref().ok_or_else(|| {
                anyhow!("circuit binds an authority but the statement has no authority key")
            })?;
            set_public_key_target(pw, &authority.authority_key, authority_key)?;
            set_byte_targets(pw, &authority.tbs, layout.tbs_bytes(&statement.certificate))?;
            set_signature_target(pw, &authority.certificate_signature, &layout.signature)?;
        }

        if let Some(targets) = &self.envelope {
            let (envelope, header_json, cnf_offset) = match (
                &statement.envelope,
                &prepared.header_json,
                prepared.cnf_offset,
            ) {
                (Some(envelope), Some(header_json), Some(cnf_offset)) => {
                    (envelope, header_json, cnf_offset)
                }
                _ => bail!("circuit binds a credential but the statement has no envelope"),
            };
            set_public_key_target(pw, &targets.issuer_key, &envelope.issuer_key)?;
            set_byte_targets(pw, &targets.payload_b64, &envelope.payload_b64)?;
            set_byte_targets(pw, &targets.header_b64, &envelope.header_b64)?;
            set_signature_target(pw, &targets.signature, &envelope.signature)?;

            pw.set_target(targets.claimed_cnf_offset, F::from_canonical_usize(cnf_offset))?;
            let start = cnf_offset + CNF_PREFIX.len();
            let cnf_hex = header_json
                .get(start..start + CNF_HEX_LEN)
                .ok_or_else(|| anyhow!("cnf claim at {} runs past the header", cnf_offset))?;
            set_byte_targets(pw, &targets.cnf_hex, cnf_hex)?;
        }

        if let Some(not_revoked) = &self.not_revoked {
            let crl = statement.crl.as_deref().ok_or_else(|| {
                anyhow!("circuit checks revocation but the statement has no revocation list")
            })?;
            not_revoked.set_witness(pw, crl, layout.serial.offset)?;
        }
        Ok(())
    }
}

/// Public inputs a proof for `shape` must carry for the statement `public`.
pub fn expected_public_inputs(
    shape: &CredentialShape,
    public: &CredentialPublic,
) -> Result<Vec<F>> {
    let mut inputs = bytes_to_field_elements(&public.challenge);

    if shape.authority {
        let key = public
            .authority_key
            .as_ref()
            .ok_or_else(|| anyhow!("missing authority key"))?;
        inputs.extend(public_key_limbs(key));
    }
    if let Some(envelope) = &shape.envelope {
        let key = public
            .issuer_key
            .as_ref()
            .ok_or_else(|| anyhow!("missing issuer key"))?;
        let payload = public
            .payload_b64
            .as_deref()
            .ok_or_else(|| anyhow!("missing credential payload"))?;
        if payload.len() != envelope.payload_b64_len {
            bail!(
                "payload has {} bytes, circuit expects {}",
                payload.len(),
                envelope.payload_b64_len
            );
        }
        inputs.extend(public_key_limbs(key));
        inputs.extend(bytes_to_field_elements(payload));
    }
    if let Some(crl_shape) = &shape.crl {
        let crl = public
            .crl
            .as_deref()
            .ok_or_else(|| anyhow!("missing revocation list"))?;
        if crl.len() > crl_shape.crl_len {
            bail!(
                "revocation list has {} bytes, circuit holds {}",
                crl.len(),
                crl_shape.crl_len
            );
        }
        inputs.extend(bytes_to_field_elements(&pad_to(crl, crl_shape.crl_len)));
    }
    Ok(inputs)
}

impl CredentialCircuit {
    pub fn prove(&self, prepared: &PreparedCredential) -> Result<ProofWithPublicInputs<F, Cfg, D>> {
        prepared.check_fits(&self.shape)?;

        let mut pw = PartialWitness::<F>::new();
        self.targets.set_witness(&mut pw, prepared)?;

        let mut timing = TimingTree::new("credential_proof", Level::Info);
        let proof = prove(&self.data.prover_only, &self.data.common, pw, &mut timing)?;
        timing.print();
        Ok(proof)
    }

    /// Verifies `proof` and checks it was made for the public statement `public`.
    pub fn verify(
        &self,
        proof: ProofWithPublicInputs<F, Cfg, D>,
        public: &CredentialPublic,
    ) -> Result<()> {
        let expected = expected_public_inputs(&self.shape, public)?;
        check_public_inputs(&proof, &expected)?;
        self.data.verify(proof)
    }
}
