//! Certificate-not-revoked circuit.
//!
//! The certificate serial is read at a fixed width after its INTEGER header and
//! compared against every revoked entry of a public revocation list. The scan
//! runs a compile-time number of times. Iterations past the end of the list are
//! inactive, and the scan must have consumed the whole list.
//!
//! The standalone circuit keeps the certificate private and ties nothing public
//! to it, so it only shows that some well-formed certificate has an unrevoked
//! serial. The composed credential circuit is what binds the serial to a
//! certified, possessed key.

use anyhow::Result;
use log::{info, Level};
use plonky2::field::extension::Extendable;
use plonky2::field::types::Field;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::{BoolTarget, Target};
use plonky2::iop::witness::{PartialWitness, WitnessWrite};
use plonky2::plonk::circuit_builder::CircuitBuilder;
use plonky2::plonk::circuit_data::CircuitData;
use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};
use plonky2::plonk::proof::ProofWithPublicInputs;
use plonky2::plonk::prover::prove;
use plonky2::util::timing::TimingTree;

use crate::circuits::{check_public_inputs, circuit_config};
use crate::der::{MAX_SERIAL_LEN, TAG_INTEGER, TAG_SEQUENCE};
use crate::gadgets::bits::{bits_msb_from_target, const_lt, le_const, offset_lt};
use crate::gadgets::der::{navigate_certificate, navigate_crl, skip_element_if, DerElementTargets};
use crate::gadgets::memory::{add_virtual_bytes, read_at, read_at_offset};
use crate::types::statement::{pad_to, PreparedRevocation, RevocationShape};
use crate::utils::parsing::{bytes_to_field_elements, set_byte_targets};

const D: usize = 2;
type Cfg = PoseidonGoldilocksConfig;
type F = <Cfg as GenericConfig<D>>::F;

/// Targets of the non-membership check, shared with the composed credential circuit.
pub struct NotRevokedTargets {
    /// Public, zero padded to the compiled length.
    pub crl: Vec<Target>,
    pub claimed_serial_offset: Target,
}

/// Asserts `(value - expected) * active == 0`.
fn assert_byte_if<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    value: Target,
    expected: u8,
    active: BoolTarget,
) {
    let c = builder.constant(F::from_canonical_u8(expected));
    let diff = builder.sub(value, c);
    let gated = builder.mul(diff, active.target);
    builder.assert_zero(gated);
}

/// Adds the revocation-list scan for the certificate serial `serial`.
///
/// Registers the revocation list bytes as public inputs.
pub fn add_not_revoked<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    certificate: &[Target],
    serial: &DerElementTargets,
    crl_len: usize,
    max_entries: usize,
) -> NotRevokedTargets {
    let claimed_serial_offset = builder.add_virtual_target();
    builder.connect(claimed_serial_offset, serial.offset);

    // serial: short-form length, at most MAX_SERIAL_LEN content bytes
    let header_len = builder.sub(serial.content_offset, serial.offset);
    let two = builder.two();
    builder.connect(header_len, two);
    let serial_len_bits = bits_msb_from_target(builder, serial.content_len, 8);
    let serial_len_ok = le_const(builder, &serial_len_bits, MAX_SERIAL_LEN as u64);
    builder.assert_one(serial_len_ok.target);
    let cert_serial: Vec<Target> = (0..MAX_SERIAL_LEN)
        .map(|i| read_at_offset(builder, certificate, serial.content_offset, i))
        .collect();
    let within_serial: Vec<BoolTarget> = (0..MAX_SERIAL_LEN)
        .map(|i| const_lt(builder, i as u64, &serial_len_bits))
        .collect();

    let crl = add_virtual_bytes(builder, crl_len);
    for &b in &crl {
        builder.register_public_input(b);
    }
    let offsets = navigate_crl(builder, &crl);

    let mut entry = offsets.entries_start;
    let mut found = builder._false();
    for _ in 0..max_entries {
        let active = offset_lt(builder, entry, offsets.entries_end);
        let element = skip_element_if(builder, &crl, entry, active);
        assert_byte_if(builder, element.tag, TAG_SEQUENCE, active);
        let serial_tag = read_at(builder, &crl, element.content_offset);
        assert_byte_if(builder, serial_tag, TAG_INTEGER, active);

        // equal length bytes at most MAX_SERIAL_LEN imply the short form
        let entry_len = read_at_offset(builder, &crl, element.content_offset, 1);
        let mut matches = builder.is_equal(entry_len, serial.content_len);
        for (i, (&cert_byte, &within)) in cert_serial.iter().zip(&within_serial).enumerate() {
            let entry_byte = read_at_offset(builder, &crl, element.content_offset, 2 + i);
            let eq = builder.is_equal(entry_byte, cert_byte);
            let outside = builder.not(within);
            let byte_ok = builder.or(eq, outside);
            matches = builder.and(matches, byte_ok);
        }

        let revoked = builder.and(active, matches);
        found = builder.or(found, revoked);
        entry = element.next;
    }

    // every entry of the list was scanned
    let unscanned = offset_lt(builder, entry, offsets.entries_end);
    builder.assert_zero(unscanned.target);
    builder.assert_zero(found.target);

    NotRevokedTargets {
        crl,
        claimed_serial_offset,
    }
}

impl NotRevokedTargets {
    pub fn set_witness(
        &self,
        pw: &mut PartialWitness<F>,
        crl: &[u8],
        serial_offset: usize,
    ) -> Result<()> {
        set_byte_targets(pw, &self.crl, crl)?;
        pw.set_target(self.claimed_serial_offset, F::from_canonical_usize(serial_offset))?;
        Ok(())
    }
}

pub struct RevocationTargets {
    /// Private, zero padded to the compiled length.
    pub certificate: Vec<Target>,
    pub not_revoked: NotRevokedTargets,
}

pub struct RevocationCircuit {
    pub shape: RevocationShape,
    pub data: CircuitData<F, Cfg, D>,
    pub targets: RevocationTargets,
}

/// Build the standalone not-revoked circuit for `shape`.
///
/// The certificate is not bound to any authority or holder key here.
pub fn build_revocation_circuit(shape: &RevocationShape) -> RevocationCircuit {
    let mut builder = CircuitBuilder::<F, D>::new(circuit_config());

    let certificate = add_virtual_bytes(&mut builder, shape.certificate_len);
    let offsets = navigate_certificate(&mut builder, &certificate);
    let not_revoked = add_not_revoked(
        &mut builder,
        &certificate,
        &offsets.serial,
        shape.crl_len,
        shape.max_entries,
    );

    let data = builder.build::<Cfg>();
    info!(
        "revocation circuit built: 2^{} rows, {} entries over {} CRL bytes",
        data.common.degree_bits(),
        shape.max_entries,
        shape.crl_len
    );
    RevocationCircuit {
        shape: *shape,
        data,
        targets: RevocationTargets {
            certificate,
            not_revoked,
        },
    }
}

impl RevocationCircuit {
    pub fn prove(&self, prepared: &PreparedRevocation) -> Result<ProofWithPublicInputs<F, Cfg, D>> {
        prepared.check_fits(&self.shape)?;

        let mut pw = PartialWitness::<F>::new();
        set_byte_targets(&mut pw, &self.targets.certificate, &prepared.statement.certificate)?;
        self.targets.not_revoked.set_witness(
            &mut pw,
            &prepared.statement.crl,
            prepared.certificate.serial.offset,
        )?;

        let mut timing = TimingTree::new("revocation_proof", Level::Info);
        let proof = prove(&self.data.prover_only, &self.data.common, pw, &mut timing)?;
        timing.print();
        Ok(proof)
    }

    /// Verifies `proof` and checks it was made against `crl`.
    pub fn verify(&self, proof: ProofWithPublicInputs<F, Cfg, D>, crl: &[u8]) -> Result<()> {
        let expected = bytes_to_field_elements(&pad_to(crl, self.shape.crl_len));
        check_public_inputs(&proof, &expected)?;
        self.data.verify(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{CertificateBuilder, Scenario, TestKey};
    use crate::test_utils::assert_unsatisfiable;
    use crate::types::statement::RevocationStatement;

    fn prepared(serial: u64, revoked: &[u64]) -> Result<PreparedRevocation> {
        Ok(Scenario::new(serial, revoked)?.revocation_statement().prepare()?)
    }

    fn small_shape(prepared: &PreparedRevocation) -> RevocationShape {
        RevocationShape {
            max_entries: 4,
            ..prepared.shape()
        }
    }

    #[test]
    fn test_not_revoked_serial_passes() -> Result<()> {
        let prepared = prepared(12345, &[1111, 2222, 3333])?;
        let circuit = build_revocation_circuit(&small_shape(&prepared));
        let proof = circuit.prove(&prepared)?;
        circuit.verify(proof, &prepared.statement.crl)
    }

    #[test]
    fn test_revoked_serial_is_unsatisfiable() -> Result<()> {
        let prepared = prepared(2222, &[1111, 2222, 3333])?;
        assert!(prepared
            .crl
            .contains_serial(prepared.certificate.serial_bytes(&prepared.statement.certificate)));
        let circuit = build_revocation_circuit(&small_shape(&prepared));

        let mut pw = PartialWitness::<F>::new();
        set_byte_targets(&mut pw, &circuit.targets.certificate, &prepared.statement.certificate)?;
        circuit.targets.not_revoked.set_witness(
            &mut pw,
            &prepared.statement.crl,
            prepared.certificate.serial.offset,
        )?;
        assert_unsatisfiable(&circuit.data, pw);
        Ok(())
    }

    #[test]
    fn test_serial_prefix_is_not_a_match() -> Result<()> {
        // 0x30 is a one-byte prefix of 12345 = 0x3039
        let prepared = prepared(12345, &[0x30, 0x303900])?;
        let circuit = build_revocation_circuit(&small_shape(&prepared));
        let proof = circuit.prove(&prepared)?;
        circuit.verify(proof, &prepared.statement.crl)
    }

    #[test]
    fn test_empty_list_passes() -> Result<()> {
        let prepared = prepared(2222, &[])?;
        let circuit = build_revocation_circuit(&small_shape(&prepared));
        let proof = circuit.prove(&prepared)?;
        circuit.verify(proof, &prepared.statement.crl)
    }

    #[test]
    fn test_list_longer_than_scan_is_unsatisfiable() -> Result<()> {
        // the revoked serial sits in the third entry, beyond a two-entry scan
        let prepared = prepared(3333, &[1111, 2222, 3333])?;
        let shape = RevocationShape {
            max_entries: 2,
            ..prepared.shape()
        };
        assert!(prepared.check_fits(&shape).is_err());
        let circuit = build_revocation_circuit(&shape);

        let mut pw = PartialWitness::<F>::new();
        set_byte_targets(&mut pw, &circuit.targets.certificate, &prepared.statement.certificate)?;
        circuit.targets.not_revoked.set_witness(
            &mut pw,
            &prepared.statement.crl,
            prepared.certificate.serial.offset,
        )?;
        assert_unsatisfiable(&circuit.data, pw);
        Ok(())
    }

    #[test]
    fn test_verify_rejects_other_revocation_list() -> Result<()> {
        let prepared = prepared(12345, &[1111])?;
        let circuit = build_revocation_circuit(&small_shape(&prepared));
        let proof = circuit.prove(&prepared)?;

        let other = Scenario::new(12345, &[1112])?.crl;
        assert!(circuit.verify(proof, &other).is_err());
        Ok(())
    }

    #[test]
    fn test_padded_buffers_are_accepted() -> Result<()> {
        let scenario = Scenario::new(12345, &[1111, 2222])?;
        let statement = RevocationStatement {
            certificate: scenario.certificate.clone(),
            crl: scenario.crl.clone(),
        };
        let prepared = statement.prepare()?;
        let shape = RevocationShape {
            certificate_len: scenario.certificate.len() + 16,
            crl_len: scenario.crl.len() + 16,
            max_entries: 3,
        };
        let circuit = build_revocation_circuit(&shape);
        let proof = circuit.prove(&prepared)?;
        circuit.verify(proof, &scenario.crl)
    }

    #[test]
    fn test_standalone_circuit_ignores_certificate_signer() -> Result<()> {
        let scenario = Scenario::new(12345, &[1111])?;
        let stranger = TestKey::from_seed("unrelated signer")?;
        let certificate =
            CertificateBuilder::new(12345, stranger.public_key()).build(&stranger)?;
        let prepared = RevocationStatement {
            certificate,
            crl: scenario.crl.clone(),
        }
        .prepare()?;

        let circuit = build_revocation_circuit(&small_shape(&prepared));
        let proof = circuit.prove(&prepared)?;
        circuit.verify(proof, &scenario.crl)
    }
}
