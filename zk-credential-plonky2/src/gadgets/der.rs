//! DER navigation under proof.
//!
//! Elements are walked with a fixed number of memory reads per field. Both
//! length forms are always computed and the right one is selected, and
//! optional fields are skipped by selecting between the skipped and the
//! unskipped cursor. A returned offset is therefore only reachable through
//! the expected sequence of tags.

use plonky2::field::extension::Extendable;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::{BoolTarget, Target};
use plonky2::plonk::circuit_builder::CircuitBuilder;

use crate::der::{
    KEY_BIT_STRING_LEN, TAG_BIT_STRING, TAG_CONTEXT_0, TAG_GENERALIZED_TIME, TAG_INTEGER,
    TAG_SEQUENCE, TAG_UTC_TIME,
};
use crate::gadgets::bits::offset_lt;
use crate::gadgets::memory::{assert_index_in_bounds, read_at, read_at_offset};

/// One TLV element as seen by the circuit.
#[derive(Debug, Clone, Copy)]
pub struct DerElementTargets {
    pub offset: Target,
    pub tag: Target,
    pub content_offset: Target,
    pub content_len: Target,
    /// Offset of the following element.
    pub next: Target,
}

/// Reads the length field at `offset + 1` and computes where the element ends.
///
/// The tag byte is read but not checked. Long-form lengths with more than two
/// length bytes are unsatisfiable.
pub fn skip_element<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    offset: Target,
) -> DerElementTargets {
    let (element, unsupported) = read_element(builder, buffer, offset);
    builder.assert_zero(unsupported);
    element
}

/// [`skip_element`] whose length-form check only applies when `active`.
pub fn skip_element_if<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    offset: Target,
    active: BoolTarget,
) -> DerElementTargets {
    let (element, unsupported) = read_element(builder, buffer, offset);
    let gated = builder.mul(active.target, unsupported);
    builder.assert_zero(gated);
    element
}

/// Returns the element and a target that is non-zero for unsupported length forms.
fn read_element<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    offset: Target,
) -> (DerElementTargets, Target) {
    let tag = read_at(builder, buffer, offset);
    let len0 = read_at_offset(builder, buffer, offset, 1);
    let len1 = read_at_offset(builder, buffer, offset, 2);
    let len2 = read_at_offset(builder, buffer, offset, 3);

    let len0_bits = builder.split_le(len0, 8);
    let is_long = len0_bits[7];
    let c81 = builder.constant(F::from_canonical_u8(0x81));
    let c82 = builder.constant(F::from_canonical_u8(0x82));
    let is_one = builder.is_equal(len0, c81);
    let is_two = builder.is_equal(len0, c82);

    // long form must be 0x81 or 0x82
    let supported = builder.add(is_one.target, is_two.target);
    let unsupported = builder.sub(is_long.target, supported);

    let two_byte_len = builder.mul_const_add(F::from_canonical_u64(256), len1, len2);
    let long_len = builder.select(is_two, two_byte_len, len1);
    let content_len = builder.select(is_long, long_len, len0);

    // header: tag, first length byte, then 0, 1 or 2 extra length bytes
    let extra = builder.mul_const_add(F::TWO, is_two.target, is_one.target);
    let header_len = builder.add_const(extra, F::TWO);
    let content_offset = builder.add(offset, header_len);
    let next = builder.add(content_offset, content_len);

    let element = DerElementTargets {
        offset,
        tag,
        content_offset,
        content_len,
        next,
    };
    (element, unsupported)
}

/// Asserts the byte at `offset` is `tag` and lies inside the buffer.
pub fn assert_tag<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    offset: Target,
    tag: u8,
) {
    assert_index_in_bounds(builder, offset, buffer.len());
    let byte = read_at(builder, buffer, offset);
    let expected = builder.constant(F::from_canonical_u8(tag));
    builder.connect(byte, expected);
}

/// [`assert_tag`] followed by [`skip_element`].
pub fn expect_element<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    offset: Target,
    tag: u8,
) -> DerElementTargets {
    assert_tag(builder, buffer, offset, tag);
    skip_element(builder, buffer, offset)
}

/// Returns `tag == expected`.
pub fn tag_is<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    tag: Target,
    expected: u8,
) -> BoolTarget {
    let c = builder.constant(F::from_canonical_u8(expected));
    builder.is_equal(tag, c)
}

fn is_time_tag<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    tag: Target,
) -> BoolTarget {
    let utc = tag_is(builder, tag, TAG_UTC_TIME);
    let generalized = tag_is(builder, tag, TAG_GENERALIZED_TIME);
    builder.or(utc, generalized)
}

/// Offsets derived while walking a certificate.
#[derive(Debug, Clone, Copy)]
pub struct CertificateOffsetsTargets {
    pub tbs: DerElementTargets,
    pub serial: DerElementTargets,
    /// Offset of the subject public key BIT STRING element.
    pub key: Target,
}

/// Walks `Certificate -> TBSCertificate -> SubjectPublicKeyInfo` and returns
/// the offset of the subject key BIT STRING.
pub fn navigate_certificate<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    cert: &[Target],
) -> CertificateOffsetsTargets {
    let zero = builder.zero();
    let outer = expect_element(builder, cert, zero, TAG_SEQUENCE);
    let tbs = expect_element(builder, cert, outer.content_offset, TAG_SEQUENCE);

    let mut cursor = tbs.content_offset;
    let version = skip_element(builder, cert, cursor);
    let has_version = tag_is(builder, version.tag, TAG_CONTEXT_0);
    cursor = builder.select(has_version, version.next, cursor);

    let serial = expect_element(builder, cert, cursor, TAG_INTEGER);
    cursor = serial.next;

    // signature algorithm, issuer, validity, subject
    for _ in 0..4 {
        cursor = expect_element(builder, cert, cursor, TAG_SEQUENCE).next;
    }

    let spki = expect_element(builder, cert, cursor, TAG_SEQUENCE);
    let algorithm = expect_element(builder, cert, spki.content_offset, TAG_SEQUENCE);
    assert_tag(builder, cert, algorithm.next, TAG_BIT_STRING);

    // the key must lie inside the signed TBSCertificate
    let key_end = builder.add_const(
        algorithm.next,
        F::from_canonical_usize(2 + KEY_BIT_STRING_LEN as usize),
    );
    let key_overruns = offset_lt(builder, spki.next, key_end);
    builder.assert_zero(key_overruns.target);
    let spki_overruns = offset_lt(builder, tbs.next, spki.next);
    builder.assert_zero(spki_overruns.target);

    CertificateOffsetsTargets {
        tbs,
        serial,
        key: algorithm.next,
    }
}

/// Asserts the uncompressed-key prefix of the BIT STRING at `offset` and
/// returns the 64 coordinate bytes `X || Y`.
pub fn extract_key_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    offset: Target,
) -> Vec<Target> {
    assert_tag(builder, buffer, offset, TAG_BIT_STRING);
    for (delta, expected) in [(1, KEY_BIT_STRING_LEN), (2, 0x00), (3, 0x04)] {
        let byte = read_at_offset(builder, buffer, offset, delta);
        let c = builder.constant(F::from_canonical_u8(expected));
        builder.connect(byte, c);
    }
    let last = builder.add_const(offset, F::from_canonical_usize(4 + 63));
    assert_index_in_bounds(builder, last, buffer.len());
    (0..64)
        .map(|i| read_at_offset(builder, buffer, offset, 4 + i))
        .collect()
}

/// Span of the revoked-certificate entries in a revocation list.
///
/// When the list is absent both ends point at the same offset.
#[derive(Debug, Clone, Copy)]
pub struct CrlOffsetsTargets {
    pub entries_start: Target,
    pub entries_end: Target,
}

/// Walks `CertificateList -> TBSCertList` past version, signature, issuer,
/// thisUpdate and the optional nextUpdate to the optional revoked list.
pub fn navigate_crl<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    crl: &[Target],
) -> CrlOffsetsTargets {
    let zero = builder.zero();
    let outer = expect_element(builder, crl, zero, TAG_SEQUENCE);
    let tbs = expect_element(builder, crl, outer.content_offset, TAG_SEQUENCE);

    let mut cursor = tbs.content_offset;
    let version = skip_element(builder, crl, cursor);
    let has_version = tag_is(builder, version.tag, TAG_INTEGER);
    cursor = builder.select(has_version, version.next, cursor);

    // signature algorithm, issuer
    for _ in 0..2 {
        cursor = expect_element(builder, crl, cursor, TAG_SEQUENCE).next;
    }

    assert_index_in_bounds(builder, cursor, crl.len());
    let this_update = skip_element(builder, crl, cursor);
    let this_is_time = is_time_tag(builder, this_update.tag);
    builder.assert_one(this_is_time.target);
    cursor = this_update.next;

    // optional fields must start before the end of TBSCertList
    let next_update = skip_element(builder, crl, cursor);
    let next_is_time = is_time_tag(builder, next_update.tag);
    let next_in_tbs = offset_lt(builder, cursor, tbs.next);
    let has_next_update = builder.and(next_is_time, next_in_tbs);
    cursor = builder.select(has_next_update, next_update.next, cursor);

    let list = skip_element(builder, crl, cursor);
    let list_is_seq = tag_is(builder, list.tag, TAG_SEQUENCE);
    let list_in_tbs = offset_lt(builder, cursor, tbs.next);
    let has_list = builder.and(list_is_seq, list_in_tbs);

    CrlOffsetsTargets {
        entries_start: builder.select(has_list, list.content_offset, cursor),
        entries_end: builder.select(has_list, list.next, cursor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use plonky2::field::types::Field;
    use plonky2::iop::witness::{PartialWitness, WitnessWrite};
    use plonky2::plonk::circuit_data::{CircuitConfig, CircuitData};
    use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};

    use crate::der::{parse_element, CertificateLayout, CrlLayout};
    use crate::fixtures::{self, CertificateBuilder, CrlBuilder, TestKey};
    use crate::gadgets::bytes::assert_equal_bytes;
    use crate::gadgets::memory::{add_virtual_bytes, constant_bytes};
    use crate::test_utils::{assert_unsatisfiable, set_bytes};

    const D: usize = 2;
    type Cfg = PoseidonGoldilocksConfig;
    type F = <Cfg as GenericConfig<D>>::F;

    struct NavigationCircuit {
        data: CircuitData<F, Cfg, D>,
        cert: Vec<Target>,
        claimed_key: Target,
        claimed_tbs_end: Target,
    }

    fn build_navigation_circuit(cert_len: usize) -> NavigationCircuit {
        let mut builder = CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
        let cert = add_virtual_bytes(&mut builder, cert_len);
        let offsets = navigate_certificate(&mut builder, &cert);
        let claimed_key = builder.add_virtual_target();
        let claimed_tbs_end = builder.add_virtual_target();
        builder.connect(offsets.key, claimed_key);
        builder.connect(offsets.tbs.next, claimed_tbs_end);
        NavigationCircuit {
            data: builder.build::<Cfg>(),
            cert,
            claimed_key,
            claimed_tbs_end,
        }
    }

    fn navigation_witness(
        circuit: &NavigationCircuit,
        cert: &[u8],
        key: usize,
        tbs_end: usize,
    ) -> Result<PartialWitness<F>> {
        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &circuit.cert, cert)?;
        pw.set_target(circuit.claimed_key, F::from_canonical_usize(key))?;
        pw.set_target(circuit.claimed_tbs_end, F::from_canonical_usize(tbs_end))?;
        Ok(pw)
    }

    fn sample_certificate() -> Result<Vec<u8>> {
        let authority = TestKey::from_seed("authority")?;
        let holder = TestKey::from_seed("holder")?;
        CertificateBuilder::new(12345, holder.public_key()).build(&authority)
    }

    #[test]
    fn test_skip_element_length_forms() -> Result<()> {
        let mut buffer = fixtures::tlv(TAG_SEQUENCE, &[7u8; 3]);
        buffer.extend(fixtures::tlv(TAG_INTEGER, &[1u8; 130]));
        buffer.extend(fixtures::tlv(TAG_SEQUENCE, &[2u8; 300]));

        let mut builder = CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
        let bytes = add_virtual_bytes(&mut builder, buffer.len());
        let zero = builder.zero();
        let first = skip_element(&mut builder, &bytes, zero);
        let second = skip_element(&mut builder, &bytes, first.next);
        let third = skip_element(&mut builder, &bytes, second.next);
        for (target, expected) in [
            (first.next, 5),
            (second.content_len, 130),
            (second.next, 5 + 3 + 130),
            (third.content_offset, 5 + 3 + 130 + 4),
            (third.next, buffer.len()),
        ] {
            let c = builder.constant(F::from_canonical_usize(expected));
            builder.connect(target, c);
        }
        let data = builder.build::<Cfg>();

        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &bytes, &buffer)?;
        let proof = data.prove(pw)?;
        data.verify(proof)
    }

    #[test]
    fn test_skip_element_rejects_three_length_bytes() -> Result<()> {
        let buffer = [TAG_SEQUENCE, 0x83, 0x00, 0x00, 0x01, 0x00];
        let mut builder = CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
        let bytes = add_virtual_bytes(&mut builder, buffer.len());
        let zero = builder.zero();
        skip_element(&mut builder, &bytes, zero);
        let data = builder.build::<Cfg>();

        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &bytes, &buffer)?;
        assert_unsatisfiable(&data, pw);
        Ok(())
    }

    #[test]
    fn test_navigation_matches_offcircuit_layout() -> Result<()> {
        let cert = sample_certificate()?;
        let layout = CertificateLayout::locate(&cert)?;
        let circuit = build_navigation_circuit(cert.len());
        let pw = navigation_witness(&circuit, &cert, layout.key_offset, layout.tbs.end())?;
        let proof = circuit.data.prove(pw)?;
        circuit.data.verify(proof)
    }

    #[test]
    fn test_navigation_without_version_field() -> Result<()> {
        let authority = TestKey::from_seed("authority")?;
        let holder = TestKey::from_seed("holder")?;
        let cert = CertificateBuilder::new(3, holder.public_key())
            .without_version()
            .build(&authority)?;
        let layout = CertificateLayout::locate(&cert)?;
        let circuit = build_navigation_circuit(cert.len());
        let pw = navigation_witness(&circuit, &cert, layout.key_offset, layout.tbs.end())?;
        let proof = circuit.data.prove(pw)?;
        circuit.data.verify(proof)
    }

    #[test]
    fn test_navigation_rejects_wrong_claimed_offset() -> Result<()> {
        let cert = sample_certificate()?;
        let layout = CertificateLayout::locate(&cert)?;
        let circuit = build_navigation_circuit(cert.len());
        let pw = navigation_witness(&circuit, &cert, layout.key_offset + 1, layout.tbs.end())?;
        assert_unsatisfiable(&circuit.data, pw);
        Ok(())
    }

    #[test]
    fn test_navigation_rejects_corrupted_tags() -> Result<()> {
        let cert = sample_certificate()?;
        let layout = CertificateLayout::locate(&cert)?;
        let circuit = build_navigation_circuit(cert.len());

        let signature_algorithm = parse_element(&cert, layout.serial.end())?;
        let issuer = parse_element(&cert, signature_algorithm.end())?;
        let validity = parse_element(&cert, issuer.end())?;
        let subject = parse_element(&cert, validity.end())?;
        let spki = parse_element(&cert, subject.end())?;
        let corruptions = [
            0,
            layout.tbs.offset,
            layout.serial.offset,
            signature_algorithm.offset,
            issuer.offset,
            validity.offset,
            subject.offset,
            spki.offset,
            spki.content_offset(),
            layout.key_offset,
        ];
        for position in corruptions {
            let mut corrupted = cert.clone();
            corrupted[position] ^= 0x01;
            let pw = navigation_witness(&circuit, &corrupted, layout.key_offset, layout.tbs.end())?;
            assert_unsatisfiable(&circuit.data, pw);
        }
        Ok(())
    }

    #[test]
    fn test_navigation_rejects_key_outside_tbs() -> Result<()> {
        let cert = sample_certificate()?;
        let layout = CertificateLayout::locate(&cert)?;
        let circuit = build_navigation_circuit(cert.len());

        // shrink the TBSCertificate by one byte so the key element overruns it
        let mut shortened = cert.clone();
        shortened[layout.tbs.offset + layout.tbs.header_len - 1] -= 1;
        let pw = navigation_witness(&circuit, &shortened, layout.key_offset, layout.tbs.end() - 1)?;
        assert_unsatisfiable(&circuit.data, pw);
        Ok(())
    }

    #[test]
    fn test_extract_key_bytes() -> Result<()> {
        let cert = sample_certificate()?;
        let layout = CertificateLayout::locate(&cert)?;

        let mut builder = CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
        let bytes = add_virtual_bytes(&mut builder, cert.len());
        let offset = builder.constant(F::from_canonical_usize(layout.key_offset));
        let key = extract_key_bytes(&mut builder, &bytes, offset);
        let expected = constant_bytes(&mut builder, &layout.subject_key.to_sec1()[1..]);
        assert_equal_bytes(&mut builder, &key, &expected);
        let data = builder.build::<Cfg>();

        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &bytes, &cert)?;
        let proof = data.prove(pw)?;
        data.verify(proof)
    }

    #[test]
    fn test_crl_navigation_matches_offcircuit_layout() -> Result<()> {
        let authority = TestKey::from_seed("authority")?;
        for builder_cfg in [
            CrlBuilder::new(&[1111, 2222, 3333]),
            CrlBuilder::new(&[1111]).without_next_update(),
            CrlBuilder::new(&[]),
        ] {
            let crl = builder_cfg.build(&authority)?;
            let layout = CrlLayout::locate(&crl)?;

            let mut builder =
                CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
            let bytes = add_virtual_bytes(&mut builder, crl.len());
            let offsets = navigate_crl(&mut builder, &bytes);
            let start = builder.constant(F::from_canonical_usize(layout.entries_start));
            let end = builder.constant(F::from_canonical_usize(layout.entries_end));
            builder.connect(offsets.entries_start, start);
            builder.connect(offsets.entries_end, end);
            let data = builder.build::<Cfg>();

            let mut pw = PartialWitness::<F>::new();
            set_bytes(&mut pw, &bytes, &crl)?;
            let proof = data.prove(pw)?;
            data.verify(proof)?;
        }
        Ok(())
    }

    #[test]
    fn test_crl_navigation_rejects_non_time_this_update() -> Result<()> {
        let authority = TestKey::from_seed("authority")?;
        let crl = CrlBuilder::new(&[1111]).build(&authority)?;

        // version, signature algorithm, issuer, then thisUpdate
        let outer = parse_element(&crl, 0)?;
        let tbs = parse_element(&crl, outer.content_offset())?;
        let version = parse_element(&crl, tbs.content_offset())?;
        let signature_algorithm = parse_element(&crl, version.end())?;
        let issuer = parse_element(&crl, signature_algorithm.end())?;
        let this_update = issuer.end();
        assert_eq!(crl[this_update], TAG_UTC_TIME);

        let mut builder = CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
        let bytes = add_virtual_bytes(&mut builder, crl.len());
        navigate_crl(&mut builder, &bytes);
        let data = builder.build::<Cfg>();

        // IA5String in place of UTCTime
        let mut corrupted = crl.clone();
        corrupted[this_update] = 0x16;
        assert!(CrlLayout::locate(&corrupted).is_err());
        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &bytes, &corrupted)?;
        assert_unsatisfiable(&data, pw);
        Ok(())
    }
}
