use super::*;

#[test]
fn fnv_seeded_hash_is_stable() {
    let mut a = Fnv1a64::new(Fnv1a64::OFFSET_BASIS);
    a.write_bytes(b"filigrane");
    let mut b = Fnv1a64::new(Fnv1a64::OFFSET_BASIS);
    b.write_bytes(b"fili");
    b.write_bytes(b"grane");
    assert_eq!(a.finish(), b.finish());
}

#[test]
fn mul_div255_variants_align() {
    for x in [0u16, 1, 127, 255] {
        for y in [0u16, 1, 127, 255] {
            assert_eq!(u16::from(mul_div255_u8(x, y)), mul_div255_u16(x, y));
        }
    }
}

#[test]
fn frac_sin_is_unit_interval_and_deterministic() {
    for n in 0..64 {
        let v = frac_sin(1_700_000_000_000.0, n as f64);
        assert!((0.0..1.0).contains(&v), "{v}");
        assert_eq!(v.to_bits(), frac_sin(1_700_000_000_000.0, n as f64).to_bits());
    }
}

#[test]
fn frac_sin_matches_reference_formula() {
    let x = (42.0f64 + 7.0).sin() * 10_000.0;
    assert_eq!(frac_sin(42.0, 7.0), x - x.floor());
}

#[test]
fn hash_u32_depends_on_all_inputs() {
    let base = hash_u32(1, 2, 3);
    assert_ne!(base, hash_u32(2, 2, 3));
    assert_ne!(base, hash_u32(1, 3, 3));
    assert_ne!(base, hash_u32(1, 2, 4));
}

#[test]
fn premultiply_then_unpremultiply_is_close() {
    let mut px = vec![200u8, 100, 50, 128, 10, 20, 30, 0, 1, 2, 3, 255];
    let orig = px.clone();
    premultiply_rgba8_in_place(&mut px);
    assert_eq!(&px[4..8], &[0, 0, 0, 0]);
    unpremultiply_rgba8_in_place(&mut px);
    for c in 0..3 {
        assert!((i16::from(px[c]) - i16::from(orig[c])).abs() <= 2);
    }
    assert_eq!(&px[8..12], &orig[8..12]);
}
