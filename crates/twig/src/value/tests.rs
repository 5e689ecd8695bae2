use proptest::prelude::*;

use super::*;

#[test]
fn negative_i32_is_zero_extended() {
    let slot = encode(Val::I32(-1));
    assert_eq!(slot, 0x0000_0000_FFFF_FFFF);
    assert_eq!(decode(slot, ValType::I32), Val::I32(-1));
}

#[test]
fn narrow_decode_ignores_stale_high_bits() {
    let dirty = 0xDEAD_BEEF_0000_002A;
    assert_eq!(decode(dirty, ValType::I32), Val::I32(42));

    let f = 1.5f32;
    let dirty = 0xFFFF_FFFF_0000_0000 | f.to_bits() as u64;
    assert_eq!(decode(dirty, ValType::F32), Val::F32(1.5));
}

#[test]
fn f64_decode_keeps_nan_payload() {
    // Signalling NaN with a payload: a value conversion would quieten it.
    let bits = 0x7FF0_0000_0000_0001u64;
    match decode(bits, ValType::F64) {
        Val::F64(v) => {
            assert!(v.is_nan());
            assert_eq!(v.to_bits(), bits);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn typed_extraction_rejects_wrong_type() {
    assert_eq!(i64::from_val(&Val::I64(7)).unwrap(), 7);
    let err = i32::from_val(&Val::F32(1.0)).unwrap_err();
    assert_eq!(err.to_string(), "expected i32, got f32");
}

#[test]
fn results_conversion() {
    <()>::from_result(None).unwrap();
    assert!(<()>::from_result(Some(Val::I32(1))).is_err());
    assert_eq!(<(i64,)>::from_result(Some(Val::I64(42))).unwrap(), (42,));
    assert!(f64::from_result(None).is_err());
}

proptest! {
    #[test]
    fn i32_slot_roundtrip(v in any::<i32>()) {
        let slot = encode(Val::I32(v));
        prop_assert_eq!(slot >> 32, 0);
        prop_assert_eq!(decode(slot, ValType::I32), Val::I32(v));
    }

    #[test]
    fn f32_slot_roundtrip_is_bit_exact(bits in any::<u32>()) {
        let slot = encode(Val::F32(f32::from_bits(bits)));
        prop_assert_eq!(slot >> 32, 0);
        match decode(slot, ValType::F32) {
            Val::F32(v) => prop_assert_eq!(v.to_bits(), bits),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn f64_decode_is_reinterpretation(bits in any::<u64>()) {
        match decode(bits, ValType::F64) {
            Val::F64(v) => prop_assert_eq!(v.to_bits(), bits),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}
