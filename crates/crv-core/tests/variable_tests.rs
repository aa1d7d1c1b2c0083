use crv_core::{CoreError, EnumDomain, Format, Kind, Op, Pool, Unary, Value, VarSpec};
use proptest::prelude::*;

fn pool() -> Pool {
    Pool::seeded(11)
}

#[test]
fn test_construction_casts() {
    let mut pool = pool();
    let a = pool.create(VarSpec::new(Kind::int8(), 130)).unwrap();
    let b = pool.create(VarSpec::new(Kind::uint8(), 300)).unwrap();
    let c = pool.create(VarSpec::new(Kind::uint8(), -5)).unwrap();
    assert!(pool.scalar(a).unwrap() == -126);
    assert!(pool.scalar(b).unwrap() == 44);
    assert!(pool.scalar(c).unwrap() == 251);
}

#[test]
fn test_invalid_width() {
    assert!(matches!(Kind::uint(0), Err(CoreError::Domain(_))));
    assert!(matches!(Kind::logic(65), Err(CoreError::Domain(_))));
    let mut pool = pool();
    let err = pool
        .create(VarSpec::new(Kind::Int { width: 0 }, 0))
        .unwrap_err();
    assert!(matches!(err, CoreError::Domain(_)));
}

#[test]
fn test_enum_width_rules() {
    let domain = EnumDomain::new([("A", 0), ("B", 1), ("C", 2)]).unwrap();
    assert_eq!(Kind::enumeration(domain.clone(), None).unwrap().width(), 2);
    assert!(matches!(
        Kind::enumeration(domain, Some(1)),
        Err(CoreError::Domain(_))
    ));
}

#[test]
fn test_assignment_goes_through_cast() {
    let mut pool = pool();
    let x = pool.create(VarSpec::new(Kind::int16(), 0)).unwrap();
    pool.assign(x, 40_000).unwrap();
    assert_eq!(pool.value(x).unwrap(), Value::Int(40_000 - 65_536));
    let b = pool.create(VarSpec::new(Kind::Bool, false)).unwrap();
    pool.assign(b, 3).unwrap();
    assert_eq!(pool.value(b).unwrap(), Value::Bool(true));
}

#[test]
fn test_operators_return_new_variables() {
    let mut pool = pool();
    let x = pool.create(VarSpec::new(Kind::uint8(), 12)).unwrap();
    let y = pool.create(VarSpec::new(Kind::uint8(), 5)).unwrap();

    let sum = pool.apply(x, Op::Add, y).unwrap();
    assert!(pool.scalar(sum).unwrap() == 17);
    let masked = pool.apply(x, Op::And, 0b0110).unwrap();
    assert!(pool.scalar(masked).unwrap() == 4);
    let shifted = pool.apply(x, Op::Shl, 5).unwrap();
    assert!(pool.scalar(shifted).unwrap() == 128);
    let inverted = pool.unary(y, Unary::Invert).unwrap();
    assert!(pool.scalar(inverted).unwrap() == 250);

    pool.apply_assign(x, Op::Mul, 30).unwrap();
    assert!(pool.scalar(x).unwrap() == 104);
    assert!(matches!(
        pool.apply(x, Op::Rem, 0),
        Err(CoreError::DivisionByZero)
    ));
}

#[test]
fn test_comparisons_use_canonical_values() {
    let mut pool = pool();
    let x = pool.create(VarSpec::new(Kind::int8(), -1)).unwrap();
    let y = pool.create(VarSpec::new(Kind::uint8(), 255)).unwrap();
    let (sx, sy) = (pool.scalar(x).unwrap(), pool.scalar(y).unwrap());
    assert!(sx < sy);
    assert!(sx == -1);
    assert!(sy > 254);
}

#[test]
fn test_float_nan_semantics() {
    let mut pool = pool();
    let f = pool.create(VarSpec::new(Kind::double(), f64::NAN)).unwrap();
    let s = pool.scalar(f).unwrap();
    assert!(s != s.clone());
    assert!(!(s < 0.0) && !(s > 0.0) && !(s <= 0.0) && !(s >= 0.0));
    assert!(s != 0.0);
    assert!(matches!(
        pool.apply(f, Op::Xor, 1),
        Err(CoreError::UnsupportedOperation { .. })
    ));
}

#[test]
fn test_float_bit_patterns() {
    let mut pool = pool();
    let h = pool.create(VarSpec::new(Kind::half(), 1.0)).unwrap();
    assert_eq!(pool.get(h).unwrap().to_bits(), 0x3c00);
    let s = pool.create(VarSpec::new(Kind::single(), 3.4e39)).unwrap();
    assert_eq!(pool.value(s).unwrap(), Value::Float(f64::INFINITY));
}

#[test]
fn test_min_max_and_formats() {
    let mut pool = pool();
    let x = pool.create(VarSpec::new(Kind::int8(), -2)).unwrap();
    let v = pool.get(x).unwrap();
    assert_eq!(v.min(), Value::Int(-128));
    assert_eq!(v.max(), Value::Int(127));
    assert_eq!(v.render(), "-2");

    let l = pool
        .create(VarSpec::new(Kind::logic(12).unwrap(), 0xabc).named("addr"))
        .unwrap();
    assert_eq!(pool.get(l).unwrap().render(), "0xabc");
    pool.get_mut(l).unwrap().set_format(Format::Bin);
    assert_eq!(pool.get(l).unwrap().render(), "0b101010111100");
    assert_eq!(pool.get(l).unwrap().name(), Some("addr"));
}

proptest! {
    #[test]
    fn integer_casts_are_idempotent_and_in_range(v in any::<i64>(), width in 1u32..=64) {
        for kind in [Kind::uint(width).unwrap(), Kind::int(width).unwrap(), Kind::logic(width).unwrap()] {
            let once = kind.cast(Value::from(v)).unwrap();
            prop_assert_eq!(kind.cast(once).unwrap(), once);
            let (lo, hi) = kind.range();
            prop_assert!(once.compare(&lo).unwrap().is_ge());
            prop_assert!(once.compare(&hi).unwrap().is_le());
        }
    }

    #[test]
    fn unsigned_cast_is_modular(v in any::<i64>(), width in 1u32..=63) {
        let kind = Kind::uint(width).unwrap();
        let expected = i128::from(v).rem_euclid(1i128 << width);
        prop_assert_eq!(kind.cast(Value::from(v)).unwrap(), Value::Int(expected));
    }

    #[test]
    fn float_casts_are_idempotent(x in any::<f64>()) {
        for kind in [Kind::half(), Kind::single(), Kind::double()] {
            let once = kind.cast(Value::Float(x)).unwrap();
            let twice = kind.cast(once).unwrap();
            if once.is_nan() {
                prop_assert!(twice.is_nan());
            } else {
                prop_assert_eq!(twice, once);
            }
        }
    }
}

#[test]
fn test_float_bit_pattern_round_trip() {
    let mut pool = pool();
    let cases = [
        (Kind::half(), 0x3c00u128, Some(1.0)),
        (Kind::half(), 0x8000, Some(-0.0)),
        (Kind::half(), 0x7c00, Some(f64::INFINITY)),
        (Kind::half(), 0xfc00, Some(f64::NEG_INFINITY)),
        (Kind::half(), 0x7e00, None),
        (Kind::single(), 0xc020_0000, Some(-2.5)),
        (Kind::single(), 0x7f80_0000, Some(f64::INFINITY)),
        (Kind::single(), 0x7fc0_0000, None),
        (Kind::double(), 0x3ff8_0000_0000_0000, Some(1.5)),
        (Kind::double(), 0xfff0_0000_0000_0000, Some(f64::NEG_INFINITY)),
        (Kind::double(), 0x7ff8_0000_0000_0000, None),
    ];
    for (kind, raw, expected) in cases {
        let f = pool.create(VarSpec::new(kind, 0.0)).unwrap();
        pool.from_bits(f, raw).unwrap();
        let value = pool.value(f).unwrap();
        match expected {
            Some(x) => assert_eq!(value, Value::Float(x)),
            None => assert!(value.is_nan()),
        }
        assert_eq!(pool.get(f).unwrap().to_bits(), raw);
    }
}

#[test]
fn test_integer_from_bits() {
    let mut pool = pool();
    let x = pool.create(VarSpec::new(Kind::int8(), 0)).unwrap();
    pool.from_bits(x, 0x1ff).unwrap();
    assert_eq!(pool.value(x).unwrap(), Value::Int(-1));

    let domain = EnumDomain::new([("A", 0), ("B", 1), ("C", 2)]).unwrap();
    let e = pool
        .create(VarSpec::labeled(Kind::enumeration(domain, None).unwrap(), "B"))
        .unwrap();
    assert!(matches!(pool.from_bits(e, 3), Err(CoreError::Domain(_))));
    assert_eq!(pool.value(e).unwrap(), Value::Int(1));
}
