use std::collections::BTreeMap;
use std::sync::Arc;

use crv_core::{Constraint, CoreError, Entity, Field, FieldAttributes, Format, Kind, Pool, Struct, Value, VarId, VarSpec};
use proptest::prelude::*;
use serde_json::json;

fn uint8(pool: &mut Pool, v: i64) -> VarId {
    pool.create(VarSpec::new(Kind::uint8(), v)).unwrap()
}

fn xyz(pool: &mut Pool) -> Entity {
    let x = uint8(pool, 10);
    let y = uint8(pool, 20);
    let z = uint8(pool, 30);
    let mut e = Entity::new("xyz")
        .with_field("x", x)
        .with_field("y", y)
        .with_field("z", z);
    e.add_constraint(Constraint::new(
        "sum",
        |t| t[2].eq(&t[0] + &t[1]),
        [x.into(), y.into(), z.into()],
    ));
    e
}

#[test]
fn test_copy_is_independent() {
    let mut pool = Pool::seeded(1);
    let e = xyz(&mut pool);
    let c = e.shallow_copy(&mut pool).unwrap();
    for name in ["x", "y", "z"] {
        assert_ne!(e.var(name), c.var(name));
    }

    pool.assign(c.var("x").unwrap(), 1).unwrap();
    pool.assign(c.var("y").unwrap(), 2).unwrap();
    pool.assign(c.var("z").unwrap(), 3).unwrap();
    assert_eq!(pool.value(e.var("x").unwrap()).unwrap(), Value::Int(10));
    assert_eq!(pool.value(e.var("y").unwrap()).unwrap(), Value::Int(20));
    assert_eq!(pool.value(e.var("z").unwrap()).unwrap(), Value::Int(30));
}

#[test]
fn test_copied_constraints_follow_the_copy() {
    let mut pool = Pool::seeded(2);
    let e = xyz(&mut pool);
    let mut c = e.deep_copy(&mut pool).unwrap();
    c.randomize(&mut pool).unwrap();

    let v = |name: &str| pool.value(c.var(name).unwrap()).unwrap().as_int().unwrap();
    assert_eq!(v("z"), v("x") + v("y"));
    assert_eq!(pool.value(e.var("x").unwrap()).unwrap(), Value::Int(10));
    assert_eq!(pool.value(e.var("z").unwrap()).unwrap(), Value::Int(30));
}

#[test]
fn test_shared_variable_maps_to_one_copy() {
    let mut pool = Pool::seeded(3);
    let x = uint8(&mut pool, 1);
    let e = Entity::new("e")
        .with_field("a", x)
        .with_field("list", Field::Seq(vec![Field::Var(x), Field::Var(x)]));
    let c = e.shallow_copy(&mut pool).unwrap();
    let a = c.var("a").unwrap();
    assert_ne!(a, x);
    match c.field("list") {
        Some(Field::Seq(items)) => {
            for item in items {
                assert!(matches!(item, Field::Var(id) if *id == a));
            }
        }
        other => panic!("unexpected field {other:?}"),
    }
    assert_eq!(c.collect_vars(), vec![a]);
}

#[test]
fn test_variable_constraints_relocate_inside_copy_only() {
    let mut pool = Pool::seeded(4);
    let outside = pool.create(VarSpec::new(Kind::uint8(), 5).fixed()).unwrap();
    let a = uint8(&mut pool, 0);
    let b = uint8(&mut pool, 0);
    pool.add_constraint(a, Constraint::new("gt_b", |t| t[0].gt(&t[1]), [b.into()]))
        .unwrap();
    pool.add_constraint(a, Constraint::new("lt_out", |t| t[0].lt(&t[1]), [outside.into()]))
        .unwrap();
    let e = Entity::new("e").with_field("a", a).with_field("b", b);
    let mut c = e.shallow_copy(&mut pool).unwrap();

    let (ca, cb) = (c.var("a").unwrap(), c.var("b").unwrap());
    let constraints = pool.get(ca).unwrap().constraints();
    let (_, gt) = constraints.get("gt_b").unwrap();
    assert_eq!(gt.args()[0].var(), Some(cb));
    let (_, lt) = constraints.get("lt_out").unwrap();
    assert_eq!(lt.args()[0].var(), Some(outside));

    c.randomize(&mut pool).unwrap();
    let value = |id| pool.value(id).unwrap().as_int().unwrap();
    assert!(value(ca) > value(cb));
    assert!(value(ca) < 5);
}

#[test]
fn test_plain_fields_shared_or_duplicated() {
    let mut pool = Pool::seeded(5);
    let e = Entity::new("e").with_field("meta", json!({"kind": "read"}));
    let shallow = e.shallow_copy(&mut pool).unwrap();
    let deep = e.deep_copy(&mut pool).unwrap();
    let plain = |e: &Entity| match e.field("meta") {
        Some(Field::Plain(v)) => Arc::clone(v),
        _ => panic!("missing plain field"),
    };
    assert!(Arc::ptr_eq(&plain(&e), &plain(&shallow)));
    assert!(!Arc::ptr_eq(&plain(&e), &plain(&deep)));
    assert_eq!(plain(&e), plain(&deep));
}

#[test]
fn test_compare_equal_and_mismatch() {
    let mut pool = Pool::seeded(6);
    let a = xyz(&mut pool);
    let b = a.shallow_copy(&mut pool).unwrap();
    assert!(a.compare(&pool, &b, true, true).unwrap());

    pool.assign(b.var("y").unwrap(), 21).unwrap();
    assert!(!a.compare(&pool, &b, false, false).unwrap());
}

#[test]
fn test_compare_skips_private_and_excluded_fields() {
    let mut pool = Pool::seeded(7);
    let make = |pool: &mut Pool, id: i64, stamp: i64, data: i64| {
        let mut e = Entity::new("txn")
            .with_field("_id", uint8(pool, id))
            .with_field("stamp", uint8(pool, stamp))
            .with_field("data", uint8(pool, data));
        e.set_attributes(
            "stamp",
            FieldAttributes {
                compare: false,
                ..FieldAttributes::default()
            },
        );
        e
    };
    let a = make(&mut pool, 1, 100, 7);
    let b = make(&mut pool, 2, 200, 7);
    assert!(a.compare(&pool, &b, false, true).unwrap());
    let c = make(&mut pool, 1, 100, 8);
    assert!(!a.compare(&pool, &c, false, false).unwrap());
}

#[test]
fn test_compare_missing_fields() {
    let mut pool = Pool::seeded(8);
    let x = uint8(&mut pool, 1);
    let y = uint8(&mut pool, 2);
    let small = Entity::new("e").with_field("x", x);
    let large = Entity::new("e").with_field("x", x).with_field("y", y);
    assert!(!large.compare(&pool, &small, false, false).unwrap());
    // only the reverse direction sees the extra field
    assert!(small.compare(&pool, &large, false, false).unwrap());
    assert!(!small.compare(&pool, &large, false, true).unwrap());
}

#[test]
fn test_compare_containers() {
    let mut pool = Pool::seeded(9);
    let vals: Vec<VarId> = [1, 2, 3].iter().map(|v| uint8(&mut pool, *v)).collect();
    let set = |ids: &[VarId]| Field::Set(ids.iter().map(|id| Field::Var(*id)).collect());
    let seq = |ids: &[VarId]| Field::Seq(ids.iter().map(|id| Field::Var(*id)).collect());

    let a = Entity::new("e").with_field("s", set(&vals)).with_field("q", seq(&vals));
    let reversed: Vec<VarId> = vals.iter().rev().copied().collect();
    let b = Entity::new("e").with_field("s", set(&reversed)).with_field("q", seq(&vals));
    let c = Entity::new("e").with_field("s", set(&vals)).with_field("q", seq(&reversed));
    assert!(a.compare(&pool, &b, false, false).unwrap());
    assert!(!a.compare(&pool, &c, false, false).unwrap());

    let map = |v: VarId| Field::Map(BTreeMap::from([("k".to_string(), Field::Var(v))]));
    let m1 = Entity::new("m").with_field("m", map(vals[0]));
    let m2 = Entity::new("m").with_field("m", map(vals[1]));
    assert!(!m1.compare(&pool, &m2, false, false).unwrap());
}

#[test]
fn test_compare_nested_entities() {
    let mut pool = Pool::seeded(10);
    let a = Entity::new("outer").with_field("inner", xyz(&mut pool));
    let b = a.deep_copy(&mut pool).unwrap();
    assert!(a.compare(&pool, &b, false, true).unwrap());
    let Some(Field::Entity(inner)) = b.field("inner") else {
        panic!("missing nested entity");
    };
    pool.assign(inner.var("z").unwrap(), 0).unwrap();
    assert!(!a.compare(&pool, &b, false, false).unwrap());
}

#[test]
fn test_release_destroys_variables() {
    let mut pool = Pool::seeded(11);
    let e = xyz(&mut pool);
    let x = e.var("x").unwrap();
    assert_eq!(pool.len(), 3);
    e.release(&mut pool).unwrap();
    assert!(pool.is_empty());
    assert!(matches!(pool.value(x), Err(CoreError::NotFound(_))));
}

#[test]
fn test_randomize_after_field_variable_removed() {
    let mut pool = Pool::seeded(12);
    let mut e = xyz(&mut pool);
    pool.remove(e.var("y").unwrap()).unwrap();
    assert!(matches!(e.randomize(&mut pool), Err(CoreError::NotFound(_))));
}

#[test]
fn test_display() {
    let mut pool = Pool::seeded(13);
    let addr = pool.create(VarSpec::new(Kind::logic(8).unwrap(), 0xff)).unwrap();
    let len = uint8(&mut pool, 12);
    let secret = uint8(&mut pool, 1);
    let mut e = Entity::new("req")
        .with_field("addr", addr)
        .with_field("len", len)
        .with_field("secret", secret);
    e.set_attributes(
        "len",
        FieldAttributes {
            format: Some(Format::Hex),
            ..FieldAttributes::default()
        },
    );
    e.set_attributes(
        "secret",
        FieldAttributes {
            display: false,
            ..FieldAttributes::default()
        },
    );
    let text = e.display(&pool).unwrap();
    assert_eq!(text, "req\n  addr: 0xff\n  len: 0xc\n");
}

#[test]
fn test_struct_field_in_entity() {
    let mut pool = Pool::seeded(14);
    let a = pool.create(VarSpec::new(Kind::logic(4).unwrap(), 0)).unwrap();
    let b = pool.create(VarSpec::new(Kind::logic(4).unwrap(), 0)).unwrap();
    let s = Struct::new(&pool, "nibbles", [("hi", a), ("lo", b)]).unwrap();
    let mut e = Entity::new("e").with_field("s", s);
    e.add_constraint(Constraint::new("lo_gt_hi", |t| t[1].gt(&t[0]), [a.into(), b.into()]));
    e.randomize(&mut pool).unwrap();
    let Some(Field::Struct(s)) = e.field("s") else {
        panic!("missing struct");
    };
    let bits = s.to_bits(&pool).unwrap();
    assert!(bits & 0xf > bits >> 4);
}

proptest! {
    #[test]
    fn struct_bits_round_trip(a in any::<u8>(), b in any::<i16>(), c in 0u8..32, d in any::<bool>()) {
        let mut pool = Pool::seeded(0);
        let fa = pool.create(VarSpec::new(Kind::uint8(), a)).unwrap();
        let fb = pool.create(VarSpec::new(Kind::int16(), b)).unwrap();
        let fc = pool.create(VarSpec::new(Kind::logic(5).unwrap(), c)).unwrap();
        let fd = pool.create(VarSpec::new(Kind::Bool, d)).unwrap();
        let s = Struct::new(&pool, "s", [("a", fa), ("b", fb), ("c", fc), ("d", fd)]).unwrap();
        let raw = s.to_bits(&pool).unwrap();
        prop_assert!(raw < 1u128 << 30);

        let copy = s.copy(&mut pool).unwrap();
        copy.from_bits(&mut pool, raw).unwrap();
        for ((_, orig), (_, new)) in s.fields().iter().zip(copy.fields()) {
            prop_assert_eq!(pool.value(*orig).unwrap(), pool.value(*new).unwrap());
        }
        prop_assert_eq!(copy.to_bits(&pool).unwrap(), raw);
    }
}
