use std::collections::BTreeSet;

use crv_core::{AdHoc, Arg, Constraint, CoreError, EnumDomain, Entity, Kind, Pool, RandomizeConfig, Value, VarSpec};
use crv_ir::expr::Expr;

fn int(pool: &Pool, id: crv_core::VarId) -> i128 {
    pool.value(id).unwrap().as_int().unwrap()
}

#[test]
fn test_values_stay_in_range_and_vary() {
    let mut pool = Pool::seeded(1);
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let mut seen = BTreeSet::new();
    for _ in 0..1000 {
        pool.randomize(x).unwrap();
        let v = int(&pool, x);
        assert!((0..=255).contains(&v));
        seen.insert(v);
    }
    assert!(seen.len() > 1);
}

#[test]
fn test_signed_values_cover_negative_range() {
    let mut pool = Pool::seeded(2);
    let x = pool.create(VarSpec::new(Kind::int8(), 0)).unwrap();
    let mut negative = false;
    for _ in 0..200 {
        pool.randomize(x).unwrap();
        let v = int(&pool, x);
        assert!((-128..=127).contains(&v));
        negative |= v < 0;
    }
    assert!(negative);
}

#[test]
fn test_infeasible_constraints_fail() {
    let mut pool = Pool::seeded(3);
    let x = pool.create(VarSpec::new(Kind::uint8(), 7)).unwrap();
    pool.add_constraint(x, Constraint::new("neg", |t| t[0].lt(0), [])).unwrap();
    pool.add_constraint(x, Constraint::new("pos", |t| t[0].gt(0), [])).unwrap();
    assert!(matches!(
        pool.randomize(x),
        Err(CoreError::SolveFailure { .. })
    ));
    assert_eq!(pool.value(x).unwrap(), Value::Int(7));
}

#[test]
fn test_uint_domain_excludes_negative_values() {
    let mut pool = Pool::seeded(3);
    let x = pool.create(VarSpec::new(Kind::uint8(), 7)).unwrap();
    pool.add_constraint(x, Constraint::new("neg", |t| t[0].lt(0), [])).unwrap();
    assert!(matches!(
        pool.randomize(x),
        Err(CoreError::SolveFailure { .. })
    ));
    pool.remove_constraint(x, "neg").unwrap();
    pool.randomize(x).unwrap();
}

#[test]
fn test_enum_values_stay_in_domain() {
    let mut pool = Pool::seeded(4);
    let domain = EnumDomain::new([("A", 0), ("B", 1), ("C", 2)]).unwrap();
    let kind = Kind::enumeration(domain, None).unwrap();
    assert_eq!(kind.width(), 2);
    let e = pool.create(VarSpec::labeled(kind, "A")).unwrap();
    let mut seen = BTreeSet::new();
    for _ in 0..100 {
        pool.randomize(e).unwrap();
        let v = int(&pool, e);
        assert!([0, 1, 2].contains(&v));
        seen.insert(v);
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_sparse_enum() {
    let mut pool = Pool::seeded(4);
    let domain = EnumDomain::new([("LOW", -8), ("MID", 5), ("HIGH", 90)]).unwrap();
    let e = pool
        .create(VarSpec::labeled(Kind::enumeration(domain, None).unwrap(), "MID"))
        .unwrap();
    pool.add_constraint(e, Constraint::new("no_low", |t| t[0].ne(-8), []))
        .unwrap();
    for _ in 0..30 {
        pool.randomize(e).unwrap();
        assert!([5, 90].contains(&int(&pool, e)));
    }
}

#[test]
fn test_constraint_against_fixed_variable() {
    let mut pool = Pool::seeded(5);
    let limit = pool.create(VarSpec::new(Kind::uint8(), 50).fixed()).unwrap();
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    pool.add_constraint(x, Constraint::new("below", |t| t[0].lt(&t[1]), [Arg::Var(limit)]))
        .unwrap();
    for _ in 0..50 {
        pool.randomize(x).unwrap();
        assert!(int(&pool, x) < 50);
    }
    pool.assign(limit, 3).unwrap();
    pool.randomize(x).unwrap();
    assert!(int(&pool, x) < 3);
}

#[test]
fn test_soft_constraint_is_honored_when_feasible() {
    let mut pool = Pool::seeded(6);
    let x = pool.create(VarSpec::new(Kind::uint16(), 0)).unwrap();
    pool.add_soft_constraint(x, Constraint::new("pref", |t| t[0].eq(7), []))
        .unwrap();
    for _ in 0..10 {
        pool.randomize(x).unwrap();
        assert_eq!(int(&pool, x), 7);
    }

    // a hard constraint always wins
    pool.add_constraint(x, Constraint::new("hard", |t| t[0].gt(100), []))
        .unwrap();
    pool.randomize(x).unwrap();
    assert!(int(&pool, x) > 100);
}

#[test]
fn test_adhoc_constraints() {
    let mut pool = Pool::seeded(7);
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let over = AdHoc::new(|t| t[0].gt(200), []);
    for _ in 0..20 {
        pool.randomize_with(x, &[over.clone()], &[]).unwrap();
        assert!(int(&pool, x) > 200);
    }

    let exact = AdHoc::new(|t| t[0].eq(&t[1]), [Arg::from(42)]);
    pool.randomize_with(x, &[], &[exact]).unwrap();
    assert_eq!(int(&pool, x), 42);

    // one-off constraints do not persist
    let mut low = false;
    for _ in 0..50 {
        pool.randomize(x).unwrap();
        low |= int(&pool, x) <= 200;
    }
    assert!(low);
}

#[test]
fn test_float_respects_bounds() {
    let mut pool = Pool::seeded(8);
    let f = pool.create(VarSpec::new(Kind::single(), 0.0)).unwrap();
    pool.add_constraint(f, Constraint::new("r", |t| t[0].within(-2.5, 2.5), []))
        .unwrap();
    let mut seen = BTreeSet::new();
    for _ in 0..100 {
        pool.randomize(f).unwrap();
        let v = pool.value(f).unwrap().as_f64();
        assert!((-2.5..=2.5).contains(&v));
        seen.insert(v.to_bits());
    }
    assert!(seen.len() > 1);
}

#[test]
fn test_half_precision_stays_finite() {
    let mut pool = Pool::seeded(8);
    let h = pool.create(VarSpec::new(Kind::half(), f64::NAN)).unwrap();
    for _ in 0..50 {
        pool.randomize(h).unwrap();
        let v = pool.value(h).unwrap().as_f64();
        assert!(v.is_finite());
        assert!(v.abs() <= 65504.0);
    }
}

#[test]
fn test_bool_randomizes_both_ways() {
    let mut pool = Pool::seeded(9);
    let b = pool.create(VarSpec::new(Kind::Bool, false)).unwrap();
    let mut seen = BTreeSet::new();
    for _ in 0..50 {
        pool.randomize(b).unwrap();
        seen.insert(pool.value(b).unwrap().as_bool());
    }
    assert_eq!(seen.len(), 2);
}

#[test]
fn test_seeded_pools_repeat() {
    let draws = |seed| {
        let mut pool = Pool::seeded(seed);
        let x = pool.create(VarSpec::new(Kind::uint32(), 0)).unwrap();
        (0..20)
            .map(|_| {
                pool.randomize(x).unwrap();
                int(&pool, x)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(draws(99), draws(99));
}

#[test]
fn test_config_from_json() {
    let config = RandomizeConfig::from_json(r#"{"seed": 5, "bit_hints": false}"#).unwrap();
    let mut pool = Pool::with_config(config).unwrap();
    let x = pool.create(VarSpec::new(Kind::int32(), 0)).unwrap();
    pool.randomize(x).unwrap();
    assert!(Pool::with_config(RandomizeConfig {
        avoid_repeat_probability: -1.0,
        ..RandomizeConfig::default()
    })
    .is_err());
}

fn packet(pool: &mut Pool) -> (Entity, [crv_core::VarId; 3]) {
    let len = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let hdr = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let total = pool.create(VarSpec::new(Kind::uint16(), 0)).unwrap();
    let mut e = Entity::new("packet")
        .with_field("len", len)
        .with_field("hdr", hdr)
        .with_field("total", total);
    e.add_constraint(Constraint::new(
        "sum",
        |t: &[Expr]| t[2].eq(&t[0] + &t[1]),
        [len.into(), hdr.into(), total.into()],
    ));
    e.add_constraint(Constraint::new("min_hdr", |t| t[0].ge(4), [hdr.into()]));
    (e, [len, hdr, total])
}

#[test]
fn test_entity_constraints_span_fields() {
    let mut pool = Pool::seeded(10);
    let (mut e, [len, hdr, total]) = packet(&mut pool);
    let mut lens = BTreeSet::new();
    for _ in 0..50 {
        e.randomize(&mut pool).unwrap();
        assert_eq!(int(&pool, total), int(&pool, len) + int(&pool, hdr));
        assert!(int(&pool, hdr) >= 4);
        lens.insert(int(&pool, len));
    }
    assert!(lens.len() > 1);
}

#[test]
fn test_nested_entity_constraints_apply() {
    let mut pool = Pool::seeded(11);
    let inner_var = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let mut inner = Entity::new("inner").with_field("v", inner_var);
    inner.add_constraint(Constraint::new("odd", |t| (&t[0] % 2).eq(1), [inner_var.into()]));
    let outer_var = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let mut outer = Entity::new("outer")
        .with_field("inner", inner)
        .with_field("w", outer_var);
    outer.add_constraint(Constraint::new(
        "greater",
        |t| t[0].gt(&t[1]),
        [outer_var.into(), inner_var.into()],
    ));
    for _ in 0..20 {
        outer.randomize(&mut pool).unwrap();
        assert_eq!(int(&pool, inner_var) % 2, 1);
        assert!(int(&pool, outer_var) > int(&pool, inner_var));
    }
}

#[test]
fn test_fixed_fields_keep_their_value() {
    let mut pool = Pool::seeded(12);
    let fixed = pool.create(VarSpec::new(Kind::uint8(), 9).fixed()).unwrap();
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let mut e = Entity::new("e").with_field("fixed", fixed).with_field("x", x);
    e.add_constraint(Constraint::new("eq", |t| t[0].eq(&t[1] * 2), [x.into(), fixed.into()]));
    e.randomize(&mut pool).unwrap();
    assert_eq!(int(&pool, fixed), 9);
    assert_eq!(int(&pool, x), 18);
}

#[test]
fn test_frozen_entity_reuses_solver() {
    let mut pool = Pool::seeded(13);
    let (mut e, [len, hdr, total]) = packet(&mut pool);
    e.freeze_constraints();
    e.randomize(&mut pool).unwrap();

    // constraints added while frozen are ignored until unfrozen
    e.add_constraint(Constraint::new("fixed_len", |t| t[0].eq(3), [len.into()]));
    let mut lens = BTreeSet::new();
    for _ in 0..20 {
        e.randomize(&mut pool).unwrap();
        assert_eq!(int(&pool, total), int(&pool, len) + int(&pool, hdr));
        lens.insert(int(&pool, len));
    }
    assert!(lens.len() > 1);

    let pin = AdHoc::new(|t| t[0].eq(77), [len.into()]);
    e.randomize_with(&mut pool, &[pin], &[]).unwrap();
    assert_eq!(int(&pool, len), 77);

    e.unfreeze_constraints();
    e.randomize(&mut pool).unwrap();
    assert_eq!(int(&pool, len), 3);
}

#[test]
fn test_frozen_failure_leaves_cache_usable() {
    let mut pool = Pool::seeded(14);
    let (mut e, [len, ..]) = packet(&mut pool);
    e.freeze_constraints();
    let impossible = AdHoc::new(|t| t[0].gt(300), [len.into()]);
    assert!(matches!(
        e.randomize_with(&mut pool, &[impossible], &[]),
        Err(CoreError::SolveFailure { .. })
    ));
    e.randomize(&mut pool).unwrap();
}

#[test]
fn test_hooks_run_around_randomize() {
    let mut pool = Pool::seeded(15);
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let done = pool.create(VarSpec::new(Kind::Bool, false).fixed()).unwrap();
    let mut e = Entity::new("hooked").with_field("x", x).with_field("done", done);
    e.set_pre_randomize(move |_, pool| pool.assign(done, false));
    e.set_post_randomize(move |_, pool| pool.assign(done, true));
    e.randomize(&mut pool).unwrap();
    assert_eq!(pool.value(done).unwrap(), Value::Bool(true));
}

#[test]
fn test_copies_constrain_independently() {
    let mut pool = Pool::seeded(17);
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    pool.add_constraint(x, Constraint::new("c", |t| t[0].eq(10), [])).unwrap();
    let y = pool.copy(x).unwrap();
    pool.add_constraint(y, Constraint::new("c", |t| t[0].eq(20), [])).unwrap();
    let z = pool.copy(y).unwrap();
    pool.add_constraint(z, Constraint::new("c", |t| t[0].eq(30), [])).unwrap();

    for id in [x, y, z] {
        pool.randomize(id).unwrap();
    }
    assert_eq!(pool.value(x).unwrap(), Value::Int(10));
    assert_eq!(pool.value(y).unwrap(), Value::Int(20));
    assert_eq!(pool.value(z).unwrap(), Value::Int(30));
}

#[test]
fn test_copy_relocates_self_references() {
    let mut pool = Pool::seeded(18);
    let other = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    pool.add_constraint(x, Constraint::new("lt", |t| t[0].lt(&t[1]), [x.into(), other.into()]))
        .unwrap();
    let y = pool.copy(x).unwrap();
    let (_, c) = pool.get(y).unwrap().constraints().get("lt").unwrap();
    assert_eq!(c.args()[0].var(), Some(y));
    assert_eq!(c.args()[1].var(), Some(other));
}

#[test]
fn test_variable_hooks_run_around_randomize() {
    let mut pool = Pool::seeded(19);
    let seen = pool.create(VarSpec::new(Kind::uint8(), 0).fixed()).unwrap();
    let before = pool.create(VarSpec::new(Kind::uint8(), 0).fixed()).unwrap();
    let x = pool
        .create(
            VarSpec::new(Kind::uint8(), 0)
                .pre_randomize(move |_, pool| pool.assign(before, 1))
                .post_randomize(move |id, pool| {
                    let value = pool.value(id)?;
                    pool.assign(seen, value)
                }),
        )
        .unwrap();
    pool.add_constraint(x, Constraint::new("c", |t| t[0].eq(&t[1] + 40), [before.into()]))
        .unwrap();

    pool.randomize(x).unwrap();
    assert_eq!(pool.value(before).unwrap(), Value::Int(1));
    assert_eq!(pool.value(x).unwrap(), Value::Int(41));
    assert_eq!(pool.value(seen).unwrap(), Value::Int(41));
}

#[test]
fn test_failing_pre_hook_aborts_randomize() {
    let mut pool = Pool::seeded(20);
    let x = pool
        .create(
            VarSpec::new(Kind::uint8(), 5)
                .pre_randomize(|_, _| Err(CoreError::Configuration("not ready".to_string()))),
        )
        .unwrap();
    assert!(matches!(pool.randomize(x), Err(CoreError::Configuration(_))));
    assert_eq!(pool.value(x).unwrap(), Value::Int(5));
}

#[test]
fn test_frozen_entity_survives_many_draws() {
    let mut pool = Pool::seeded(21);
    let (mut e, [len, hdr, total]) = packet(&mut pool);
    e.freeze_constraints();
    for _ in 0..300 {
        e.randomize(&mut pool).unwrap();
        assert_eq!(int(&pool, total), int(&pool, len) + int(&pool, hdr));
        assert!(int(&pool, hdr) >= 4);
    }
}

#[test]
fn test_stale_argument_is_not_found() {
    let mut pool = Pool::seeded(16);
    let x = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    let gone = pool.create(VarSpec::new(Kind::uint8(), 0)).unwrap();
    pool.add_constraint(x, Constraint::new("lt", |t| t[0].lt(&t[1]), [gone.into()]))
        .unwrap();
    pool.remove(gone).unwrap();
    assert!(matches!(pool.randomize(x), Err(CoreError::NotFound(id)) if id == gone));
}
