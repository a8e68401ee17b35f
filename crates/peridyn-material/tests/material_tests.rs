//! Integration tests for peridyn-material.

use peridyn_material::{
    BondBased, BondModel, Fracture, MaterialDatabase, MaterialSpec, ParameterSet,
    PerPointParameterTable, PointParameters,
};

fn spec(horizon: f64) -> MaterialSpec {
    MaterialSpec {
        name: "test".into(),
        horizon,
        density: 8000.0,
        youngs_modulus: 210.0e9,
        fracture: Fracture::EnergyReleaseRate(55.0),
    }
}

// ─── PointParameters Tests ────────────────────────────────────

#[test]
fn derived_elastic_constants() {
    let p = PointParameters::new(&spec(0.5)).unwrap();
    assert!((p.poisson_ratio - 0.25).abs() < 1e-15);
    // K = E / (3(1 - 2ν)) = 2E/3
    assert!((p.bulk_modulus - 140.0e9).abs() / 140.0e9 < 1e-12);
    // G = E / (2(1 + ν)) = E / 2.5
    assert!((p.shear_modulus - 84.0e9).abs() / 84.0e9 < 1e-12);
    let bc = 18.0 * p.bulk_modulus / (std::f64::consts::PI * 0.5f64.powi(4));
    assert!((p.bond_constant - bc).abs() / bc < 1e-12);
}

#[test]
fn critical_stretch_from_energy_release_rate() {
    let p = PointParameters::new(&spec(0.5)).unwrap();
    let expected = (5.0 * 55.0 / (9.0 * p.bulk_modulus * 0.5)).sqrt();
    assert!((p.critical_stretch - expected).abs() < 1e-15);
    assert!(p.allows_failure());
}

#[test]
fn energy_release_rate_from_critical_stretch() {
    let mut s = spec(0.5);
    s.fracture = Fracture::CriticalStretch(0.01);
    let p = PointParameters::new(&s).unwrap();
    assert_eq!(p.critical_stretch, 0.01);
    let roundtrip = (5.0 * p.energy_release_rate / (9.0 * p.bulk_modulus * 0.5)).sqrt();
    assert!((roundtrip - 0.01).abs() < 1e-12);
}

#[test]
fn unbreakable_material() {
    let mut s = spec(0.5);
    s.fracture = Fracture::Unbreakable;
    let p = PointParameters::new(&s).unwrap();
    assert!(!p.allows_failure());
    assert!(!BondBased.exceeds_critical_stretch(&p, 1.0e6));
}

#[test]
fn rejects_non_positive_inputs() {
    assert!(PointParameters::new(&spec(0.0)).is_err());
    assert!(PointParameters::new(&spec(-1.0)).is_err());
    let mut s = spec(1.0);
    s.density = f64::NAN;
    assert!(PointParameters::new(&s).is_err());
    let mut s = spec(1.0);
    s.fracture = Fracture::CriticalStretch(0.0);
    assert!(PointParameters::new(&s).is_err());
}

// ─── ParameterSet Tests ───────────────────────────────────────

#[test]
fn uniform_lookup() {
    let p = PointParameters::new(&spec(1.0)).unwrap();
    let set = ParameterSet::Uniform(p);
    assert_eq!(set.get(0), &p);
    assert_eq!(set.get(1000), &p);
    assert!(!set.is_heterogeneous());
    assert_eq!(set.max_horizon(), 1.0);
}

#[test]
fn per_point_lookup() {
    let a = PointParameters::new(&spec(1.0)).unwrap();
    let b = PointParameters::new(&spec(2.0)).unwrap();
    let table = PerPointParameterTable::new(vec![a, b], vec![0, 1, 1, 0]);
    assert_eq!(table.len(), 4);
    let set = ParameterSet::PerPoint(table);
    assert!(set.is_heterogeneous());
    assert_eq!(set.get(0).horizon, 1.0);
    assert_eq!(set.get(2).horizon, 2.0);
    assert_eq!(set.max_horizon(), 2.0);
}

// ─── BondBased Tests ──────────────────────────────────────────

#[test]
fn bond_based_force_law() {
    let p = PointParameters::new(&spec(1.0)).unwrap();
    let model = BondBased::new();
    let f = model.bond_force(&p, 0.01, 2.0);
    assert!((f - p.bond_constant * 0.01 / 2.0).abs() < 1e-6);
    assert_eq!(model.bond_force(&p, 0.0, 2.0), 0.0);
    assert!(model.exceeds_critical_stretch(&p, 2.0 * p.critical_stretch));
    assert!(!model.exceeds_critical_stretch(&p, 0.5 * p.critical_stretch));
    assert_eq!(model.name(), "bond_based");
}

// ─── Database Tests ───────────────────────────────────────────

#[test]
fn database_defaults() {
    let db = MaterialDatabase::with_defaults();
    assert_eq!(db.len(), 4);
    assert_eq!(db.names(), vec!["aluminium", "glass", "pmma", "steel"]);
    let steel = db.get("steel").unwrap();
    assert!(PointParameters::new(&steel.with_horizon(0.003)).is_ok());
    assert!(db.get("unobtainium").is_none());
}

#[test]
fn preset_takes_the_job_horizon() {
    let db = MaterialDatabase::with_defaults();
    let pmma = db.preset("pmma", 0.003).unwrap();
    assert_eq!(pmma.horizon, 0.003);
    assert_eq!(pmma.density, db.get("pmma").unwrap().density);
    assert!(db.preset("unobtainium", 0.003).is_none());
}

#[test]
fn custom_database_from_specs() {
    let db: MaterialDatabase = [spec(0.5), spec(0.25)].into_iter().collect();
    // Same name: the later spec replaces the earlier one.
    assert_eq!(db.len(), 1);
    assert_eq!(db.get(&spec(0.25).name).unwrap().horizon, spec(0.25).horizon);
}

#[test]
fn spec_toml_roundtrip() {
    let s = spec(0.25);
    let text = toml::to_string(&s).unwrap();
    let recovered: MaterialSpec = toml::from_str(&text).unwrap();
    assert_eq!(recovered, s);

    let unbreakable: MaterialSpec = toml::from_str(
        r#"
        name = "rigid"
        horizon = 1.0
        density = 1.0
        youngs_modulus = 1.0
        fracture = "unbreakable"
        "#,
    )
    .unwrap();
    assert_eq!(unbreakable.fracture, Fracture::Unbreakable);
}
