//! Live OSRM integration: opt in by pointing OSRM_BASE_URL at a running
//! osrm-routed instance with coverage for the Las Vegas area, e.g.
//!
//!   OSRM_BASE_URL=http://127.0.0.1:5000 cargo test --test osrm_integration

mod fixtures;

use std::env;

use access_engine::engine;
use access_engine::model::{FieldValue, Geometry, RawFeature};
use access_engine::osrm::{OsrmConfig, OsrmSolver};
use fixtures::{base_config, permissive_locator};

fn feature(id: &str, lat: f64, lng: f64) -> RawFeature {
    RawFeature::new(FieldValue::Text(id.to_string()), Geometry::Point((lat, lng)))
}

#[test]
fn osrm_backed_run_scores_every_origin() {
    let Ok(base_url) = env::var("OSRM_BASE_URL") else {
        eprintln!("OSRM_BASE_URL not set; skipping live OSRM test");
        return;
    };

    let solver = OsrmSolver::new(OsrmConfig {
        base_url,
        profile: "car".to_string(),
        timeout_secs: 10,
    })
    .expect("build OSRM solver");

    let origins = vec![
        feature("strip", 36.1147, -115.1728),
        feature("downtown", 36.1727, -115.1580),
    ];
    let destinations = vec![
        feature("jobs_a", 36.1215, -115.1739).with_weight(FieldValue::Float(100.0)),
        feature("jobs_b", 36.1663, -115.1492).with_weight(FieldValue::Float(250.0)),
    ];

    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.travel_mode = "car".to_string();
    config.impedance_functions = vec!["CUMR45".to_string()];

    let summary = engine::run(
        &config,
        &origins,
        &destinations,
        &permissive_locator(),
        &solver,
    )
    .expect("OSRM-backed run");

    assert!(summary.fully_covered());
    let rows = fixtures::read_access_table(summary.slices[0].access_table.as_ref().unwrap());
    assert_eq!(rows.len(), 2);
    // everything in the area is within 45 minutes of driving
    for row in &rows {
        assert!((row.scores[0] - 350.0).abs() < 1e-9, "{row:?}");
        assert_eq!(row.frequency, 2);
    }
}
