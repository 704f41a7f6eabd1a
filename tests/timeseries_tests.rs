//! Time-series runs: one solve round per departure slice, partitioned output.

mod fixtures;

use chrono::{NaiveDate, NaiveDateTime};

use access_engine::engine::{self, DepartureSpec};
use access_engine::export::OdMatrixStore;
use fixtures::*;

fn departure(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 12, 30)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[test]
fn two_slices_five_minutes_apart_produce_two_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.departures = DepartureSpec::Series {
        start: departure(8, 0),
        end: departure(8, 5),
        step_minutes: 5,
    };
    config.write_od_matrix = true;

    let summary = engine::run(
        &config,
        &scenario_a_origins(),
        &scenario_a_destinations(),
        &permissive_locator(),
        &scenario_a_solver(),
    )
    .expect("time-series run");

    assert_eq!(summary.slices.len(), 2);
    assert!(summary.fully_covered());
    assert_eq!(summary.slices[0].departure, Some(departure(8, 0)));
    assert_eq!(summary.slices[1].departure, Some(departure(8, 5)));

    let store = OdMatrixStore::new(summary.od_store.as_ref().unwrap());
    let labels = ["2019_12_30-08_00_00", "2019_12_30-08_05_00"];
    for label in labels {
        let partition = store.partition_dir(label);
        assert!(partition.is_dir(), "missing partition {label}");

        let lines = read_partition(&partition);
        assert_eq!(lines.len(), 6, "3 origins x 2 destinations");
        assert!(lines.iter().all(|l| l.start_datetime == label));

        // spot-check the raw matrix carried into the partition
        let o1_d2 = lines
            .iter()
            .find(|l| l.i_id == "o1" && l.j_id == "d2")
            .unwrap();
        assert!((o1_d2.total_time - 2.0).abs() < 1e-9);
    }

    // each slice's accessibility table independently satisfies scenario A
    for slice in &summary.slices {
        let rows = read_access_table(slice.access_table.as_ref().unwrap());
        assert_eq!(rows.len(), 3);
        for (row, (expected_id, expected_ai)) in rows.iter().zip(scenario_a_expected()) {
            assert_eq!(row.i_id, expected_id);
            assert!((row.scores[0] - expected_ai).abs() < 1e-9);
        }
    }
}

#[test]
fn later_slices_accumulate_instead_of_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.departures = DepartureSpec::Series {
        start: departure(8, 0),
        end: departure(8, 10),
        step_minutes: 5,
    };
    config.write_od_matrix = true;

    let summary = engine::run(
        &config,
        &scenario_a_origins(),
        &scenario_a_destinations(),
        &permissive_locator(),
        &scenario_a_solver(),
    )
    .expect("time-series run");

    let root = summary.od_store.as_ref().unwrap();
    let partitions: Vec<_> = std::fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(partitions.len(), 3);
    for label in [
        "start_datetime=2019_12_30-08_00_00",
        "start_datetime=2019_12_30-08_05_00",
        "start_datetime=2019_12_30-08_10_00",
    ] {
        assert!(partitions.contains(&label.to_string()), "missing {label}");
    }
}

#[test]
fn single_fixed_departure_tags_records_without_partitioning_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.departures = DepartureSpec::At(departure(8, 0));
    config.write_od_matrix = true;

    let summary = engine::run(
        &config,
        &scenario_a_origins(),
        &scenario_a_destinations(),
        &permissive_locator(),
        &scenario_a_solver(),
    )
    .expect("fixed-departure run");

    assert_eq!(summary.slices.len(), 1);
    // single slice keeps the plain table name
    let table = summary.slices[0].access_table.as_ref().unwrap();
    assert_eq!(table.file_name().unwrap(), "access.parquet");
    // but the OD store still partitions by the departure label
    let store = OdMatrixStore::new(summary.od_store.as_ref().unwrap());
    assert!(store.partition_dir("2019_12_30-08_00_00").is_dir());
}
