#![forbid(unsafe_code)]

use metro_kernel_contracts::bench::{BenchKind, ABSENT_SENTINEL};
use metro_kernel_contracts::ContractViolation;
use metro_os::ingest::{columns, test_run_from_row, TabularRow};
use serde_json::{json, Value};

fn blank_row(run_id: Value, bench: &str) -> TabularRow {
    let mut row = TabularRow::new();
    row.insert(columns::RUN_ID.to_string(), run_id);
    row.insert(columns::BENCH.to_string(), json!(bench));
    row.insert(columns::DATE.to_string(), json!("14/08/25"));
    row.insert(columns::TEMPERATURE.to_string(), json!("Ambiente 23.4°C"));
    let slots = BenchKind::from_identifier(bench).slot_count();
    for pos in 1..=slots {
        for label in ["CN", "CP", "CI"] {
            row.insert(columns::channel(pos, label), Value::Null);
        }
    }
    row
}

#[test]
fn at_ingest_db_01_twenty_slot_row_yields_twenty_ordered_slots() {
    let mut row = blank_row(json!("E-77"), "BANC_20_POS");
    row.insert(columns::serial(20), json!("ZX-0020"));
    row.insert(columns::channel(20, "CN"), json!("-0,45%"));
    row.insert(columns::register_start(20), json!(1000));
    row.insert(columns::register_end(20), json!("1001,0"));

    let run = test_run_from_row(&row).unwrap();
    assert_eq!(run.bench, BenchKind::TwentySlot);
    assert_eq!(run.slots.len(), 20);
    assert_eq!(run.declared_class, "");
    assert_eq!(run.date.as_deref(), Some("14/08/25"));
    assert_eq!(run.temperature.as_deref(), Some("Ambiente 23.4°C"));
    for (idx, slot) in run.slots.iter().enumerate() {
        assert_eq!(slot.position as usize, idx + 1);
    }

    let last = &run.slots[19];
    assert_eq!(last.serial, "ZX-0020");
    assert_eq!(last.err_nominal, Some(-0.45));
    assert_eq!(last.register_start, Some(1000.0));
    assert_eq!(last.register_end, Some(1001.0));
    assert_eq!(last.raw.nominal.as_deref(), Some("-0,45%"));

    let first = &run.slots[0];
    assert_eq!(first.serial, ABSENT_SENTINEL);
    assert!(first.all_channels_absent());
}

#[test]
fn at_ingest_db_02_ten_slot_row_ignores_extra_positions() {
    let mut row = blank_row(json!(3), "BANC_10_POS");
    row.insert(columns::channel(11, "CN"), json!("9.9"));
    let run = test_run_from_row(&row).unwrap();
    assert_eq!(run.slots.len(), 10);
}

#[test]
fn at_ingest_db_03_twenty_slot_bench_requires_all_positions() {
    let mut row = blank_row(json!(4), "BANC_20_POS");
    row.remove(&columns::channel(15, "CI"));
    assert_eq!(
        test_run_from_row(&row),
        Err(ContractViolation::MissingColumn {
            column: "P15_CI".to_string()
        })
    );
}

#[test]
fn at_ingest_db_04_run_id_is_required() {
    let mut row = blank_row(json!(""), "BANC_10_POS");
    assert!(matches!(
        test_run_from_row(&row),
        Err(ContractViolation::InvalidValue { .. })
    ));
    row.remove(columns::RUN_ID);
    assert_eq!(
        test_run_from_row(&row),
        Err(ContractViolation::MissingColumn {
            column: "N_ENSAIO".to_string()
        })
    );
}

#[test]
fn at_ingest_db_05_malformed_cells_degrade_to_absent_readings() {
    let mut row = blank_row(json!(5), "BANC_10_POS");
    row.insert(columns::channel(2, "CN"), json!("#VALUE!"));
    row.insert(columns::channel(2, "CP"), json!("0.3"));
    row.insert(columns::register_start(2), json!("n/d"));
    let run = test_run_from_row(&row).unwrap();
    let slot = &run.slots[1];
    assert_eq!(slot.err_nominal, None);
    assert_eq!(slot.err_light, Some(0.3));
    assert_eq!(slot.register_start, None);
    assert_eq!(slot.raw.register_start.as_deref(), Some("n/d"));
}
