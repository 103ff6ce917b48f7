#![forbid(unsafe_code)]

use metro_engines::{EngineConfig, IndicatorPolicyKind, RunClassifier};
use metro_kernel_contracts::bench::ChannelId;
use metro_kernel_contracts::verdict::{FailureReason, SlotStatus};
use metro_os::classification::{
    reason_codes, ClassificationOutcome, ClassificationWiring, ClassificationWiringConfig,
};
use metro_os::ingest::{columns, TabularRow};
use metro_os::report::{daily_tallies, find_serial, RunReport};
use serde_json::{json, Value};

struct SlotCells {
    cn: Value,
    cp: Value,
    ci: Value,
    mv: &'static str,
    reg: Option<(f64, f64)>,
}

fn clean(mv: &'static str) -> SlotCells {
    SlotCells {
        cn: json!("0,10"),
        cp: json!("-0,20"),
        ci: json!("0.05%"),
        mv,
        reg: Some((100.0, 101.0)),
    }
}

fn ten_slot_row(
    run_id: u32,
    date: &str,
    class: &str,
    special: Vec<(u16, SlotCells)>,
) -> TabularRow {
    let mut row = TabularRow::new();
    row.insert(columns::RUN_ID.to_string(), json!(run_id));
    row.insert(columns::BENCH.to_string(), json!("BANC_10_POS"));
    row.insert(columns::CLASS.to_string(), json!(class));
    row.insert(columns::DATE.to_string(), json!(date));
    for pos in 1..=10u16 {
        let cells = special
            .iter()
            .position(|(p, _)| *p == pos)
            .map(|i| &special[i].1);
        let default = clean("+");
        let cells = cells.unwrap_or(&default);
        row.insert(columns::serial(pos), json!(format!("MTR{run_id}-{pos:02}")));
        row.insert(columns::channel(pos, "CN"), cells.cn.clone());
        row.insert(columns::channel(pos, "CP"), cells.cp.clone());
        row.insert(columns::channel(pos, "CI"), cells.ci.clone());
        row.insert(columns::indicator(pos), json!(cells.mv));
        if let Some((start, end)) = cells.reg {
            row.insert(columns::register_start(pos), json!(start));
            row.insert(columns::register_end(pos), json!(end));
        }
    }
    row
}

fn wiring(config: EngineConfig) -> ClassificationWiring<RunClassifier> {
    ClassificationWiring::new(
        ClassificationWiringConfig::mvp_v1(),
        RunClassifier::new(config).unwrap(),
    )
}

fn classify(config: EngineConfig, row: &TabularRow) -> RunReport {
    match wiring(config).classify_row(row).unwrap() {
        ClassificationOutcome::Classified(report) => report,
        ClassificationOutcome::Refused { message, .. } => panic!("refused: {message}"),
    }
}

#[test]
fn at_classification_db_01_against_consumer_needs_two_independent_signals() {
    let row = ten_slot_row(
        1,
        "02/06/25",
        "B",
        vec![
            (
                1,
                SlotCells {
                    cn: json!("2,0"),
                    ..clean("OK")
                },
            ),
            (
                2,
                SlotCells {
                    cn: json!("-2,0"),
                    ..clean("OK")
                },
            ),
        ],
    );
    let report = classify(EngineConfig::mvp_v1(), &row);

    let ac = &report.slots[0];
    assert_eq!(ac.status, SlotStatus::AgainstConsumer);
    assert_eq!(ac.reasons, vec![FailureReason::AgainstConsumer]);
    assert_eq!(ac.against_consumer_points, 2);

    let rejected = &report.slots[1];
    assert_eq!(rejected.status, SlotStatus::Rejected);
    assert_eq!(
        rejected.reasons,
        vec![FailureReason::Accuracy, FailureReason::Indicator]
    );
    assert_eq!(rejected.failing_channels, vec![ChannelId::Nominal]);

    assert_eq!(report.tally.against_consumer, 1);
    assert_eq!(report.tally.rejected, 1);
    assert_eq!(report.tally.approved, 8);
}

#[test]
fn at_classification_db_02_register_increment_direction_matters() {
    let row = ten_slot_row(
        2,
        "02/06/25",
        "B",
        vec![
            (
                3,
                SlotCells {
                    reg: Some((100.0, 102.0)),
                    ..clean("+")
                },
            ),
            (
                4,
                SlotCells {
                    reg: Some((100.0, 100.5)),
                    ..clean("+")
                },
            ),
            (5, SlotCells { reg: None, ..clean("+") }),
        ],
    );
    let report = classify(EngineConfig::mvp_v1(), &row);
    assert_eq!(report.slots[2].status, SlotStatus::Rejected);
    assert_eq!(report.slots[2].reasons, vec![FailureReason::Register]);
    assert_eq!(report.slots[2].register_delta, Some(2.0));
    assert_eq!(report.slots[3].status, SlotStatus::Rejected);
    assert_eq!(report.slots[3].against_consumer_points, 0);
    assert_eq!(report.slots[4].status, SlotStatus::Approved);
    assert_eq!(report.slots[4].readings.register_start, "-");
}

#[test]
fn at_classification_db_03_guardband_only_when_configured() {
    let row = ten_slot_row(
        3,
        "03/06/25",
        "B",
        vec![(
            6,
            SlotCells {
                ci: json!("1,2%"),
                ..clean("+")
            },
        )],
    );
    let plain = classify(EngineConfig::mvp_v1(), &row);
    assert_eq!(plain.slots[5].status, SlotStatus::Approved);
    assert_eq!(plain.guardband_used, None);

    let guarded = classify(EngineConfig::with_guardband_v1(), &row);
    assert_eq!(guarded.slots[5].status, SlotStatus::CriticalZone);
    assert_eq!(guarded.slots[5].guardband_channels, vec![ChannelId::Low]);
    assert!(guarded.slots[5].reasons.is_empty());
    assert_eq!(guarded.tally.critical_zone, 1);
    assert_eq!(guarded.tally.approval_rate_pct(), 100.0);
}

#[test]
fn at_classification_db_04_indicator_policy_is_a_deployment_choice() {
    let row = ten_slot_row(4, "03/06/25", "A", vec![(7, clean("OK"))]);
    let bench_token = classify(EngineConfig::mvp_v1(), &row);
    assert_eq!(bench_token.slots[6].status, SlotStatus::Rejected);
    assert_eq!(bench_token.slots[6].reasons, vec![FailureReason::Indicator]);

    let mut cfg = EngineConfig::mvp_v1();
    cfg.indicator_policy = IndicatorPolicyKind::Blocklist;
    let blocklist = classify(cfg, &row);
    assert_eq!(blocklist.slots[6].status, SlotStatus::Approved);
}

#[test]
fn at_classification_db_05_electromechanical_class_widens_limit() {
    let row = ten_slot_row(
        5,
        "04/06/25",
        "B ELETROMEC",
        vec![(
            1,
            SlotCells {
                cn: json!("3,5"),
                ..clean("+")
            },
        )],
    );
    let report = classify(EngineConfig::mvp_v1(), &row);
    assert_eq!(report.limit_used, 4.0);
    assert_eq!(report.slots[0].status, SlotStatus::Approved);
    assert_eq!(report.slots[0].limit_used, 4.0);
}

#[test]
fn at_classification_db_06_batch_keeps_order_and_collects_bad_rows() {
    let mut broken = ten_slot_row(7, "05/06/25", "B", vec![]);
    broken.remove(&columns::channel(4, "CN"));
    let rows = vec![
        ten_slot_row(6, "05/06/25", "B", vec![]),
        broken,
        ten_slot_row(8, "04/06/25", "C", vec![]),
    ];

    let parallel = wiring(EngineConfig::mvp_v1()).classify_batch(&rows);
    let sequential = ClassificationWiring::new(
        ClassificationWiringConfig {
            include_not_tested_slots: true,
            parallel_batch: false,
        },
        RunClassifier::mvp_v1(),
    )
    .classify_batch(&rows);
    assert_eq!(parallel, sequential);

    let ids: Vec<&str> = parallel.reports.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(ids, vec!["6", "8"]);
    assert_eq!(parallel.issues.len(), 1);
    assert_eq!(parallel.issues[0].row_index, 1);
    assert_eq!(
        parallel.issues[0].reason_code,
        reason_codes::CLASSIFY_ROW_REJECTED.0
    );
    assert!(parallel.issues[0].message.contains("P4_CN"));

    let days = daily_tallies(&parallel.reports);
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].date, "04/06/25");
    assert_eq!(days[1].tally.approved, 10);
}

#[test]
fn at_classification_db_07_serial_search_spans_runs() {
    let rows = vec![
        ten_slot_row(10, "06/06/25", "B", vec![]),
        ten_slot_row(11, "06/06/25", "B", vec![]),
    ];
    let batch = wiring(EngineConfig::mvp_v1()).classify_batch(&rows);
    let hits = find_serial(&batch.reports, "mtr11-0");
    assert_eq!(hits.len(), 9);
    assert!(hits.iter().all(|h| h.run_id == "11"));
    assert!(find_serial(&batch.reports, "   ").is_empty());
}

#[test]
fn at_classification_db_08_all_absent_channels_short_circuit() {
    let row = ten_slot_row(
        12,
        "07/06/25",
        "B",
        vec![(
            9,
            SlotCells {
                cn: Value::Null,
                cp: json!(""),
                ci: json!("abc"),
                mv: "NOK",
                reg: Some((1.0, 5.0)),
            },
        )],
    );
    let report = classify(EngineConfig::mvp_v1(), &row);
    assert_eq!(report.slots[8].status, SlotStatus::NotTested);
    assert!(report.slots[8].reasons.is_empty());
    assert_eq!(report.slots[8].readings.low, "abc");
    assert_eq!(report.tally.not_tested, 1);
    let reports = vec![report];
    assert!(find_serial(&reports, "MTR12-09").is_empty());
    assert_eq!(find_serial(&reports, "MTR12-08").len(), 1);
}

#[test]
fn at_classification_db_09_noisy_free_text_still_classifies_every_slot() {
    let mut row = ten_slot_row(13, "08/06/25", "B", vec![]);
    row.insert(columns::indicator(3), json!(format!("+ {}", "x".repeat(70))));
    row.insert(columns::serial(5), json!("AB\t123"));
    row.insert(
        columns::CLASS.to_string(),
        json!(format!("B (medidor eletronico {})", "monofasico ".repeat(6))),
    );

    let report = classify(EngineConfig::mvp_v1(), &row);
    assert_eq!(report.slots.len(), 10);
    assert_eq!(report.limit_used, 1.3);
    assert_eq!(report.slots[2].status, SlotStatus::Rejected);
    assert_eq!(report.slots[2].reasons, vec![FailureReason::Indicator]);
    assert_eq!(report.slots[4].serial, "AB 123");
    assert_eq!(report.slots[4].status, SlotStatus::Approved);
    assert_eq!(report.tally.approved, 9);
}
