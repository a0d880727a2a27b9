use octofr::aggregate::{
    TariffType, aggregate, convert_sensor_date, detect_tariff, gas_monthly_total, window_info,
};
use octofr::offpeak::{OffPeakSchedule, parse_off_peak_hours};
use octofr::snapshot::{Cost, Reading, ReadingMetadata, Statistic};

fn stat(label: &str, value: f64, cents: Option<f64>) -> Statistic {
    Statistic {
        label: Some(label.into()),
        value: Some(value),
        cost_incl_tax: cents.map(|c| Cost {
            estimated_amount: Some(c),
        }),
    }
}

fn reading(start: &str, stats: Vec<Statistic>) -> Reading {
    Reading {
        start_at: Some(start.into()),
        meta_data: Some(ReadingMetadata { statistics: stats }),
        ..Default::default()
    }
}

#[test]
fn range_count_matches_range_substrings() {
    let labels = [
        ("HC 01H00-02H00", 1),
        ("HC 01H00-02H00 03H00-04H30", 2),
        ("HP 00H00-01H00 02H00-03H00 04H00-05H00 23H00-00H30", 4),
        ("HC 1H0-2H0 garbage 3H00-4H00", 2),
    ];
    for (label, expected) in labels {
        let s = parse_off_peak_hours(Some(label));
        assert_eq!(s.range_count, expected, "{}", label);
        let sum: f64 = s.ranges.iter().map(|r| r.duration_hours).sum();
        assert!((s.total_hours - sum).abs() < 0.011, "{}", label);
    }
}

#[test]
fn empty_labels_are_equal() {
    assert_eq!(OffPeakSchedule::parse(None), OffPeakSchedule::parse(Some("")));
}

#[test]
fn aggregate_is_idempotent() {
    let readings = vec![
        reading("2025-03-02T10:00:00+01:00", vec![stat("BASE", 0.7, None)]),
        reading("2025-03-01T10:00:00+01:00", vec![stat("BASE", 0.3, None)]),
    ];
    let first = aggregate(&readings, &["BASE"], false, "2025-03", Some(2));
    let second = aggregate(&readings, &["BASE"], false, "2025-03", Some(2));
    assert_eq!(first, second);
    assert_eq!(first, 1.0);
}

#[test]
fn month_boundary_partitions_by_string() {
    let readings = vec![
        reading("2025-01-31T23:59:59+01:00", vec![stat("BASE", 5.0, None)]),
        reading("2025-02-01T00:00:00+01:00", vec![stat("BASE", 7.0, None)]),
    ];
    assert_eq!(aggregate(&readings, &["BASE"], false, "2025-01", None), 5.0);
    assert_eq!(aggregate(&readings, &["BASE"], false, "2025-02", None), 7.0);
}

#[test]
fn cost_converts_cents_and_skips_missing_cost() {
    let readings = vec![reading(
        "2025-03-01T00:00:00+01:00",
        vec![
            stat("CONSO_BASE", 3.0, Some(1234.0)),
            stat("CONSO_BASE", 3.0, None),
        ],
    )];
    assert_eq!(
        aggregate(&readings, &["CONSO_BASE"], true, "2025-03", Some(2)),
        12.34
    );
}

#[test]
fn unparsable_and_missing_timestamps_are_skipped() {
    let mut no_start = reading("", vec![stat("BASE", 100.0, None)]);
    no_start.start_at = None;
    let readings = vec![
        reading("yesterday", vec![stat("BASE", 100.0, None)]),
        no_start,
        reading("2025-03-03", vec![stat("BASE", 2.0, None)]),
    ];
    assert_eq!(aggregate(&readings, &["BASE"], false, "2025-03", None), 2.0);
    assert_eq!(aggregate(&[], &["BASE"], false, "2025-03", Some(2)), 0.0);
}

#[test]
fn tariff_detection_uses_last_delivered_reading() {
    let base = reading("2025-03-02", vec![stat("CONSO_BASE", 1.0, None)]);
    let hphc = reading(
        "2025-03-01",
        vec![
            stat("CONSO_HEURES_PLEINES", 1.0, None),
            stat("CONSO_HEURES_CREUSES", 1.0, None),
        ],
    );
    // Chronologically the BASE reading is latest, but delivery order wins
    assert_eq!(
        detect_tariff(&[base.clone(), hphc.clone()]),
        TariffType::Hphc
    );
    assert_eq!(detect_tariff(&[hphc, base]), TariffType::Base);
    assert_eq!(detect_tariff(&[]), TariffType::Unknown);
    assert_eq!(detect_tariff(&[Reading::default()]), TariffType::Unknown);
}

#[test]
fn gas_total_and_window_helpers() {
    let readings = vec![
        Reading {
            start_at: Some("2025-03-05T06:00:00+01:00".into()),
            value: Some(10.0),
            ..Default::default()
        },
        Reading {
            start_at: Some("2025-03-01T06:00:00+01:00".into()),
            value: None,
            ..Default::default()
        },
    ];
    assert_eq!(gas_monthly_total(&readings, "2025-03", Some(2)), 10.0);

    let info = window_info(&readings);
    assert_eq!(info.start.as_deref(), Some("2025-03-01T06:00:00+01:00"));
    assert_eq!(info.end.as_deref(), Some("2025-03-05T06:00:00+01:00"));
    assert_eq!(info.count, 2);

    assert_eq!(
        convert_sensor_date(Some("2025-03-05T06:00:00+01:00")).as_deref(),
        Some("2025-03-05")
    );
    assert_eq!(convert_sensor_date(Some("n/a")), None);
    assert_eq!(convert_sensor_date(None), None);
}
