#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a lossy label; parsing must never panic
    let label = String::from_utf8_lossy(data);
    let schedule = octofr::offpeak::OffPeakSchedule::parse(Some(&label));

    assert_eq!(schedule.range_count, schedule.ranges.len());
    for range in &schedule.ranges {
        assert!(range.start_minutes < 1440 && range.end_minutes < 1440);
        assert!(range.duration_minutes >= 1 && range.duration_minutes <= 1440);
        let _ = range.contains(range.start_minutes);
    }
});
