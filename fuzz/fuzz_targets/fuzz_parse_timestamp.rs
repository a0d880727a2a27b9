#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let value = String::from_utf8_lossy(data);
    let _ = octofr::aggregate::parse_timestamp(&value);
    let _ = octofr::aggregate::reading_month(&value);
    let _ = octofr::aggregate::convert_sensor_date(Some(&value));
});
