use uapoll_telemetry::{metrics, new_cycle_id, record_accepted, record_read_latency_ms};

#[test]
fn cycle_ids_are_unique() {
    let first = new_cycle_id();
    let second = new_cycle_id();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[test]
fn accepted_counters_track_forced() {
    let before = metrics().snapshot();
    record_accepted(false);
    record_accepted(true);
    record_read_latency_ms(12);
    let after = metrics().snapshot();
    assert!(after.accepted >= before.accepted + 2);
    assert!(after.forced_accepts >= before.forced_accepts + 1);
    assert!(after.read_latency_ms_total >= before.read_latency_ms_total + 12);
}
