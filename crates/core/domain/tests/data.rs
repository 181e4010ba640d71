use domain::{Observation, Quality, ReadOutcome};

#[test]
fn read_outcome_constructors_set_quality() {
    let good = ReadOutcome::good("ns=2;i=1234", 1.5, 1000);
    assert!(good.quality.is_good());
    assert_eq!(good.value, 1.5);

    let bad = ReadOutcome::bad("ns=2;i=1234", "BadNodeIdUnknown", 1000);
    assert!(!bad.quality.is_good());
    assert_eq!(bad.quality.to_string(), "bad(BadNodeIdUnknown)");
}

#[test]
fn only_good_quality_is_good() {
    assert!(Quality::Good.is_good());
    assert!(!Quality::Bad("BadDecodingError".to_string()).is_good());
    assert_eq!(Quality::Good.to_string(), "good");
}

#[test]
fn observation_exposes_fields() {
    let observation = Observation::new("Device", "HX1 Temp", "ns=2;i=1", 21.5, 42);
    assert_eq!(observation.server_name(), "Device");
    assert_eq!(observation.tag(), "HX1 Temp");
    assert_eq!(observation.node_id(), "ns=2;i=1");
    assert_eq!(observation.value(), 21.5);
    assert_eq!(observation.source_ts_ms(), 42);
}
