use ruwai_check::{
    archive::{self, SessionPhase},
    registry::DeviceIdentity,
};
use time::macros::date;

fn obs() -> DeviceIdentity {
    DeviceIdentity {
        serial: "00006".into(),
        network: "SBK_stations".into(),
        station: "OBS".into(),
    }
}

#[test]
fn before_exchange_path_layout() {
    let base = tempfile::tempdir().unwrap();
    let paths = archive::build(base.path(), &obs(), SessionPhase::BeforeExchange, date!(2024 - 03 - 01)).unwrap();
    assert_eq!(
        paths.local_dest,
        base.path().join("2024/SBK_stations/sr20240301/OBS_sn_00006_1_BEX")
    );
    assert_eq!(paths.log_dest, paths.local_dest.join("var_log"));
    assert!(paths.local_dest.is_dir());
    assert!(paths.log_dest.is_dir());
}

#[test]
fn phase_suffixes() {
    let base = tempfile::tempdir().unwrap();
    let d = date!(2024 - 03 - 01);
    let after = archive::plan(base.path(), &obs(), SessionPhase::AfterExchange, d);
    assert!(after.local_dest.to_string_lossy().ends_with("_2_AEX"));
    let none = archive::plan(base.path(), &obs(), SessionPhase::Unspecified, d);
    let s = none.local_dest.to_string_lossy().to_string();
    assert!(s.ends_with("OBS_sn_00006"));
    assert!(!s.contains("_BEX") && !s.contains("_AEX"));
}

#[test]
fn build_is_deterministic_and_idempotent() {
    let base = tempfile::tempdir().unwrap();
    let d = date!(2024 - 03 - 01);
    let first = archive::build(base.path(), &obs(), SessionPhase::AfterExchange, d).unwrap();
    std::fs::write(first.log_dest.join("ruwai.log"), "kept").unwrap();
    let second = archive::build(base.path(), &obs(), SessionPhase::AfterExchange, d).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        std::fs::read_to_string(second.log_dest.join("ruwai.log")).unwrap(),
        "kept"
    );
}

#[test]
fn unknown_identity_still_gets_a_path() {
    let base = tempfile::tempdir().unwrap();
    let id = DeviceIdentity {
        serial: "FFFFF".into(),
        network: "unknown_network".into(),
        station: "unknown_station".into(),
    };
    let paths = archive::build(base.path(), &id, SessionPhase::Unspecified, date!(2025 - 12 - 31)).unwrap();
    assert_eq!(
        paths.local_dest,
        base.path().join("2025/unknown_network/sr20251231/unknown_station_sn_FFFFF")
    );
}

#[test]
fn blocked_path_is_an_error() {
    let base = tempfile::tempdir().unwrap();
    std::fs::write(base.path().join("2024"), "not a directory").unwrap();
    let res = archive::build(base.path(), &obs(), SessionPhase::BeforeExchange, date!(2024 - 03 - 01));
    assert!(res.is_err());
}

#[test]
fn phase_choice_mapping() {
    assert_eq!(SessionPhase::from_choice("1"), SessionPhase::BeforeExchange);
    assert_eq!(SessionPhase::from_choice(" 2\n"), SessionPhase::AfterExchange);
    assert_eq!(SessionPhase::from_choice("3"), SessionPhase::Unspecified);
    assert_eq!(SessionPhase::from_choice(""), SessionPhase::Unspecified);
}
