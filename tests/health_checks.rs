mod common;

use common::{FakeRemote, ruwai_line};
use ruwai_check::health::{
    ActivityVerdict, StatusCategory, extract_status, log_files, sample_activity, tail_matches,
};
use std::time::Duration;

#[test]
fn verdict_requires_strict_growth() {
    assert_eq!(ActivityVerdict::from_samples(100, 150), ActivityVerdict::LoggingActive);
    assert_eq!(ActivityVerdict::from_samples(150, 100), ActivityVerdict::LoggingInactive);
    assert_eq!(ActivityVerdict::from_samples(100, 100), ActivityVerdict::LoggingInactive);
}

#[test]
fn sampler_reports_both_samples() {
    let remote = FakeRemote::new("00006").with_sizes("100", "150");
    let mut seen = Vec::new();
    let sample = sample_activity(&remote, "/home/ruwai/ruwaicom/mseed_tmp", Duration::ZERO, |kb| seen.push(kb)).unwrap();
    assert_eq!(seen, [100]);
    assert_eq!(sample.first_kb, 100);
    assert_eq!(sample.second_kb, 150);
    assert_eq!(sample.verdict, ActivityVerdict::LoggingActive);
    let du: Vec<_> = remote.commands().into_iter().filter(|c| c.starts_with("du -s")).collect();
    assert_eq!(du.len(), 2);
    assert_eq!(du[0], du[1]);
}

#[test]
fn sampler_rejects_non_numeric_output() {
    let remote = FakeRemote::new("00006").with_sizes("du: cannot access", "150");
    assert!(sample_activity(&remote, "/x", Duration::ZERO, |_| {}).is_err());
}

fn write_logs(dir: &std::path::Path, files: &[(&str, Vec<String>)]) {
    for (name, lines) in files {
        std::fs::write(dir.join(name), lines.join("\n") + "\n").unwrap();
    }
}

#[test]
fn extract_keeps_last_ten_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..25).map(|i| ruwai_line(512, &format!("GPS_FIX {i}"))).collect();
    write_logs(dir.path(), &[("ruwai.log", lines)]);

    let files = log_files(dir.path(), "ruwai").unwrap();
    let pattern = StatusCategory::GpsFix.pattern("ruwaicom", &[512]).unwrap();
    let got = tail_matches(&files, &pattern, 10).unwrap();
    assert_eq!(got.len(), 10);
    assert!(got[0].ends_with("GPS_FIX 15"));
    assert!(got[9].ends_with("GPS_FIX 24"));
}

#[test]
fn no_match_is_empty_not_error() {
    let dir = tempfile::tempdir().unwrap();
    write_logs(dir.path(), &[("ruwai.log", vec![ruwai_line(512, "started")])]);
    let extracts = extract_status(dir.path(), "ruwai", "ruwaicom", &[512], 10).unwrap();
    let sd = extracts.iter().find(|e| e.category == StatusCategory::SdCard).unwrap();
    assert!(sd.lines.is_empty());
    let last = extracts.iter().find(|e| e.category == StatusCategory::LastOutput).unwrap();
    assert_eq!(last.lines.len(), 1);
}

#[test]
fn utc_lines_match_any_process_others_are_scoped() {
    let dir = tempfile::tempdir().unwrap();
    write_logs(
        dir.path(),
        &[(
            "ruwai.log",
            vec![
                ruwai_line(77, "SD card ok"),
                ruwai_line(77, "UTC_AVAILABLE 1"),
                ruwai_line(512, "SD card ok"),
                "Mar  1 10:00:01 ruwai gpsd[12]: UTC_AVAILABLE".to_string(),
            ],
        )],
    );
    let extracts = extract_status(dir.path(), "ruwai", "ruwaicom", &[512], 10).unwrap();
    let by = |c: StatusCategory| extracts.iter().find(|e| e.category == c).unwrap();

    assert_eq!(by(StatusCategory::SdCard).lines, vec![ruwai_line(512, "SD card ok")]);
    assert_eq!(by(StatusCategory::UtcAvailable).lines.len(), 2);
    assert_eq!(by(StatusCategory::LastOutput).lines.len(), 1);
}

#[test]
fn only_prefix_log_files_are_scanned_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_logs(
        dir.path(),
        &[
            ("ruwai.log.1", vec![ruwai_line(512, "older")]),
            ("ruwai.log", vec![ruwai_line(512, "newer")]),
            ("ruwaicom.txt", vec![ruwai_line(512, "ignored")]),
        ],
    );
    let files = log_files(dir.path(), "ruwai").unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, ["ruwai.log", "ruwai.log.1"]);

    let extracts = extract_status(dir.path(), "ruwai", "ruwaicom", &[512], 10).unwrap();
    let last = extracts.iter().find(|e| e.category == StatusCategory::LastOutput).unwrap();
    assert!(last.lines[0].ends_with("newer"));
    assert!(last.lines[1].ends_with("older"));
}

#[test]
fn invalid_utf8_lines_are_still_scanned() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = ruwai_line(512, "SD \u{0}").into_bytes();
    bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
    std::fs::write(dir.path().join("ruwai.log"), bytes).unwrap();
    let extracts = extract_status(dir.path(), "ruwai", "ruwaicom", &[512], 10).unwrap();
    assert_eq!(extracts[0].category, StatusCategory::SdCard);
    assert_eq!(extracts[0].lines.len(), 1);
}
