mod common;

use common::{Call, FakeRemote};
use ruwai_check::harvest::{harvest, select_logs};

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn selection_by_first_segment() {
    let entries = names(&["ruwai.log", "ruwai.log.1", "system.log", "ruwaicom.txt"]);
    assert_eq!(
        select_logs(&entries, "ruwai"),
        names(&["ruwai.log", "ruwai.log.1", "ruwaicom.txt"])
    );
}

#[test]
fn selection_ignores_names_with_other_first_segment() {
    let entries = names(&["syslog.ruwai", ".ruwai", "kern.log", "Ruwai.log"]);
    assert!(select_logs(&entries, "ruwai").is_empty());
}

#[test]
fn copies_selected_files_by_name() {
    let remote = FakeRemote::new("00006")
        .with_log("ruwai.log", "a\n")
        .with_log("ruwai.log.1", "bb\n");
    let dest = tempfile::tempdir().unwrap();

    let files = harvest(&remote, "/var/log/", "ruwai", dest.path()).into_result().unwrap();

    let got: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(got, ["ruwai.log", "ruwai.log.1"]);
    assert_eq!(files[1].bytes, 3);
    assert_eq!(files[0].sha256.len(), 64);
    assert_eq!(std::fs::read_to_string(dest.path().join("ruwai.log.1")).unwrap(), "bb\n");
    assert!(!dest.path().join("system.log").exists());

    let listings = remote
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::ListDir(_)))
        .count();
    assert_eq!(listings, 1);
    assert!(remote.calls().contains(&Call::FetchFile("/var/log/ruwai.log.1".into())));
}

#[test]
fn first_failed_copy_stops_the_batch() {
    let mut remote = FakeRemote::new("00006")
        .with_log("ruwai.log", "a\n")
        .with_log("ruwai.log.1", "b\n")
        .with_log("ruwai.log.2", "c\n");
    remote.fail_fetch_file = Some("ruwai.log.1".into());
    let dest = tempfile::tempdir().unwrap();

    let partial = harvest(&remote, "/var/log/", "ruwai", dest.path());
    assert!(partial.error.is_some());
    let got: Vec<_> = partial.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(got, ["ruwai.log"]);
    assert_eq!(partial.files[0].bytes, 2);
    assert!(dest.path().join("ruwai.log").exists());
    assert!(!remote.calls().contains(&Call::FetchFile("/var/log/ruwai.log.2".into())));
}
