use std::path::PathBuf;
use valohai_utils::distributed::Distributed;
use valohai_utils::ValohaiError;

const VALID_CONFIGS: &[&str] =
    &["exposed-ports.json", "is-master.json", "is-not-master.json", "network-host.json", "no-public-ips.json"];

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/distributed").join(name)
}

fn distributed(name: &str) -> Distributed {
    Distributed::new(fixture(name))
}

#[test]
fn test_parsing_basic_values() {
    for name in VALID_CONFIGS {
        let d = distributed(name);
        assert!(d.is_distributed_task(), "{name}");
        assert!(d.group_name().unwrap().starts_with("task-"));
        assert!(["0", "1", "2"].contains(&d.member_id().unwrap().as_str()));
        assert!(d.rank().unwrap() <= 2);
        assert_eq!(d.required_count().unwrap() as usize, d.members().unwrap().len());

        let members = d.members().unwrap();
        let mut ranks: Vec<_> = members.iter().map(|m| m.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (0..members.len()).collect::<Vec<_>>(), "ranks are dense in {name}");
        assert_eq!(members.iter().filter(|m| m.is_master()).count(), 1);
    }
}

#[test]
fn test_members_keep_file_order() {
    let d = distributed("is-master.json");
    let ids: Vec<_> = d.members().unwrap().into_iter().map(|m| (m.member_id, m.rank)).collect();
    assert_eq!(ids, vec![("2".to_string(), 2), ("0".to_string(), 0), ("1".to_string(), 1)]);
}

#[test]
fn test_missing_file() {
    let d = distributed("I do not exist.json");
    assert!(!d.is_distributed_task());
    assert!(matches!(d.group_name(), Err(ValohaiError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound));
}

#[test]
fn test_malformed_file() {
    let d = distributed("malformed.json");
    assert!(!d.is_distributed_task());
    assert!(matches!(d.group_name(), Err(ValohaiError::Json(_))));
}

#[test]
fn test_getting_member_by_id() {
    for name in VALID_CONFIGS {
        let d = distributed(name);
        let me = d.me().unwrap();
        let looked_up = d.member(&me.member_id).unwrap();
        assert_eq!(looked_up, me);
    }
}

#[test]
fn test_unable_to_find_member_by_id() {
    let err = distributed("is-master.json").member("1234").unwrap_err();
    let message = err.to_string();
    assert!(message.to_lowercase().contains("no member"));
    assert!(message.contains("1234"));
}

#[test]
fn test_master_as_master() {
    let d = distributed("is-master.json");
    let master = d.master().unwrap();
    assert_eq!(d.me().unwrap().member_id, master.member_id);
    assert_eq!(d.member_id().unwrap(), master.member_id);
    assert!(master.is_master());
    assert!(d.me().unwrap().is_master());
}

#[test]
fn test_master_as_non_master() {
    let d = distributed("is-not-master.json");
    let master = d.master().unwrap();
    assert_ne!(d.me().unwrap().member_id, master.member_id);
    assert!(master.is_master());
    assert!(!d.me().unwrap().is_master());
    assert_eq!(d.rank().unwrap(), 2);
}

#[test]
fn test_master_primary_ips() {
    for name in VALID_CONFIGS {
        assert!(!distributed(name).master().unwrap().primary_local_ip().unwrap().is_empty());
    }
    assert_eq!(distributed("network-host.json").master().unwrap().primary_public_ip().unwrap(), "35.228.40.1");
}

#[test]
fn test_no_public_ips() {
    let err = distributed("no-public-ips.json").master().unwrap().primary_public_ip().unwrap_err();
    assert!(err.to_string().to_lowercase().contains("no public ips"));
}

#[test]
fn test_exposed_ports() {
    let me = distributed("exposed-ports.json").me().unwrap();
    assert_eq!(me.exposed_ports.get("1234").map(String::as_str), Some("51234"));
}

#[test]
fn test_flush_rereads() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("distributed.json");
    std::fs::copy(fixture("is-master.json"), &path).unwrap();

    let d = Distributed::new(path.clone());
    assert_eq!(d.member_id().unwrap(), "0");

    std::fs::copy(fixture("is-not-master.json"), &path).unwrap();
    assert_eq!(d.member_id().unwrap(), "0", "cached until flushed");
    d.flush();
    assert_eq!(d.member_id().unwrap(), "2");
}
