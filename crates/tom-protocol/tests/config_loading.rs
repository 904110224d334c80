//! Peer table and dictionary files on disk.

use std::io::Write;

use tom_protocol::{Dictionary, NodeId, PeerAddr, PeerTable, RuntimeConfig, TomProtocolError};

fn write_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_six_member_table() {
    let file = write_file(
        "# pid host port\n\
         1 192.168.1.10 5001\n\
         2 192.168.1.11 5002\n\
         3 192.168.1.12 5003\n\
         4 192.168.1.13 5004\n\
         5 192.168.1.14 5005\n\
         6 192.168.1.15 5006\n",
    );
    let table = PeerTable::load(file.path()).unwrap();

    assert_eq!(table.len(), 6);
    assert_eq!(
        table.addr_of(NodeId::new(5)),
        Some(&PeerAddr::new("192.168.1.15", 5006))
    );
    let ids: Vec<_> = table.ids().collect();
    assert_eq!(ids.first(), Some(&NodeId::new(0)));
    assert_eq!(ids.last(), Some(&NodeId::new(5)));

    let map = table.to_transport_map();
    assert_eq!(map.len(), 6);
    assert_eq!(map[&NodeId::new(0)].port, 5001);
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip_table.txt");
    let err = PeerTable::load(&path).unwrap_err();
    assert!(matches!(err, TomProtocolError::ReadFile { .. }));
    assert!(err.to_string().contains("ip_table.txt"));
}

#[test]
fn loads_dictionary_with_accents() {
    let file = write_file("maçã\n  pêra  \na\n123\nguarda-chuva\r\n");
    let dict = Dictionary::load(file.path()).unwrap();
    assert_eq!(dict.words(), ["maçã", "pêra", "guarda-chuva"]);
}

#[test]
fn unusable_dictionary_refuses_to_start() {
    let file = write_file("1\n2\n?\n");
    assert!(matches!(
        Dictionary::load(file.path()),
        Err(TomProtocolError::Config(_))
    ));
}

#[test]
fn loaded_files_feed_a_runtime_config() {
    let table = write_file("1 127.0.0.1 7001\n2 127.0.0.1 7002\n");
    let dict = write_file("alfa\nbravo\n");
    let table = PeerTable::load(table.path()).unwrap();
    let words = Dictionary::load(dict.path()).unwrap().into_words();

    assert!(RuntimeConfig::new(NodeId::new(1), table.clone(), words.clone())
        .validate()
        .is_ok());
    assert!(RuntimeConfig::new(NodeId::new(2), table, words)
        .validate()
        .is_err());
}
