use std::io::Write;

use vald_ingest::{LineStore, ValdReader};

const LINE_TIO: &str = "'TiO 1',4100.00020,-11.472,0.2011,31.0,3.2242,32.0,99.000,99.000,99.000,6.962,0.000,0.000,";
const LINE_FE: &str = "'Fe 2',4101.27300,-2.100,1.0400,2.5,4.0600,1.5,99.000,99.000,99.000,8.100,-6.120,-7.800,";

fn reader_over(dir: &std::path::Path, name: &str, body: &str) -> ValdReader {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    ValdReader::new(Some(path.to_str().unwrap().to_string()))
}

#[test]
fn test_export_and_read_back_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let reader = reader_over(dir.path(), "lines.dat", &format!("{}\n{}\n", LINE_TIO, LINE_FE));

    let out = dir.path().join("store");
    reader.export(&out).unwrap();

    let store = LineStore::open(&out).unwrap();
    let raw = store.read_raw().unwrap();
    let parsed = store.read_parsed().unwrap();

    assert_eq!(&raw, reader.raw().unwrap());
    assert_eq!(&parsed, reader.parsed().unwrap());
    assert_eq!(raw.len(), 2);
    assert_eq!(parsed.records[1].molecule, "Fe");
    assert_eq!(parsed.records[1].ion_charge, "2");
}

#[test]
fn test_export_overwrites_prior_store_content() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("store");

    let first = reader_over(dir.path(), "first.dat", &format!("{}\n{}\n", LINE_TIO, LINE_FE));
    first.export(&out).unwrap();

    let second = reader_over(dir.path(), "second.dat", &format!("{}\n", LINE_FE));
    second.export(&out).unwrap();

    let store = LineStore::open(&out).unwrap();
    let raw = store.read_raw().unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw.records[0].elm_ion, "'Fe 2'");
    assert_eq!(&raw, second.raw().unwrap());
}

#[test]
fn test_empty_table_round_trips_with_schema() {
    let dir = tempfile::tempdir().unwrap();
    let reader = reader_over(dir.path(), "empty.dat", "nothing matches here\n");

    let out = dir.path().join("store");
    reader.export(&out).unwrap();

    let store = LineStore::open(&out).unwrap();
    assert!(store.read_raw().unwrap().is_empty());
    assert!(store.read_parsed().unwrap().is_empty());
}

#[test]
fn test_export_into_unwritable_destination_fails() {
    let dir = tempfile::tempdir().unwrap();
    let reader = reader_over(dir.path(), "lines.dat", &format!("{}\n", LINE_TIO));

    // A regular file where the store root should be.
    let blocked = dir.path().join("blocked");
    std::fs::File::create(&blocked).unwrap();

    assert!(reader.export(&blocked).is_err());
}
