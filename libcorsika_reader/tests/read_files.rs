use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};

use libcorsika_reader::constants::{MAGIC_NUMBER, SYNC_MARKER, TYPE_RUN_END};
use libcorsika_reader::corsika_read::CorsikaRead;
use libcorsika_reader::error::{CorsikaFormatError, CorsikaReadError};
use libcorsika_reader::eventio_format::pack_type_version;
use libcorsika_reader::format::corsika_format_factory;

const BLOCK_WORDS: usize = 272;

fn block(tag: &[u8; 4], values: &[(usize, f32)]) -> Vec<u8> {
    let mut words = vec![0.0f32; BLOCK_WORDS];
    for (idx, value) in values {
        words[*idx] = *value;
    }
    let mut bytes = tag.to_vec();
    bytes.extend(words.iter().flat_map(|w| w.to_le_bytes()));
    bytes
}

fn event_header(event_number: f32) -> Vec<u8> {
    block(
        b"EVTH",
        &[(0, event_number), (1, 14.0), (2, 500.0), (83, 1.0), (96, 1.0)],
    )
}

/// A raw run with `n_events` showers of one payload sub-block each
fn raw_run(run_number: f32, n_events: usize, with_trailer: bool) -> Vec<u8> {
    let mut bytes = block(b"RUNH", &[(0, run_number), (3, 1.0), (4, 150000.0)]);
    for evt in 1..=n_events {
        bytes.extend(event_header(evt as f32));
        bytes.extend([0u8; (BLOCK_WORDS + 1) * 4]);
        bytes.extend(block(b"EVTE", &[(0, evt as f32), (1, 10.0)]));
    }
    if with_trailer {
        bytes.extend(block(b"RUNE", &[(0, run_number), (1, n_events as f32)]));
    }
    bytes
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_factory_detects_formats() {
    let dir = tempfile::tempdir().unwrap();

    let raw = write_file(dir.path(), "DAT000001", &raw_run(1.0, 1, true));
    assert!(!corsika_format_factory(&raw).unwrap().is_eventio_format());

    let mut magic = MAGIC_NUMBER.to_le_bytes().to_vec();
    magic.extend(raw_run(2.0, 1, true));
    let magic = write_file(dir.path(), "DAT000002", &magic);
    assert!(!corsika_format_factory(&magic).unwrap().is_eventio_format());

    let mut eventio = SYNC_MARKER.to_le_bytes().to_vec();
    eventio.extend(pack_type_version(TYPE_RUN_END, 0).to_le_bytes());
    eventio.extend([0u8; 8]);
    let eventio = write_file(dir.path(), "DAT000003.eventio", &eventio);
    assert!(corsika_format_factory(&eventio).unwrap().is_eventio_format());
}

#[test]
fn test_factory_rejects_bad_files() {
    let dir = tempfile::tempdir().unwrap();

    let junk = write_file(dir.path(), "junk.dat", b"JUNKJUNKJUNKJUNK");
    assert!(matches!(
        corsika_format_factory(&junk),
        Err(CorsikaFormatError::UnrecognizedFormat(_))
    ));

    let empty = write_file(dir.path(), "empty.dat", &[]);
    assert!(matches!(
        corsika_format_factory(&empty),
        Err(CorsikaFormatError::UnrecognizedFormat(_))
    ));

    assert!(matches!(
        corsika_format_factory(&dir.path().join("missing.dat")),
        Err(CorsikaFormatError::OpenFailed(_, _))
    ));

    let not_gzip = write_file(dir.path(), "broken.gz", b"RUNH but not compressed");
    assert!(matches!(
        corsika_format_factory(&not_gzip),
        Err(CorsikaFormatError::DecompressionFailed(_, _))
    ));
}

#[test]
fn test_read_gzip_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw_run(4.0, 2, true)).unwrap();
    let path = write_file(dir.path(), "DAT000004.gz", &encoder.finish().unwrap());

    let mut reader = CorsikaRead::new(Some(path.as_path()));
    assert_eq!(reader.calc_num_total_events().unwrap(), 2);
    let mut n_events = 0;
    while let Some(event) = reader.next_event().unwrap() {
        n_events += 1;
        assert_eq!(event.header.get_evt_number(), n_events);
        assert_eq!(event.header.get_total_energy(), 500.0);
    }
    assert_eq!(n_events, 2);
    assert_eq!(reader.get_run_header().get_particle_id(), 14);
}

#[test]
fn test_read_file_list() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(dir.path(), "DAT000005", &raw_run(5.0, 3, true));
    let mut with_magic = MAGIC_NUMBER.to_le_bytes().to_vec();
    with_magic.extend(raw_run(6.0, 2, true));
    // Record length word closing the Fortran record
    with_magic.extend(MAGIC_NUMBER.to_le_bytes());
    let second = write_file(dir.path(), "DAT000006", &with_magic);

    let mut reader = CorsikaRead::new(Some(first.as_path()));
    reader.add_file(&second);
    assert_eq!(reader.calc_num_total_events().unwrap(), 5);

    let mut runs = Vec::new();
    while let Some(_event) = reader.next_event().unwrap() {
        runs.push(reader.get_run_header().get_run_number());
    }
    assert_eq!(runs, vec![5, 5, 5, 6, 6]);
    assert_eq!(reader.get_num_events(), 5);

    reader.rewind().unwrap();
    assert!(reader.next_event().unwrap().is_some());
    assert_eq!(reader.get_run_header().get_run_number(), 5);
}

#[test]
fn test_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "DAT000007", &raw_run(7.0, 2, false));

    let mut reader = CorsikaRead::new(Some(path.as_path()));
    assert!(matches!(
        reader.calc_num_total_events(),
        Err(CorsikaReadError::MissingTrailer(_))
    ));

    let mut reader = CorsikaRead::new(Some(path.as_path()));
    reader.set_force_mode(true);
    assert_eq!(reader.calc_num_total_events().unwrap(), 0);
    let mut n_events = 0;
    while reader.next_event().unwrap().is_some() {
        n_events += 1;
    }
    assert_eq!(n_events, 2);
}
