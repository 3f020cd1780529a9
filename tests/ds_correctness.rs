#![allow(clippy::unwrap_used, missing_docs)]

mod common;

use common::{MockBackingFs, mock_export};
use dsgate::ds::{DataServerWire, DsError, NfsStatus, REAP_AFTER_RELEASE, Stability};

fn wire(inode: u32) -> [u8; 4] {
    DataServerWire::new(inode).unwrap().encode(false)
}

#[test]
fn make_ds_handle_validates_the_wire_form() {
    let (export, _clock) = mock_export(MockBackingFs::default(), 100, 60);

    let err = export.make_ds_handle(&[1, 2], false).unwrap_err();
    assert_eq!(err.nfs_status(), NfsStatus::BadHandle);
    assert_eq!(err.nfs_status().code(), 10001);
    assert!(export.make_ds_handle(&[0, 0, 0, 0], true).is_err());

    let handle = export.make_ds_handle(&[0, 0, 0, 9], true).unwrap();
    assert_eq!(handle.inode(), 9);
    assert!(!handle.is_open(), "nothing is opened before the first I/O");
}

#[test]
fn io_on_one_handle_opens_the_file_once() {
    let (export, _clock) = mock_export(MockBackingFs::with_files([5]), 100, 60);

    let mut handle = export.make_ds_handle(&wire(5), false).unwrap();
    let written = handle.write(0, b"hello", Stability::Unstable).unwrap();
    assert_eq!(written.written, 5);
    let read = handle.read(0, 16).unwrap();
    assert_eq!(&read.data[..], b"hello");
    assert!(!read.eof);
    handle.commit(0, 5).unwrap();
    assert!(handle.is_open());

    assert_eq!(export.fs().opens(), 1);
    assert_eq!(export.stats().used, 1);
    drop(handle);
    assert_eq!(export.stats().used, 0);
    assert_eq!(export.stats().idle, 1);
}

#[test]
fn released_handle_is_reused_by_the_next_client() {
    let (export, _clock) = mock_export(MockBackingFs::with_files([5]), 100, 60);

    for _ in 0..3 {
        let mut handle = export.make_ds_handle(&wire(5), false).unwrap();
        handle.read(0, 1).unwrap();
        handle.release();
    }

    assert_eq!(export.fs().opens(), 1, "the pooled handle should be reused");
    let stats = export.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}

#[test]
fn read_past_end_reports_eof() {
    let (export, _clock) = mock_export(MockBackingFs::with_files([3]), 100, 60);

    let mut handle = export.make_ds_handle(&wire(3), false).unwrap();
    let read = handle.read(0, 4096).unwrap();
    assert!(read.data.is_empty());
    assert!(read.eof);
}

#[test]
fn failed_open_caches_nothing() {
    let fs = MockBackingFs::with_files([1]);
    fs.fail_open(1);
    let (export, _clock) = mock_export(fs, 100, 60);

    let mut handle = export.make_ds_handle(&wire(1), false).unwrap();
    let err = handle.read(0, 10).unwrap_err();
    assert!(matches!(err, DsError::Open { inode: 1, .. }), "{err:?}");
    assert_eq!(err.nfs_status(), NfsStatus::Io);
    assert!(!handle.is_open());

    let stats = export.stats();
    assert_eq!(stats.entries, 0, "the entry of a failed open is erased");
    assert_eq!(stats.erased, 1);
}

#[test]
fn missing_file_fails_write_with_open_error() {
    let (export, _clock) = mock_export(MockBackingFs::default(), 100, 60);

    let mut handle = export.make_ds_handle(&wire(77), false).unwrap();
    let err = handle.write(0, b"x", Stability::FileSync).unwrap_err();
    assert!(matches!(err, DsError::Open { .. }));
}

#[test]
fn unstable_writes_skip_the_flush() {
    let (export, _clock) = mock_export(MockBackingFs::with_files([2]), 100, 60);
    let mut handle = export.make_ds_handle(&wire(2), false).unwrap();

    let w = handle.write(0, b"abc", Stability::Unstable).unwrap();
    assert_eq!(w.committed, Stability::Unstable);
    assert_eq!(export.fs().flushes(), 0);

    let w = handle.write(3, b"def", Stability::DataSync).unwrap();
    assert_eq!(w.committed, Stability::DataSync);
    let w = handle.write(6, b"g", Stability::FileSync).unwrap();
    assert_eq!(w.committed, Stability::FileSync);
    assert_eq!(export.fs().flushes(), 2);

    drop(handle);
    assert_eq!(export.fs().contents(2), b"abcdefg");
}

#[test]
fn failed_flush_downgrades_write_stability() {
    let fs = MockBackingFs::with_files([2]);
    fs.set_fail_flush(true);
    let (export, _clock) = mock_export(fs, 100, 60);
    let mut handle = export.make_ds_handle(&wire(2), false).unwrap();

    let w = handle.write(0, b"data", Stability::FileSync).unwrap();
    assert_eq!(w.written, 4, "the write itself succeeded");
    assert_eq!(w.committed, Stability::Unstable);
}

#[test]
fn commit_without_openable_file_succeeds() {
    let fs = MockBackingFs::with_files([4]);
    fs.fail_open(4);
    let (export, _clock) = mock_export(fs, 100, 60);

    let mut handle = export.make_ds_handle(&wire(4), false).unwrap();
    handle.commit(0, 100).unwrap();
    assert_eq!(export.fs().flushes(), 0);
}

#[test]
fn failed_commit_flush_is_inval() {
    let fs = MockBackingFs::with_files([4]);
    fs.set_fail_flush(true);
    let (export, _clock) = mock_export(fs, 100, 60);

    let mut handle = export.make_ds_handle(&wire(4), false).unwrap();
    let err = handle.commit(0, 100).unwrap_err();
    assert!(matches!(err, DsError::Commit { inode: 4, .. }));
    assert_eq!(err.nfs_status(), NfsStatus::Inval);
}

#[test]
fn release_reaps_a_bounded_number_of_expired_entries() {
    let fs = MockBackingFs::with_files(1..=20);
    let (export, clock) = mock_export(fs, 100, 1);

    for inode in 1..=7 {
        let mut handle = export.make_ds_handle(&wire(inode), false).unwrap();
        handle.read(0, 1).unwrap();
    }
    assert_eq!(export.stats().idle, 7, "nothing expired yet");

    clock.advance(1_000);
    drop(export.make_ds_handle(&wire(20), false).unwrap());
    assert_eq!(export.fs().closes(), REAP_AFTER_RELEASE as u64);
    assert_eq!(export.stats().idle, 2);

    let mut handle = export.make_ds_handle(&wire(8), false).unwrap();
    handle.read(0, 1).unwrap();
    assert_eq!(export.fs().closes(), 7, "opening reaps the remaining two");
    drop(handle);
    assert_eq!(export.stats().entries, 1);
}

#[test]
fn over_capacity_export_drains_on_release() {
    let fs = MockBackingFs::with_files(1..=10);
    let (export, _clock) = mock_export(fs, 2, 3600);

    let mut held: Vec<_> = (1..=6)
        .map(|inode| export.make_ds_handle(&wire(inode), false).unwrap())
        .collect();
    for handle in &mut held {
        handle.read(0, 1).unwrap();
    }
    assert_eq!(export.stats().entries, 6);

    drop(held);
    assert_eq!(
        export.stats().entries,
        2,
        "releases reap down to capacity despite the long timeout"
    );
    assert_eq!(export.fs().open_count(), 2);
}

#[test]
fn shutdown_closes_every_handle() {
    let fs = MockBackingFs::with_files(1..=5);
    let (export, _clock) = mock_export(fs.clone(), 100, 3600);

    for inode in 1..=5 {
        let mut handle = export.make_ds_handle(&wire(inode), false).unwrap();
        handle.write(0, b"z", Stability::Unstable).unwrap();
    }
    assert_eq!(fs.open_count(), 5, "idle handles stay open within the timeout");

    export.shutdown();
    assert_eq!(fs.open_count(), 0);
    assert_eq!(fs.closes(), 5);
}
