//! On-disk storage: shadow files, write avoidance, source protection.


use asn_fixtures::{example_asn, index_of, library};
use modelshelf::{DataModel, JsonFormat, LibraryConfig, ModelLibrary};
use serde_json::Value;

#[test]
fn test_unmodified_shelve_writes_no_shadow() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    lib.open().expect("open");

    let mut loan = lib.borrow(0).expect("borrow");
    loan.set_meta("scratch", Value::from("discard me"));
    lib.shelve_with(loan, false).expect("shelve unmodified");
    assert!(lib.shadow_path(0).is_none());

    let loan = lib.borrow(0).expect("borrow again");
    assert!(loan.meta("scratch").is_none());
    assert_eq!(index_of(&loan), 0);
    lib.shelve(loan).expect("shelve");
    lib.close().expect("close");

    let stats = lib.store_stats();
    assert_eq!(stats.skipped_writes, 1);
    assert_eq!(stats.source_loads, 2);
}

#[test]
fn test_borrow_with_false_skips_the_write() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    lib.open().expect("open");
    let loan = lib.borrow_with(1, false).expect("borrow");
    lib.shelve(loan).expect("shelve");
    assert!(lib.shadow_path(1).is_none());
    assert_eq!(lib.store_stats().shadow_writes, 0);
    lib.close().expect("close");
}

#[test]
fn test_modified_model_survives_reopen() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);

    lib.open().expect("open");
    let mut loan = lib.borrow(2).expect("borrow");
    loan.set_meta("calibrated", Value::Bool(true));
    lib.shelve_with(loan, true).expect("shelve modified");
    lib.close().expect("close");

    lib.open().expect("reopen");
    let loan = lib.borrow(2).expect("borrow again");
    assert_eq!(loan.meta("calibrated"), Some(&Value::Bool(true)));
    lib.shelve(loan).expect("shelve");
    lib.close().expect("close");

    let stats = lib.store_stats();
    assert_eq!(stats.shadow_writes, 2);
    assert_eq!(stats.shadow_loads, 1);
}

#[test]
fn test_unmodified_shelve_keeps_existing_shadow() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    lib.open().expect("open");

    let mut loan = lib.borrow(0).expect("borrow");
    loan.set_meta("step", Value::from(1));
    lib.shelve(loan).expect("shelve modified");

    let mut loan = lib.borrow(0).expect("borrow");
    loan.set_meta("step", Value::from(2));
    lib.shelve_with(loan, false).expect("shelve unmodified");

    let loan = lib.borrow(0).expect("borrow");
    assert_eq!(loan.meta("step"), Some(&Value::from(1)));
    lib.shelve(loan).expect("shelve");
    lib.close().expect("close");
}

#[test]
fn test_source_files_are_never_altered() {
    let fixture = example_asn();
    let before = fixture.member_bytes();
    let mut lib = library(&fixture, true);

    lib.open().expect("open");
    for i in 0..lib.len() {
        let mut loan = lib.borrow(i).expect("borrow");
        loan.set_meta("touched", Value::from(i));
        loan.data = Value::Null;
        lib.shelve_with(loan, i % 2 == 0).expect("shelve");
    }
    for i in 0..lib.len() {
        let loan = lib.borrow(i).expect("borrow");
        lib.shelve(loan).expect("shelve");
    }
    lib.close().expect("close");
    lib.save(fixture.dir.path().join("out")).expect("save elsewhere");

    assert_eq!(fixture.member_bytes(), before);
}

#[test]
fn test_shadow_files_live_in_the_workspace() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    let workspace = lib.workspace().expect("workspace").to_path_buf();
    assert!(workspace.is_dir());

    lib.open().expect("open");
    let loan = lib.borrow(1).expect("borrow");
    lib.shelve(loan).expect("shelve");
    lib.close().expect("close");

    let shadow = lib.shadow_path(1).expect("shadow").to_path_buf();
    assert!(shadow.starts_with(&workspace));
    assert_eq!(shadow, workspace.join("1").join("1.json"));
    assert_ne!(shadow, fixture.member_path(1));
    assert!(shadow.is_file());

    drop(lib);
    assert!(!workspace.exists(), "private workspace removed with the library");
}

#[test]
fn test_configured_temp_directory_is_kept() {
    let fixture = example_asn();
    let temp = tempfile::tempdir().expect("tempdir");
    let cfg = LibraryConfig {
        on_disk: true,
        temp_directory: Some(temp.path().join("shadows").to_string_lossy().into_owned()),
        ..Default::default()
    };
    let mut lib = ModelLibrary::new(JsonFormat::default(), fixture.asn_path.as_path(), &cfg)
        .expect("library");

    lib.open().expect("open");
    let loan = lib.borrow(0).expect("borrow");
    lib.shelve(loan).expect("shelve");
    lib.close().expect("close");
    let shadow = lib.shadow_path(0).expect("shadow").to_path_buf();
    assert!(shadow.starts_with(temp.path().join("shadows")));

    drop(lib);
    assert!(shadow.is_file());
}

#[test]
fn test_renamed_model_replaces_its_shadow() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    lib.open().expect("open");

    let loan = lib.borrow(0).expect("borrow");
    lib.shelve(loan).expect("shelve");
    let first = lib.shadow_path(0).expect("shadow").to_path_buf();

    let mut loan = lib.borrow(0).expect("borrow");
    loan.set_meta("filename", Value::from("renamed.json"));
    lib.shelve(loan).expect("shelve renamed");
    let second = lib.shadow_path(0).expect("shadow").to_path_buf();

    assert_ne!(first, second);
    assert!(!first.exists());
    assert!(second.ends_with("renamed.json"));

    let loan = lib.borrow(0).expect("borrow");
    assert_eq!(loan.meta_str("filename"), Some("renamed.json"));
    lib.shelve(loan).expect("shelve");
    lib.close().expect("close");
}

#[test]
fn test_in_memory_library_has_no_workspace() {
    let fixture = example_asn();
    let mut lib = library(&fixture, false);
    assert!(lib.workspace().is_none());
    assert!(!lib.on_disk());

    lib.open().expect("open");
    let loan = lib.borrow(0).expect("borrow");
    lib.shelve(loan).expect("shelve");
    let loan = lib.borrow(0).expect("borrow");
    lib.shelve(loan).expect("shelve");
    lib.close().expect("close");

    assert!(lib.shadow_path(0).is_none());
    let stats = lib.store_stats();
    assert_eq!(stats.source_loads, 1);
    assert_eq!(stats.resident_hits, 1);
}
