//! Iteration, map_function, save/reload and step hooks.


use asn_fixtures::{config, example_asn, index_of, library};
use modelshelf::{
    DataModel, FinalizeInfo, JsonFormat, JsonModel, LibraryError, LibraryInit, ModelLibrary,
};
use serde_json::Value;

#[test]
fn test_iteration_yields_every_index_in_order() {
    for on_disk in [false, true] {
        let fixture = example_asn();
        let mut lib = library(&fixture, on_disk);
        lib.open().expect("open");
        let mut seen = Vec::new();
        let mut models = lib.iter();
        while let Some(loan) = models.next() {
            let loan = loan.expect("borrow");
            seen.push((loan.index(), index_of(&loan)));
            models.shelve_with(loan, false).expect("shelve");
        }
        lib.close().expect("close");
        assert_eq!(seen, [(0, 0), (1, 1), (2, 2)]);
    }
}

#[test]
fn test_iteration_on_closed_library_fails() {
    let fixture = example_asn();
    let mut lib = library(&fixture, false);
    let mut models = lib.iter();
    assert!(matches!(models.next(), Some(Err(LibraryError::ClosedLibrary))));
    assert!(models.next().is_none());
}

#[test]
fn test_iteration_does_not_shelve_for_you() {
    let fixture = example_asn();
    let mut lib = library(&fixture, false);
    lib.open().expect("open");
    let loans: Vec<_> = lib.iter().collect::<Result<_, _>>().expect("borrow all");
    assert_eq!(lib.borrowed_indices(), vec![0, 1, 2]);
    assert!(lib.close().is_err());
    for loan in loans {
        lib.shelve(loan).expect("shelve");
    }
    lib.close().expect("close");
}

#[test]
fn test_map_function_opens_and_closes() {
    for on_disk in [false, true] {
        let fixture = example_asn();
        let mut lib = library(&fixture, on_disk);
        let values: Vec<(usize, u64)> = lib
            .map_function(|m, i| (i, index_of(m)), false)
            .collect::<Result<_, _>>()
            .expect("map");
        assert_eq!(values, [(0, 0), (1, 1), (2, 2)]);
        assert!(!lib.is_open());
    }
}

#[test]
fn test_map_function_is_lazy_and_restartable() {
    let fixture = example_asn();
    let mut lib = library(&fixture, false);
    let mut calls = 0;
    {
        let pass = lib.map_function(
            |_, _| {
                calls += 1;
            },
            true,
        );
        drop(pass);
    }
    assert_eq!(calls, 0);
    assert!(!lib.is_open());

    let first: Vec<usize> = lib
        .map_function(|_, i| i, false)
        .collect::<Result<_, _>>()
        .expect("first pass");
    let second: Vec<usize> = lib
        .map_function(|_, i| i, false)
        .collect::<Result<_, _>>()
        .expect("second pass");
    assert_eq!(first, second);
}

#[test]
fn test_map_function_modifications_persist_on_disk() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    for result in lib.map_function(|m, i| m.set_meta("visited", Value::from(i)), true) {
        result.expect("map");
    }
    let visited: Vec<Option<u64>> = lib
        .map_function(|m, _| m.meta("visited").and_then(Value::as_u64), false)
        .collect::<Result<_, _>>()
        .expect("read back");
    assert_eq!(visited, [Some(0), Some(1), Some(2)]);
    assert_eq!(lib.store_stats().shadow_writes, 3);
}

#[test]
fn test_map_function_inside_a_session() {
    let fixture = example_asn();
    let mut lib = library(&fixture, false);
    lib.open().expect("open");
    let n = lib.map_function(|_, _| (), false).count();
    assert_eq!(n, 3);
    assert!(lib.is_open());
    lib.close().expect("close");
}

#[test]
fn test_map_function_stops_on_borrowed_index() {
    let fixture = example_asn();
    let mut lib = library(&fixture, false);
    lib.open().expect("open");
    let held = lib.borrow(1).expect("borrow");
    let results: Vec<_> = lib.map_function(|_, i| i, false).collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Ok(0)));
    assert!(matches!(results[1], Err(LibraryError::Borrow(_))));
    lib.shelve(held).expect("shelve");
    lib.close().expect("close");
}

#[test]
fn test_save_and_reload_is_equivalent() {
    for on_disk in [false, true] {
        let fixture = example_asn();
        let mut lib = library(&fixture, on_disk);
        lib.open().expect("open");
        let mut loan = lib.borrow(0).expect("borrow");
        loan.set_meta("calibrated", Value::Bool(true));
        lib.shelve(loan).expect("shelve");
        lib.close().expect("close");

        let out = fixture.dir.path().join("saved");
        let asn_path = lib.save(&out).expect("save");
        assert_eq!(asn_path, out.join("asn.json"));
        assert!(!lib.is_open());

        let mut reloaded = ModelLibrary::from_asn_path(JsonFormat::default(), &asn_path)
            .expect("reload");
        assert_eq!(reloaded.len(), lib.len());
        assert_eq!(
            reloaded.group_names().expect("names"),
            lib.group_names().expect("names")
        );
        let calibrated: Vec<bool> = reloaded
            .map_function(|m, _| m.meta("calibrated").is_some(), false)
            .collect::<Result<_, _>>()
            .expect("map");
        assert_eq!(calibrated, [true, false, false]);
    }
}

#[test]
fn test_save_refuses_to_overwrite_inputs() {
    for on_disk in [false, true] {
        let fixture = example_asn();
        let sources = fixture.member_bytes();
        let manifest = std::fs::read(&fixture.asn_path).expect("read asn");

        let mut lib = library(&fixture, on_disk);
        let err = lib.save(fixture.dir.path()).expect_err("asn.json is an input");
        assert!(matches!(err, LibraryError::WouldOverwriteInput(p) if p.ends_with("asn.json")));
        assert_eq!(std::fs::read(&fixture.asn_path).expect("read asn"), manifest);
        assert_eq!(fixture.member_bytes(), sources);
        assert!(!lib.is_open());
    }

    // Manifest under another name: the first member source is the clash.
    let fixture = example_asn();
    let sources = fixture.member_bytes();
    let renamed = fixture.dir.path().join("input_asn.json");
    std::fs::rename(&fixture.asn_path, &renamed).expect("rename asn");
    let mut lib = ModelLibrary::from_asn_path(JsonFormat::default(), &renamed).expect("library");
    let err = lib.save(fixture.dir.path()).expect_err("member 0 is an input");
    assert!(matches!(err, LibraryError::WouldOverwriteInput(p) if p == fixture.member_path(0)));
    assert_eq!(fixture.member_bytes(), sources);
    assert!(!fixture.dir.path().join("asn.json").exists());
    assert!(lib.borrowed_indices().is_empty());
    assert!(!lib.is_open());
}

#[test]
fn test_crds_parameters_use_one_member() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    let params = lib.get_crds_parameters().expect("crds");
    assert_eq!(params.get("meta.filename"), Some(&Value::from("0.json")));
    assert_eq!(params.get("meta.asn.pool_name"), Some(&Value::from("pool")));
    assert_eq!(lib.store_stats().source_loads, 1);
    assert_eq!(lib.crds_observatory(), "jwst");
    assert!(!lib.is_open());
}

#[test]
fn test_crds_parameters_inside_open_session() {
    let fixture = example_asn();
    let mut lib = library(&fixture, false);
    lib.open().expect("open");
    let params = lib.get_crds_parameters().expect("crds");
    assert!(params.contains_key("meta.group_id"));
    assert!(lib.is_open());
    lib.close().expect("close");
}

fn stamp_group(model: &mut JsonModel, info: &FinalizeInfo<'_>) -> modelshelf::Result<()> {
    model.set_meta("finalized_group", Value::from(info.group_id));
    model.set_meta("refs", Value::from(info.reference_files_used.to_vec()));
    Ok(())
}

#[test]
fn test_finalize_result_visits_every_model() {
    let fixture = example_asn();
    let mut lib = library(&fixture, true);
    let refs = vec!["jwst_flat_0001.fits".to_string()];
    let mut step = stamp_group;
    lib.finalize_result(&mut step, &refs).expect("finalize");
    assert!(!lib.is_open());

    let stamped: Vec<(String, usize)> = lib
        .map_function(
            |m, _| {
                let group = m.meta_str("finalized_group").unwrap_or_default().to_string();
                let refs = m.meta("refs").and_then(Value::as_array).map_or(0, Vec::len);
                (group, refs)
            },
            false,
        )
        .collect::<Result<_, _>>()
        .expect("map");
    assert_eq!(
        stamped,
        [("1".to_string(), 1), ("1".to_string(), 1), ("2".to_string(), 1)]
    );
}

#[test]
fn test_existing_library_is_aliased() {
    let fixture = example_asn();
    let lib = library(&fixture, false);
    let id = lib.id();
    let again = ModelLibrary::new(JsonFormat::default(), LibraryInit::Library(lib), &config(true))
        .expect("alias");
    assert_eq!(again.id(), id);
    assert!(!again.on_disk());
}
