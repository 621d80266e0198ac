//! Contract Invariant Tests
//!
//! These tests verify the guarantees callers rely on: validation before any
//! engine run, deterministic metafiles, and the engine process protocol.

use dggrid_core::{
    construct,
    construct::{specify_topo_aperture, ApertureSetting, TopoApertureOptions},
    metafile::{compile_generate_grid, compile_output_stats},
    select, stats::parse_grid_stats, ApertureType, ClipConfig, ClipSubsetType, ConstructParams,
    DggridError, GridType, MetafileKey, OutputConfig, OutputSpec, OutputType, SelectOverrides,
    Topology,
};

const PURE_HEXAGON_PRESETS: &[&str] = &[
    "ISEA3H", "ISEA4H", "ISEA7H", "FULLER3H", "FULLER4H", "FULLER7H",
];

fn resolution(res: u32) -> SelectOverrides {
    SelectOverrides { resolution: Some(res), ..Default::default() }
}

#[test]
fn invariant_preset_name_is_dggs_type() {
    for name in PURE_HEXAGON_PRESETS {
        let dggs = select(name, &resolution(5)).unwrap();
        let lines = compile_output_stats(&dggs).unwrap().lines();
        assert!(
            lines.contains(&format!("dggs_type {}", name)),
            "{} missing from {:?}",
            name,
            lines
        );
    }
}

#[test]
fn invariant_construct_needs_exactly_one_resolution_source() {
    let cases = [
        (None, None, None, None),
        (Some(4), Some(1.0), None, None),
        (None, None, Some(2.0), Some(3.0)),
        (Some(4), Some(1.0), Some(2.0), Some(3.0)),
    ];
    for (res, area, spacing, cls) in cases {
        let params = ConstructParams { resolution: res, area, spacing, cls, ..Default::default() };
        let err = construct(&params).unwrap_err();
        assert!(matches!(err, DggridError::InvalidConfiguration(_)), "{:?}", err);
    }

    let ok = ConstructParams { resolution: Some(4), ..Default::default() };
    assert!(construct(&ok).is_ok());

    // A single derived source passes the count check and reaches the stub.
    let area_only = ConstructParams { area: Some(1.0), ..Default::default() };
    assert!(matches!(construct(&area_only), Err(DggridError::NotImplemented(_))));
}

#[test]
fn invariant_topo_aperture_best_effort() {
    let options = TopoApertureOptions::default();

    let hex5 = specify_topo_aperture(Topology::Hexagon, ApertureType::Pure, 5, &options).unwrap();
    assert_eq!(hex5.aperture, ApertureSetting::Pure(3));
    assert!(hex5.diagnostic.is_some());

    let tri4 = specify_topo_aperture(Topology::Triangle, ApertureType::Pure, 4, &options).unwrap();
    assert_eq!(tri4.aperture, ApertureSetting::Pure(4));
    assert!(tri4.diagnostic.is_none());

    let mixed = specify_topo_aperture(Topology::Hexagon, ApertureType::Mixed43, 99, &options).unwrap();
    assert!(mixed.entries().iter().any(|(k, _)| *k == MetafileKey::DggsNumAperture4Res));
}

#[test]
fn invariant_metafile_deterministic() {
    let overrides = SelectOverrides {
        resolution: Some(8),
        precision: Some(5),
        mixed_aperture_level: Some(3),
        ..Default::default()
    };
    let a = select("ISEA43H", &overrides).unwrap();
    let b = select("ISEA43H", &overrides).unwrap();
    let output = OutputConfig::cells(OutputSpec::file(OutputType::Geojson, "cells.geojson"));

    let first = compile_generate_grid(&a, &ClipConfig::whole_earth(), &output).unwrap().render();
    let second = compile_generate_grid(&b, &ClipConfig::whole_earth(), &output).unwrap().render();
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn invariant_shapefile_clip_needs_region_files() {
    let dggs = select("ISEA4T", &resolution(6)).unwrap();
    for files in [None, Some(String::new())] {
        let clip = ClipConfig { clip_subset_type: ClipSubsetType::Shapefile, clip_region_files: files };
        let err = compile_generate_grid(&dggs, &clip, &OutputConfig::default()).unwrap_err();
        assert!(matches!(err, DggridError::InvalidConfiguration(_)));
    }
}

#[test]
fn invariant_unknown_projection_prefix() {
    let err = select("HEALPIX4D", &SelectOverrides::default()).unwrap_err();
    assert!(matches!(err, DggridError::UnrecognizedGridType(_)));
}

#[test]
fn invariant_unknown_preset_never_compiles() {
    for name in ["ISEA5H", "FULLER3T", "ISEA43D", "ISEA03H"] {
        let err = select(name, &resolution(5)).unwrap_err();
        assert!(matches!(err, DggridError::InvalidConfiguration(_)), "{}: {:?}", name, err);
    }
}

#[test]
fn invariant_every_preset_is_its_own_dggs_type() {
    for grid in GridType::presets() {
        let name = grid.to_string();
        let dggs = select(&name, &resolution(5)).unwrap();
        let lines = compile_output_stats(&dggs).unwrap().lines();
        assert_eq!(lines[1], format!("dggs_type {}", name));
    }
}

#[test]
fn invariant_construct_preset_structure_matches_name() {
    let params = ConstructParams {
        grid_type: GridType::parse("ISEA4T").unwrap(),
        resolution: Some(5),
        ..Default::default()
    };
    let dggs = construct(&params).unwrap();
    assert_eq!(dggs.topology(), Some(Topology::Triangle));
    assert_eq!(dggs.aperture(), Some(4));
    assert_eq!(compile_output_stats(&dggs).unwrap().get(MetafileKey::DggsType), Some("ISEA4T"));
}

#[test]
fn invariant_custom_mixed_level_reaches_metafile() {
    let params = ConstructParams {
        aperture: 43,
        mixed_aperture_level: Some(3),
        resolution: Some(7),
        ..Default::default()
    };
    let dggs = construct(&params).unwrap();
    let lines = compile_output_stats(&dggs).unwrap();
    assert_eq!(lines.get(MetafileKey::DggsNumAperture4Res), Some("3"));
}

#[test]
fn invariant_stats_table_rows() {
    let log = "\
DGGRID run
Earth Radius, 6371.0075
Res   Cells   Area   CLS
---   -----   ----   ---
(km^2) (km)
0   12   42505468.3   7356.3
1   42   14168489.4   4247.1
";
    let stats = parse_grid_stats(log);
    assert_eq!(stats.earth_radius_info, "Earth Radius 6371.0075");
    assert_eq!(stats.stats_output.rows().map(|r| r.len()), Some(2));
}

#[test]
fn invariant_end_to_end_whole_earth_metafile() {
    let params = ConstructParams {
        grid_type: GridType::parse("ISEA3H").unwrap(),
        resolution: Some(9),
        ..Default::default()
    };
    let dggs = construct(&params).unwrap();
    let output = OutputConfig::cells(OutputSpec::file(OutputType::Text, "out.txt"));

    let lines = compile_generate_grid(&dggs, &ClipConfig::whole_earth(), &output).unwrap().lines();
    for expected in [
        "dggrid_operation GENERATE_GRID",
        "dggs_type ISEA3H",
        "dggs_res_spec 9",
        "clip_subset_type WHOLE_EARTH",
        "cell_output_type TEXT",
        "cell_output_file_name out.txt",
    ] {
        assert!(lines.iter().any(|l| l == expected), "missing '{}' in {:?}", expected, lines);
    }
    assert_eq!(lines[0], "dggrid_operation GENERATE_GRID");
}

#[cfg(unix)]
mod engine {
    use super::*;
    use dggrid_core::{Dggrid, RunnerConfig, METAFILE_NAME};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn install_stub(dir: &Path, body: &str) {
        let path = dir.join("fake-dggrid");
        fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
    }

    fn facade(dir: &Path) -> Dggrid {
        let mut config = RunnerConfig::new("fake-dggrid", dir);
        config.silent = true;
        Dggrid::new(config)
    }

    fn isea3h() -> dggrid_core::Dggs {
        select("ISEA3H", &resolution(3)).unwrap()
    }

    #[test]
    fn invariant_cwd_unchanged_after_any_run() {
        let before = std::env::current_dir().unwrap();

        let ok = tempfile::tempdir().unwrap();
        install_stub(ok.path(), "echo ran\n");
        facade(ok.path()).grid_stats(&isea3h()).unwrap();
        assert_eq!(std::env::current_dir().unwrap(), before);

        let failing = tempfile::tempdir().unwrap();
        install_stub(failing.path(), "echo boom\nexit 4\n");
        assert!(facade(failing.path()).grid_stats(&isea3h()).is_err());
        assert_eq!(std::env::current_dir().unwrap(), before);

        let missing = tempfile::tempdir().unwrap();
        assert!(facade(missing.path()).grid_stats(&isea3h()).is_err());
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn invariant_captured_log_is_engine_output() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), "echo first\necho second\n");
        let mut dggrid = facade(dir.path());

        let output = OutputConfig::cells(OutputSpec::file(OutputType::Text, "out.txt"));
        let result = dggrid.grid_gen(&isea3h(), &ClipConfig::whole_earth(), &output).unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.captured_log.as_deref(), Some("first\nsecond"));
        assert_eq!(result.output_config, output);

        let written = fs::read_to_string(dir.path().join(METAFILE_NAME)).unwrap();
        assert_eq!(written, result.metafile.render());
    }

    #[test]
    fn invariant_grid_stats_parses_engine_report() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(
            dir.path(),
            "echo 'Earth Radius, 6371.0075'\necho 'Res Cells Area CLS'\necho '---'\necho '(km)'\n\
             echo '0 12 42505468.3 7356.3'\necho '1 42 14168489.4 4247.1'\n",
        );
        let mut config = RunnerConfig::new("fake-dggrid", dir.path());
        config.capture_logs = false;
        config.silent = true;
        let mut dggrid = Dggrid::new(config);

        let result = dggrid.grid_stats(&isea3h()).unwrap();
        assert_eq!(result.output_config.earth_radius_info, "Earth Radius 6371.0075");
        assert_eq!(result.output_config.stats_output.rows().map(|r| r.len()), Some(2));
        // capture setting restored after the forced capture
        assert!(!dggrid.runner().capture_logs());
    }

    #[test]
    fn invariant_engine_failure_carries_log() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), "echo 'bad parameter value'\nexit 2\n");

        let err = facade(dir.path()).grid_stats(&isea3h()).unwrap_err();
        match err {
            DggridError::EngineExecutionFailed { exit_code, log } => {
                assert_eq!(exit_code, Some(2));
                assert!(log.contains("bad parameter value"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn invariant_validation_error_writes_no_metafile() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), "exit 0\n");
        let clip = ClipConfig { clip_subset_type: ClipSubsetType::Shapefile, clip_region_files: None };

        let err = facade(dir.path())
            .grid_gen(&isea3h(), &clip, &OutputConfig::default())
            .unwrap_err();
        assert!(matches!(err, DggridError::InvalidConfiguration(_)));
        assert!(!dir.path().join(METAFILE_NAME).exists());
    }
}
