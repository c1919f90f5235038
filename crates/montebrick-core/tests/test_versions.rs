use std::env;
use std::fs;
use std::sync::Mutex;

use tempfile::TempDir;

use montebrick_core::error::MonteBrickError;
use montebrick_core::header::{Header, COMMENT_KEY};
use montebrick_core::versions::{
    match_image, module_search_path, EnvironmentManager, HarnessVersions, HeaderVersions, Stage,
    HARNESS_MODULE, IMAGE_MODULE, PIPELINE_MODULE,
};

/// Serializes tests touching the process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Version header as the pipeline writes it, with dependency pairs first.
fn pipeline_header(deps: &[(&str, &str)], version_at: impl Fn(Stage) -> &'static str) -> Header {
    let mut header = Header::new();
    header.push("PIPEVER", version_at(Stage::Writecat), Some("pipeline version"));
    for (i, (name, version)) in deps.iter().enumerate() {
        header.push(&format!("DEPNAM{i:02}"), name, None);
        header.push(&format!("DEPVER{i:02}"), version, None);
    }
    for stage in Stage::ALL {
        if stage != Stage::WiseForced {
            header.push(&stage.pipeline_key(), version_at(stage), None);
        }
    }
    header
}

const DR969_DEPS: [(&str, &str); 2] = [("astrometry", "0.84-15-g48bdcb08"), ("tractor", "dr9.5")];

#[test]
fn test_stage_names_and_keys() {
    assert_eq!("wise_forced".parse::<Stage>().unwrap(), Stage::WiseForced);
    assert!(matches!("bogus".parse::<Stage>(), Err(MonteBrickError::UnknownStage(_))));
    assert_eq!(Stage::Outliers.pipeline_key(), "VER_OUTL");
    assert_eq!(Stage::Fitblobs.harness_key(), "MBV_FITB");
    assert_eq!(Stage::ALL.first(), Some(&Stage::Tims));
    assert_eq!(Stage::ALL.last(), Some(&Stage::Writecat));
}

#[test]
fn test_decorate_places_harness_cards() {
    let header = pipeline_header(&DR969_DEPS, |_| "DR9.6.9");
    let decorated = HarnessVersions::new("1.2.3").decorate(&header);
    let keys: Vec<&str> = decorated.keys().collect();

    assert_eq!(keys[0], COMMENT_KEY);
    assert_eq!(keys[1], "MBRICKV");
    assert_eq!(decorated.get("MBRICKV"), Some("1.2.3"));

    let pos = |key: &str| keys.iter().position(|k| *k == key).unwrap();
    assert_eq!(pos("DEPNAM02"), pos("DEPVER01") + 1);
    assert_eq!(decorated.get("DEPNAM02"), Some(HARNESS_MODULE));
    assert_eq!(decorated.get("DEPVER02"), Some("1.2.3"));
    for stage in Stage::ALL {
        if stage == Stage::WiseForced {
            assert!(!decorated.contains(&stage.harness_key()));
            continue;
        }
        assert_eq!(pos(&stage.harness_key()) + 1, pos(&stage.pipeline_key()));
    }
    // Every pipeline card survives in order.
    let original: Vec<&str> = header.keys().collect();
    let kept: Vec<&str> = keys.iter().copied().filter(|k| original.contains(k)).collect();
    assert_eq!(kept, original);

    assert_eq!(HarnessVersions::new("9.9.9").decorate(&decorated), decorated);
}

#[test]
fn test_decorate_without_dependencies_appends_pair() {
    let header = pipeline_header(&[], |_| "DR9.6.9");
    let decorated = HarnessVersions::default().decorate(&header);
    let last: Vec<&str> = decorated.keys().rev().take(2).collect();
    assert_eq!(last, vec!["DEPVER00", "DEPNAM00"]);
    assert_eq!(decorated.get("DEPVER00"), Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_module_versions() {
    let versions = HeaderVersions::from_header(&HarnessVersions::new("0.4.0").decorate(&pipeline_header(
        &DR969_DEPS,
        |_| "DR9.6.9",
    )));
    assert_eq!(versions.module_version(PIPELINE_MODULE, Stage::Srcs).unwrap(), "DR9.6.9");
    assert_eq!(versions.module_version(HARNESS_MODULE, Stage::Coadds).unwrap(), "0.4.0");
    assert_eq!(versions.module_version("tractor", Stage::Tims).unwrap(), "dr9.5");
    assert_eq!(versions.module_version(IMAGE_MODULE, Stage::Writecat).unwrap(), "DR9.6.9");
    assert!(matches!(
        versions.module_version(PIPELINE_MODULE, Stage::WiseForced),
        Err(MonteBrickError::VersionNotFound { .. })
    ));
    assert!(versions.module_version("galex", Stage::Tims).is_err());
}

#[test]
fn test_pipever_fallback_for_tims() {
    let mut header = Header::new();
    header.push("PIPEVER", "DR9.6.2", None);
    header.push("VER_WCAT", "DR9.6.2", None);
    let versions = HeaderVersions::from_header(&header);
    assert_eq!(versions.module_version(PIPELINE_MODULE, Stage::Tims).unwrap(), "DR9.6.2");
    assert_eq!(versions.read_versions(), vec![
        (Stage::Tims, "DR9.6.2".to_string()),
        (Stage::Writecat, "DR9.6.2".to_string()),
    ]);
}

#[test]
fn test_stage_versions_collapse_unchanged_stages() {
    let constant = HeaderVersions::from_header(&pipeline_header(&DR969_DEPS, |_| "DR9.6.9"));
    let stages = constant.stage_versions(&[PIPELINE_MODULE]).unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].0, Stage::Writecat);
    assert_eq!(stages[0].1[PIPELINE_MODULE], "DR9.6.9");

    let resumed = HeaderVersions::from_header(&pipeline_header(&DR969_DEPS, |stage| {
        if stage <= Stage::Srcs {
            "DR9.6.5"
        } else {
            "DR9.6.9"
        }
    }));
    let stages = resumed.stage_versions(&[PIPELINE_MODULE]).unwrap();
    let summary: Vec<(Stage, &str)> = stages
        .iter()
        .map(|(s, v)| (*s, v[PIPELINE_MODULE].as_str()))
        .collect();
    assert_eq!(summary, vec![(Stage::Srcs, "DR9.6.5"), (Stage::Writecat, "DR9.6.9")]);
}

#[test]
fn test_match_image() {
    let current = HeaderVersions::from_header(&pipeline_header(&DR969_DEPS, |_| "DR9.6.9"));
    assert_eq!(match_image(&current, Stage::Tims).unwrap(), "DR9.6.9");
    assert_eq!(match_image(&current, Stage::Writecat).unwrap(), "DR9.6.9");

    // Rebuilt distributions sharing a name: the matching bundle wins.
    let rebuilt = HeaderVersions::from_header(&pipeline_header(
        &[("astrometry", "0.83-1-g4a4c1bfe"), ("tractor", "dr9.4")],
        |_| "DR9.6.7",
    ));
    assert_eq!(match_image(&rebuilt, Stage::Fitblobs).unwrap(), "DR9.6.7");

    // Dependencies are recorded once, for the latest pipeline version, so
    // after a version change only the pipeline itself is compared.
    let resumed = HeaderVersions::from_header(&pipeline_header(&DR969_DEPS, |stage| {
        if stage <= Stage::Srcs {
            "DR9.6.5"
        } else {
            "DR9.6.9"
        }
    }));
    assert_eq!(match_image(&resumed, Stage::Writecat).unwrap(), "DR9.6.9");
    // Up to srcs the version is constant, so the dependencies must match
    // too, and no DR9.6.5 distribution shipped them.
    for stage in [Stage::Tims, Stage::Srcs] {
        assert!(matches!(
            match_image(&resumed, stage),
            Err(MonteBrickError::NoMatchingImage { .. })
        ));
    }
}

#[test]
fn test_environment_fallback_and_restore() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let gaia = dir.path().join("gaia");
    let tycho = dir.path().join("tycho");
    fs::create_dir_all(&gaia).unwrap();
    fs::create_dir_all(&tycho).unwrap();

    let mut header = pipeline_header(&DR969_DEPS, |_| "DR9.6.9");
    header.push("DEPNAM02", "GAIA_CAT", None);
    header.push("DEPVER02", &gaia.display().to_string(), None);
    header.push("DEPNAM03", "TYCHO2_KD", None);
    header.push("DEPVER03", "/no/such/tycho", None);
    let versions = HeaderVersions::from_header(&header);

    env::remove_var("GAIA_CAT_DIR");
    env::remove_var("TYCHO2_KD_DIR");

    let manager = EnvironmentManager::from_header(&versions);
    assert_eq!(manager.get("GAIA_CAT_DIR"), Some(gaia.display().to_string().as_str()));
    assert_eq!(manager.get("TYCHO2_KD_DIR"), Some("/no/such/tycho"));
    assert_eq!(manager.get("GALEX_DIR"), None);

    // Invalid value and nothing to fall back on.
    let err = manager.clone().enter().err().unwrap();
    assert!(matches!(err, MonteBrickError::InvalidEnvironment { name, .. } if name == "TYCHO2_KD_DIR"));
    assert!(env::var("GAIA_CAT_DIR").is_err());

    env::set_var("TYCHO2_KD_DIR", &tycho);
    let mut checked = manager.clone();
    checked.check_environ().unwrap();
    assert_eq!(checked.get("TYCHO2_KD_DIR"), Some(tycho.display().to_string().as_str()));

    {
        let _guard = manager.enter().unwrap();
        assert_eq!(env::var("GAIA_CAT_DIR").unwrap(), gaia.display().to_string());
        assert_eq!(env::var("TYCHO2_KD_DIR").unwrap(), tycho.display().to_string());
    }
    assert!(env::var("GAIA_CAT_DIR").is_err());
    assert_eq!(env::var("TYCHO2_KD_DIR").unwrap(), tycho.display().to_string());
    env::remove_var("TYCHO2_KD_DIR");
}

#[test]
fn test_environment_restored_on_unwind() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let mut header = Header::new();
    header.push("DEPNAM00", "galex", None);
    header.push("DEPVER00", &dir.path().display().to_string(), None);
    let manager = EnvironmentManager::from_header(&HeaderVersions::from_header(&header));
    env::remove_var("GALEX_DIR");

    let result = std::panic::catch_unwind(|| {
        let _guard = manager.enter().unwrap();
        assert!(env::var("GALEX_DIR").is_ok());
        panic!("pipeline failed");
    });
    assert!(result.is_err());
    assert!(env::var("GALEX_DIR").is_err());
}

#[test]
fn test_module_search_path() {
    let dir = TempDir::new().unwrap();
    let pipeline = dir.path().join("legacypipe_DR9.6.9").join("py");
    let tractor = dir.path().join("tractor_dr9.5");
    fs::create_dir_all(&pipeline).unwrap();
    fs::create_dir_all(&tractor).unwrap();

    let versions = vec![
        ("tractor".to_string(), "dr9.5".to_string()),
        ("legacypipe".to_string(), "DR9.6.9".to_string()),
    ];
    let inherited = format!("/opt/site:{}:", tractor.display());
    let paths = module_search_path(dir.path(), &versions, Some(&inherited)).unwrap();
    assert_eq!(paths, vec![pipeline, tractor, "/opt/site".into()]);

    let missing = vec![("legacypipe".to_string(), "DR9.6.2".to_string())];
    assert!(matches!(
        module_search_path(dir.path(), &missing, None),
        Err(MonteBrickError::Config(_))
    ));
}
