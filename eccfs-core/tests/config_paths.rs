use eccfs_core::config::OverlayConfig;
use eccfs_core::path_safety::{logical_key, resolve};
use eccfs_core::EccError;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[test]
fn mount_options_split_on_commas() {
    let cfg = OverlayConfig::from_options("/srv/import", "/srv/ecc0,/srv/ecc1,/srv/ecc2").unwrap();
    assert_eq!(cfg.import_dir, PathBuf::from("/srv/import"));
    assert_eq!(cfg.ecc_dirs.len(), 3);
    assert_eq!(cfg.ecc_dirs[2], PathBuf::from("/srv/ecc2"));
    assert_eq!(cfg.reverify_interval(), Duration::from_secs(86_400));
}

#[test]
fn trailing_separators_and_empty_lists_are_rejected() {
    for (import, ecc) in [
        ("/srv/import/", "/srv/ecc0"),
        ("/srv/import", "/srv/ecc0/,/srv/ecc1"),
        ("/srv/import", ""),
        ("", "/srv/ecc0"),
    ] {
        let err = OverlayConfig::from_options(import, ecc).unwrap_err();
        assert!(matches!(err, EccError::InvalidArgument(_)), "{import:?} {ecc:?}");
    }
}

#[test]
fn json_config_loads_with_default_interval() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("eccfs.json");
    std::fs::write(&path, r#"{"import_dir": "/srv/import", "ecc_dirs": ["/srv/e0", "/srv/e1"]}"#).unwrap();
    let cfg = OverlayConfig::load(&path).unwrap();
    assert_eq!(cfg.ecc_dirs, vec![PathBuf::from("/srv/e0"), PathBuf::from("/srv/e1")]);
    assert_eq!(cfg.reverify_interval_secs, 86_400);

    let custom = cfg.clone().with_reverify_interval(Duration::from_secs(30));
    std::fs::write(&path, serde_json::to_string(&custom).unwrap()).unwrap();
    assert_eq!(OverlayConfig::load(&path).unwrap(), custom);

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(OverlayConfig::load(&path), Err(EccError::InvalidArgument(_))));
}

#[test]
fn logical_paths_resolve_under_the_root() {
    let root = Path::new("/srv/ecc0");
    assert_eq!(resolve(root, "/docs/a.txt").unwrap(), root.join("docs").join("a.txt"));
    assert_eq!(resolve(root, "docs/./a.txt").unwrap(), root.join("docs").join("a.txt"));
    assert_eq!(resolve(root, "/").unwrap(), root.to_path_buf());
    assert!(resolve(root, "/docs/../../etc/passwd").is_err());
    assert!(resolve(root, "..").is_err());
}

#[test]
fn logical_keys_ignore_outer_slashes() {
    assert_eq!(logical_key("/docs/a.txt"), "docs/a.txt");
    assert_eq!(logical_key("docs/a.txt/"), "docs/a.txt");
    assert_eq!(logical_key("/"), "");
}
