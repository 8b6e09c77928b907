//! End-to-end tests for the spreadcrop binary

use std::path::Path;

use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;
use tempfile::TempDir;

/// 400x200 spread with two bright pages and a dark gutter band
fn write_spread(path: &Path) {
    let mut gray = GrayImage::from_pixel(400, 200, Luma([20]));
    for y in 15..=185 {
        for x in 20..=175 {
            gray.put_pixel(x, y, Luma([245]));
        }
        for x in 225..=380 {
            gray.put_pixel(x, y, Luma([245]));
        }
    }
    for y in 0..200 {
        for x in 195..=205 {
            gray.put_pixel(x, y, Luma([5]));
        }
    }
    gray.save(path).unwrap();
}

/// 200x300 portrait page
fn write_single(path: &Path) {
    let mut gray = GrayImage::from_pixel(200, 300, Luma([15]));
    for y in 30..270 {
        for x in 25..175 {
            gray.put_pixel(x, y, Luma([240]));
        }
    }
    gray.save(path).unwrap();
}

fn spreadcrop(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("spreadcrop").unwrap();
    // Keep a user config file from leaking into the run.
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

fn read_manifest(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    spreadcrop(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--symmetry-strategy"))
        .stdout(predicate::str::contains("--page-numbers"));
}

#[test]
fn test_splits_spread_and_crops_single_page() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&in_dir).unwrap();
    write_spread(&in_dir.join("p001.png"));
    write_single(&in_dir.join("p002.png"));
    std::fs::write(in_dir.join("notes.txt"), "not an image").unwrap();

    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2 of 2 files: 1 split, 1 crop-only"));

    assert!(out_dir.join("p001_L.png").is_file());
    assert!(out_dir.join("p001_R.png").is_file());
    assert!(out_dir.join("p002.png").is_file());
    assert!(!out_dir.join("notes.txt").exists());

    let single = image::open(out_dir.join("p002.png")).unwrap();
    assert!(single.width() < 200);
    assert!(single.height() < 300);

    let manifest = read_manifest(&out_dir.join("manifest.json"));
    assert_eq!(manifest["summary"]["status"], "ok");
    assert_eq!(manifest["summary"]["files_found"], 2);
    assert_eq!(manifest["summary"]["split_count"], 1);
    assert_eq!(manifest["actions"][0]["mode_used"], "split");
    assert_eq!(manifest["actions"][1]["mode_used"], "crop");
    assert_eq!(manifest["action_counts"]["written"], 2);
}

#[test]
fn test_second_run_skips_existing_outputs() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&in_dir).unwrap();
    write_spread(&in_dir.join("p001.png"));

    spreadcrop(&home).arg(&in_dir).arg(&out_dir).assert().success();
    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 skipped"));

    let manifest = read_manifest(&out_dir.join("manifest.json"));
    assert_eq!(manifest["actions"][0]["status"], "skipped");

    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .arg("--overwrite")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 skipped"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&in_dir).unwrap();
    write_spread(&in_dir.join("p001.png"));

    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .args(["--dry-run", "--debug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(dry run)"));

    assert!(!out_dir.exists());
}

#[test]
fn test_debug_overlay_written() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&in_dir).unwrap();
    write_spread(&in_dir.join("p001.png"));

    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .arg("--debug")
        .assert()
        .success();

    assert!(out_dir.join("_debug").is_dir());
    let overlays: Vec<_> = std::fs::read_dir(out_dir.join("_debug"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    assert_eq!(overlays.len(), 1);
}

#[test]
fn test_no_matches() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&in_dir).unwrap();

    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No files matched"));

    let manifest = read_manifest(&out_dir.join("manifest.json"));
    assert_eq!(manifest["summary"]["status"], "no-matches");
}

#[test]
fn test_missing_input_dir_fails() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();

    spreadcrop(&home)
        .arg(dir.path().join("missing"))
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input directory not found"));
}

#[test]
fn test_same_dir_requires_inplace_and_overwrite() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    write_single(&dir.path().join("p.png"));

    spreadcrop(&home)
        .arg(dir.path())
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--inplace"));

    spreadcrop(&home)
        .arg(dir.path())
        .arg(dir.path())
        .arg("--inplace")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--overwrite"));

    let manifest = read_manifest(&dir.path().join("manifest.json"));
    assert_eq!(manifest["summary"]["status"], "error");
}

#[test]
fn test_invalid_option_rejected() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();

    spreadcrop(&home)
        .arg(dir.path())
        .arg(dir.path().join("out"))
        .args(["--split-ratio", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("split_ratio must be > 0."));
}

#[test]
fn test_dump_config_roundtrips_overrides() {
    let home = TempDir::new().unwrap();
    spreadcrop(&home)
        .args(["--dump-config", "--mode", "crop", "--pad-px", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode = \"crop\""))
        .stdout(predicate::str::contains("pad_px = 7"))
        .stdout(predicate::str::contains("[page_numbers]"));
}

#[test]
fn test_config_file_applied() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("spreadcrop.toml");
    std::fs::write(&config, "[page_images]\nmode = \"crop\"\n").unwrap();
    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&in_dir).unwrap();
    write_spread(&in_dir.join("p001.png"));

    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    assert!(out_dir.join("p001.png").is_file());
    assert!(!out_dir.join("p001_L.png").exists());
}

#[test]
fn test_unknown_config_key_fails() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "split_ration = 2.0\n").unwrap();

    spreadcrop(&home)
        .arg("--dump-config")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn test_missing_tesseract_path_reports_no_tesseract() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let in_dir = dir.path().join("in");
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&in_dir).unwrap();
    write_single(&in_dir.join("p001.png"));

    spreadcrop(&home)
        .arg(&in_dir)
        .arg(&out_dir)
        .arg("--page-numbers")
        .arg("--tesseract")
        .arg(dir.path().join("no-such-tesseract"))
        .assert()
        .success();

    let manifest = read_manifest(&out_dir.join("manifest.json"));
    let page_number = &manifest["actions"][0]["pages"][0]["page_number"];
    assert!(page_number["printed_page"].is_null());
    assert_eq!(page_number["reason"], "no_tesseract");
}
