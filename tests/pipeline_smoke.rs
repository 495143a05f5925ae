use assert_cmd::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    assert!(
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap()
            .success(),
        "git {args:?} failed in {}",
        dir.display()
    );
}

fn init_git_repo(dir: &Path) {
    git(dir, &["init"]);
    git(dir, &["config", "core.autocrlf", "false"]);
    git(dir, &["config", "user.email", "you@example.com"]);
    git(dir, &["config", "user.name", "Your Name"]);
}

fn commit_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.sync_all().unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", &format!("add {name}")]);
}

struct Fleet {
    _root: tempfile::TempDir,
    origin: PathBuf,
    workdir: PathBuf,
    config: PathBuf,
}

fn setup_fleet(repo_name: &str) -> Fleet {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    fs::create_dir(&origin).unwrap();
    init_git_repo(&origin);
    commit_file(&origin, "src/a.rs", "fn a() {}\nfn b() {}\n");
    commit_file(&origin, "src/b.rs", "fn c() {}\n");
    git(&origin, &["tag", "v1"]);

    let workdir = root.path().join("fleet");
    let config = root.path().join("fleetstats.toml");
    let mut f = File::create(&config).unwrap();
    write!(
        f,
        "workdir = {:?}\npool_size = 2\n\n[[repositories]]\nname = {repo_name:?}\nclone = {:?}\n",
        workdir.to_str().unwrap(),
        origin.to_str().unwrap(),
    )
    .unwrap();

    Fleet {
        _root: root,
        origin,
        workdir,
        config,
    }
}

fn run_fleetstats(config: &Path, extra: &[&str]) {
    let mut cmd = Command::cargo_bin("fleetstats").unwrap();
    cmd.arg("--config").arg(config).args(extra);
    cmd.assert().success();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap_or_else(|_| panic!("missing {}", path.display())))
        .unwrap()
}

fn report_snapshot(data_dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut snapshot = BTreeMap::new();
    for entry in fs::read_dir(data_dir.join("alpha")).unwrap() {
        let path = entry.unwrap().path();
        snapshot.insert(
            path.file_name().unwrap().to_string_lossy().to_string(),
            fs::read(&path).unwrap(),
        );
    }
    snapshot.insert("repos.json".into(), fs::read(data_dir.join("repos.json")).unwrap());
    snapshot
}

#[test]
fn full_run_writes_every_report() {
    if !has_git() {
        return;
    }
    let fleet = setup_fleet("alpha");
    run_fleetstats(&fleet.config, &[]);

    let data = fleet.workdir.join("data");
    for kind in [
        "summary",
        "lines",
        "activity",
        "files-history",
        "tags",
        "branches",
        "files-authors",
        "authors",
    ] {
        assert!(
            data.join("alpha").join(format!("{kind}.json")).exists(),
            "missing {kind}.json"
        );
    }

    let states = read_json(&data.join("repos.json"));
    assert_eq!(states["alpha"]["name"], "alpha");
    assert!(states["alpha"]["head"].as_str().unwrap().len() >= 40);

    let summary = read_json(&data.join("alpha/summary.json"));
    assert_eq!(summary["commits"], 2);
    assert_eq!(summary["files"], 2);
    assert_eq!(summary["lines"], 3);
    assert_eq!(summary["authors"], 1);
    assert_eq!(summary["tags"], 1);

    let activity = read_json(&data.join("alpha/activity.json"));
    let yearly = activity["by_time"]["yearly"].as_object().unwrap();
    let commits: u64 = yearly.values().map(|b| b["commits"].as_u64().unwrap()).sum();
    assert_eq!(commits, 2);
    assert!(activity["by_authors"]["Your Name"].is_object());

    let tags = read_json(&data.join("alpha/tags.json"));
    assert_eq!(tags[0]["tag"], "v1");
    assert_eq!(tags[0]["authors"][0]["author"], "Your Name");
    assert_eq!(tags[0]["authors"][0]["commits"], 2);

    let history = read_json(&data.join("alpha/files-history.json"));
    assert_eq!(history.as_object().unwrap().len(), 2);

    let authors = read_json(&data.join("alpha/authors.json"));
    assert_eq!(authors["lines"]["Your Name"], 3);
    assert_eq!(authors["files"]["Your Name"], 2);

    assert!(read_json(&data.join("last_update.json"))["last_updated"]
        .as_i64()
        .unwrap()
        > 0);
}

#[test]
fn second_run_without_changes_rewrites_nothing_but_the_stamp() {
    if !has_git() {
        return;
    }
    let fleet = setup_fleet("alpha");
    run_fleetstats(&fleet.config, &[]);

    let data = fleet.workdir.join("data");
    let before = report_snapshot(&data);
    let stamp_before = read_json(&data.join("last_update.json"));

    std::thread::sleep(std::time::Duration::from_millis(1100));
    run_fleetstats(&fleet.config, &[]);

    let after = report_snapshot(&data);
    assert_eq!(before, after, "a stable repository was rewritten");

    let stamp_after = read_json(&data.join("last_update.json"));
    assert!(
        stamp_after["last_updated"].as_i64() >= stamp_before["last_updated"].as_i64(),
        "stamp must move forward"
    );
}

#[test]
fn new_commits_mark_the_repository_dirty_again() {
    if !has_git() {
        return;
    }
    let fleet = setup_fleet("alpha");
    run_fleetstats(&fleet.config, &[]);

    commit_file(&fleet.origin, "src/c.rs", "fn d() {}\n");
    run_fleetstats(&fleet.config, &[]);

    let summary = read_json(&fleet.workdir.join("data/alpha/summary.json"));
    assert_eq!(summary["commits"], 3);
    assert_eq!(summary["files"], 3);

    let history = read_json(&fleet.workdir.join("data/alpha/files-history.json"));
    assert_eq!(history.as_object().unwrap().len(), 3);
}

#[test]
fn forced_run_recomputes_stable_repositories() {
    if !has_git() {
        return;
    }
    let fleet = setup_fleet("alpha");
    run_fleetstats(&fleet.config, &[]);
    // Second run finds nothing dirty; --force recomputes anyway.
    run_fleetstats(&fleet.config, &["--force"]);

    let summary = read_json(&fleet.workdir.join("data/alpha/summary.json"));
    assert_eq!(summary["commits"], 2);
}

#[test]
fn unreachable_clone_source_degrades_that_repository_only() {
    if !has_git() {
        return;
    }
    let fleet = setup_fleet("alpha");

    // Append a repository whose clone source does not exist.
    let mut raw = fs::read_to_string(&fleet.config).unwrap();
    raw.push_str("\n[[repositories]]\nname = \"ghost\"\nclone = \"/nonexistent/ghost.git\"\n");
    fs::write(&fleet.config, raw).unwrap();

    run_fleetstats(&fleet.config, &[]);

    let data = fleet.workdir.join("data");
    assert!(data.join("alpha/summary.json").exists());
    assert!(!data.join("ghost").exists());
    assert!(data.join("last_update.json").exists());
}

#[test]
fn missing_config_fails_fast() {
    let mut cmd = Command::cargo_bin("fleetstats").unwrap();
    cmd.arg("--config").arg("/nonexistent/fleetstats.toml");
    cmd.assert().failure();
}
