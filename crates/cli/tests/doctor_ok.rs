use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn doctor_reads_provided_config_path() {
    let tmp = tempdir().unwrap();
    let cfg = tmp.path().join("config.toml");
    let toml = r#"
version = 1

[documents]
root = "/tmp/notes"
type_field = "kind"

[cache]
enabled = false
"#;
    write_file(&cfg, toml);

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("schemata"));
    cmd.args(["doctor", "--config", cfg.to_str().unwrap()]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   schemata doctor"))
        .stdout(predicate::str::contains("root: /tmp/notes"))
        .stdout(predicate::str::contains("type_field: kind"))
        .stdout(predicate::str::contains("state_file: /tmp/notes/.schemata/state.yaml"))
        .stdout(predicate::str::contains("cache: disabled"));
}

#[test]
fn doctor_uses_xdg_default_when_present() {
    let tmp = tempdir().unwrap();
    let cfg_path = tmp.path().join("schemata").join("config.toml");
    let root = tmp.path().join("notes");
    write_file(
        &cfg_path,
        &format!(
            r#"
version = 1
[documents]
root = "{}"
"#,
            root.display()
        ),
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("schemata"));
    cmd.env("XDG_CONFIG_HOME", tmp.path());
    cmd.arg("doctor");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("OK   schemata doctor"))
        .stdout(predicate::str::contains(format!("root: {}", root.display())))
        .stdout(predicate::str::contains("types: 0"))
        .stdout(predicate::str::contains("(0 entries)"));
}

#[test]
fn doctor_root_flag_overrides_config() {
    let tmp = tempdir().unwrap();
    let cfg = tmp.path().join("config.toml");
    write_file(&cfg, "version = 1\n[documents]\nroot = \"/tmp/ignored\"\n");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("schemata"));
    cmd.args(["--config", cfg.to_str().unwrap(), "--root", "/srv/docs", "doctor"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("root: /srv/docs"))
        .stdout(predicate::str::contains("backup_dir: /srv/docs/.schemata/backups"));
}
