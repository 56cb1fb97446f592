use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

const ARTICLE_V1: &str = r##"
id: article
name: Article
version: 1.0.0
metadata:
  category: writing
  tags: [blog]
properties:
  - key: title
    external_key: title
    name: Title
    kind: text
    required: true
    rule: { kind: text, max_length: 80 }
template:
  version: 1.0.0
  content: "# {{title}}"
"##;

const ARTICLE_V1_1: &str = r##"
id: article
name: Article
version: 1.1.0
properties:
  - key: title
    external_key: title
    name: Title
    kind: text
    required: true
    rule: { kind: text, max_length: 80 }
  - key: slug
    external_key: slug
    name: Slug
    kind: text
    required: true
    transform: { op: slugify }
    rule: { kind: text }
template:
  version: 1.1.0
  content: "# {{title}}"
"##;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn setup() -> (TempDir, PathBuf) {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("notes");
    let cfg = tmp.path().join("config.toml");
    write_file(
        &cfg,
        &format!(
            r#"
version = 1
[documents]
root = "{}"

[logging]
level = "error"
"#,
            root.display()
        ),
    );
    (tmp, cfg)
}

fn schemata(cfg: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("schemata"));
    cmd.arg("--config").arg(cfg);
    cmd
}

fn register(tmp: &TempDir, cfg: &Path, name: &str, yaml: &str, extra: &[&str]) -> assert_cmd::assert::Assert {
    let file = tmp.path().join(name);
    write_file(&file, yaml);
    schemata(cfg).arg("register").arg(&file).args(extra).assert()
}

#[test]
fn register_then_list_types() {
    let (tmp, cfg) = setup();
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[])
        .success()
        .stdout(predicate::str::contains("OK   registered article v1.0.0"));

    schemata(&cfg)
        .arg("types")
        .assert()
        .success()
        .stdout(predicate::str::contains("article"))
        .stdout(predicate::str::contains("writing"));

    schemata(&cfg)
        .args(["types", "--json", "--tag", "blog"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""id": "article""#))
        .stdout(predicate::str::contains(r#""property_count": 1"#));

    schemata(&cfg)
        .args(["types", "--category", "reference"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no note types registered)"));
}

#[test]
fn register_rejects_duplicates_and_downgrades() {
    let (tmp, cfg) = setup();
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[]).success();

    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[])
        .failure()
        .stdout(predicate::str::contains("DUPLICATE_NOTE_TYPE"));

    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &["--overwrite"])
        .failure()
        .stdout(predicate::str::contains("INVALID_VERSION_UPDATE"));

    register(&tmp, &cfg, "article-next.yaml", ARTICLE_V1_1, &["--overwrite"])
        .success()
        .stdout(predicate::str::contains("v1.1.0"));
}

#[test]
fn register_reports_structural_errors() {
    let (tmp, cfg) = setup();
    register(&tmp, &cfg, "broken.yaml", "id: broken\nversion: not-a-version\n", &[])
        .failure()
        .stdout(predicate::str::contains("FAIL register broken"))
        .stdout(predicate::str::contains("INVALID_VERSION"))
        .stdout(predicate::str::contains("MISSING_FIELD"));
}

#[test]
fn validate_after_schema_upgrade() {
    let (tmp, cfg) = setup();
    let root = tmp.path().join("notes");
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[]).success();
    write_file(&root.join("posts/hello.md"), "---\ntype: article\ntitle: Hello\n---\nbody\n");

    schemata(&cfg)
        .args(["validate", "posts/hello.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK   posts/hello.md (article v1.0.0)"));

    register(&tmp, &cfg, "article-next.yaml", ARTICLE_V1_1, &["--overwrite"]).success();

    schemata(&cfg)
        .args(["validate", "posts/hello.md"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL posts/hello.md"))
        .stdout(predicate::str::contains("REQUIRED_PROPERTY_MISSING"))
        .stdout(predicate::str::contains("slug"));
}

#[test]
fn validate_folder_as_json() {
    let (tmp, cfg) = setup();
    let root = tmp.path().join("notes");
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[]).success();
    write_file(&root.join("posts/a.md"), "---\ntype: article\ntitle: A\n---\n");
    write_file(&root.join("posts/b.md"), "---\ntype: article\n---\n");

    schemata(&cfg)
        .args(["validate", "posts", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""path": "posts/a.md""#))
        .stdout(predicate::str::contains(r#""path": "posts/b.md""#))
        .stdout(predicate::str::contains(r#""code": "REQUIRED_PROPERTY_MISSING""#));
}

#[test]
fn validate_with_unknown_explicit_type() {
    let (tmp, cfg) = setup();
    let root = tmp.path().join("notes");
    write_file(&root.join("loose.md"), "---\ntitle: Loose\n---\n");

    schemata(&cfg)
        .args(["validate", "loose.md", "--type", "missing"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("NOTE_TYPE_NOT_FOUND"));
}

#[test]
fn detect_prefers_header_over_path() {
    let (tmp, cfg) = setup();
    let root = tmp.path().join("notes");
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[]).success();
    write_file(&root.join("article/draft.md"), "---\ntitle: Draft\n---\n");
    write_file(&root.join("misc/post.md"), "---\ntype: article\n---\n");
    write_file(&root.join("misc/other.md"), "---\ntype: unknown\n---\n");

    schemata(&cfg)
        .args(["detect", "misc/post.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("type: article"))
        .stdout(predicate::str::contains("confidence: high"))
        .stdout(predicate::str::contains("method: explicit"));

    schemata(&cfg)
        .args(["detect", "article/draft.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("confidence: medium"))
        .stdout(predicate::str::contains("method: path"));

    schemata(&cfg)
        .args(["detect", "misc/other.md"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("EXPLICIT_TYPE_UNRESOLVED"))
        .stdout(predicate::str::contains("no note type detected"));
}

#[test]
fn unregister_removes_type() {
    let (tmp, cfg) = setup();
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[]).success();

    schemata(&cfg)
        .args(["unregister", "article"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK   unregistered article"));

    schemata(&cfg)
        .args(["unregister", "article"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown note type: article"));
}

#[test]
fn validate_folder_continues_past_unreadable_document() {
    let (tmp, cfg) = setup();
    let root = tmp.path().join("notes");
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[]).success();
    write_file(&root.join("posts/a.md"), "---\ntype: article\ntitle: A\n---\n");
    fs::write(root.join("posts/binary.md"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

    schemata(&cfg)
        .args(["validate", "posts"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("OK   posts/a.md (article v1.0.0)"))
        .stdout(predicate::str::contains("FAIL posts/binary.md"))
        .stdout(predicate::str::contains("HEADER_PARSE_ERROR"))
        .stdout(predicate::str::contains("could not read document"))
        .stdout(predicate::str::contains("1/2 documents valid"));
}

#[test]
fn validate_resolves_types_through_cache() {
    let (tmp, cfg) = setup();
    let root = tmp.path().join("notes");
    let cache_file = root.join(".schemata/cache.json");
    register(&tmp, &cfg, "article.yaml", ARTICLE_V1, &[]).success();
    fs::remove_file(&cache_file).unwrap();
    write_file(&root.join("posts/a.md"), "---\ntype: article\ntitle: A\n---\n");

    schemata(&cfg).args(["validate", "posts/a.md"]).assert().success();

    let cached = fs::read_to_string(&cache_file).unwrap();
    assert!(cached.contains(r#""article""#));
    assert!(cached.contains(r#""version": "1.0.0""#));

    schemata(&cfg)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 entries)"));
}
