use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const VALID_PAGE: &str = r#"<!doctype html>
<html ⚡ lang="de">
<head>
<meta charset="utf-8">
<title>A3 wieder frei</title>
<link rel="canonical" href="https://informant.example.org/2018/5/696-a3-wieder-frei">
<meta name="viewport" content="width=device-width,minimum-scale=1,initial-scale=1">
<script async src="https://cdn.ampproject.org/v0.js"></script>
<style amp-boilerplate>body{visibility:hidden}</style><noscript><style amp-boilerplate>body{visibility:visible}</style></noscript>
</head>
<body><h1>A3 wieder frei</h1></body>
</html>
"#;

fn run_informant(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_informant"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("SITE_ORIGIN")
        .env_remove("CMS_API_URL")
        .env_remove("BUCKET_NAME")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run informant");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_validate_accepts_amp_page() {
    let tmp = TempDir::new().unwrap();
    let page = tmp.path().join("page.html");
    fs::write(&page, VALID_PAGE).unwrap();

    let (stdout, stderr, ok) = run_informant(
        &tmp.path().join("none.toml"),
        &["validate", page.to_str().unwrap()],
    );

    assert!(ok, "stderr: {}", stderr);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["status"], "PASS");
}

#[test]
fn test_validate_rejects_plain_html() {
    let tmp = TempDir::new().unwrap();
    let page = tmp.path().join("page.html");
    fs::write(&page, "<html><body><img src=\"a.jpg\"></body></html>").unwrap();

    let (stdout, stderr, ok) = run_informant(
        &tmp.path().join("none.toml"),
        &["validate", page.to_str().unwrap()],
    );

    assert!(!ok);
    assert!(stderr.contains("failed AMP validation"));
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["status"], "FAIL");
    assert!(!result["diagnostics"].as_array().unwrap().is_empty());
}

#[test]
fn test_publish_without_config_fails() {
    let tmp = TempDir::new().unwrap();

    let (_, stderr, ok) = run_informant(&tmp.path().join("missing.toml"), &["publish", "696"]);

    assert!(!ok);
    assert!(stderr.contains("site.origin"), "stderr: {}", stderr);
}

#[test]
fn test_delete_requires_created() {
    let tmp = TempDir::new().unwrap();

    let (_, stderr, ok) = run_informant(&tmp.path().join("missing.toml"), &["delete", "696"]);

    assert!(!ok);
    assert!(stderr.contains("--created"), "stderr: {}", stderr);
}
