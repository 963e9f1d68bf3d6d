//! CLI contract tests.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;

use assert_cmd::Command;

const ROSTER: &str = r#"
[groups.acme]
name = "Acme"

[groups.acme.projects.web]
name = "web"
github_usernames = ["alice", "ghost"]

[groups.acme.projects.api]
name = "api"
github_usernames = ["ghost"]
"#;

fn ghwatch(dir: &Path) -> Command {
    let mut cmd = match Command::cargo_bin("ghwatch") {
        Ok(cmd) => cmd,
        Err(err) => panic!("ghwatch binary should be built: {err}"),
    };
    cmd.current_dir(dir)
        .env_remove("GITHUB_TOKEN")
        .env_remove("DISCORD_WEBHOOK_URL")
        .env("RUST_LOG", "warn");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Serve `/users/ghost` as 404 and every other path as 200 until the test exits.
fn spawn_fake_github() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if line == "\r\n" => break,
                    Ok(_) => {}
                }
            }
            let (status, body) = if request_line.starts_with("GET /users/ghost ") {
                ("404 Not Found", r#"{"message":"Not Found"}"#)
            } else {
                ("200 OK", r#"{"login":"alice"}"#)
            };
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}")
}

#[test]
fn validate_reports_roster_and_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("roster.toml"), ROSTER).expect("write roster");

    let output = ghwatch(dir.path())
        .arg("validate")
        .output()
        .expect("run ghwatch");

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("roster ok: 1 groups, 2 projects, 2 distinct usernames"));
    assert!(stdout.contains("config ok: alert_with_details=false, max_attempts=3"));
}

#[test]
fn validate_rejects_unsafe_username() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("roster.toml"),
        "[groups.a]\nname = \"A\"\n[groups.a.projects.p]\nname = \"p\"\ngithub_usernames = [\"a/b\"]\n",
    )
    .expect("write roster");

    let output = ghwatch(dir.path())
        .arg("validate")
        .output()
        .expect("run ghwatch");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("invalid GitHub username"));
}

#[test]
fn missing_roster_fails() {
    let dir = tempfile::tempdir().expect("tempdir");

    let output = ghwatch(dir.path())
        .args(["validate", "--roster", "nope.toml"])
        .output()
        .expect("run ghwatch");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("failed to read roster"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("roster.toml"), ROSTER).expect("write roster");

    let output = ghwatch(dir.path())
        .args(["validate", "--config", "missing.toml"])
        .output()
        .expect("run ghwatch");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("failed to read config"));
}

#[test]
fn probe_rejects_path_like_username() {
    let dir = tempfile::tempdir().expect("tempdir");

    let output = ghwatch(dir.path())
        .args(["probe", "../etc"])
        .output()
        .expect("run ghwatch");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("invalid GitHub username"));
}

#[test]
fn probe_prints_status_per_username() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = spawn_fake_github();
    std::fs::write(
        dir.path().join("ghwatch.toml"),
        format!("[probe]\napi_base = \"{base}\"\nretry_delay_secs = 0\n"),
    )
    .expect("write config");

    let output = ghwatch(dir.path())
        .args(["probe", "alice", "ghost"])
        .output()
        .expect("run ghwatch");

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("alice: active (1 attempt)"));
    assert!(stdout.contains("ghost: suspended (1 attempt)"));
}

#[test]
fn dry_run_prints_alert_and_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = spawn_fake_github();
    std::fs::write(dir.path().join("roster.toml"), ROSTER).expect("write roster");
    std::fs::write(
        dir.path().join("ghwatch.toml"),
        format!(
            "[message_types]\nalert_with_details = true\n\n[probe]\napi_base = \"{base}\"\nretry_delay_secs = 0\n"
        ),
    )
    .expect("write config");

    let output = ghwatch(dir.path())
        .args(["run", "--dry-run"])
        .output()
        .expect("run ghwatch");

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Suspended Accounts Alert!"));
    assert!(stdout.contains("- web: ghost"));
    assert!(stdout.contains("- api: ghost"));
    assert!(!stdout.contains("alice"));

    let json_start = stdout.find('{').expect("tree json in output");
    let tree: serde_json::Value =
        serde_json::from_str(stdout[json_start..].trim()).expect("tree should be JSON");
    assert_eq!(
        tree,
        serde_json::json!({"Acme": {"api": ["ghost"], "web": ["ghost"]}})
    );
}

#[test]
fn unusable_webhook_url_does_not_stop_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = spawn_fake_github();
    std::fs::write(dir.path().join("roster.toml"), ROSTER).expect("write roster");
    std::fs::write(
        dir.path().join("ghwatch.toml"),
        format!(
            "[message_types]\nalert_with_details = true\n\n[probe]\napi_base = \"{base}\"\nretry_delay_secs = 0\n"
        ),
    )
    .expect("write config");

    let output = ghwatch(dir.path())
        .env("DISCORD_WEBHOOK_URL", "ftp://example.com/hook")
        .arg("run")
        .output()
        .expect("run ghwatch");

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stderr_of(&output).contains("webhook URL unusable"));
}
