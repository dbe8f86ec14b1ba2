//! End-to-end tests for the `lf` binary

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use assert_cmd::Command;
use assert_cmd::cargo::CommandCargoExt;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// `lf` isolated inside `temp`: its own state file, logs and config dirs
fn lf(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lf").expect("lf binary");
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("XDG_DATA_HOME", temp.path().join("data"))
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env_remove("RUST_LOG")
        .env_remove("LEADFLOW_CONFIG")
        .arg("--state")
        .arg(temp.path().join("state.json"));
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run lf");
    assert!(output.status.success(), "lf failed: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("json output")
}

fn create_preset(temp: &TempDir, name: &str) -> String {
    lf(temp)
        .args(["preset", "create", name, "--title", "CTO", "--page-limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created preset"));

    let presets = json_output(lf(temp).args(["preset", "list", "--format", "json"]));
    presets
        .as_array()
        .and_then(|all| all.iter().find(|p| p["name"] == name))
        .and_then(|p| p["id"].as_str())
        .expect("preset id")
        .to_string()
}

fn only_task(temp: &TempDir) -> Value {
    let tasks = json_output(lf(temp).args(["task", "list", "--format", "json"]));
    let tasks = tasks.as_array().expect("task array").clone();
    assert_eq!(tasks.len(), 1);
    tasks[0].clone()
}

#[test]
fn test_help() {
    let temp = TempDir::new().unwrap();
    lf(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("preset"))
        .stdout(predicate::str::contains("task"));
}

#[test]
fn test_queue_then_back_to_draft() {
    let temp = TempDir::new().unwrap();
    let preset_id = create_preset(&temp, "CTOs");

    lf(&temp)
        .args(["task", "queue", &preset_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending"));

    let task = only_task(&temp);
    assert_eq!(task["type"], "sales_navigator");
    assert_eq!(task["status"], "pending");
    assert!(task["scheduledFor"].is_string());
    let id = task["id"].as_str().unwrap().to_string();

    lf(&temp)
        .args(["task", "status", &id, "draft"])
        .assert()
        .success()
        .stdout(predicate::str::contains("draft"));

    let task = only_task(&temp);
    assert_eq!(task["status"], "draft");
    assert!(task.get("scheduledFor").is_none());

    let status = json_output(lf(&temp).args(["status", "--format", "json"]));
    assert_eq!(status["tasks"]["draft"], 1);
    assert_eq!(status["presets"], 1);
}

#[test]
fn test_queue_for_unknown_preset_fails() {
    let temp = TempDir::new().unwrap();
    lf(&temp)
        .args(["task", "queue", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_post_task_needs_reactions_or_commenters() {
    let temp = TempDir::new().unwrap();
    lf(&temp)
        .args(["task", "posts", "https://e.com/posts/1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reactions"));

    lf(&temp)
        .args(["task", "posts", "https://e.com/posts/1", "--commenters", "--list", "Q3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("post_engagement"));

    let task = only_task(&temp);
    assert_eq!(task["name"], "Post Engagement");
    assert_eq!(task["payload"]["targetLeadListName"], "Q3");
}

#[test]
fn test_settings_are_masked_and_snapshotted() {
    let temp = TempDir::new().unwrap();
    let preset_id = create_preset(&temp, "P");

    lf(&temp).args(["task", "draft", &preset_id]).assert().success();

    lf(&temp)
        .args(["settings", "set", "--session-cookie", "s3cret", "--headless", "false"])
        .assert()
        .success();

    lf(&temp)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cret").not())
        .stdout(predicate::str::contains("********"));

    // The draft was created before the change
    let task = only_task(&temp);
    assert_eq!(task["settingsSnapshot"]["headless"], true);
}

#[test]
fn test_invalid_settings_rejected() {
    let temp = TempDir::new().unwrap();
    lf(&temp)
        .args(["settings", "set", "--min-delay-ms", "9000", "--max-delay-ms", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("minDelayMs"));
}

#[test]
fn test_run_requires_automation_command() {
    let temp = TempDir::new().unwrap();
    lf(&temp)
        .args(["run", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("automation.command"));
}

fn write_driver(dir: &Path) -> PathBuf {
    let driver = dir.join("driver.sh");
    std::fs::write(
        &driver,
        r#"cat >/dev/null
echo '{"profiles":[{"fullName":"Jane","profileUrl":"https://e.com/in/jane/"},{"fullName":"Bob","profileUrl":"/in/bob"}]}'
"#,
    )
    .unwrap();
    driver
}

fn write_config(temp: &TempDir, poll_interval_ms: u64) -> PathBuf {
    let driver = write_driver(temp.path());
    let config = temp.path().join("lf.yml");
    std::fs::write(
        &config,
        format!(
            "scheduler:\n  origin: https://e.com\n  poll-interval-ms: {}\nautomation:\n  command: sh\n  args: [\"{}\"]\n  timeout-ms: 10000\n",
            poll_interval_ms,
            driver.display()
        ),
    )
    .unwrap();
    config
}

fn queue_profile_task(temp: &TempDir) -> String {
    lf(temp)
        .args(["settings", "set", "--min-delay-ms", "0", "--max-delay-ms", "0"])
        .assert()
        .success();
    lf(temp)
        .args(["task", "profiles", "https://e.com/in/jane", "--list", "Q3"])
        .assert()
        .success();
    let id = only_task(temp)["id"].as_str().unwrap().to_string();
    lf(temp).args(["task", "schedule", &id]).assert().success();
    id
}

#[cfg(unix)]
#[test]
fn test_run_once_collects_leads() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, 30_000);
    queue_profile_task(&temp);

    lf(&temp)
        .arg("--config")
        .arg(&config)
        .args(["run", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 tasks finished"));

    let task = only_task(&temp);
    assert_eq!(task["status"], "completed");
    assert_eq!(task["resultLeadIds"].as_array().unwrap().len(), 2);

    let leads = json_output(lf(&temp).args(["lead", "list", "--format", "json"]));
    let leads = leads.as_array().unwrap();
    assert_eq!(leads.len(), 2);
    assert_eq!(leads[0]["profileUrl"], "https://e.com/in/jane");
    assert_eq!(leads[1]["profileUrl"], "https://e.com/in/bob");
    assert_eq!(leads[1]["listName"], "Q3");
}

/// Kills the background scheduler even when an assertion fails first
struct Background(std::process::Child);

impl Drop for Background {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[cfg(unix)]
#[test]
fn test_cli_queues_work_while_scheduler_runs() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, 200);

    let scheduler = std::process::Command::cargo_bin("lf")
        .expect("lf binary")
        .current_dir(temp.path())
        .env("HOME", temp.path())
        .env("XDG_DATA_HOME", temp.path().join("data"))
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env_remove("RUST_LOG")
        .env_remove("LEADFLOW_CONFIG")
        .arg("--state")
        .arg(temp.path().join("state.json"))
        .arg("--config")
        .arg(&config)
        .arg("run")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn scheduler");
    let _scheduler = Background(scheduler);

    // Every edit below goes through while the scheduler has the document open
    let id = queue_profile_task(&temp);

    let mut task = only_task(&temp);
    for _ in 0..100 {
        if task["status"] == "completed" {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
        task = only_task(&temp);
    }
    assert_eq!(task["id"], id.as_str());
    assert_eq!(task["status"], "completed");

    lf(&temp)
        .arg("--config")
        .arg(&config)
        .args(["run", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already running"));
}
