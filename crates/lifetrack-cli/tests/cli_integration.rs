use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|err| panic!("clock should be >= UNIX_EPOCH: {err}"))
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{now}"));
    fs::create_dir_all(&dir)
        .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
    dir
}

fn run_lt<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_lt"))
        .args(args)
        .output()
        .unwrap_or_else(|err| panic!("failed to execute lt binary: {err}"))
}

fn run_json<I, S>(args: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_lt(args);
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "lt command failed (status={}):\nstdout:\n{}\nstderr:\n{}",
            output.status, stdout, stderr
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    serde_json::from_str(&stdout)
        .unwrap_or_else(|err| panic!("stdout is not valid JSON: {err}\nstdout:\n{stdout}"))
}

fn as_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing string field `{key}` in payload: {value}"))
}

fn as_u64(value: &Value, key: &str) -> u64 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .unwrap_or_else(|| panic!("missing integer field `{key}` in payload: {value}"))
}

fn as_array<'a>(value: &'a Value, key: &str) -> &'a Vec<Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .unwrap_or_else(|| panic!("missing array field `{key}` in payload: {value}"))
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap_or_else(|| panic!("path should be valid UTF-8: {}", path.display()))
}

#[test]
fn every_payload_is_stamped_with_the_contract_version() {
    let dir = unique_temp_dir("lt-contract");
    let payload = run_json(["--data-dir", path_str(&dir), "profile", "show"]);
    assert_eq!(as_str(&payload, "contract_version"), "cli.v1");
    assert_eq!(as_str(payload.get("profile").unwrap_or(&Value::Null), "name"), "New User");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn task_lifecycle_add_complete_archive() {
    let dir = unique_temp_dir("lt-tasks");
    let data_dir = path_str(&dir);

    let added = run_json([
        "--data-dir", data_dir, "task", "add", "--name", "water the plants",
        "--category", "Daily Goal",
    ]);
    let task = added.get("task").unwrap_or(&Value::Null);
    assert_eq!(as_str(task, "status"), "Pending");
    assert_eq!(as_str(task, "name"), "water the plants");
    assert!(task.get("completed_date").is_some_and(Value::is_null));

    let listed = run_json(["--data-dir", data_dir, "task", "list"]);
    assert_eq!(as_array(&listed, "tasks").len(), 1);

    let updated = run_json([
        "--data-dir", data_dir, "task", "set-status", "--index", "0", "--status", "done",
    ]);
    let task = updated.get("task").unwrap_or(&Value::Null);
    assert_eq!(as_str(task, "status"), "Done");
    assert!(task.get("completed_date").is_some_and(|date| !date.is_null()));

    let archived = run_json(["--data-dir", data_dir, "task", "archive"]);
    assert_eq!(as_u64(&archived, "archived"), 1);

    let listed = run_json(["--data-dir", data_dir, "task", "list"]);
    assert!(as_array(&listed, "tasks").is_empty());

    let history = run_json(["--data-dir", data_dir, "history", "--action", "TASK_COMPLETE"]);
    assert_eq!(as_array(&history, "records").len(), 1);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn out_of_range_index_reports_a_no_op() {
    let dir = unique_temp_dir("lt-noop");
    let payload = run_json([
        "--data-dir", path_str(&dir), "task", "set-status", "--index", "7", "--status", "done",
    ]);
    assert!(payload.get("task").is_some_and(Value::is_null));
    assert!(as_str(&payload, "note").contains("out of range"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_document_key_is_an_error() {
    let dir = unique_temp_dir("lt-badkey");
    let output = run_lt(["--data-dir", path_str(&dir), "data", "load", "--key", "settings"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid document key"), "stderr was: {stderr}");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn raw_data_surface_round_trips_documents() {
    let dir = unique_temp_dir("lt-data");
    let data_dir = path_str(&dir);

    let loaded = run_json(["--data-dir", data_dir, "data", "load", "--key", "tasks"]);
    assert_eq!(as_str(&loaded, "origin"), "stored");
    assert!(loaded.get("document").is_some_and(Value::is_array));

    let replacement = dir.join("tasks-replacement.json");
    let body = r#"[{"id": "01HZY9D4Q3SG7PV9A6EXJ8N2E4", "name": "imported", "category": "Work",
                    "status": "Pending", "created_date": "2024-03-01", "completed_date": null}]"#;
    fs::write(&replacement, body)
        .unwrap_or_else(|err| panic!("failed to write replacement document: {err}"));

    run_json([
        "--data-dir", data_dir, "data", "save", "--key", "tasks",
        "--file", path_str(&replacement),
    ]);

    let listed = run_json(["--data-dir", data_dir, "task", "list"]);
    let tasks = as_array(&listed, "tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(as_str(&tasks[0], "name"), "imported");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn health_logs_feed_monthly_stats_and_score() {
    let dir = unique_temp_dir("lt-stats");
    let data_dir = path_str(&dir);

    run_json([
        "--data-dir", data_dir, "health", "food", "--date", "2024-03-01",
        "--name", "toast", "--calories", "800",
    ]);
    run_json([
        "--data-dir", data_dir, "health", "food", "--date", "2024-03-02",
        "--name", "feast", "--calories", "2600",
    ]);
    run_json([
        "--data-dir", data_dir, "health", "workout", "--date", "2024-03-01",
        "--completed", "true",
    ]);
    run_json(["--data-dir", data_dir, "health", "weight", "--date", "2024-03-01", "--kg", "80.0"]);
    run_json(["--data-dir", data_dir, "health", "weight", "--date", "2024-03-20", "--kg", "78.5"]);

    let stats = run_json(["--data-dir", data_dir, "stats", "--year", "2024", "--month", "3"]);
    assert_eq!(as_u64(&stats, "days_under_limit"), 1);
    assert_eq!(as_u64(&stats, "workouts_count"), 1);
    let weight_change = stats
        .get("weight_change")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| panic!("missing weight_change in payload: {stats}"));
    assert!((weight_change - (-1.5)).abs() < 1e-9);
    assert!(stats.get("score").is_some_and(Value::is_u64));

    let history = run_json(["--data-dir", data_dir, "health", "weight-history"]);
    let weights = history
        .get("weights")
        .and_then(Value::as_object)
        .unwrap_or_else(|| panic!("missing weights in payload: {history}"));
    assert_eq!(weights.len(), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn empty_month_stats_are_zeroed() {
    let dir = unique_temp_dir("lt-empty-stats");
    let stats =
        run_json(["--data-dir", path_str(&dir), "stats", "--year", "2024", "--month", "3"]);
    assert_eq!(as_u64(&stats, "days_under_limit"), 0);
    assert_eq!(as_u64(&stats, "workouts_count"), 0);
    assert_eq!(as_u64(&stats, "score"), 0);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn journal_lists_newest_entry_first() {
    let dir = unique_temp_dir("lt-journal");
    let data_dir = path_str(&dir);

    run_json([
        "--data-dir", data_dir, "journal", "add", "--title", "first", "--content", "one",
    ]);
    run_json([
        "--data-dir", data_dir, "journal", "add", "--title", "second", "--content", "two",
    ]);

    let listed = run_json(["--data-dir", data_dir, "journal", "list"]);
    let entries = as_array(&listed, "entries");
    assert_eq!(entries.len(), 2);
    let first_date = as_str(&entries[0], "date");
    let second_date = as_str(&entries[1], "date");
    assert!(first_date >= second_date, "entries should be newest-first");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn profile_set_round_trips_and_keeps_avatar() {
    let dir = unique_temp_dir("lt-profile");
    let data_dir = path_str(&dir);

    run_json([
        "--data-dir", data_dir, "profile", "set", "--name", "Sam", "--height", "180",
        "--current-weight", "82", "--goal-weight", "76", "--calorie-limit", "2300",
    ]);

    let shown = run_json(["--data-dir", data_dir, "profile", "show"]);
    let profile = shown.get("profile").unwrap_or(&Value::Null);
    assert_eq!(as_str(profile, "name"), "Sam");
    assert_eq!(as_u64(profile, "calorie_limit"), 2300);
    let avatar = profile.get("avatar_config").unwrap_or(&Value::Null);
    assert_eq!(as_str(avatar, "style"), "default");

    let status = run_json(["--data-dir", data_dir, "status", "--date", "2024-03-09"]);
    assert_eq!(as_u64(&status, "calorie_limit"), 2300);
    assert_eq!(as_u64(&status, "calories_consumed"), 0);

    let _ = fs::remove_dir_all(&dir);
}
