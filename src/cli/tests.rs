//! Tests for the CLI module.

use super::*;
use crate::config::TrackerConfig;
use crate::paths;
use crate::tasks::{NotificationKind, SqliteTrackerStore, TrackerStore};
use clap::{CommandFactory, Parser};
use serde_json::Value;
use std::process::ExitCode;
use tempfile::TempDir;

const TWO_PHASE_TASK: &str = r#"{
    "name": "Ship release",
    "interval_minutes": 15,
    "phases": [
        {"name": "Build", "todos": [{"name": "Compile"}, {"name": "Test"}]},
        {"name": "Publish", "todos": [{"name": "Upload"}]}
    ]
}"#;

fn settings_in(dir: &TempDir) -> Settings {
    Settings {
        data_dir: dir.path().to_path_buf(),
        db_path: paths::db_path_in(dir.path()),
        config: TrackerConfig::default(),
    }
}

fn parse(args: &[&str]) -> Command {
    let mut argv = vec!["status-tracker"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
}

fn run_args(settings: &Settings, args: &[&str], stdin: &str) -> CliOutput {
    run(parse(args), settings, stdin)
}

fn stdout_json(output: &CliOutput) -> Value {
    assert_eq!(output.exit_code, ExitCode::SUCCESS, "stderr: {:?}", output.stderr);
    serde_json::from_str(&output.stdout[0]).unwrap()
}

/// Create the two-phase task and return its JSON detail.
fn create_task(settings: &Settings) -> Value {
    stdout_json(&run_args(settings, &["task", "create"], TWO_PHASE_TASK))
}

fn todo_id(detail: &Value, phase: usize, todo: usize) -> i64 {
    detail["phases"][phase]["todos"][todo]["id"].as_i64().unwrap()
}

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn test_command_needs_stdin() {
    assert!(parse(&["task", "create"]).needs_stdin());
    assert!(parse(&["batch", "1"]).needs_stdin());

    assert!(!Command::Version.needs_stdin());
    assert!(!Command::EnsureConfig.needs_stdin());
    assert!(!Command::Repair.needs_stdin());
    assert!(!parse(&["task", "get", "1"]).needs_stdin());
    assert!(!parse(&["notifications", "count"]).needs_stdin());
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli =
        Cli::try_parse_from(["status-tracker", "task", "list", "--db", "/tmp/x.db", "-v"]).unwrap();
    assert_eq!(cli.db.as_deref(), Some(std::path::Path::new("/tmp/x.db")));
    assert!(cli.verbose);
}

#[test]
fn test_parse_rejects_unknown_status() {
    let err = Cli::try_parse_from(["status-tracker", "todo", "status", "1", "finished"]);
    assert!(err.is_err());
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let output = run(Command::Version, &settings_in(&dir), "");
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(output.stderr[0].starts_with("status-tracker v"));
}

#[test]
fn test_ensure_config_writes_file() {
    let dir = TempDir::new().unwrap();
    let output = run(Command::EnsureConfig, &settings_in(&dir), "");
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(paths::config_path_in(dir.path()).exists());
    assert!(output.stderr[0].starts_with("Config ensured at"));
}

#[test]
fn test_task_create_and_get() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    assert_eq!(detail["name"], "Ship release");
    assert_eq!(detail["status"], "todo");
    assert_eq!(detail["progress_percent"], 0);
    assert_eq!(detail["phases"].as_array().unwrap().len(), 2);

    let id = detail["id"].as_i64().unwrap().to_string();
    let fetched = stdout_json(&run_args(&settings, &["task", "get", &id], ""));
    assert_eq!(fetched["id"], detail["id"]);
    assert_eq!(fetched["phases"][1]["name"], "Publish");
}

#[test]
fn test_task_create_rejects_bad_input() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let output = run_args(&settings, &["task", "create"], "not json");
    assert_eq!(output.exit_code, ExitCode::from(1));

    let output = run_args(&settings, &["task", "create"], r#"{"name": "Empty", "phases": []}"#);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("at least one phase"));
}

#[test]
fn test_get_missing_task_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_args(&settings_in(&dir), &["task", "get", "42"], "");
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("42"));
}

#[test]
fn test_todo_updates_roll_up() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let compile = todo_id(&detail, 0, 0).to_string();

    let task = stdout_json(&run_args(&settings, &["todo", "status", &compile, "done"], ""));
    // Build is half done: 0.5 * 0.5 + 0 = 25%.
    assert_eq!(task["progress_percent"], 25);
    assert_eq!(task["status"], "in_progress");
}

#[test]
fn test_task_done_refused_with_exit_code_two() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap().to_string();

    let output = run_args(&settings, &["task", "status", &id, "done"], "");
    assert_eq!(output.exit_code, ExitCode::from(2));
    assert!(output.stderr[0].contains("3 of 3 checklist items remain incomplete"));

    let fetched = stdout_json(&run_args(&settings, &["task", "get", &id], ""));
    assert_eq!(fetched["status"], "todo");
}

#[test]
fn test_phase_completed_then_task_done() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap().to_string();

    for phase in detail["phases"].as_array().unwrap() {
        let phase_id = phase["id"].as_i64().unwrap().to_string();
        stdout_json(&run_args(&settings, &["phase", "status", &phase_id, "completed"], ""));
    }

    let task = stdout_json(&run_args(&settings, &["task", "status", &id, "done"], ""));
    assert_eq!(task["status"], "done");
    assert_eq!(task["progress_percent"], 100);

    let count = run_args(&settings, &["notifications", "count"], "");
    assert_eq!(count.stdout, vec!["1".to_string()]);
}

#[test]
fn test_phase_and_todo_add() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap().to_string();

    let phase = stdout_json(&run_args(
        &settings,
        &["phase", "add", &id, "--name", "Announce", "--todo", "Blog", "--todo", "Tweet"],
        "",
    ));
    assert_eq!(phase["name"], "Announce");
    assert_eq!(phase["todos"].as_array().unwrap().len(), 2);

    let phase_id = phase["id"].as_i64().unwrap().to_string();
    let todo = stdout_json(&run_args(
        &settings,
        &["todo", "add", &phase_id, "--name", "Email", "--status", "done"],
        "",
    ));
    assert_eq!(todo["status"], "done");

    let fetched = stdout_json(&run_args(&settings, &["task", "get", &id], ""));
    assert_eq!(fetched["phases"][2]["status"], "in_progress");
}

#[test]
fn test_task_list_filters() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let compile = todo_id(&detail, 0, 0).to_string();
    create_task(&settings);
    run_args(&settings, &["todo", "status", &compile, "done"], "");

    let all = stdout_json(&run_args(&settings, &["task", "list"], ""));
    assert_eq!(all.as_array().unwrap().len(), 2);

    let active = stdout_json(&run_args(&settings, &["task", "list", "-s", "in_progress"], ""));
    let active = active.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], detail["id"]);
}

#[test]
fn test_task_edit_and_delete() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap().to_string();

    let task = stdout_json(&run_args(
        &settings,
        &["task", "edit", &id, "--name", "Ship 2.0", "--priority", "critical"],
        "",
    ));
    assert_eq!(task["name"], "Ship 2.0");
    assert_eq!(task["priority"], "critical");

    let output = run_args(&settings, &["task", "delete", &id], "");
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    let output = run_args(&settings, &["task", "delete", &id], "");
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[test]
fn test_comments() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap().to_string();

    let comment = stdout_json(&run_args(
        &settings,
        &["comment", "add", &id, "Looking at the build", "--author", "agent"],
        "",
    ));
    assert_eq!(comment["author"], "agent");

    let comments = stdout_json(&run_args(&settings, &["comment", "list", &id], ""));
    let last = comments.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["text"], "Looking at the build");
}

#[test]
fn test_batch_report() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap().to_string();
    let items = format!(
        r#"[{{"comment": "Build is green"}}, {{"todo_id": {}, "status": "done"}}, {{"todo_id": {}, "status": "done"}}]"#,
        todo_id(&detail, 0, 0),
        todo_id(&detail, 0, 1)
    );

    let outcome = stdout_json(&run_args(&settings, &["batch", &id], &items));
    assert_eq!(outcome["comments_added"], 1);
    assert_eq!(outcome["todos_updated"], 2);
    assert_eq!(outcome["task"]["progress_percent"], 50);
}

#[test]
fn test_batch_rejects_invalid_items() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap().to_string();

    let output = run_args(&settings, &["batch", &id], r#"[{"todo_id": 1}]"#);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("requires a status"));
}

#[test]
fn test_notifications_read() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let id = detail["id"].as_i64().unwrap();
    let store = SqliteTrackerStore::new(&settings.db_path).unwrap();
    store.add_notification(id, NotificationKind::Reminder, "ping").unwrap();
    store.add_notification(id, NotificationKind::Reminder, "ping again").unwrap();

    let listed = stdout_json(&run_args(&settings, &["notifications", "list", "--unread"], ""));
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["message"], "ping again");

    let first = listed[1]["id"].as_i64().unwrap().to_string();
    let output = run_args(&settings, &["notifications", "read", &first], "");
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert_eq!(run_args(&settings, &["notifications", "count"], "").stdout, vec!["1"]);

    let output = run_args(&settings, &["notifications", "read-all"], "");
    assert_eq!(output.stdout, vec!["Marked 1 notification(s) as read"]);

    let output = run_args(&settings, &["notifications", "read", "999"], "");
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[test]
fn test_worker_once_reports_nothing_for_fresh_tasks() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let detail = create_task(&settings);
    let compile = todo_id(&detail, 0, 0).to_string();
    run_args(&settings, &["todo", "status", &compile, "done"], "");

    let report = stdout_json(&run_args(&settings, &["worker", "--once"], ""));
    assert_eq!(report["reminded"], serde_json::json!([]));
}

#[test]
fn test_repair_on_consistent_store() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    create_task(&settings);

    let report = stdout_json(&run_args(&settings, &["repair"], ""));
    assert_eq!(report["examined"], 1);
    assert_eq!(report["tasks_changed"], serde_json::json!([]));
}

#[test]
#[serial_test::serial]
fn test_settings_resolve_uses_config_database_path() {
    let dir = TempDir::new().unwrap();
    let config =
        TrackerConfig { database_path: Some("custom.db".into()), ..TrackerConfig::default() };
    config.save_to(dir.path()).unwrap();
    std::env::remove_var(crate::config::DB_ENV_VAR);

    let settings = Settings::resolve(Some(dir.path().to_path_buf()), None).unwrap();
    assert_eq!(settings.db_path, dir.path().join("custom.db"));

    let explicit = dir.path().join("flag.db");
    let settings = Settings::resolve(Some(dir.path().to_path_buf()), Some(explicit.clone())).unwrap();
    assert_eq!(settings.db_path, explicit);
}
