//! Integration tests for `status_tracker`.

use chrono::Duration;
use status_tracker::error::Error;
use status_tracker::notifier::Notifier;
use status_tracker::tasks::{
    BatchItem, NewPhase, NewTask, NotificationKind, PhaseStatus, SqliteTrackerStore, TaskStatus,
    TodoStatus, TrackerStore,
};
use status_tracker::VERSION;
use tempfile::TempDir;

#[test]
fn test_version_exists() {
    assert!(!VERSION.is_empty());
}

fn release_task() -> NewTask {
    let mut task = NewTask::named("Release 1.0")
        .with_phase(
            NewPhase::named("Build")
                .with_todo("Compile", TodoStatus::Todo)
                .with_todo("Test", TodoStatus::Todo),
        )
        .with_phase(NewPhase::named("Publish").with_todo("Upload", TodoStatus::Todo));
    task.interval_minutes = Some(5);
    task
}

#[test]
fn test_full_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = SqliteTrackerStore::new(dir.path().join("tracker.sqlite3")).unwrap();

    let detail = store.create_task(release_task()).unwrap().into_inner();
    let id = detail.task.id;
    let build = detail.phase_named("Build").unwrap();
    let (compile, test) = (build.todos[0].id, build.todos[1].id);
    let publish = detail.phase_named("Publish").unwrap().phase.id;

    let task = store.update_todo_status(compile, TodoStatus::Done).unwrap().into_inner();
    assert_eq!((task.progress_percent, task.status), (25, TaskStatus::InProgress));

    // Blocked phases contribute nothing and stay blocked while todos move.
    store.update_phase_status(publish, PhaseStatus::Blocked).unwrap();
    let err = store.update_task_status(id, TaskStatus::Done).unwrap_err();
    assert!(matches!(err, Error::CompletionBlocked(ref b) if b.incomplete == 2));

    let task = store.update_todo_status(test, TodoStatus::Done).unwrap().into_inner();
    assert_eq!(task.progress_percent, 50);

    let items = vec![
        BatchItem { comment: Some("Unblocked upload".into()), ..BatchItem::default() },
        BatchItem {
            phase_id: Some(publish),
            status: Some("completed".into()),
            ..BatchItem::default()
        },
    ];
    let outcome = store.batch_report(id, &items).unwrap().into_inner();
    assert_eq!(outcome.task.progress_percent, 100);
    assert_eq!(outcome.task.status, TaskStatus::Done);

    let detail = store.get_task_detail(id).unwrap();
    assert!(detail.todos().all(|t| t.status == TodoStatus::Done));
    assert!(detail.comments.iter().any(|c| c.text == "Unblocked upload"));

    let notifications = store.list_notifications(false, 10).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Completion);
    assert_eq!(notifications[0].message, "Task 'Release 1.0' has been completed!");
}

#[test]
fn test_notifier_reminds_quiet_task() {
    let dir = TempDir::new().unwrap();
    let store = SqliteTrackerStore::new(dir.path().join("tracker.sqlite3")).unwrap();

    let detail = store.create_task(release_task()).unwrap().into_inner();
    let compile = detail.phases[0].todos[0].id;
    let task = store.update_todo_status(compile, TodoStatus::Done).unwrap().into_inner();

    let notifier = Notifier::new(&store, &store);
    let report = notifier.check_and_notify(task.last_ping + Duration::minutes(6)).unwrap();
    assert_eq!(report.reminded, vec![task.id]);

    assert_eq!(store.unread_notification_count().unwrap(), 1);
    assert_eq!(store.get_task_detail(task.id).unwrap().unread_reminder_count, 1);
    assert_eq!(store.mark_all_notifications_read().unwrap(), 1);
    assert_eq!(store.get_task_detail(task.id).unwrap().unread_reminder_count, 0);
}

#[test]
fn test_concurrent_todo_updates_converge() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("tracker.sqlite3");
    let store = SqliteTrackerStore::new(&db_path).unwrap();

    let mut phase = NewPhase::named("Many");
    for i in 0..8 {
        phase = phase.with_todo(format!("item {i}"), TodoStatus::Todo);
    }
    let detail = store.create_task(NewTask::named("Parallel").with_phase(phase)).unwrap();
    let detail = detail.into_inner();
    let todo_ids: Vec<i64> = detail.todos().map(|t| t.id).collect();

    std::thread::scope(|s| {
        for chunk in todo_ids.chunks(2) {
            let db_path = &db_path;
            s.spawn(move || {
                let store = SqliteTrackerStore::new(db_path).unwrap();
                for &id in chunk {
                    store.update_todo_status(id, TodoStatus::Done).unwrap();
                }
            });
        }
    });

    let task = store.get_task(detail.task.id).unwrap().unwrap();
    assert_eq!(task.progress_percent, 100);
    assert_eq!(task.status, TaskStatus::Done);

    let repair = store.recompute_all().unwrap().into_inner();
    assert!(repair.tasks_changed.is_empty());
}
