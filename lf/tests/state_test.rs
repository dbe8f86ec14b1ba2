//! Integration tests for LeadFlow state
//!
//! Run the repository and task lifecycle against a real file-backed store.

use chrono::Utc;
use leadflow::domain::{AutomationSettings, LeadRecord, NewPreset, TaskKind, TaskStatus, TaskType};
use leadflow::state::{StateRepository, TaskLifecycleManager, open_store, recover};
use tempfile::TempDir;

#[tokio::test]
async fn test_lifecycle_survives_restart() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("state.json");

    let (task_id, preset_id) = {
        let store = open_store(&path).unwrap();
        let repo = StateRepository::new(store.clone());
        let tasks = TaskLifecycleManager::new(store.clone());

        let preset = repo.create_preset(NewPreset::new("Founders")).await.unwrap();
        let task = tasks.queue(&preset.id, &AutomationSettings::default(), None).await.unwrap();
        let claimed = tasks.claim_due(Utc::now(), 5).await.unwrap();
        assert_eq!(claimed.len(), 1);

        store.shutdown().await.unwrap();
        (task.id, preset.id)
    };

    let store = open_store(&path).unwrap();
    let tasks = TaskLifecycleManager::new(store.clone());
    let running = tasks.get_required(&task_id).await.unwrap();
    assert_eq!(running.status, TaskStatus::Running);
    assert_eq!(running.kind.preset_id(), Some(preset_id.as_str()));

    let requeued = recover(&tasks).await.unwrap();
    assert_eq!(requeued, vec![task_id.clone()]);

    let done = tasks
        .complete(&task_id, vec![LeadRecord::new("Jane", "https://e.com/in/jane")])
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_legacy_document_is_normalized_on_read() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("state.json");
    std::fs::write(
        &path,
        r#"{
            "presets": [{
                "id": "p1",
                "name": "Old",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            }],
            "tasks": [{
                "id": "t1",
                "presetId": "p1",
                "status": "queued",
                "createdAt": "2024-01-01T00:00:00Z",
                "scheduledFor": "2024-01-02T00:00:00Z"
            }],
            "settings": {"headless": false}
        }"#,
    )
    .unwrap();

    let store = open_store(&path).unwrap();
    let repo = StateRepository::new(store.clone());
    let tasks = TaskLifecycleManager::new(store.clone());

    let task = tasks.get_required("t1").await.unwrap();
    assert_eq!(task.task_type(), TaskType::SalesNavigator);
    assert!(matches!(task.kind, TaskKind::SalesNavigator { .. }));

    let settings = repo.get_settings().await.unwrap();
    assert!(!settings.headless);
    assert_eq!(settings.max_delay_ms, AutomationSettings::default().max_delay_ms);

    // A queued task is due like a pending one
    let claimed = tasks.claim_due(Utc::now(), 5).await.unwrap();
    assert_eq!(claimed.len(), 1);

    // The next write stores the normalized shape
    store.shutdown().await.unwrap();
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["tasks"][0]["type"], "sales_navigator");
    assert!(raw["tasks"][0]["payload"].is_object());
    assert_eq!(raw["tasks"][0]["status"], "running");
}

#[tokio::test]
async fn test_corrupt_document_is_not_replaced() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(open_store(&path).is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn test_two_handles_on_one_file_share_work() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("state.json");

    // One plays the running scheduler, the other a CLI invocation
    let scheduler_store = open_store(&path).unwrap();
    let cli_store = open_store(&path).unwrap();
    let scheduler_tasks = TaskLifecycleManager::new(scheduler_store.clone());
    let cli_repo = StateRepository::new(cli_store.clone());
    let cli_tasks = TaskLifecycleManager::new(cli_store.clone());

    let preset = cli_repo.create_preset(NewPreset::new("P")).await.unwrap();
    let task = cli_tasks.queue(&preset.id, &AutomationSettings::default(), None).await.unwrap();

    let claimed = scheduler_tasks.claim_due(Utc::now(), 5).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, task.id);
    assert_eq!(cli_tasks.get_required(&task.id).await.unwrap().status, TaskStatus::Running);

    // Interleaved writers through both handles lose nothing
    let mut handles = Vec::new();
    for i in 0..10 {
        let repo = if i % 2 == 0 {
            StateRepository::new(scheduler_store.clone())
        } else {
            cli_repo.clone()
        };
        handles.push(tokio::spawn(async move {
            repo.append_leads(vec![LeadRecord::new(format!("L{}", i), format!("https://e.com/in/{}", i))])
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(cli_repo.count_leads().await.unwrap(), 10);
    assert_eq!(StateRepository::new(scheduler_store.clone()).count_leads().await.unwrap(), 10);

    scheduler_store.shutdown().await.unwrap();
    cli_store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_appends_and_task_creates_all_land() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let store = open_store(temp.path().join("state.json")).unwrap();
    let repo = StateRepository::new(store.clone());
    let tasks = TaskLifecycleManager::new(store.clone());
    let preset = repo.create_preset(NewPreset::new("P")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let repo = repo.clone();
        let tasks = tasks.clone();
        let preset_id = preset.id.clone();
        handles.push(tokio::spawn(async move {
            repo.append_leads(vec![LeadRecord::new(format!("L{}", i), format!("https://e.com/in/{}", i))])
                .await
                .unwrap();
            tasks.queue(&preset_id, &AutomationSettings::default(), None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(repo.count_leads().await.unwrap(), 10);
    assert_eq!(tasks.counts().await.unwrap().pending, 10);
    store.shutdown().await.unwrap();
}
