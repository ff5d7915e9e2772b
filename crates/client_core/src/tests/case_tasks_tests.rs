use serde_json::json;

use super::*;
use crate::{
    filtering::{FilterDefaults, Filtering, MemoryContextStore},
    modal::FixedAnswer,
    test_support::{
        task, task_with_status, FakeResponders, FakeTaskSearch, FakeTaskService, Notice,
        RecordingNavigator, RecordingNotifier, RunBehavior,
    },
    InMemoryLayout,
};

struct Harness {
    manager: TaskListManager,
    search: Arc<FakeTaskSearch>,
    tasks: Arc<FakeTaskService>,
    filtering: Arc<Filtering>,
    store: Arc<MemoryContextStore>,
    notifier: Arc<RecordingNotifier>,
    responders: Arc<FakeResponders>,
    navigator: Arc<RecordingNavigator>,
    layout: Arc<InMemoryLayout>,
}

struct Setup {
    search: FakeTaskSearch,
    tasks: FakeTaskService,
    responders: FakeResponders,
    confirm: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            search: FakeTaskSearch::default(),
            tasks: FakeTaskService::default(),
            responders: FakeResponders::new(RunBehavior::Succeed),
            confirm: true,
        }
    }
}

fn harness(setup: Setup) -> Harness {
    let search = Arc::new(setup.search);
    let tasks = Arc::new(setup.tasks);
    let store = Arc::new(MemoryContextStore::default());
    let filtering = Arc::new(Filtering::new(
        "task.list",
        FilterDefaults::case_tasks(),
        store.clone(),
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let responders = Arc::new(setup.responders);
    let navigator = Arc::new(RecordingNavigator::default());
    let layout = Arc::new(InMemoryLayout::new(false));

    let manager = TaskListManager::new(
        CaseId::from("case-1"),
        TaskListDependencies {
            search: search.clone(),
            tasks: tasks.clone(),
            filtering: filtering.clone(),
            notifier: notifier.clone(),
            responders: responders.clone(),
            dialog: Arc::new(FixedAnswer(setup.confirm)),
            navigator: navigator.clone(),
            layout: layout.clone(),
        },
    );

    Harness {
        manager,
        search,
        tasks,
        filtering,
        store,
        notifier,
        responders,
        navigator,
        layout,
    }
}

fn status_patch(status: TaskStatus) -> TaskPatch {
    TaskPatch::status(status)
}

fn detail_route(task_id: &str) -> Route {
    Route::TaskDetail {
        case_id: CaseId::from("case-1"),
        task_id: TaskId::from(task_id),
    }
}

#[tokio::test]
async fn load_excludes_cancelled_tasks_and_uses_filter_context() {
    let h = harness(Setup::default());
    h.manager.init().await.expect("init");

    let requests = h.search.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(
        request.query().to_json(),
        json!({
            "_and": [
                { "_parent": { "_type": "case", "_query": { "_id": "case-1" } } },
                { "_not": { "status": "Cancel" } }
            ]
        })
    );
    let sort: Vec<String> = request.sort.iter().map(ToString::to_string).collect();
    assert_eq!(sort, vec!["-flag", "+order", "+startDate", "+title"]);
    assert_eq!(request.page_size, 15);
    assert!(request.load_all);
}

#[tokio::test]
async fn active_filters_are_appended_to_the_base_filter() {
    let h = harness(Setup::default());
    h.manager.init().await.expect("init");

    h.manager
        .add_filter_value("group", json!("Triage"))
        .await
        .expect("filter");

    let last = h.search.requests().pop().expect("request");
    assert_eq!(
        last.query().to_json(),
        json!({
            "_and": [
                { "_parent": { "_type": "case", "_query": { "_id": "case-1" } } },
                { "_not": { "status": "Cancel" } },
                { "group": "Triage" }
            ]
        })
    );
}

#[tokio::test]
async fn load_builds_groups_from_results() {
    let h = harness(Setup {
        search: FakeTaskSearch::with_tasks(vec![
            task("t1", "B", 2),
            task("t2", "A", 1),
            task("t3", "A", 3),
        ]),
        ..Setup::default()
    });
    let mut events = h.manager.subscribe_events();

    h.manager.init().await.expect("init");

    let view = h.manager.view().await;
    assert_eq!(view.group_names, vec!["A", "B"]);
    assert_eq!(view.total, 3);
    assert_eq!(
        events.recv().await.expect("event"),
        TaskListEvent::TasksUpdated { total: 3 }
    );
}

#[tokio::test]
async fn live_update_rebuilds_groups() {
    let h = harness(Setup::default());
    h.manager.init().await.expect("init");
    assert!(h.manager.groups().await.is_empty());

    h.manager
        .apply_update(vec![task("t1", "Report", 1), task("t2", "Triage", 0)], 2)
        .await;

    let names: Vec<String> = h.manager.groups().await.into_iter().map(|g| g.group).collect();
    assert_eq!(names, vec!["Triage", "Report"]);
}

#[tokio::test]
async fn paging_slices_the_loaded_tasks() {
    let all: Vec<Task> = (0..5).map(|i| task(&format!("t{i}"), "G", i)).collect();
    let h = harness(Setup {
        search: FakeTaskSearch::with_tasks(all),
        ..Setup::default()
    });
    h.manager.init().await.expect("init");
    h.manager.set_page_size(2).await;

    h.manager.set_page(1).await;
    let ids: Vec<String> = h.manager.view().await.tasks.into_iter().map(|t| t.id.0).collect();
    assert_eq!(ids, vec!["t2", "t3"]);

    h.manager.set_page(9).await;
    let view = h.manager.view().await;
    assert_eq!(view.page, 2);
    assert_eq!(view.tasks.len(), 1);
    assert_eq!(h.filtering.page_size().await, 2);
}

#[tokio::test]
async fn failed_load_notifies_with_payload_and_status() {
    let h = harness(Setup {
        search: FakeTaskSearch {
            fail_status: Some(500),
            ..FakeTaskSearch::default()
        },
        ..Setup::default()
    });

    assert!(h.manager.init().await.is_err());
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::Error {
            scope: "taskList".to_string(),
            payload: json!({ "message": "boom" }),
            status: 500,
        }]
    );
}

#[tokio::test]
async fn update_field_sends_single_field_patch() {
    let h = harness(Setup::default());
    let target = task("t1", "G", 0);

    h.manager
        .update_field("title", json!("Renamed"), &target)
        .await
        .expect("update");

    let updates = h.tasks.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, TaskId::from("t1"));
    assert_eq!(updates[0].1, TaskPatch::field("title", "Renamed"));
    assert!(h.manager.view().await.all_tasks.is_empty());
}

#[tokio::test]
async fn update_field_failure_is_reported() {
    let h = harness(Setup {
        tasks: FakeTaskService::failing(400),
        ..Setup::default()
    });

    let err = h
        .manager
        .update_field("title", json!(""), &task("t1", "G", 0))
        .await
        .expect_err("must fail");

    assert_eq!(err.status(), 400);
    assert!(matches!(
        h.notifier.notices().as_slice(),
        [Notice::Error { status: 400, .. }]
    ));
}

#[tokio::test]
async fn submitting_form_creates_task_and_clears_title_and_group() {
    let h = harness(Setup::default());
    h.manager.open_new_task_form().await;
    h.manager
        .edit_new_task(|form| {
            form.title = "Collect memory dump".to_string();
            form.group = "Forensics".to_string();
            form.description = Some("Full RAM image".to_string());
        })
        .await;
    let filled = h.manager.view().await.new_task;
    assert_eq!(filled.title, "Collect memory dump");

    let created = h.manager.submit_new_task().await.expect("add");

    assert_eq!(created.title, "Collect memory dump");
    assert_eq!(h.tasks.created(), vec![(CaseId::from("case-1"), filled)]);
    let view = h.manager.view().await;
    assert!(!view.is_new_task);
    assert!(view.new_task.title.is_empty());
    assert!(view.new_task.group.is_empty());
    assert_eq!(view.new_task.status, TaskStatus::Waiting);
    assert_eq!(view.new_task.description.as_deref(), Some("Full RAM image"));
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::Success("Task has been successfully added".to_string())]
    );
}

#[tokio::test]
async fn failed_submit_keeps_form_contents() {
    let h = harness(Setup {
        tasks: FakeTaskService::failing(400),
        ..Setup::default()
    });
    h.manager.open_new_task_form().await;
    h.manager
        .edit_new_task(|form| form.title = "Collect logs".to_string())
        .await;

    assert!(h.manager.submit_new_task().await.is_err());

    let view = h.manager.view().await;
    assert!(view.is_new_task);
    assert_eq!(view.new_task.title, "Collect logs");
}

#[tokio::test]
async fn status_field_edit_out_of_cancel_is_refused_before_request() {
    let h = harness(Setup::default());

    let err = h
        .manager
        .update_field(
            "status",
            json!("Waiting"),
            &task_with_status("t9", TaskStatus::Cancel),
        )
        .await
        .expect_err("cancel is terminal");

    assert!(matches!(
        err,
        ClientError::InvalidTransition {
            from: TaskStatus::Cancel,
            to: TaskStatus::Waiting
        }
    ));
    assert!(h.tasks.updates().is_empty());
}

#[tokio::test]
async fn status_field_edit_follows_allowed_moves() {
    let h = harness(Setup::default());

    h.manager
        .update_field(
            "status",
            json!("Completed"),
            &task_with_status("t1", TaskStatus::InProgress),
        )
        .await
        .expect("allowed move");
    let err = h
        .manager
        .update_field("status", json!("Archived"), &task("t2", "G", 0))
        .await
        .expect_err("unknown status");

    assert!(matches!(err, ClientError::InvalidInput(_)));
    assert_eq!(
        h.tasks.updates(),
        vec![(TaskId::from("t1"), status_patch(TaskStatus::Completed))]
    );
}

#[tokio::test]
async fn add_task_failure_keeps_form_open() {
    let h = harness(Setup {
        tasks: FakeTaskService::failing(400),
        ..Setup::default()
    });
    h.manager.open_new_task_form().await;

    assert!(h.manager.add_task(NewTask::default()).await.is_err());
    assert!(h.manager.view().await.is_new_task);
}

#[tokio::test]
async fn confirmed_removal_cancels_task_and_emits_event() {
    let h = harness(Setup::default());
    let mut events = h.manager.subscribe_events();
    let target = task("t1", "G", 0);

    assert!(h.manager.remove_task(&target).await.expect("remove"));

    assert_eq!(
        h.tasks.updates(),
        vec![(TaskId::from("t1"), status_patch(TaskStatus::Cancel))]
    );
    assert_eq!(
        events.recv().await.expect("event"),
        TaskListEvent::TaskRemoved(target)
    );
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::Success("Task has been successfully removed".to_string())]
    );
}

#[tokio::test]
async fn dismissed_removal_does_nothing() {
    let h = harness(Setup {
        confirm: false,
        ..Setup::default()
    });

    assert!(!h.manager.remove_task(&task("t1", "G", 0)).await.expect("remove"));
    assert!(h.tasks.updates().is_empty());
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn cancelled_task_cannot_be_removed_again() {
    let h = harness(Setup::default());

    let err = h
        .manager
        .remove_task(&task_with_status("t1", TaskStatus::Cancel))
        .await
        .expect_err("terminal");

    assert!(matches!(err, ClientError::InvalidTransition { .. }));
    assert!(h.tasks.updates().is_empty());
}

#[tokio::test]
async fn starting_waiting_task_moves_it_in_progress_then_navigates() {
    let h = harness(Setup::default());

    h.manager
        .start_task(&task_with_status("t1", TaskStatus::Waiting))
        .await
        .expect("start");

    assert_eq!(
        h.tasks.updates(),
        vec![(TaskId::from("t1"), status_patch(TaskStatus::InProgress))]
    );
    assert_eq!(h.navigator.routes(), vec![detail_route("t1")]);
}

#[tokio::test]
async fn starting_running_task_only_navigates() {
    let h = harness(Setup::default());

    h.manager
        .start_task(&task_with_status("t1", TaskStatus::InProgress))
        .await
        .expect("start");

    assert!(h.tasks.updates().is_empty());
    assert_eq!(h.navigator.routes(), vec![detail_route("t1")]);
}

#[tokio::test]
async fn failed_start_does_not_navigate() {
    let h = harness(Setup {
        tasks: FakeTaskService::failing(500),
        ..Setup::default()
    });

    assert!(h
        .manager
        .start_task(&task_with_status("t1", TaskStatus::Waiting))
        .await
        .is_err());
    assert!(h.navigator.routes().is_empty());
    assert_eq!(h.notifier.notices().len(), 1);
}

#[tokio::test]
async fn opening_completed_task_reopens_it() {
    let h = harness(Setup::default());

    h.manager
        .open_task(&task_with_status("t1", TaskStatus::Completed))
        .await
        .expect("open");

    assert_eq!(
        h.tasks.updates(),
        vec![(TaskId::from("t1"), status_patch(TaskStatus::InProgress))]
    );
    assert_eq!(h.navigator.routes(), vec![detail_route("t1")]);
}

#[tokio::test]
async fn opening_other_tasks_changes_nothing() {
    let h = harness(Setup::default());

    h.manager
        .open_task(&task_with_status("t1", TaskStatus::Waiting))
        .await
        .expect("open");

    assert!(h.tasks.updates().is_empty());
    assert!(h.navigator.routes().is_empty());
}

#[tokio::test]
async fn closing_in_progress_task_completes_it_once() {
    let h = harness(Setup::default());

    h.manager
        .close_task(&task_with_status("t1", TaskStatus::InProgress))
        .await
        .expect("close");

    assert_eq!(
        h.tasks.updates(),
        vec![(TaskId::from("t1"), status_patch(TaskStatus::Completed))]
    );
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::Success("Task has been successfully closed".to_string())]
    );
}

#[tokio::test]
async fn closing_completed_task_is_a_no_op() {
    let h = harness(Setup::default());

    h.manager
        .close_task(&task_with_status("t1", TaskStatus::Completed))
        .await
        .expect("close");

    assert!(h.tasks.updates().is_empty());
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn update_task_status_returns_server_task() {
    let h = harness(Setup::default());

    let updated = h
        .manager
        .update_task_status(&TaskId::from("t9"), TaskStatus::InProgress)
        .await
        .expect("update");

    assert_eq!(updated.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn responders_are_fetched_once_per_task() {
    let h = harness(Setup::default());
    let t1 = TaskId::from("t1");

    h.manager.get_responders(&t1, false).await.expect("fetch");
    h.manager.get_responders(&t1, false).await.expect("cached");
    assert_eq!(h.responders.list_calls(), 1);
    assert_eq!(h.manager.responders().await.map(|r| r.len()), Some(1));

    h.manager.get_responders(&t1, true).await.expect("forced");
    assert_eq!(h.responders.list_calls(), 2);

    h.manager
        .get_responders(&TaskId::from("t2"), false)
        .await
        .expect("other task");
    assert_eq!(h.responders.list_calls(), 3);
    let responders = h.manager.responders().await.expect("cached responders");
    assert_eq!(responders[0].id.0, "responder-for-t2");
}

#[tokio::test]
async fn failed_responder_fetch_leaves_cache_empty() {
    let mut responders = FakeResponders::new(RunBehavior::Succeed);
    responders.fail_listing = true;
    let h = harness(Setup {
        responders,
        ..Setup::default()
    });
    let t1 = TaskId::from("t1");

    assert!(h.manager.get_responders(&t1, false).await.is_err());
    assert!(h.manager.responders().await.is_none());
    assert!(h.manager.get_responders(&t1, false).await.is_err());
    assert_eq!(h.responders.list_calls(), 2);
    assert_eq!(h.notifier.notices().len(), 2);
}

#[tokio::test]
async fn running_responder_reports_name_and_task() {
    let h = harness(Setup::default());
    let target = task("t1", "G", 0);

    h.manager
        .run_responder(ResponderId::from("r-1"), "Mailer_1_0", &target)
        .await
        .expect("run");

    let runs = h.responders.runs.lock().expect("runs").clone();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0.object_type, "case_task");
    assert_eq!(runs[0].0.object_id, "t1");
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::Success(
            "Responder Mailer_1_0 started successfully on task task t1".to_string()
        )]
    );
}

#[tokio::test]
async fn responder_failure_is_reported() {
    let h = harness(Setup {
        responders: FakeResponders::new(RunBehavior::Fail(502)),
        ..Setup::default()
    });

    assert!(h
        .manager
        .run_responder(ResponderId::from("r-1"), "Mailer_1_0", &task("t1", "G", 0))
        .await
        .is_err());
    assert!(matches!(
        h.notifier.notices().as_slice(),
        [Notice::Error { status: 502, .. }]
    ));
}

#[tokio::test]
async fn cancelled_responder_run_is_silent() {
    let h = harness(Setup {
        responders: FakeResponders::new(RunBehavior::Cancel),
        ..Setup::default()
    });

    let err = h
        .manager
        .run_responder(ResponderId::from("r-1"), "Mailer_1_0", &task("t1", "G", 0))
        .await
        .expect_err("cancelled");

    assert!(err.is_cancelled());
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn grouped_view_toggle_is_persisted() {
    let h = harness(Setup::default());
    assert!(!h.manager.view().await.show_grouped);

    assert!(h.manager.toggle_grouped_view().await);
    assert!(h.layout.group_tasks());

    assert!(!h.manager.toggle_grouped_view().await);
    assert!(!h.layout.group_tasks());
}

#[tokio::test]
async fn search_persists_filter_context() {
    let h = harness(Setup::default());
    h.manager.init().await.expect("init");
    h.manager.toggle_stats().await;

    let before = Filtering::new("task.list", FilterDefaults::case_tasks(), h.store.clone());
    before.init_context("case-1").await.expect("init");
    assert!(!before.context().await.show_stats);

    h.manager.search().await.expect("search");

    let after = Filtering::new("task.list", FilterDefaults::case_tasks(), h.store.clone());
    after.init_context("case-1").await.expect("init");
    assert!(after.context().await.show_stats);
    assert!(h.filtering.context().await.show_stats);
}

#[tokio::test]
async fn clearing_and_removing_filters_reload_the_list() {
    let h = harness(Setup::default());
    h.manager.init().await.expect("init");
    h.manager
        .add_filter_value("status", json!("Waiting"))
        .await
        .expect("add");
    h.manager
        .add_filter_value("group", json!("Triage"))
        .await
        .expect("add");

    h.manager.remove_filter(0).await.expect("remove");
    let last = h.search.requests().pop().expect("request");
    assert_eq!(last.filter, Some(Query::eq("group", "Triage")));

    h.manager.clear_filters().await.expect("clear");
    let last = h.search.requests().pop().expect("request");
    assert_eq!(last.filter, None);

    assert!(h.manager.remove_filter(3).await.is_err());
    assert_eq!(h.search.requests().len(), 5);
}
