//! Integration tests for the session machine driven through the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use forge_client::{ChatResponse, Endpoint, MockBackend, TemplateResponse};
use forge_core::{
    file_count, find_node, BuildSession, FilePatch, NewFile, NewStep, SessionStatus, StepPatch,
    StepType,
};
use forge_session::{
    BuildSessionMachine, Orchestrator, SessionConfig, SessionError, SessionObserver, Services,
    TemplateChatSource,
};

const SCAFFOLD: &str = r#"<boltArtifact id="vite-react" title="Vite React">
<boltAction type="file" filePath="package.json">{ "name": "app" }</boltAction>
</boltArtifact>"#;

const GENERATED: &str = r#"I'll build the todo app.
<boltArtifact id="todo" title="Todo App">
<boltAction type="file" filePath="src/App.tsx">export default function App() {}</boltAction>
<boltAction type="file" filePath="src/index.css">body { margin: 0; }</boltAction>
<boltAction type="shell">npm install && npm run dev</boltAction>
</boltArtifact>"#;

#[derive(Default)]
struct RecordingObserver {
    statuses: Mutex<Vec<SessionStatus>>,
    errors: Mutex<Vec<String>>,
}

impl SessionObserver for RecordingObserver {
    fn on_session_update(&self, session: &BuildSession) {
        self.statuses.lock().push(session.status);
    }

    fn on_error(&self, error: &SessionError) {
        self.errors.lock().push(error.to_string());
    }
}

fn template() -> TemplateResponse {
    TemplateResponse::new(
        vec!["base prompt".into(), "project files".into()],
        vec![SCAFFOLD.into()],
    )
}

fn backend() -> MockBackend {
    MockBackend::new()
        .add_template(template())
        .add_chat(ChatResponse::new(GENERATED))
}

fn machine_and_source(
    backend: MockBackend,
    config: SessionConfig,
) -> (BuildSessionMachine, Arc<TemplateChatSource>) {
    let machine = BuildSessionMachine::new("a todo app", config, Services::default());
    let source = Arc::new(TemplateChatSource::new(Arc::new(backend)));
    (machine, source)
}

async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_full_run_completes_with_merged_tree() {
    let backend = backend();
    let orchestrator = Orchestrator::new("  a todo app ", Arc::new(backend.clone()), Services::default());

    let session = orchestrator.run().await;
    assert_eq!(session.status, SessionStatus::Building);
    assert_eq!(backend.endpoints(), vec![Endpoint::Template, Endpoint::Chat]);

    settle(10).await;

    let state = orchestrator.state();
    let session = state.session.clone().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(!state.is_building);
    assert!(!state.chat_loading);
    assert_eq!(state.build_progress, 100);
    assert_eq!(session.progress, 100);

    // artifact + file from the scaffold, artifact + 2 files + shell from chat
    assert_eq!(session.steps.len(), 6);
    assert_eq!(file_count(&session.files), 3);
    assert!(find_node(&session.files, "/src/index.css").is_some());
    assert!(!orchestrator.machine().has_running_timers());
}

#[tokio::test(start_paused = true)]
async fn test_chat_receives_context_then_prompt() {
    let backend = backend();
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend.clone()), Services::default());
    orchestrator.run().await;

    let chat = &backend.chat_requests()[0];
    let contents: Vec<&str> = chat.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["base prompt", "project files", "a todo app"]);
}

#[tokio::test(start_paused = true)]
async fn test_session_identity_after_start_and_cancel() {
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend()), Services::default());
    let started = orchestrator.run().await;
    let cancelled = orchestrator.cancel().unwrap();

    assert_eq!(started.id, cancelled.id);
    assert!(uuid::Uuid::parse_str(&cancelled.id).is_ok());
    assert!(cancelled.created_at <= cancelled.updated_at);
    assert_eq!(cancelled.prompt, "a todo app");
    assert_eq!(cancelled.metadata.environment, "development");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_timers_and_discards_late_result() {
    let (machine, source) = machine_and_source(
        backend().with_delay(Duration::from_secs(5)),
        SessionConfig::default(),
    );

    let handle = {
        let machine = machine.clone();
        let source = source.clone();
        tokio::spawn(async move { machine.start_session(source.as_ref()).await })
    };

    // Template lands at 5s; chat is in flight with two countdown ticks elapsed.
    tokio::time::sleep(Duration::from_millis(7500)).await;
    let state = machine.state();
    assert_eq!(state.status(), Some(SessionStatus::Building));
    assert!(state.chat_loading);
    assert_eq!(state.remaining_seconds, 58);
    assert_eq!(state.build_progress, 50);

    let cancelled = machine.cancel_session().unwrap();
    assert_eq!(cancelled.status, SessionStatus::Cancelled);
    assert!(!machine.has_running_timers());

    let state = machine.state();
    assert!(!state.chat_loading);
    assert!(!state.is_building);
    assert_eq!(state.remaining_seconds, 0);

    let finished = handle.await.unwrap();
    assert_eq!(finished.status, SessionStatus::Cancelled);
    assert_eq!(finished.steps.len(), 2);

    settle(30).await;
    let state = machine.state();
    assert_eq!(state.remaining_seconds, 0);
    assert_eq!(state.build_progress, 50);
    assert_eq!(state.status(), Some(SessionStatus::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_countdown_times_out_without_cancelling_request() {
    let (machine, source) = machine_and_source(
        backend().with_delay(Duration::from_secs(10)),
        SessionConfig::default().chat_window_secs(3),
    );

    let handle = {
        let machine = machine.clone();
        let source = source.clone();
        tokio::spawn(async move { machine.start_session(source.as_ref()).await })
    };

    tokio::time::sleep(Duration::from_millis(15_500)).await;
    let state = machine.state();
    assert!(state.chat_timed_out);
    assert!(!state.chat_loading);
    assert_eq!(state.remaining_seconds, 0);
    assert_eq!(state.status(), Some(SessionStatus::Building));

    // The request still completes and its steps are appended.
    let session = handle.await.unwrap();
    assert_eq!(session.steps.len(), 6);
    assert!(!machine.state().chat_timed_out);

    settle(10).await;
    assert_eq!(machine.state().status(), Some(SessionStatus::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_progress_ramp_values() {
    let steps = (0..6)
        .map(|i| {
            format!(
                r#"<boltAction type="file" filePath="f{}.txt">{}</boltAction>"#,
                i, i
            )
        })
        .collect::<String>();
    let scaffold = format!(r#"<boltArtifact title="Files">{}</boltArtifact>"#, steps);
    let backend = MockBackend::new().add_template(TemplateResponse::new(Vec::new(), vec![scaffold]));
    let (machine, source) = machine_and_source(backend, SessionConfig::default());

    let mut rx = machine.subscribe();
    machine.start_session(source.as_ref()).await;
    rx.borrow_and_update();

    let mut seen = Vec::new();
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        if !state.is_building {
            break;
        }
        seen.push(state.build_progress);
    }

    // 7 steps: artifact folder + six files
    assert_eq!(seen, vec![14, 29, 43, 57, 71, 86, 100]);
    assert_eq!(machine.state().status(), Some(SessionStatus::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_chat_failure_keeps_session_building_until_retry() {
    let backend = backend().fail_chat("upstream busy");
    let observer = Arc::new(RecordingObserver::default());
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend.clone()), Services::default())
        .with_observer(observer.clone());

    orchestrator.run().await;
    settle(10).await;

    let state = orchestrator.state();
    assert_eq!(state.status(), Some(SessionStatus::Building));
    assert_eq!(
        state.error.as_deref(),
        Some("Failed to generate build steps: Simulated failure: upstream busy")
    );
    assert!(!state.chat_loading);
    assert_eq!(observer.errors.lock().len(), 1);
    assert_eq!(orchestrator.machine().services().errors.len(), 1);

    backend.clear_chat_failure();
    orchestrator.retry().await.unwrap();
    assert!(orchestrator.state().error.is_none());

    settle(10).await;
    let state = orchestrator.state();
    assert_eq!(state.status(), Some(SessionStatus::Completed));
    assert_eq!(state.session.unwrap().steps.len(), 6);
    assert_eq!(
        observer.statuses.lock().last().copied(),
        Some(SessionStatus::Completed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_retry_keeps_loading_until_last_result() {
    let (machine, source) = machine_and_source(
        backend().with_delay(Duration::from_secs(4)),
        SessionConfig::default(),
    );

    let start = {
        let machine = machine.clone();
        let source = source.clone();
        tokio::spawn(async move { machine.start_session(source.as_ref()).await })
    };

    // Template lands at 4s, so the first chat request resolves at 8s.
    settle(6).await;
    let retry = {
        let machine = machine.clone();
        let source = source.clone();
        tokio::spawn(async move { machine.retry_chat(source.as_ref()).await })
    };

    // The first chat has landed; the retry is due at 10s.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let state = machine.state();
    assert!(state.chat_loading);
    assert_eq!(state.remaining_seconds, 58);
    assert!(machine.has_running_timers());
    assert_eq!(state.session.unwrap().steps.len(), 6);

    start.await.unwrap();
    retry.await.unwrap().unwrap();
    assert!(!machine.state().chat_loading);

    settle(15).await;
    let state = machine.state();
    assert_eq!(state.status(), Some(SessionStatus::Completed));
    assert_eq!(state.session.unwrap().steps.len(), 10);
    assert!(!machine.has_running_timers());
}

#[tokio::test(start_paused = true)]
async fn test_retry_requires_active_session() {
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend()), Services::default());
    assert!(matches!(
        orchestrator.retry().await,
        Err(SessionError::NoActiveSession)
    ));

    orchestrator.run().await;
    orchestrator.cancel();
    assert!(matches!(
        orchestrator.retry().await,
        Err(SessionError::InvalidState {
            status: SessionStatus::Cancelled,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_template_failure_fails_session() {
    let backend = MockBackend::new().fail_template("Bad Gateway");
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend.clone()), Services::default());

    let session = orchestrator.run().await;
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session.steps.is_empty());
    assert_eq!(backend.endpoints(), vec![Endpoint::Template]);
    assert!(orchestrator
        .state()
        .error
        .unwrap()
        .starts_with("Failed to fetch template: "));
}

#[tokio::test(start_paused = true)]
async fn test_flat_file_operations() {
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend()), Services::default());
    orchestrator.run().await;
    let machine = orchestrator.machine();

    assert!(machine.add_file(NewFile::file("README.md", "/README.md", "# Todo")));
    let files = machine.session().unwrap().files;
    let readme = files.iter().find(|f| f.name == "README.md").unwrap().clone();
    assert_ne!(readme.id, "/README.md");

    assert!(machine.update_file(&readme.id, FilePatch::content("# Todo App")));
    let files = machine.session().unwrap().files;
    let position = files.iter().position(|f| f.id == readme.id).unwrap();
    assert_eq!(files[position].content.as_deref(), Some("# Todo App"));
    assert_eq!(position, files.len() - 1);

    // Nested nodes are not addressable
    assert!(!machine.update_file("/src/App.tsx", FilePatch::content("x")));
    assert!(!machine.remove_file("missing"));

    let before = machine.session().unwrap().files.len();
    assert!(machine.remove_file(&readme.id));
    assert_eq!(machine.session().unwrap().files.len(), before - 1);
}

#[tokio::test(start_paused = true)]
async fn test_added_file_path_is_shared_with_merged_steps() {
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend()), Services::default());
    orchestrator.run().await;
    let machine = orchestrator.machine();

    assert!(machine.add_file(NewFile::file("a.txt", "a.txt", "draft")));
    let added = machine.session().unwrap().files.last().unwrap().clone();
    assert_eq!(added.path, "/a.txt");

    let step = NewStep::new(StepType::CreateFile, "Create a.txt", "Creating file at a.txt")
        .with_path("a.txt")
        .with_code("final");
    assert!(machine.add_step(step));

    let files = machine.session().unwrap().files;
    let matches: Vec<_> = files.iter().filter(|f| f.name == "a.txt").collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, added.id);
    assert_eq!(matches[0].content.as_deref(), Some("final"));
}

#[tokio::test(start_paused = true)]
async fn test_step_operations_and_terminal_no_ops() {
    let orchestrator = Orchestrator::new("a todo app", Arc::new(backend()), Services::default());
    let session = orchestrator.run().await;
    let machine = orchestrator.machine();
    let first = session.steps[0].id;

    let renamed = StepPatch {
        title: Some("Scaffold".into()),
        ..StepPatch::default()
    };
    assert!(machine.update_step(first, renamed.clone()));
    assert_eq!(machine.session().unwrap().steps[0].title, "Scaffold");
    assert!(!machine.update_step(999, renamed));

    let added = NewStep::new(StepType::CreateFile, "Add docs", "Documentation").with_path("docs/guide.md");
    assert!(machine.add_step(added));
    let session = machine.session().unwrap();
    assert!(find_node(&session.files, "docs/guide.md").is_some());

    let last = session.steps.last().unwrap().id;
    assert!(machine.remove_step(last));
    assert!(!machine.remove_step(last));

    orchestrator.cancel();
    assert!(!machine.add_step(NewStep::new(StepType::Test, "Test", "")));
    assert!(!machine.add_file(NewFile::folder("public", "/public")));
    assert!(!machine.update_step(first, StepPatch::status(forge_core::StepStatus::Failed)));
}
