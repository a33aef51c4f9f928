//! Update Session Flow Tests
//!
//! Drive full update sessions against a wiremock release server.
//! Covers:
//! - Silent vs. verbose reporting of check results and errors
//! - The confirmation dialogs and their contents
//! - Download + install through a fake disk image tool in temp directories
//! - The browser strategy and the single-session guard

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bloom::progress::ProgressEvent;
use bloom::shell::{UpdateUi, drive_session};
use bloom::update::{
    CheckMode, DiskImageTool, Launcher, SessionOutcome, SessionState, UpdateOrchestrator,
    UpdateState, strategy_for,
};
use bloom::{Result, StrategyKind, UpdateConfig, UpdateError};
use serde_json::json;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LATEST_PATH: &str = "/repos/stafne/test2_update_app/releases/latest";
const ASSET_PATH: &str = "/download/flower.dmg";

// ────────────────────────────────────────────────────────────────────────────
// Fakes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingUi {
    answers: VecDeque<bool>,
    confirms: Vec<(String, String)>,
    infos: Vec<(String, String)>,
    errors: Vec<(String, String)>,
    states: Vec<SessionState>,
    progress: Vec<ProgressEvent>,
}

impl RecordingUi {
    fn answering(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn dialogs(&self) -> usize {
        self.confirms.len() + self.infos.len() + self.errors.len()
    }
}

impl UpdateUi for RecordingUi {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self.confirms.push((title.to_owned(), message.to_owned()));
        self.answers.pop_front().unwrap_or(false)
    }

    fn info(&mut self, title: &str, message: &str) {
        self.infos.push((title.to_owned(), message.to_owned()));
    }

    fn error(&mut self, title: &str, message: &str) {
        self.errors.push((title.to_owned(), message.to_owned()));
    }

    fn progress(&mut self, event: &ProgressEvent) {
        self.progress.push(event.clone());
    }

    fn state_changed(&mut self, state: &SessionState) {
        self.states.push(state.clone());
    }
}

#[derive(Default)]
struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
    relaunched: Mutex<Vec<PathBuf>>,
}

impl Launcher for RecordingLauncher {
    fn open_url(&self, url: &str) -> Result<()> {
        self.opened.lock().unwrap().push(url.to_owned());
        Ok(())
    }

    fn relaunch(&self, bundle: &Path) -> Result<()> {
        self.relaunched.lock().unwrap().push(bundle.to_owned());
        Ok(())
    }
}

/// Pretends the image mounted at `volume`, which the test fills beforehand.
struct FakeDiskImage {
    volume: PathBuf,
    attached: Mutex<Vec<PathBuf>>,
    detached: Mutex<Vec<PathBuf>>,
}

impl FakeDiskImage {
    fn new(volume: PathBuf) -> Self {
        Self {
            volume,
            attached: Mutex::new(Vec::new()),
            detached: Mutex::new(Vec::new()),
        }
    }
}

impl DiskImageTool for FakeDiskImage {
    fn attach(&self, image: &Path) -> Result<String> {
        self.attached.lock().unwrap().push(image.to_owned());
        Ok(format!(
            "/dev/disk7\tGUID_partition_scheme\t\n/dev/disk7s1\tApple_HFS\t{}\n",
            self.volume.display()
        ))
    }

    fn detach(&self, mount_point: &Path) -> Result<()> {
        self.detached.lock().unwrap().push(mount_point.to_owned());
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Config pointing at `server`. `app_name` keeps download paths distinct
/// between tests running in parallel.
fn config_for(server: &MockServer, app_name: &str) -> UpdateConfig {
    UpdateConfig {
        api_base: server.uri(),
        current_version: "1.0.1".into(),
        app_name: app_name.into(),
        check_timeout_secs: 5,
        ..Default::default()
    }
}

fn release_body(tag: &str, assets: serde_json::Value) -> serde_json::Value {
    json!({
        "tag_name": tag,
        "html_url": format!("https://github.com/stafne/test2_update_app/releases/tag/{tag}"),
        "body": "Petals now sway in the breeze.",
        "assets": assets,
    })
}

fn dmg_asset(server: &MockServer) -> serde_json::Value {
    json!([
        {"name": "notes.txt", "browser_download_url": format!("{}/download/notes.txt", server.uri())},
        {"name": "Beautiful Flower Display.dmg", "browser_download_url": format!("{}{ASSET_PATH}", server.uri())},
    ])
}

async fn mount_release(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn orchestrator(
    config: &UpdateConfig,
    tool: Arc<dyn DiskImageTool>,
    launcher: Arc<RecordingLauncher>,
) -> UpdateOrchestrator {
    let launcher: Arc<dyn Launcher> = launcher;
    let strategy = strategy_for(config, tool, Arc::clone(&launcher));
    UpdateOrchestrator::new(
        config.clone(),
        strategy,
        launcher,
        tokio::runtime::Handle::current(),
    )
    .unwrap()
}

fn unused_tool() -> Arc<dyn DiskImageTool> {
    Arc::new(FakeDiskImage::new(PathBuf::from("/nonexistent")))
}

async fn run(orch: &UpdateOrchestrator, mode: CheckMode, ui: &mut RecordingUi) -> SessionOutcome {
    let handle = orch.start(mode).unwrap();
    drive_session(handle, ui).await.unwrap()
}

fn make_bundle(root: &Path, marker: &str) {
    let macos = root.join("Contents").join("MacOS");
    std::fs::create_dir_all(&macos).unwrap();
    std::fs::write(macos.join("flower"), marker).unwrap();
    std::fs::write(root.join("Contents").join("Info.plist"), "<plist/>").unwrap();
}

// ────────────────────────────────────────────────────────────────────────────
// Check phase
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn verbose_404_reports_hint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &config_for(&server, "Flow 404"),
        unused_tool(),
        Arc::default(),
    );
    let mut ui = RecordingUi::default();
    let outcome = run(&orch, CheckMode::Verbose, &mut ui).await;

    assert!(matches!(outcome, SessionOutcome::Failed { .. }));
    assert_eq!(ui.errors.len(), 1);
    let (title, message) = &ui.errors[0];
    assert_eq!(title, "Update Check Failed");
    assert!(message.contains("HTTP 404"));
    assert!(message.contains("No releases exist yet"));
    assert!(message.contains("Repository is private"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_404_shows_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let orch = orchestrator(
        &config_for(&server, "Flow Silent 404"),
        unused_tool(),
        Arc::default(),
    );
    let mut ui = RecordingUi::default();
    let outcome = run(&orch, CheckMode::Silent, &mut ui).await;

    assert!(matches!(outcome, SessionOutcome::Failed { .. }));
    assert_eq!(ui.dialogs(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_transport_error_is_swallowed() {
    let config = UpdateConfig {
        api_base: "http://127.0.0.1:1".into(),
        current_version: "1.0.1".into(),
        check_timeout_secs: 2,
        ..Default::default()
    };
    let orch = orchestrator(&config, unused_tool(), Arc::default());
    let mut ui = RecordingUi::default();
    let outcome = run(&orch, CheckMode::Silent, &mut ui).await;

    match outcome {
        SessionOutcome::Failed { message } => assert!(message.contains("network error")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(ui.dialogs(), 0);
    assert!(!orch.is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_body_is_a_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .mount(&server)
        .await;

    let orch = orchestrator(
        &config_for(&server, "Flow Parse"),
        unused_tool(),
        Arc::default(),
    );
    let mut ui = RecordingUi::default();
    run(&orch, CheckMode::Verbose, &mut ui).await;

    assert_eq!(ui.errors.len(), 1);
    assert!(ui.errors[0].1.contains("parse error"));
    assert!(ui.confirms.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn up_to_date_silent_is_quiet_and_verbose_informs_once() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.0.1", dmg_asset(&server))).await;
    let orch = orchestrator(
        &config_for(&server, "Flow Current"),
        unused_tool(),
        Arc::default(),
    );

    let mut silent = RecordingUi::default();
    assert_eq!(
        run(&orch, CheckMode::Silent, &mut silent).await,
        SessionOutcome::UpToDate
    );
    assert_eq!(silent.dialogs(), 0);

    let mut verbose = RecordingUi::default();
    assert_eq!(
        run(&orch, CheckMode::Verbose, &mut verbose).await,
        SessionOutcome::UpToDate
    );
    assert_eq!(verbose.dialogs(), 1);
    assert_eq!(
        verbose.infos,
        vec![(
            "No Updates".to_owned(),
            "You're running the latest version (1.0.1)".to_owned()
        )]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn older_release_is_not_offered() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.0.0", dmg_asset(&server))).await;
    let orch = orchestrator(
        &config_for(&server, "Flow Older"),
        unused_tool(),
        Arc::default(),
    );

    let mut ui = RecordingUi::default();
    assert_eq!(
        run(&orch, CheckMode::Verbose, &mut ui).await,
        SessionOutcome::UpToDate
    );
    assert!(ui.confirms.is_empty());
}

// ────────────────────────────────────────────────────────────────────────────
// Confirmation
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn decline_downloads_nothing() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.2.0", dmg_asset(&server))).await;
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"dmg".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &config_for(&server, "Flow Decline"),
        unused_tool(),
        Arc::default(),
    );
    let mut ui = RecordingUi::answering(&[false]);
    let outcome = run(&orch, CheckMode::Silent, &mut ui).await;

    assert_eq!(outcome, SessionOutcome::Declined);
    assert_eq!(ui.confirms.len(), 1);
    let (title, message) = &ui.confirms[0];
    assert_eq!(title, "Update Available");
    assert!(message.contains("Current version: 1.0.1"));
    assert!(message.contains("Latest version: 1.2.0"));
    assert!(message.contains("Petals now sway in the breeze."));
    assert!(message.contains("download and install"));
    assert_eq!(ui.states.last(), Some(&SessionState::Declined));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_notes_show_placeholder() {
    let server = MockServer::start().await;
    mount_release(
        &server,
        json!({"tag_name": "v1.2.0", "body": "", "assets": []}),
    )
    .await;

    let orch = orchestrator(
        &config_for(&server, "Flow Notes"),
        unused_tool(),
        Arc::default(),
    );
    let mut ui = RecordingUi::answering(&[false]);
    run(&orch, CheckMode::Verbose, &mut ui).await;

    assert!(ui.confirms[0].1.contains("No release notes available"));
}

// ────────────────────────────────────────────────────────────────────────────
// Download + install
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_installer_asset_fails_before_download() {
    let server = MockServer::start().await;
    mount_release(
        &server,
        release_body(
            "v1.2.0",
            json!([{"name": "flower.zip", "browser_download_url": format!("{}{ASSET_PATH}", server.uri())}]),
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &config_for(&server, "Flow No Asset"),
        unused_tool(),
        Arc::default(),
    );
    let mut ui = RecordingUi::answering(&[true]);
    let outcome = run(&orch, CheckMode::Silent, &mut ui).await;

    assert!(matches!(outcome, SessionOutcome::Failed { .. }));
    assert_eq!(ui.errors.len(), 1, "post-consent errors show even in silent mode");
    assert!(ui.errors[0].1.contains("no .dmg installer found in release v1.2.0"));
    assert!(ui.progress.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn download_error_is_reported() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.2.0", dmg_asset(&server))).await;
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &config_for(&server, "Flow Download 500"),
        unused_tool(),
        Arc::default(),
    );
    let mut ui = RecordingUi::answering(&[true]);
    let outcome = run(&orch, CheckMode::Verbose, &mut ui).await;

    assert!(matches!(outcome, SessionOutcome::Failed { .. }));
    assert_eq!(ui.errors.len(), 1);
    assert_eq!(ui.errors[0].0, "Download Failed");
    assert!(ui.errors[0].1.contains("HTTP 500"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn accepted_update_replaces_bundle_and_relaunches() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.2.0", dmg_asset(&server))).await;
    let image = vec![7u8; 20_000];
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let volume = scratch.path().join("Volumes").join("Beautiful Flower Display");
    make_bundle(&volume.join("Beautiful Flower Display.app"), "1.2.0");
    let install_dir = scratch.path().join("Applications");
    make_bundle(&install_dir.join("Beautiful Flower Display.app"), "1.0.1");

    let config = UpdateConfig {
        install_dir: install_dir.clone(),
        ..config_for(&server, "Flow Install")
    };
    let tool = Arc::new(FakeDiskImage::new(volume.clone()));
    let launcher = Arc::new(RecordingLauncher::default());
    let orch = orchestrator(&config, tool.clone(), Arc::clone(&launcher));

    let mut ui = RecordingUi::answering(&[true, true]);
    let outcome = run(&orch, CheckMode::Verbose, &mut ui).await;

    let bundle = install_dir.join("Beautiful Flower Display.app");
    assert_eq!(
        outcome,
        SessionOutcome::Relaunched {
            bundle: bundle.clone()
        }
    );
    assert_eq!(
        std::fs::read_to_string(bundle.join("Contents/MacOS/flower")).unwrap(),
        "1.2.0"
    );
    assert_eq!(*launcher.relaunched.lock().unwrap(), vec![bundle.clone()]);
    assert_eq!(*tool.detached.lock().unwrap(), vec![volume]);

    let downloaded = config.download_path("1.2.0");
    assert_eq!(*tool.attached.lock().unwrap(), vec![downloaded.clone()]);
    assert!(!downloaded.exists(), "image is removed after install");

    assert_eq!(ui.confirms.len(), 2);
    assert_eq!(ui.confirms[1].0, "Update Installed");
    assert!(ui.confirms[1].1.contains("version 1.2.0"));
    assert!(ui.errors.is_empty());

    assert!(matches!(
        ui.progress.first(),
        Some(ProgressEvent::DownloadStarted {
            total_bytes: Some(20_000),
            ..
        })
    ));
    assert_eq!(
        ui.progress.last(),
        Some(&ProgressEvent::DownloadComplete {
            bytes_downloaded: 20_000
        })
    );

    let states: Vec<String> = ui.states.iter().map(ToString::to_string).collect();
    assert_eq!(
        states,
        vec![
            "checking",
            "update available (1.0.1 -> 1.2.0)",
            "downloading 1.2.0",
            "installing 1.2.0",
            "installed 1.2.0",
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn declining_relaunch_keeps_running() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.2.0", dmg_asset(&server))).await;
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image".to_vec()))
        .mount(&server)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let volume = scratch.path().join("Beautiful Flower Display");
    make_bundle(&volume.join("Beautiful Flower Display.app"), "1.2.0");
    let install_dir = scratch.path().join("Applications");

    let config = UpdateConfig {
        install_dir: install_dir.clone(),
        ..config_for(&server, "Flow Keep Running")
    };
    let launcher = Arc::new(RecordingLauncher::default());
    let orch = orchestrator(
        &config,
        Arc::new(FakeDiskImage::new(volume)),
        Arc::clone(&launcher),
    );

    let mut ui = RecordingUi::answering(&[true, false]);
    let outcome = run(&orch, CheckMode::Verbose, &mut ui).await;

    assert_eq!(
        outcome,
        SessionOutcome::Installed {
            version: "1.2.0".into(),
            bundle: install_dir.join("Beautiful Flower Display.app"),
        }
    );
    assert!(launcher.relaunched.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn browser_strategy_opens_release_page() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.2.0", dmg_asset(&server))).await;
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = UpdateConfig {
        strategy: StrategyKind::OpenInBrowser,
        ..config_for(&server, "Flow Browser")
    };
    let launcher = Arc::new(RecordingLauncher::default());
    let orch = orchestrator(&config, unused_tool(), Arc::clone(&launcher));

    let mut ui = RecordingUi::answering(&[true]);
    let outcome = run(&orch, CheckMode::Verbose, &mut ui).await;

    let url = "https://github.com/stafne/test2_update_app/releases/tag/v1.2.0";
    assert_eq!(
        outcome,
        SessionOutcome::OpenedReleasePage { url: url.into() }
    );
    assert_eq!(*launcher.opened.lock().unwrap(), vec![url]);
    assert!(ui.confirms[0].1.ends_with("Would you like to download the update?"));
}

// ────────────────────────────────────────────────────────────────────────────
// Session guard and throttling
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_session_is_rejected_while_first_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(release_body("v1.0.1", json!([])))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let orch = orchestrator(
        &config_for(&server, "Flow Guard"),
        unused_tool(),
        Arc::default(),
    );
    let first = orch.start(CheckMode::Verbose).unwrap();
    assert!(orch.is_busy());
    assert!(matches!(
        orch.start(CheckMode::Verbose),
        Err(UpdateError::SessionInProgress)
    ));

    let mut ui = RecordingUi::default();
    assert_eq!(
        drive_session(first, &mut ui).await.unwrap(),
        SessionOutcome::UpToDate
    );
    assert!(!orch.is_busy());

    let mut again = RecordingUi::default();
    assert_eq!(
        run(&orch, CheckMode::Silent, &mut again).await,
        SessionOutcome::UpToDate
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recent_check_skips_silent_but_not_verbose() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_body("v1.0.1", json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let state_file = scratch.path().join("update-state.json");
    let mut state = UpdateState::default();
    state.mark_checked(Some("1.0.1"));
    state.save(&state_file).unwrap();

    let config = UpdateConfig {
        startup_check_interval_hours: 24,
        ..config_for(&server, "Flow Throttle")
    };
    let orch = orchestrator(&config, unused_tool(), Arc::default()).with_state_file(&state_file);

    let mut silent = RecordingUi::default();
    assert_eq!(
        run(&orch, CheckMode::Silent, &mut silent).await,
        SessionOutcome::Skipped
    );
    assert!(silent.states.is_empty());

    let mut verbose = RecordingUi::default();
    assert_eq!(
        run(&orch, CheckMode::Verbose, &mut verbose).await,
        SessionOutcome::UpToDate
    );
    let saved = UpdateState::load(&state_file);
    assert_eq!(saved.last_seen_version.as_deref(), Some("1.0.1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn finish_without_ui_declines() {
    let server = MockServer::start().await;
    mount_release(&server, release_body("v1.2.0", dmg_asset(&server))).await;

    let orch = orchestrator(
        &config_for(&server, "Flow Headless"),
        unused_tool(),
        Arc::default(),
    );
    let handle = orch.start(CheckMode::Verbose).unwrap();
    assert_eq!(handle.finish().await.unwrap(), SessionOutcome::Declined);
    assert!(!orch.is_busy());
}
