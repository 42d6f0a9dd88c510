//! Integration tests for the poll cycle against a mock CI server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use artifact_sync::error::Error;
use artifact_sync::event::{create_event_channel, UpdaterEvent, UpdaterEventsChannel};
use artifact_sync::poller::install::DeferredDeletes;
use artifact_sync::poller::{CycleOutcome, UpdatePoller};
use artifact_sync::source::{ArtifactSource, ArtifactVariant};
use std::path::PathBuf;
use std::time::Duration;
use wiremock::matchers::{header_regex, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB: &str = "ViaVersion";
const METADATA_PATH: &str = "/job/ViaVersion/lastBuild/api/json";
const ARTIFACT_CONTENT: &[u8] = b"\x50\x4b\x03\x04 fake jar bytes";

fn last_build_body(file_name: &str, relative_path: &str) -> String {
    format!(
        r#"{{"number": 4123, "artifacts": [{{"fileName": "{file_name}", "relativePath": "{relative_path}"}}]}}"#
    )
}

/// Mount the last-build metadata endpoint. Only requests carrying a
/// browser-identifying user agent are answered, mirroring the CI server's
/// rejection of default client identifiers.
async fn mock_metadata(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .and(header_regex("user-agent", "Mozilla"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mock_artifact(server: &MockServer, relative_path: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/job/{JOB}/lastBuild/artifact/{relative_path}")))
        .and(header_regex("user-agent", "Mozilla"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ARTIFACT_CONTENT))
        .mount(server)
        .await;
}

fn test_poller(
    server: &MockServer,
    install_dir: PathBuf,
    installed: Option<PathBuf>,
) -> (UpdatePoller, UpdaterEventsChannel, DeferredDeletes) {
    let (events_tx, events_rx) = create_event_channel();
    let deferred = DeferredDeletes::new();
    let poller = UpdatePoller::with_source(
        ArtifactVariant::Primary,
        ArtifactSource::with_root(&server.uri(), JOB),
        install_dir,
        installed,
        Duration::from_secs(5),
        events_tx,
        deferred.clone(),
    )
    .unwrap();
    (poller, events_rx, deferred)
}

fn drain(rx: &mut UpdaterEventsChannel) -> Vec<UpdaterEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn restart_requests(events: &[UpdaterEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, UpdaterEvent::RestartRequested { .. }))
        .count()
}

#[tokio::test]
async fn fresh_install_downloads_and_requests_restart() {
    let server = MockServer::start().await;
    mock_metadata(
        &server,
        last_build_body("App-123.jar", "build/App-123.jar"),
    )
    .await;
    mock_artifact(&server, "build/App-123.jar").await;

    let dir = tempfile::tempdir().unwrap();
    let (mut poller, mut events_rx, _) = test_poller(&server, dir.path().to_path_buf(), None);

    let outcome = poller.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Installed {
            file_name: "App-123.jar".to_string()
        }
    );

    let installed = dir.path().join("App-123.jar");
    assert_eq!(std::fs::read(&installed).unwrap(), ARTIFACT_CONTENT);
    assert_eq!(poller.installed_file(), Some(installed.as_path()));

    let events = drain(&mut events_rx);
    assert_eq!(restart_requests(&events), 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, UpdaterEvent::UpdateInstalled { file_name, .. } if file_name == "App-123.jar")));
}

#[tokio::test]
async fn matching_name_skips_download() {
    let server = MockServer::start().await;
    mock_metadata(
        &server,
        last_build_body("App-123.jar", "build/App-123.jar"),
    )
    .await;
    // Any download request is a test failure.
    Mock::given(method("GET"))
        .and(path("/job/ViaVersion/lastBuild/artifact/build/App-123.jar"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    // Same name, different case: still counts as current.
    let current = dir.path().join("app-123.JAR");
    std::fs::write(&current, b"already here").unwrap();

    let (mut poller, mut events_rx, _) =
        test_poller(&server, dir.path().to_path_buf(), Some(current.clone()));

    let outcome = poller.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::UpToDate);

    assert_eq!(std::fs::read(&current).unwrap(), b"already here");
    let events = drain(&mut events_rx);
    assert_eq!(restart_requests(&events), 0);
}

#[tokio::test]
async fn new_build_replaces_superseded_file() {
    let server = MockServer::start().await;
    mock_metadata(
        &server,
        last_build_body("ViaVersion-4.9.2.jar", "build/libs/ViaVersion-4.9.2.jar"),
    )
    .await;
    mock_artifact(&server, "build/libs/ViaVersion-4.9.2.jar").await;

    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("ViaVersion-4.9.1.jar");
    std::fs::write(&old, b"old build").unwrap();

    let (mut poller, _events_rx, deferred) =
        test_poller(&server, dir.path().to_path_buf(), Some(old.clone()));

    let outcome = poller.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Installed { .. }));

    let new = dir.path().join("ViaVersion-4.9.2.jar");
    assert_eq!(std::fs::read(&new).unwrap(), ARTIFACT_CONTENT);
    assert!(!old.exists());
    assert!(deferred.is_empty());
}

#[tokio::test]
async fn undeletable_old_file_is_deferred_not_fatal() {
    let server = MockServer::start().await;
    mock_metadata(
        &server,
        last_build_body("ViaVersion-4.9.2.jar", "build/libs/ViaVersion-4.9.2.jar"),
    )
    .await;
    mock_artifact(&server, "build/libs/ViaVersion-4.9.2.jar").await;

    let dir = tempfile::tempdir().unwrap();
    // A non-empty directory where the old artifact should be makes the
    // deletion fail the way a file held open by the host would.
    let old = dir.path().join("ViaVersion-4.9.1.jar");
    std::fs::create_dir(&old).unwrap();
    std::fs::write(old.join("held"), b"x").unwrap();

    let (mut poller, mut events_rx, deferred) =
        test_poller(&server, dir.path().to_path_buf(), Some(old.clone()));

    let outcome = poller.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Installed { .. }));
    assert!(dir.path().join("ViaVersion-4.9.2.jar").exists());
    assert_eq!(deferred.pending(), vec![old]);

    // Still a successful cycle: exactly one restart request.
    assert_eq!(restart_requests(&drain(&mut events_rx)), 1);
}

#[tokio::test]
async fn malformed_metadata_fails_cycle_then_next_cycle_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"artifacts": []}"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_metadata(
        &server,
        last_build_body("App-123.jar", "build/App-123.jar"),
    )
    .await;
    mock_artifact(&server, "build/App-123.jar").await;

    let dir = tempfile::tempdir().unwrap();
    let (mut poller, _events_rx, _) = test_poller(&server, dir.path().to_path_buf(), None);

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));

    // The poller stays usable; the next scheduled cycle succeeds.
    let outcome = poller.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Installed { .. }));
}

#[tokio::test]
async fn invalid_json_metadata_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (mut poller, _events_rx, _) = test_poller(&server, dir.path().to_path_buf(), None);

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[tokio::test]
async fn non_success_metadata_status_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (mut poller, _events_rx, _) = test_poller(&server, dir.path().to_path_buf(), None);

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
}

#[tokio::test]
async fn failed_download_leaves_no_partial_file() {
    let server = MockServer::start().await;
    mock_metadata(
        &server,
        last_build_body("App-123.jar", "build/App-123.jar"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/job/ViaVersion/lastBuild/artifact/build/App-123.jar"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (mut poller, mut events_rx, _) = test_poller(&server, dir.path().to_path_buf(), None);

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, Error::Download(_)));

    // Neither the target file nor any staging residue may be visible.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    assert_eq!(restart_requests(&drain(&mut events_rx)), 0);
}

#[tokio::test]
async fn artifact_paths_with_spaces_are_escaped() {
    let server = MockServer::start().await;
    mock_metadata(
        &server,
        last_build_body("my app.jar", "build/my app.jar"),
    )
    .await;
    // Reaching this mock proves the request line carried an escaped URL.
    Mock::given(method("GET"))
        .and(path_regex(
            r"^/job/ViaVersion/lastBuild/artifact/build/my(%20| )app\.jar$",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ARTIFACT_CONTENT))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (mut poller, _events_rx, _) = test_poller(&server, dir.path().to_path_buf(), None);

    let outcome = poller.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Installed {
            file_name: "my app.jar".to_string()
        }
    );
    assert!(dir.path().join("my app.jar").exists());
}

#[tokio::test]
async fn traversal_artifact_name_is_rejected() {
    let server = MockServer::start().await;
    mock_metadata(
        &server,
        last_build_body("../escape.jar", "build/escape.jar"),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let (mut poller, _events_rx, _) = test_poller(&server, dir.path().to_path_buf(), None);

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, Error::Install(_)));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
