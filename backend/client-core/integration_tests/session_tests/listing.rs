use crate::session_tests::helpers::{FakeCapture, config_for, drive_until, new_session, saw};

use client_core::bridge::{CaptureConstraints, CommandCapture};
use client_core::error::listing::ListingError;
use client_core::listing::ListingClient;
use client_core::modules;
use client_core::protocol::FileCategory;
use client_core::recording::{Recording, record};
use client_core::session::Effect;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_audio_listing(server: &MockServer, entries: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/files/audio/uploads/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(server)
        .await;
}

/// **VALUE**: Verifies listings skip directories and come back newest first with server paths.
///
/// **WHY THIS MATTERS**: The newest upload is the default selection; the server path is
/// what start frames and file operations carry.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Subdirectories appear as selectable files
/// - Files are sorted by name instead of modification time
/// - Server paths are built from the URL instead of the files root
#[tokio::test]
async fn given_directory_index_when_listed_then_files_newest_first() {
    // GIVEN: A files server with two files and a directory
    let server = MockServer::start().await;
    mount_audio_listing(
        &server,
        json!([
            {"name": "old.wav", "isDir": false, "size": 10, "modTime": "2024-01-01T00:00:00Z"},
            {"name": "sub", "isDir": true},
            {"name": "new.wav", "isDir": false, "size": 20, "modTime": "2024-06-01T00:00:00Z"}
        ]),
    )
    .await;
    let client = ListingClient::new(&config_for(&server.uri())).expect("client builds");

    // WHEN: Listing audio files
    let files = client.list(FileCategory::Audio).await.expect("listing loads");

    // THEN: Files only, newest first
    let names: Vec<&str> = files.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(names, vec!["new.wav", "old.wav"]);
    assert_eq!(files[0].server_path, "./files/audio/uploads/new.wav");
    assert_eq!(files[0].size, Some(20));
}

async fn mount_sfx_listing(server: &MockServer, entries: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/files/audio/sfx/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(server)
        .await;
}

/// **VALUE**: Verifies the effect listing offers only `.wav` files, with SFX server paths.
///
/// **WHY THIS MATTERS**: The transmitter can only splice WAV effects around the main audio.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Other audio formats or directories are offered as effects
/// - Effect paths point into the uploads directory
#[tokio::test]
async fn given_sfx_directory_when_listed_then_wav_files_only() {
    // GIVEN: An SFX directory with a WAV, an MP3, a text file and a directory
    let server = MockServer::start().await;
    mount_sfx_listing(
        &server,
        json!([
            {"name": "horn.wav", "isDir": false, "modTime": "2024-01-01T00:00:00Z"},
            {"name": "song.mp3", "isDir": false, "modTime": "2024-02-01T00:00:00Z"},
            {"name": "notes.txt", "isDir": false, "modTime": "2024-03-01T00:00:00Z"},
            {"name": "more.wav", "isDir": true},
            {"name": "bell.wav", "isDir": false, "modTime": "2024-04-01T00:00:00Z"}
        ]),
    )
    .await;
    let client = ListingClient::new(&config_for(&server.uri())).expect("client builds");

    // WHEN: Listing effects
    let files = client.list_sfx().await.expect("listing loads");

    // THEN: WAV files only, newest first, under the SFX directory
    let paths: Vec<&str> = files.iter().map(|file| file.server_path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["./files/audio/sfx/bell.wav", "./files/audio/sfx/horn.wav"]
    );
}

/// **VALUE**: Verifies reloading effects through the session drops saved choices the server no longer has.
///
/// **WHY THIS MATTERS**: `piraterf start` loads this listing before validating the intro/outro.
///
/// **BUG THIS CATCHES**: Would catch the listing being reported without pruning the forms.
#[tokio::test]
async fn given_saved_outro_deleted_when_sfx_reloaded_then_outro_cleared() {
    // GIVEN: A server offering one effect, and a form naming another
    let server = MockServer::start().await;
    mount_sfx_listing(
        &server,
        json!([{"name": "horn.wav", "isDir": false, "modTime": "2024-01-01T00:00:00Z"}]),
    )
    .await;
    let (mut session, mut events) = new_session(
        config_for(&server.uri()),
        Arc::new(CommandCapture::new("arecord")),
    );
    let spec = modules::find("pifmrds").expect("pifmrds in catalog");
    let form = session.context_mut().forms.form_mut(spec);
    form.intro = "./files/audio/sfx/horn.wav".to_string();
    form.outro = "./files/audio/sfx/gone.wav".to_string();

    // WHEN: Reloading effects
    session.reload_sfx();
    drive_until(&mut session, &mut events, |s| s.context().sfx.is_some()).await;

    // THEN: The listed intro stays, the deleted outro is gone
    let form = session.context().forms.form(spec);
    assert_eq!(form.intro, "./files/audio/sfx/horn.wav");
    assert_eq!(form.outro, "");
    assert!(saw(&session, |effect| matches!(effect, Effect::SfxLoaded { files } if files.len() == 1)));
}

/// **VALUE**: Verifies a failing listing surfaces the HTTP status.
///
/// **WHY THIS MATTERS**: The operator needs to tell a missing directory from a dead server.
///
/// **BUG THIS CATCHES**: Would catch error bodies parsed as empty listings.
#[tokio::test]
async fn given_server_error_when_listed_then_server_error_returned() {
    // GIVEN: A files server that fails
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/images/uploads/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let client = ListingClient::new(&config_for(&server.uri())).expect("client builds");

    // WHEN: Listing images
    let result = client.list(FileCategory::Image).await;

    // THEN: A server error carrying the body
    match result {
        Err(ListingError::Server { message, .. }) => assert_eq!(message, "boom"),
        other => panic!("Expected server error, got {other:?}"),
    }
}

/// **VALUE**: Verifies an upload reloads its category and selects the uploaded file.
///
/// **WHY THIS MATTERS**: After uploading, the operator expects to transmit that file next
/// without hunting for it in the browser.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The upload is filed under the wrong category for its module
/// - The reload picks the newest file instead of the uploaded one
/// - The loading indicator is never cleared
#[tokio::test]
async fn given_upload_when_accepted_then_listing_reloads_with_file_selected() {
    // GIVEN: A server accepting uploads, whose listing has the new file but not as newest
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "original_filename": "tone.wav",
            "saved_filename": "tone.wav"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_audio_listing(
        &server,
        json!([
            {"name": "tone.wav", "isDir": false, "modTime": "2024-01-01T00:00:00Z"},
            {"name": "later.wav", "isDir": false, "modTime": "2024-06-01T00:00:00Z"}
        ]),
    )
    .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let local = dir.path().join("tone.wav");
    std::fs::write(&local, b"RIFF").expect("write sample file");

    let (mut session, mut events) = new_session(
        config_for(&server.uri()),
        Arc::new(CommandCapture::new("arecord")),
    );

    // WHEN: Uploading for pifmrds
    session.upload(local, "pifmrds");

    // THEN: The audio listing reloads with the uploaded file selected
    drive_until(&mut session, &mut events, |s| {
        s.context().listings.contains_key(&FileCategory::Audio)
    })
    .await;
    assert_eq!(
        session.context().selections.get(FileCategory::Audio),
        Some("./files/audio/uploads/tone.wav")
    );
    assert!(saw(&session, |effect| *effect == Effect::Loading(None)));
    assert!(saw(&session, |effect| {
        *effect == Effect::system("File uploaded: tone.wav")
    }));
}

/// **VALUE**: Verifies a rejected upload reports an error and reloads nothing.
///
/// **WHY THIS MATTERS**: A failed upload must not look like a success that silently vanished.
///
/// **BUG THIS CATCHES**: Would catch a non-success status treated as accepted.
#[tokio::test]
async fn given_upload_when_rejected_then_error_reported() {
    // GIVEN: A server rejecting uploads
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "original_filename": "tone.wav"
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().expect("temp dir");
    let local = dir.path().join("tone.wav");
    std::fs::write(&local, b"RIFF").expect("write sample file");

    let (mut session, mut events) = new_session(
        config_for(&server.uri()),
        Arc::new(CommandCapture::new("arecord")),
    );

    // WHEN: Uploading
    session.upload(local, "pifmrds");

    // THEN: An upload error, no reload
    drive_until(&mut session, &mut events, |s| {
        saw(s, |effect| matches!(effect, Effect::Error(text) if text.starts_with("Upload failed")))
    })
    .await;
    assert!(!saw(&session, |effect| matches!(effect, Effect::ReloadListing { .. })));
}

/// **VALUE**: Verifies a microphone recording is saved as WAV, uploaded and selected.
///
/// **WHY THIS MATTERS**: `piraterf record` is the quickest way to get fresh audio onto the transmitter.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The upload carries raw samples instead of a WAV file
/// - The recording is filed outside the audio browser
/// - The uploaded recording is not selected afterwards
#[tokio::test]
async fn given_recording_when_uploaded_then_wav_sent_and_selected() {
    // GIVEN: A server accepting the recording and listing it afterwards
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "original_filename": "recording_1.wav",
            "saved_filename": "recording_1.wav"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_audio_listing(
        &server,
        json!([{"name": "recording_1.wav", "isDir": false, "modTime": "2024-01-01T00:00:00Z"}]),
    )
    .await;
    let config = config_for(&server.uri());
    let capture = Arc::new(FakeCapture::new(vec![0.25; 64]));
    let (mut session, mut events) = new_session(config.clone(), capture);

    // WHEN: Recording briefly and uploading the file
    let recording = record(
        session.capture(),
        CaptureConstraints::from_config(&config.audio),
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await
    .expect("recording captured");
    let dir = tempfile::tempdir().expect("temp dir");
    let local = dir.path().join(Recording::filename(1));
    recording.save(&local).expect("recording saved");
    session.upload(local, "pifmrds");

    // THEN: The audio listing reloads with the recording selected
    drive_until(&mut session, &mut events, |s| {
        s.context().listings.contains_key(&FileCategory::Audio)
    })
    .await;
    assert_eq!(
        session.context().selections.get(FileCategory::Audio),
        Some("./files/audio/uploads/recording_1.wav")
    );

    // AND: The uploaded body is the WAV file under its recording name
    let requests = server.received_requests().await.expect("requests recorded");
    let upload = requests
        .iter()
        .find(|request| request.url.path() == "/upload")
        .expect("upload sent");
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("recording_1.wav"));
    assert!(body.contains("RIFF"));
    assert!(body.contains("WAVE"));
}

