//! Integration tests for settings persistence and the editing session.

mod common;

use std::sync::Arc;

use common::TestHarness;
use gifcut::session::EditingSession;
use gifcut::settings::{JsonFileStore, SettingsPatch, SettingsState, STORAGE_KEY};
use gifcut::timeline::{DragKind, Interval};
use gifcut_common::{ConversionParameters, FilterKind};

fn state_at(path: &std::path::Path) -> SettingsState {
    SettingsState::init(Arc::new(JsonFileStore::new(path)))
}

#[test]
fn settings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let mut first = state_at(&path);
    first
        .set(&SettingsPatch {
            width: Some(320),
            filter: Some(FilterKind::Sepia),
            reverse: Some(true),
            ..Default::default()
        })
        .unwrap();

    let second = state_at(&path);
    assert_eq!(second.params().width, 320);
    assert_eq!(second.params().filter, FilterKind::Sepia);
    assert!(second.params().reverse);
    assert_eq!(second.params().frame_rate, 10);
}

#[test]
fn stored_record_uses_stable_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    state_at(&path)
        .set(&SettingsPatch::trim(1.5, 2.0))
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let record = &raw[STORAGE_KEY];
    assert_eq!(record["startTime"], 1.5);
    assert_eq!(record["duration"], 2.0);
    assert_eq!(record["frameRate"], 10);
    assert_eq!(record["filter"], "none");
}

#[test]
fn partial_record_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        format!(r#"{{"{STORAGE_KEY}": {{"width": 640, "quality": 4}}}}"#),
    )
    .unwrap();

    let state = state_at(&path);
    assert_eq!(state.params().width, 640);
    assert_eq!(state.params().quality, 4);
    assert_eq!(state.params().duration, 5.0);
}

#[test]
fn corrupt_file_falls_back_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{{{ definitely not json").unwrap();

    let mut state = state_at(&path);
    assert_eq!(*state.params(), ConversionParameters::default());

    state.reset().unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get(STORAGE_KEY).is_some());
}

#[test]
fn reset_restores_defaults_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let mut state = state_at(&path);
    state
        .set(&SettingsPatch {
            quality: Some(25),
            ..Default::default()
        })
        .unwrap();
    state.reset().unwrap();

    assert_eq!(*state_at(&path).params(), ConversionParameters::default());
}

#[test]
fn session_trim_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let h = TestHarness::with_videos(&[("clip.mp4", b"body")]);

    {
        let mut session = EditingSession::new(state_at(&path));
        session.set_track_width(200.0);
        assert_eq!(session.select(&h.intake, 0).unwrap(), Interval::new(0.0, 5.0));

        // 200px track over 10s: 40px is 2s.
        session.begin_drag(DragKind::End, 100.0);
        session.update_drag(140.0).unwrap();
        session.end_drag();
        assert_eq!(session.interval(), Some(Interval::new(0.0, 7.0)));
    }

    let restored = state_at(&path);
    assert_eq!(restored.params().start, 0.0);
    assert_eq!(restored.params().duration, 7.0);
}
