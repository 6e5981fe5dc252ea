//! Scenario tests for the router core and actor

use super::*;
use crate::cue::{CueBank, CueEngine};
use crate::mapping::store::NoteEntry;
use crate::mapping::{Feedback, MappingDocument, MappingTable, RawEvent, RuleSource};
use crate::osc::{ControlArg, ControlMessage};
use crate::state::{LiveState, Params, Shape};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

const DT: f32 = 1.0 / 60.0;

fn core_with(doc: &MappingDocument) -> Core {
    Core::new(
        MappingTable::from_document(doc),
        LiveState::default(),
        CueEngine::default(),
    )
}

fn default_core() -> Core {
    core_with(&MappingDocument::defaults())
}

fn press(core: &mut Core, addr: &str) {
    core.control(ControlMessage::float(addr, 1.0));
    core.tick(DT);
}

fn release(core: &mut Core, addr: &str) {
    core.control(ControlMessage::float(addr, 0.0));
    core.tick(DT);
}

fn note(channel: u8, note: u8, osc: &str, group: &str, feedback: bool) -> NoteEntry {
    NoteEntry {
        channel,
        note,
        osc: osc.to_string(),
        exclusive_group: group.to_string(),
        led_feedback: feedback,
        led_on: 127,
        ..NoteEntry::default()
    }
}

#[test]
fn test_missing_mapping_file_installs_defaults() {
    let dir = tempdir().unwrap();
    let (doc, report) = MappingDocument::load(&dir.path().join("midi_mapping.json"));
    assert_eq!(report.source, RuleSource::Defaults);

    let core = core_with(&doc);
    let cc: Vec<&str> = core
        .table()
        .continuous_rules()
        .iter()
        .map(|r| r.target.as_str())
        .collect();
    assert_eq!(cc, vec!["/laser/brightness", "/laser/scanrate"]);
    assert_eq!(core.table().discrete_rules().len(), 1);
    assert_eq!(core.table().discrete_rules()[0].target, "/flash");
}

#[test]
fn test_empty_cue_recall_changes_nothing() {
    let mut core = default_core();
    core.tick(DT);
    let before = (core.live().settable(), core.live().phases());

    core.control(ControlMessage::float("/cue/5", 1.0));
    core.drain();

    assert_eq!((core.live().settable(), core.live().phases()), before);
    assert!(core.take_outbox().persist.is_empty());
}

#[test]
fn test_raw_event_intent_applies_on_next_tick() {
    let mut core = default_core();
    core.raw_event(&RawEvent::continuous("pad", 1, 14, 0));
    assert_eq!(core.pending(), 1);
    assert_eq!(core.live().brightness(), 1.0);

    core.tick(DT);
    assert_eq!(core.live().brightness(), 0.0);

    let outbox = core.take_outbox();
    assert_eq!(outbox.forwarded.len(), 1);
    assert_eq!(outbox.forwarded[0].address, "/laser/brightness");
}

#[test]
fn test_flash_note_forces_full_brightness() {
    let mut core = default_core();
    core.control(ControlMessage::float("/laser/brightness", 0.3));
    core.raw_event(&RawEvent::press("pad", 1, 64, 100));
    core.tick(DT);
    assert_eq!(core.view().brightness, 1.0);

    core.raw_event(&RawEvent::release("pad", 1, 64));
    core.tick(DT);
    assert!(core.view().brightness < 1.0);
}

#[test]
fn test_save_then_recall() {
    let mut core = default_core();
    core.control(ControlMessage::bang("/laser/shape/triangle"));
    core.control(ControlMessage::float("/laser/position/x", 0.5));
    press(&mut core, "/cue/save");
    assert!(core.cues().is_save_armed());
    press(&mut core, "/cue/2");
    assert!(!core.cues().is_save_armed());

    let outbox = core.take_outbox();
    assert!(matches!(
        outbox.persist.as_slice(),
        [PersistRequest::Cues(doc)] if doc.cues[1].populated
    ));

    press(&mut core, "/laser/shape/square");
    press(&mut core, "/cue/2");
    let p = core.live().settable();
    assert_eq!(p.shape, Shape::Triangle);
    assert_eq!(p.pos_x, 0.5);
    assert_eq!(core.live().currents().pos_x, 0.5);
}

#[test]
fn test_recall_ignores_release() {
    let mut bank = CueBank::default();
    bank.store(
        1,
        Params {
            shape: Shape::Line,
            ..Params::default()
        },
    );
    let mut core = Core::new(
        MappingTable::from_document(&MappingDocument::defaults()),
        LiveState::default(),
        CueEngine::new(bank),
    );
    release(&mut core, "/cue/1");
    assert_eq!(core.live().settable().shape, Shape::Circle);
    press(&mut core, "/cue/1");
    assert_eq!(core.live().settable().shape, Shape::Line);
}

#[test]
fn test_momentary_cue_round_trip_through_protocol() {
    let mut bank = CueBank::default();
    bank.store(
        3,
        Params {
            shape: Shape::Square,
            wave_speed: 2.0,
            ..Params::default()
        },
    );
    let mut core = Core::new(
        MappingTable::from_document(&MappingDocument::defaults()),
        LiveState::default(),
        CueEngine::new(bank),
    );
    core.control(ControlMessage::float("/laser/wave/speed", 0.25));
    for _ in 0..12 {
        core.tick(DT);
    }
    let params = core.live().settable();
    let phases = core.live().phases();

    core.control(ControlMessage::float("/cue/momentary/3", 1.0));
    core.drain();
    assert_eq!(core.live().settable().shape, Shape::Square);
    for _ in 0..5 {
        core.tick(DT);
    }
    // a second momentary while held is ignored
    core.control(ControlMessage::float("/cue/momentary/4", 1.0));
    core.control(ControlMessage::float("/cue/momentary/3", 0.0));
    core.drain();

    assert_eq!(core.live().settable(), params);
    assert_eq!(core.live().phases(), phases);
    assert!(core.cues().momentary().is_none());
}

#[test]
fn test_standard_learn_binds_momentary_trigger() {
    let mut core = default_core();
    press(&mut core, "/learn/start");
    // target selection never recalls or saves
    press(&mut core, "/cue/save");
    press(&mut core, "/cue/7");
    assert!(core.cues().is_save_armed());

    core.raw_event(&RawEvent::press("pad", 2, 36, 90));
    core.drain();
    let rule = core
        .table()
        .discrete_rules()
        .iter()
        .find(|r| r.matches(2, 36))
        .cloned()
        .unwrap();
    assert_eq!(rule.target, "/cue/momentary/7");
    assert_eq!(core.learn().armed_flavor(), None);

    let outbox = core.take_outbox();
    assert!(matches!(
        outbox.persist.as_slice(),
        [PersistRequest::Mapping(doc)] if doc.notes.iter().any(|n| n.note == 36)
    ));
}

#[test]
fn test_momentary_learn_selection_does_not_apply() {
    let mut bank = CueBank::default();
    bank.store(
        4,
        Params {
            shape: Shape::Line,
            ..Params::default()
        },
    );
    let mut core = Core::new(
        MappingTable::from_document(&MappingDocument::defaults()),
        LiveState::default(),
        CueEngine::new(bank),
    );
    press(&mut core, "/learn/momentary/start");
    press(&mut core, "/cue/momentary/4");
    assert_eq!(core.live().settable().shape, Shape::Circle);
    assert!(core.cues().momentary().is_none());

    // rewrite the existing flash binding in place
    core.raw_event(&RawEvent::press("pad", 1, 64, 127));
    core.drain();
    assert_eq!(core.table().discrete_rules().len(), 1);
    assert_eq!(core.table().discrete_rules()[0].target, "/cue/momentary/4");
}

#[test]
fn test_learn_follows_press_order_within_one_frame() {
    let doc = MappingDocument {
        notes: vec![
            note(1, 10, "/learn/momentary/start", "", false),
            note(1, 11, "/cue/momentary/3", "", false),
        ],
        ..MappingDocument::defaults()
    };
    let mut core = core_with(&doc);

    // arm, pick the target and press the new trigger before a single tick
    core.raw_event(&RawEvent::press("pad", 1, 10, 127));
    core.raw_event(&RawEvent::press("pad", 1, 11, 127));
    core.raw_event(&RawEvent::press("pad", 1, 12, 127));
    core.tick(DT);

    let bound = core
        .table()
        .discrete_rules()
        .iter()
        .find(|r| r.matches(1, 12))
        .map(|r| r.target.clone());
    assert_eq!(bound.as_deref(), Some("/cue/momentary/3"));
    assert_eq!(core.learn().armed_flavor(), None);

    // the trigger that chose the target keeps its own binding
    let target_key = core
        .table()
        .discrete_rules()
        .iter()
        .find(|r| r.matches(1, 11))
        .map(|r| r.target.clone());
    assert_eq!(target_key.as_deref(), Some("/cue/momentary/3"));
}

#[test]
fn test_learn_cancel() {
    let mut core = default_core();
    press(&mut core, "/learn/momentary/start");
    press(&mut core, "/learn/cancel");
    core.raw_event(&RawEvent::press("pad", 3, 10, 127));
    core.drain();
    assert!(core.take_outbox().persist.is_empty());
}

#[test]
fn test_exclusive_group_feedback_reaches_outbox() {
    let doc = MappingDocument {
        notes: vec![
            note(1, 40, "/laser/shape/circle", "shapes", true),
            note(1, 41, "/laser/shape/line", "shapes", true),
        ],
        ..MappingDocument::defaults()
    };
    let mut core = core_with(&doc);
    core.raw_event(&RawEvent::press("pad", 1, 41, 127));
    core.tick(DT);
    assert_eq!(core.live().settable().shape, Shape::Line);

    let outbox = core.take_outbox();
    assert!(outbox.feedback.contains(&Feedback {
        channel: 1,
        control: 41,
        level: 127
    }));
    assert!(outbox.feedback.contains(&Feedback {
        channel: 1,
        control: 40,
        level: 0
    }));
    // legacy group: no OFF intent for the sibling
    assert_eq!(outbox.forwarded.len(), 1);
}

#[test]
fn test_reload_keeps_live_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("midi_mapping.json");
    let mut core = default_core().with_mapping_path(path.clone());
    press(&mut core, "/laser/shape/square");

    let doc = MappingDocument {
        notes: vec![note(1, 20, "/laser/shape/line", "", false)],
        ..MappingDocument::defaults()
    };
    std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
    press(&mut core, "/midi/reload");

    assert!(core.table().discrete_rules().iter().any(|r| r.matches(1, 20)));
    assert_eq!(core.live().settable().shape, Shape::Square);
    // the file lacked the rainbow controls, so the repaired version is persisted
    assert!(matches!(
        core.take_outbox().persist.as_slice(),
        [PersistRequest::Mapping(_)]
    ));
}

#[test]
fn test_out_of_range_cue_index_is_ignored() {
    let mut core = default_core();
    press(&mut core, "/cue/save");
    press(&mut core, "/cue/31");
    press(&mut core, "/cue/abc");
    assert!(core.cues().is_save_armed());
}

#[test]
fn test_unknown_address_is_not_dispatched() {
    let mut core = default_core();
    assert!(!core.dispatch(&ControlMessage::new(
        "/nothing/here",
        vec![ControlArg::Int(1)]
    )));
}

#[tokio::test]
async fn test_actor_publishes_view_and_feedback() {
    let doc = MappingDocument {
        notes: vec![note(1, 40, "/laser/shape/line", "shapes", true)],
        ..MappingDocument::defaults()
    };
    let (fb_tx, mut fb_rx) = mpsc::channel(16);
    let handle = RouterActor::spawn(
        core_with(&doc),
        RouterOutputs {
            feedback: Some(fb_tx),
            ..RouterOutputs::default()
        },
        200,
    );

    // initial indicator state
    let first = fb_rx.recv().await.unwrap();
    assert_eq!((first.control, first.level), (40, 0));

    let mut views = handle.subscribe();
    handle.raw_event(RawEvent::press("pad", 1, 40, 127));
    let lit = tokio::time::timeout(Duration::from_secs(1), fb_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lit.level, 127);

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            views.changed().await.unwrap();
            if views.borrow().params.shape == Shape::Line {
                break;
            }
        }
    })
    .await
    .unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.params.shape, Shape::Line);
    let doc = handle.mapping_document().await.unwrap();
    assert_eq!(doc.notes.len(), 1);

    handle.shutdown().await;
    assert!(handle.snapshot().await.is_none());
}
