use oort_core::input::{Action, Key};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySequence {
    #[serde(default = "default_dt")]
    pub fixed_dt: f32,
    pub frames: Vec<ReplayFrame>,
}

/// Keys are held for the whole run of `repeat` frames; actions fire on the
/// first of those frames only.
#[derive(Debug, Deserialize, Clone)]
pub struct ReplayFrame {
    #[serde(default)]
    pub held: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayInput {
    pub held: Vec<Key>,
    pub actions: Vec<Action>,
}

impl ReplaySequence {
    pub fn expanded_inputs(&self) -> Vec<ReplayInput> {
        let mut out = Vec::new();
        for frame in &self.frames {
            let held: Vec<Key> = frame.held.iter().filter_map(|k| parse_key(k)).collect();
            let actions: Vec<Action> = frame
                .actions
                .iter()
                .filter_map(|a| parse_action(a))
                .collect();
            for i in 0..frame.repeat.max(1) {
                out.push(ReplayInput {
                    held: held.clone(),
                    actions: if i == 0 { actions.clone() } else { Vec::new() },
                });
            }
        }
        out
    }
}

pub fn load_replay_from_path(path: &Path) -> Result<ReplaySequence, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let replay: ReplaySequence = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse replay JSON {}: {e}", path.display()))?;
    validate_replay(&replay)?;
    Ok(replay)
}

fn validate_replay(replay: &ReplaySequence) -> Result<(), String> {
    if !(replay.fixed_dt > 0.0) {
        return Err("Replay validation failed: fixed_dt must be > 0".to_string());
    }
    if replay.frames.is_empty() {
        return Err("Replay validation failed: frames list is empty".to_string());
    }
    for (i, frame) in replay.frames.iter().enumerate() {
        if let Some(key) = frame.held.iter().find(|k| parse_key(k).is_none()) {
            return Err(format!(
                "Replay validation failed: frame {i} holds unknown key '{key}'"
            ));
        }
        if let Some(action) = frame.actions.iter().find(|a| parse_action(a).is_none()) {
            return Err(format!(
                "Replay validation failed: frame {i} triggers unknown action '{action}'"
            ));
        }
    }
    Ok(())
}

fn parse_key(name: &str) -> Option<Key> {
    match name {
        "left" => Some(Key::Left),
        "right" => Some(Key::Right),
        "up" => Some(Key::Up),
        "down" => Some(Key::Down),
        "w" => Some(Key::W),
        "a" => Some(Key::A),
        "s" => Some(Key::S),
        "d" => Some(Key::D),
        _ => None,
    }
}

fn parse_action(name: &str) -> Option<Action> {
    match name {
        "start" => Some(Action::Start),
        "help" => Some(Action::Help),
        "back" => Some(Action::Back),
        "quit" => Some(Action::Quit),
        "replay" => Some(Action::Replay),
        "fire" => Some(Action::Fire),
        "camera" => Some(Action::CycleCamera),
        _ => None,
    }
}

const fn default_dt() -> f32 {
    1.0 / 60.0
}

const fn default_repeat() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::orchestrator::FrameOrchestrator;
    use crate::state::GameState;
    use crate::testing::Harness;
    use glam::Vec3;
    use oort_core::input::InputState;
    use oort_core::services::{EntityId, FrameListener, ObjectKind};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "oort_replay_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[derive(Debug, PartialEq)]
    struct RunSummary {
        state: GameState,
        score: i64,
        live: Vec<EntityId>,
        ship: Option<Vec3>,
        collisions: u64,
        sounds: usize,
    }

    fn run(replay: &ReplaySequence) -> RunSummary {
        let mut orchestrator = FrameOrchestrator::new(GameConfig::default());
        let mut input = InputState::new();
        let mut harness = Harness::default();
        let mut held: Vec<Key> = Vec::new();

        for frame in replay.expanded_inputs() {
            for key in held.iter().filter(|k| !frame.held.contains(k)) {
                input.key_up(*key);
            }
            for key in &frame.held {
                input.key_down(*key);
            }
            held = frame.held.clone();
            for action in &frame.actions {
                input.trigger_action(*action);
            }
            orchestrator.frame_rendering_queued(
                f64::from(replay.fixed_dt),
                &mut input,
                &mut harness.services(),
            );
            input.end_frame();
        }

        let registry = orchestrator.registry();
        RunSummary {
            state: orchestrator.state(),
            score: orchestrator.score(),
            live: registry.iter_live().map(|o| o.id).collect(),
            ship: registry
                .first_of(ObjectKind::Spaceship)
                .and_then(|id| registry.live(id))
                .map(|ship| ship.transform.position),
            collisions: orchestrator.stats().collisions,
            sounds: harness.audio.sounds.len(),
        }
    }

    #[test]
    fn replay_file_parses_and_expands() {
        let path = temp_file_path("parse");
        fs::write(
            &path,
            r#"{
              "fixed_dt": 0.016666667,
              "frames": [
                { "actions": ["start"] },
                { "held": ["w", "a"], "actions": ["fire"], "repeat": 3 }
              ]
            }"#,
        )
        .expect("write replay file");

        let replay = load_replay_from_path(&path).expect("replay should load");
        let expanded = replay.expanded_inputs();
        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[0].actions, vec![Action::Start]);
        assert_eq!(expanded[1].held, vec![Key::W, Key::A]);
        assert_eq!(expanded[1].actions, vec![Action::Fire]);
        assert!(expanded[3].actions.is_empty());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let path = temp_file_path("unknown_key");
        fs::write(&path, r#"{ "frames": [ { "held": ["jump"] } ] }"#)
            .expect("write replay file");

        let err = load_replay_from_path(&path).expect_err("unknown key must fail");
        assert!(err.contains("jump"), "{err}");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn empty_replay_is_rejected() {
        let path = temp_file_path("empty");
        fs::write(&path, r#"{ "fixed_dt": 0.02, "frames": [] }"#).expect("write replay file");
        assert!(load_replay_from_path(&path).is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn replay_run_is_deterministic() {
        let path = temp_file_path("deterministic");
        fs::write(
            &path,
            r#"{
              "fixed_dt": 0.016666667,
              "frames": [
                { "repeat": 2 },
                { "actions": ["start"] },
                { "held": ["w"], "repeat": 45 },
                { "held": ["w", "a"], "actions": ["fire"], "repeat": 30 },
                { "held": ["up"], "actions": ["fire"], "repeat": 30 },
                { "actions": ["camera", "fire"], "repeat": 20 },
                { "held": ["s", "d"], "repeat": 60 },
                { "actions": ["fire"], "repeat": 120 }
              ]
            }"#,
        )
        .expect("write replay file");

        let replay = load_replay_from_path(&path).expect("replay should load");
        let run_a = run(&replay);
        let run_b = run(&replay);

        assert_eq!(run_a.state, run_b.state);
        assert_eq!(run_a.score, run_b.score);
        assert_eq!(run_a.live, run_b.live);
        assert_eq!(run_a.collisions, run_b.collisions);
        assert_eq!(run_a.sounds, run_b.sounds);
        match (run_a.ship, run_b.ship) {
            (Some(a), Some(b)) => assert!(a.distance(b) < 0.0001),
            (a, b) => assert_eq!(a.is_some(), b.is_some()),
        }
        assert_ne!(run_a.state, GameState::Home);

        let _ = fs::remove_file(path);
    }
}
