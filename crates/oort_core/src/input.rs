//! Input state tracking with level-triggered keys and edge-triggered actions.
//!
//! - **Level-triggered (held):** `is_held(key)` / `is_key_down(key)` is true
//!   every frame the key is physically down. Ship steering and thrust read this.
//!
//! - **Edge-triggered actions:** a key press (through the binding table) or a
//!   GUI button click queues an `Action`. `is_action_triggered` consumes it, so
//!   each press is observed exactly once. `end_frame()` drops whatever the
//!   frame did not consume; a menu click must not fire a laser three frames
//!   later.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Escape,
    Space,
    Enter,
    Backspace,
    F3,
    W,
    A,
    S,
    D,
    H,
    M,
    C,
    P,
    R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseBtn {
    Left,
    Right,
    Middle,
}

/// Discrete, edge-triggered intents. Menu actions feed the game state
/// machine; the rest are handled by the frame orchestrator directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Help,
    Back,
    Quit,
    Replay,
    Fire,
    ToggleMute,
    CycleCamera,
    TogglePause,
    ToggleOverlay,
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Action::Start,
        Action::Help,
        Action::Back,
        Action::Quit,
        Action::Replay,
        Action::Fire,
        Action::ToggleMute,
        Action::CycleCamera,
        Action::TogglePause,
        Action::ToggleOverlay,
    ];

    /// Default keyboard binding.
    pub fn for_key(key: Key) -> Option<Action> {
        match key {
            Key::Enter => Some(Action::Start),
            Key::H => Some(Action::Help),
            Key::Backspace => Some(Action::Back),
            Key::Escape => Some(Action::Quit),
            Key::R => Some(Action::Replay),
            Key::Space => Some(Action::Fire),
            Key::M => Some(Action::ToggleMute),
            Key::C => Some(Action::CycleCamera),
            Key::P => Some(Action::TogglePause),
            Key::F3 => Some(Action::ToggleOverlay),
            _ => None,
        }
    }

    pub fn for_mouse(btn: MouseBtn) -> Option<Action> {
        match btn {
            MouseBtn::Left => Some(Action::Fire),
            _ => None,
        }
    }
}

/// Polling contract the frame orchestrator consumes.
pub trait InputService {
    fn is_key_down(&self, key: Key) -> bool;

    /// Edge-triggered; returns true at most once per trigger.
    fn is_action_triggered(&mut self, action: Action) -> bool;
}

pub struct InputState {
    held: HashSet<Key>,
    just_pressed: HashSet<Key>,
    just_released: HashSet<Key>,

    mouse_held: HashSet<MouseBtn>,
    mouse_just_pressed: HashSet<MouseBtn>,

    pending_actions: HashSet<Action>,

    pub mouse_position: (f64, f64),
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
            mouse_held: HashSet::new(),
            mouse_just_pressed: HashSet::new(),
            pending_actions: HashSet::new(),
            mouse_position: (0.0, 0.0),
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
            if let Some(action) = Action::for_key(key) {
                self.pending_actions.insert(action);
            }
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if self.held.remove(&key) {
            self.just_released.insert(key);
        }
    }

    pub fn mouse_down(&mut self, btn: MouseBtn) {
        if self.mouse_held.insert(btn) {
            self.mouse_just_pressed.insert(btn);
            if let Some(action) = Action::for_mouse(btn) {
                self.pending_actions.insert(action);
            }
        }
    }

    pub fn mouse_up(&mut self, btn: MouseBtn) {
        self.mouse_held.remove(&btn);
    }

    /// Queue an action from a non-keyboard source (GUI button, replay).
    pub fn trigger_action(&mut self, action: Action) {
        self.pending_actions.insert(action);
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn is_just_released(&self, key: Key) -> bool {
        self.just_released.contains(&key)
    }

    pub fn is_mouse_held(&self, btn: MouseBtn) -> bool {
        self.mouse_held.contains(&btn)
    }

    pub fn is_action_pending(&self, action: Action) -> bool {
        self.pending_actions.contains(&action)
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
        self.mouse_just_pressed.clear();
        self.pending_actions.clear();
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputService for InputState {
    fn is_key_down(&self, key: Key) -> bool {
        self.is_held(key)
    }

    fn is_action_triggered(&mut self, action: Action) -> bool {
        self.pending_actions.remove(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_down_sets_held_and_just_pressed() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        assert!(input.is_held(Key::A));
        assert!(input.is_just_pressed(Key::A));
        assert!(input.is_key_down(Key::A));
    }

    #[test]
    fn test_key_up_clears_held_sets_just_released() {
        let mut input = InputState::new();
        input.key_down(Key::W);
        input.key_up(Key::W);
        assert!(!input.is_held(Key::W));
        assert!(input.is_just_released(Key::W));
    }

    #[test]
    fn test_key_up_without_down_is_no_op() {
        let mut input = InputState::new();
        input.key_up(Key::A);
        assert!(!input.is_just_released(Key::A));
        assert!(!input.is_held(Key::A));
    }

    #[test]
    fn bound_key_press_queues_action_once() {
        let mut input = InputState::new();
        input.key_down(Key::Space);
        assert!(input.is_action_triggered(Action::Fire));
        // Consumed: a second poll in the same frame sees nothing.
        assert!(!input.is_action_triggered(Action::Fire));
    }

    #[test]
    fn held_key_repeat_does_not_requeue_action() {
        let mut input = InputState::new();
        input.key_down(Key::Space);
        assert!(input.is_action_triggered(Action::Fire));
        // OS key repeat delivers another press while still held.
        input.key_down(Key::Space);
        assert!(!input.is_action_triggered(Action::Fire));
        assert!(input.is_held(Key::Space));
    }

    #[test]
    fn unconsumed_actions_are_dropped_at_end_frame() {
        let mut input = InputState::new();
        input.trigger_action(Action::Start);
        assert!(input.is_action_pending(Action::Start));
        input.end_frame();
        assert!(!input.is_action_triggered(Action::Start));
    }

    #[test]
    fn test_end_frame_keeps_held_keys() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        input.key_down(Key::W);
        input.end_frame();
        assert!(!input.is_just_pressed(Key::A));
        assert!(input.is_held(Key::A));
        assert!(input.is_held(Key::W));
    }

    #[test]
    fn mouse_left_fires() {
        let mut input = InputState::new();
        input.mouse_down(MouseBtn::Left);
        assert!(input.is_mouse_held(MouseBtn::Left));
        assert!(input.is_action_triggered(Action::Fire));
        input.mouse_up(MouseBtn::Left);
        assert!(!input.is_mouse_held(MouseBtn::Left));
    }

    #[test]
    fn unbound_keys_queue_nothing() {
        let mut input = InputState::new();
        input.key_down(Key::W);
        for &action in Action::ALL {
            assert!(!input.is_action_pending(action));
        }
    }

    #[test]
    fn default_state_is_empty() {
        let input = InputState::default();
        assert!(!input.is_held(Key::A));
        assert!(!input.is_just_pressed(Key::Space));
        assert!(!input.is_mouse_held(MouseBtn::Left));
        assert!((input.mouse_position.0 - 0.0).abs() < f64::EPSILON);
    }
}
