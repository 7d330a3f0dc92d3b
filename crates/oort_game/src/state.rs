//! Session-level state machine.
//!
//! `transition` is a pure table: it names the next state and the effects to
//! run on the way out of the old state and into the new one. Applying the
//! effects is the orchestrator's job, in the order teardown, state change,
//! setup. An action that is not legal in the current state yields `None`.

use oort_core::input::Action;
use oort_core::services::{ObjectKind, Screen, SoundId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GameState {
    #[default]
    Home,
    Single,
    Endgame,
    Replay,
    HowTo,
}

impl GameState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Home => "HOME",
            Self::Single => "SINGLE",
            Self::Endgame => "ENDGAME",
            Self::Replay => "REPLAY",
            Self::HowTo => "HOWTO",
        }
    }

    /// Entities are only ever spawned into a running game.
    pub fn permits_spawn(self, _kind: ObjectKind) -> bool {
        self == Self::Single
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Inputs to the state machine. All but `ShipDestroyed` come from the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuAction {
    Start,
    Help,
    Back,
    Quit,
    Replay,
    ShipDestroyed,
}

impl MenuAction {
    pub const PLAYER: &'static [MenuAction] = &[
        MenuAction::Start,
        MenuAction::Help,
        MenuAction::Back,
        MenuAction::Quit,
        MenuAction::Replay,
    ];

    pub fn to_action(self) -> Option<Action> {
        match self {
            Self::Start => Some(Action::Start),
            Self::Help => Some(Action::Help),
            Self::Back => Some(Action::Back),
            Self::Quit => Some(Action::Quit),
            Self::Replay => Some(Action::Replay),
            Self::ShipDestroyed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Ship, lasers and asteroids.
    ClearDynamic,
    /// Everything, walls included.
    ClearAll,
    ResetScore,
    SpawnArena,
    ShowScreen(Screen),
    HideScreen(Screen),
    StartMusic,
    StopMusic,
    PlaySound(SoundId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: GameState,
    pub teardown: Vec<Effect>,
    pub setup: Vec<Effect>,
}

pub fn transition(state: GameState, action: MenuAction) -> Option<Transition> {
    use Effect::*;
    let (next, teardown, setup) = match (state, action) {
        (GameState::Home, MenuAction::Start) => (
            GameState::Single,
            vec![HideScreen(Screen::Home), PlaySound(SoundId::Menu)],
            vec![ResetScore, SpawnArena, ShowScreen(Screen::Hud)],
        ),
        (GameState::Home, MenuAction::Help) => (
            GameState::HowTo,
            vec![HideScreen(Screen::Home), PlaySound(SoundId::Menu)],
            vec![ShowScreen(Screen::HowTo)],
        ),
        (GameState::HowTo, MenuAction::Back) => (
            GameState::Home,
            vec![HideScreen(Screen::HowTo), PlaySound(SoundId::Menu)],
            vec![ShowScreen(Screen::Home)],
        ),
        (GameState::Single, MenuAction::ShipDestroyed) => (
            GameState::Endgame,
            vec![ClearDynamic, HideScreen(Screen::Hud)],
            vec![StopMusic, ShowScreen(Screen::EndGame)],
        ),
        (GameState::Endgame, MenuAction::Replay) => (
            GameState::Replay,
            vec![ClearAll, HideScreen(Screen::EndGame), PlaySound(SoundId::Menu)],
            vec![StartMusic],
        ),
        (GameState::Endgame, MenuAction::Quit) => (
            GameState::Home,
            vec![ClearAll, HideScreen(Screen::EndGame), PlaySound(SoundId::Menu)],
            vec![StartMusic, ShowScreen(Screen::Home)],
        ),
        (GameState::Replay, MenuAction::Start) => (
            GameState::Single,
            vec![],
            vec![ResetScore, SpawnArena, ShowScreen(Screen::Hud)],
        ),
        _ => return None,
    };
    Some(Transition {
        next,
        teardown,
        setup,
    })
}

#[derive(Debug, Default)]
pub struct GameStateMachine {
    state: GameState,
    pub transitions: u64,
}

impl GameStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> GameState {
        self.state
    }

    /// Look up the transition without applying it.
    pub fn request(&self, action: MenuAction) -> Option<Transition> {
        transition(self.state, action)
    }

    /// Called by the orchestrator between teardown and setup.
    pub fn enter(&mut self, next: GameState) {
        log::info!("State {} -> {}", self.state, next);
        self.state = next;
        self.transitions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [GameState; 5] = [
        GameState::Home,
        GameState::Single,
        GameState::Endgame,
        GameState::Replay,
        GameState::HowTo,
    ];

    const ALL_ACTIONS: [MenuAction; 6] = [
        MenuAction::Start,
        MenuAction::Help,
        MenuAction::Back,
        MenuAction::Quit,
        MenuAction::Replay,
        MenuAction::ShipDestroyed,
    ];

    #[test]
    fn home_accepts_only_start_and_help() {
        for action in ALL_ACTIONS {
            let legal = transition(GameState::Home, action).is_some();
            assert_eq!(
                legal,
                matches!(action, MenuAction::Start | MenuAction::Help),
                "{action:?}"
            );
        }
    }

    #[test]
    fn legal_transition_table() {
        let expected = [
            (GameState::Home, MenuAction::Start, GameState::Single),
            (GameState::Home, MenuAction::Help, GameState::HowTo),
            (GameState::HowTo, MenuAction::Back, GameState::Home),
            (GameState::Single, MenuAction::ShipDestroyed, GameState::Endgame),
            (GameState::Endgame, MenuAction::Replay, GameState::Replay),
            (GameState::Endgame, MenuAction::Quit, GameState::Home),
            (GameState::Replay, MenuAction::Start, GameState::Single),
        ];
        let mut legal_count = 0;
        for state in STATES {
            for action in ALL_ACTIONS {
                let result = transition(state, action).map(|t| t.next);
                let want = expected
                    .iter()
                    .find(|(s, a, _)| *s == state && *a == action)
                    .map(|(_, _, next)| *next);
                assert_eq!(result, want, "{state} + {action:?}");
                legal_count += usize::from(result.is_some());
            }
        }
        assert_eq!(legal_count, expected.len());
    }

    #[test]
    fn endgame_entry_clears_dynamic_objects_and_shows_end_screen() {
        let t = transition(GameState::Single, MenuAction::ShipDestroyed).expect("legal");
        assert!(t.teardown.contains(&Effect::ClearDynamic));
        assert!(t.setup.contains(&Effect::ShowScreen(Screen::EndGame)));
    }

    #[test]
    fn leaving_endgame_clears_everything() {
        for action in [MenuAction::Replay, MenuAction::Quit] {
            let t = transition(GameState::Endgame, action).expect("legal");
            assert!(t.teardown.contains(&Effect::ClearAll), "{action:?}");
        }
    }

    #[test]
    fn only_single_permits_spawning() {
        for state in STATES {
            assert_eq!(
                state.permits_spawn(ObjectKind::Asteroid),
                state == GameState::Single
            );
        }
    }

    #[test]
    fn machine_records_entered_state() {
        let mut machine = GameStateMachine::new();
        assert_eq!(machine.current(), GameState::Home);
        let t = machine.request(MenuAction::Help).expect("legal");
        machine.enter(t.next);
        assert_eq!(machine.current(), GameState::HowTo);
        assert!(machine.request(MenuAction::Start).is_none());
        assert_eq!(machine.transitions, 1);
    }

    #[test]
    fn only_player_actions_map_to_input_actions() {
        let actions: Vec<Action> = MenuAction::PLAYER
            .iter()
            .map(|menu| menu.to_action().expect("player action"))
            .collect();
        assert_eq!(
            actions,
            vec![
                Action::Start,
                Action::Help,
                Action::Back,
                Action::Quit,
                Action::Replay
            ]
        );
        assert_eq!(MenuAction::ShipDestroyed.to_action(), None);
    }
}
