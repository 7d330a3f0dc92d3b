pub mod game_overlay;
pub mod screens;

pub use game_overlay::{GameOverlay, OverlayActions, OverlayStats};
pub use screens::ScreenState;
