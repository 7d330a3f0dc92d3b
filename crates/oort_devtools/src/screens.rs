//! Which GUI screens are up, and the score the HUD shows. The egui overlay
//! reads this every frame; the simulation writes it through `GuiService`.

use std::collections::BTreeSet;

use oort_core::services::{GuiService, Screen};

#[derive(Debug, Default, Clone)]
pub struct ScreenState {
    visible: BTreeSet<Screen>,
    score: i64,
}

impl ScreenState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, screen: Screen) -> bool {
        self.visible.contains(&screen)
    }

    pub fn visible_screens(&self) -> impl Iterator<Item = Screen> + '_ {
        self.visible.iter().copied()
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    /// Menus block gameplay input; the HUD alone does not.
    pub fn has_menu(&self) -> bool {
        self.visible.iter().any(|s| *s != Screen::Hud)
    }
}

impl GuiService for ScreenState {
    fn show_screen(&mut self, screen: Screen) {
        if self.visible.insert(screen) {
            log::debug!("Screen shown: {screen:?}");
        }
    }

    fn hide_screen(&mut self, screen: Screen) {
        if self.visible.remove(&screen) {
            log::debug!("Screen hidden: {screen:?}");
        }
    }

    fn set_score_text(&mut self, value: i64) {
        self.score = value;
    }
}
