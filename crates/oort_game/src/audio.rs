use oort_core::services::{AudioService, SoundId};

/// Mute flags. Music and sound effects can be muted separately; the global
/// toggle reconciles them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuteState {
    pub muted: bool,
    pub music_muted: bool,
    pub sounds_muted: bool,
}

impl MuteState {
    /// Flip the global flag and push it to both channels. Channels that
    /// disagree beforehand (sounds muted on their own) all end up muted.
    pub fn toggle(&mut self) {
        if self.music_muted != self.sounds_muted {
            *self = Self {
                muted: true,
                music_muted: true,
                sounds_muted: true,
            };
            return;
        }
        self.muted = !self.muted;
        self.music_muted = self.muted;
        self.sounds_muted = self.muted;
    }

    /// Sound effects only; leaves the global flag alone.
    #[cfg(test)]
    pub fn mute_sounds(&mut self, mute: bool) {
        self.sounds_muted = mute;
    }

    pub fn apply(&self, audio: &mut dyn AudioService) {
        audio.mute_music(self.music_muted);
    }

    pub fn play(&self, audio: &mut dyn AudioService, sound: SoundId) {
        if self.sounds_muted {
            log::trace!("Suppressed {sound:?} (sounds muted)");
            return;
        }
        audio.play_sound(sound);
    }
}

/// Audio trigger sink for the binary: records what would be played.
#[derive(Debug, Default)]
pub struct LogAudio {
    pub music_playing: bool,
    pub music_paused: bool,
    pub last_sound: Option<SoundId>,
    pub sounds_played: u64,
}

impl AudioService for LogAudio {
    fn play_sound(&mut self, sound: SoundId) {
        self.last_sound = Some(sound);
        self.sounds_played += 1;
        log::debug!("Sound {sound:?}");
    }

    fn mute_music(&mut self, mute: bool) {
        if self.music_paused != mute {
            log::debug!("Music {}", if mute { "paused" } else { "resumed" });
        }
        self.music_paused = mute;
    }

    fn start_music(&mut self) {
        if !self.music_playing {
            log::debug!("Music started");
        }
        self.music_playing = true;
    }

    fn stop_music(&mut self) {
        if self.music_playing {
            log::debug!("Music stopped");
        }
        self.music_playing = false;
    }
}
