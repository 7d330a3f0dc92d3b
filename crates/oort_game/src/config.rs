//! Game tuning loaded from `assets/config/oort.json`.
//!
//! Every section and field has a default so a partial file (or none at all)
//! still yields a playable session. Validation is strict on the values the
//! simulation divides by or uses as caps.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub window: WindowConfig,
    pub spawn: SpawnConfig,
    pub asteroid: AsteroidConfig,
    pub laser: LaserConfig,
    pub ship: ShipConfig,
    pub scoring: ScoringConfig,
    pub physics: PhysicsConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Oort".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SpawnConfig {
    pub laser_cap: usize,
    pub asteroid_cap: usize,
    /// Size of the first wave spawned with the arena.
    pub initial_wave: usize,
    pub wave_growth: usize,
    /// Seconds the field stays empty before the next wave.
    pub respawn_delay: f32,
    pub initial_asteroid_size: u32,
    pub seed: u64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            laser_cap: 8,
            asteroid_cap: 48,
            initial_wave: 4,
            wave_growth: 1,
            respawn_delay: 2.0,
            initial_asteroid_size: 3,
            seed: 0x00_0A_57_E1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AsteroidConfig {
    pub radius_per_size: f32,
    pub min_size: u32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub max_spin: f32,
    pub separation_speed: f32,
    pub density: f32,
    /// Asteroids never spawn closer than this to the ship.
    pub spawn_clearance: f32,
}

impl Default for AsteroidConfig {
    fn default() -> Self {
        Self {
            radius_per_size: 2.0,
            min_size: 1,
            min_speed: 2.0,
            max_speed: 8.0,
            max_spin: 1.0,
            separation_speed: 3.0,
            density: 1.0,
            spawn_clearance: 25.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LaserConfig {
    pub speed: f32,
    pub lifetime: f32,
    pub radius: f32,
    pub cooldown: f32,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            speed: 90.0,
            lifetime: 1.5,
            radius: 0.25,
            cooldown: 0.15,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ShipConfig {
    pub radius: f32,
    pub thrust: f32,
    pub max_speed: f32,
    pub drag: f32,
    /// Radians per second for both yaw and pitch.
    pub turn_rate: f32,
    pub walls_are_hazards: bool,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            radius: 1.5,
            thrust: 40.0,
            max_speed: 30.0,
            drag: 12.0,
            turn_rate: 2.2,
            walls_are_hazards: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub split_points: i64,
    pub destroy_points: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            split_points: 10,
            destroy_points: 25,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    pub max_step_dt: f32,
    pub arena_half_extent: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            max_step_dt: 1.0 / 30.0,
            arena_half_extent: 80.0,
        }
    }
}

/// Polls a file's mtime; reloads happen at frame boundaries only.
pub struct ConfigWatcher {
    path: PathBuf,
    last_seen_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf) -> Self {
        let last_seen_modified = modified_time(&path);
        Self {
            path,
            last_seen_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn should_reload(&mut self) -> bool {
        let current = modified_time(&self.path);
        match (self.last_seen_modified, current) {
            (Some(old), Some(now)) if now > old => {
                self.last_seen_modified = Some(now);
                true
            }
            (None, Some(now)) => {
                self.last_seen_modified = Some(now);
                true
            }
            _ => false,
        }
    }
}

pub fn load_config_from_path(path: &Path) -> Result<GameConfig, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let config: GameConfig = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse config JSON {}: {e}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Startup path: a missing or broken file is not fatal, the defaults are.
pub fn load_config_or_default(path: &Path) -> GameConfig {
    match load_config_from_path(path) {
        Ok(config) => {
            log::info!("Loaded config {}", path.display());
            config
        }
        Err(err) => {
            log::warn!("{err}; using built-in defaults");
            GameConfig::default()
        }
    }
}

fn validate_config(config: &GameConfig) -> Result<(), String> {
    if config.spawn.laser_cap == 0 || config.spawn.asteroid_cap == 0 {
        return Err("Config validation failed: spawn caps must be > 0".to_string());
    }
    if config.asteroid.min_size == 0 {
        return Err("Config validation failed: asteroid.min_size must be >= 1".to_string());
    }
    if config.spawn.initial_asteroid_size < config.asteroid.min_size {
        return Err(format!(
            "Config validation failed: spawn.initial_asteroid_size ({}) is below asteroid.min_size ({})",
            config.spawn.initial_asteroid_size, config.asteroid.min_size
        ));
    }
    if config.asteroid.radius_per_size <= 0.0 || config.asteroid.density <= 0.0 {
        return Err(
            "Config validation failed: asteroid radius_per_size and density must be > 0"
                .to_string(),
        );
    }
    if config.asteroid.min_speed > config.asteroid.max_speed {
        return Err("Config validation failed: asteroid.min_speed exceeds max_speed".to_string());
    }
    if config.physics.max_step_dt <= 0.0 {
        return Err("Config validation failed: physics.max_step_dt must be > 0".to_string());
    }
    if config.physics.arena_half_extent <= 0.0 {
        return Err("Config validation failed: physics.arena_half_extent must be > 0".to_string());
    }
    if config.laser.lifetime <= 0.0 || config.laser.radius <= 0.0 || config.ship.radius <= 0.0 {
        return Err(
            "Config validation failed: laser lifetime/radius and ship radius must be > 0"
                .to_string(),
        );
    }
    Ok(())
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "oort_config_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn partial_config_fills_defaults() {
        let path = temp_file_path("partial");
        fs::write(
            &path,
            r#"{ "spawn": { "laser_cap": 3 }, "scoring": { "destroy_points": 50 } }"#,
        )
        .expect("write temp file");

        let config = load_config_from_path(&path).expect("partial config should load");
        assert_eq!(config.spawn.laser_cap, 3);
        assert_eq!(config.spawn.asteroid_cap, SpawnConfig::default().asteroid_cap);
        assert_eq!(config.scoring.destroy_points, 50);
        assert_eq!(config.scoring.split_points, 10);
        assert_eq!(config.asteroid.min_size, 1);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn zero_cap_is_rejected() {
        let path = temp_file_path("zero_cap");
        fs::write(&path, r#"{ "spawn": { "asteroid_cap": 0 } }"#).expect("write temp file");
        let err = load_config_from_path(&path).expect_err("zero cap should fail");
        assert!(err.contains("spawn caps must be > 0"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let path = temp_file_path("step");
        fs::write(&path, r#"{ "physics": { "max_step_dt": 0.0 } }"#).expect("write temp file");
        let err = load_config_from_path(&path).expect_err("zero dt cap should fail");
        assert!(err.contains("max_step_dt"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn initial_size_below_minimum_is_rejected() {
        let path = temp_file_path("sizes");
        fs::write(
            &path,
            r#"{ "spawn": { "initial_asteroid_size": 1 }, "asteroid": { "min_size": 2 } }"#,
        )
        .expect("write temp file");
        let err = load_config_from_path(&path).expect_err("size mismatch should fail");
        assert!(err.contains("initial_asteroid_size"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/config/oort.json");
        let config = load_config_from_path(&path).expect("shipped config should load");
        let defaults = GameConfig::default();
        assert_eq!(config.spawn, defaults.spawn);
        assert_eq!(config.scoring, defaults.scoring);
        assert_eq!(config.ship, defaults.ship);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = temp_file_path("missing");
        let _ = fs::remove_file(&path);
        assert_eq!(load_config_or_default(&path), GameConfig::default());
    }

    #[test]
    fn config_watcher_detects_newly_created_file() {
        let path = temp_file_path("watcher");
        let _ = fs::remove_file(&path);

        let mut watcher = ConfigWatcher::new(path.clone());
        assert!(!watcher.should_reload(), "missing file should not reload");

        fs::write(&path, "{}").expect("write temp file");
        assert!(watcher.should_reload(), "creating file should trigger reload once");
        assert!(!watcher.should_reload(), "unchanged file should not reload again");

        let _ = fs::remove_file(path);
    }
}
