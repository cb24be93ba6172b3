use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::hazard::HazardConfig;
use crate::movement::MovementConfig;
use crate::scheduler::{AlertConfig, SchedulerConfig};
use crate::speech::SpeechConfig;

const DEFAULT_SOURCE: &str = "stub://front_camera";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_NARRATOR_MODEL: &str = "llama3.2:3b";
const DEFAULT_NARRATOR_TIMEOUT_SECS: f64 = 10.0;

#[derive(Debug, Deserialize, Default)]
struct PathsenseConfigFile {
    source: Option<SourceConfigFile>,
    narrator: Option<NarratorConfigFile>,
    scheduler: Option<SchedulerConfigFile>,
    alerts: Option<AlertConfigFile>,
    hazard: Option<HazardConfigFile>,
    movement: Option<MovementConfigFile>,
    speech: Option<SpeechConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    spec: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(rename = "loop")]
    looping: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct NarratorConfigFile {
    url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SchedulerConfigFile {
    reflex_fps: Option<u32>,
    frame_queue_capacity: Option<usize>,
    cleanup_interval_frames: Option<u64>,
    max_missing_frames: Option<u64>,
    history_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    global_cooldown_secs: Option<f64>,
    hazard_cooldown_secs: Option<f64>,
    near_field_area_ratio: Option<f64>,
    beep_frequency_hz: Option<u32>,
    beep_duration_ms: Option<u64>,
    beep_cooldown_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct HazardConfigFile {
    classes: Option<Vec<String>>,
    expansion_threshold_pct: Option<f64>,
    shrink_threshold_pct: Option<f64>,
    window_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct MovementConfigFile {
    min_points: Option<usize>,
    rapid_growth_pct: Option<f64>,
    handheld_classes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    queue_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PathsenseConfig {
    pub source: SourceSettings,
    pub narrator: NarratorSettings,
    pub scheduler: SchedulerConfig,
    pub alerts: AlertConfig,
    pub hazard: HazardConfig,
    pub movement: MovementConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// `stub://name` or an image directory.
    pub spec: String,
    pub width: u32,
    pub height: u32,
    pub looping: bool,
}

#[derive(Debug, Clone)]
pub struct NarratorSettings {
    /// Narration service base URL. Unset means caption-only narration.
    pub url: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl PathsenseConfig {
    /// Load from the file named by `PATHSENSE_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PATHSENSE_CONFIG").ok();
        Self::load_from(
            config_path
                .as_deref()
                .filter(|path| !path.trim().is_empty())
                .map(Path::new),
        )
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PathsenseConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source = SourceSettings {
            spec: source_file
                .spec
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width: source_file.width.unwrap_or(DEFAULT_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_HEIGHT),
            looping: source_file.looping.unwrap_or(true),
        };

        let narrator_file = file.narrator.unwrap_or_default();
        let narrator = NarratorSettings {
            url: narrator_file.url.filter(|url| !url.trim().is_empty()),
            model: narrator_file
                .model
                .unwrap_or_else(|| DEFAULT_NARRATOR_MODEL.to_string()),
            timeout: secs(
                "narrator.timeout_secs",
                narrator_file.timeout_secs.unwrap_or(DEFAULT_NARRATOR_TIMEOUT_SECS),
            )?,
        };

        let mut scheduler = SchedulerConfig::default();
        if let Some(s) = file.scheduler {
            scheduler.reflex_fps = s.reflex_fps.unwrap_or(scheduler.reflex_fps);
            scheduler.frame_queue_capacity = s
                .frame_queue_capacity
                .unwrap_or(scheduler.frame_queue_capacity);
            scheduler.cleanup_interval_frames = s
                .cleanup_interval_frames
                .unwrap_or(scheduler.cleanup_interval_frames);
            scheduler.max_missing_frames = s.max_missing_frames.unwrap_or(scheduler.max_missing_frames);
            scheduler.history_capacity = s.history_capacity.unwrap_or(scheduler.history_capacity);
        }

        let mut alerts = AlertConfig::default();
        if let Some(a) = file.alerts {
            if let Some(v) = a.global_cooldown_secs {
                alerts.global_cooldown = secs("alerts.global_cooldown_secs", v)?;
            }
            if let Some(v) = a.hazard_cooldown_secs {
                alerts.hazard_cooldown = secs("alerts.hazard_cooldown_secs", v)?;
            }
            if let Some(v) = a.beep_cooldown_secs {
                alerts.beep_cooldown = secs("alerts.beep_cooldown_secs", v)?;
            }
            if let Some(ms) = a.beep_duration_ms {
                alerts.beep_duration = Duration::from_millis(ms);
            }
            alerts.near_field_area_ratio = a
                .near_field_area_ratio
                .unwrap_or(alerts.near_field_area_ratio);
            alerts.beep_frequency_hz = a.beep_frequency_hz.unwrap_or(alerts.beep_frequency_hz);
        }

        let mut hazard = HazardConfig::default();
        if let Some(h) = file.hazard {
            hazard.classes = h.classes.unwrap_or(hazard.classes);
            hazard.expansion_threshold_pct = h
                .expansion_threshold_pct
                .unwrap_or(hazard.expansion_threshold_pct);
            hazard.shrink_threshold_pct = h.shrink_threshold_pct.unwrap_or(hazard.shrink_threshold_pct);
            hazard.window_secs = h.window_secs.unwrap_or(hazard.window_secs);
        }

        let mut movement = MovementConfig::default();
        if let Some(m) = file.movement {
            movement.min_points = m.min_points.unwrap_or(movement.min_points);
            movement.rapid_growth_pct = m.rapid_growth_pct.unwrap_or(movement.rapid_growth_pct);
            movement.handheld_classes = m.handheld_classes.unwrap_or(movement.handheld_classes);
        }

        let mut speech = SpeechConfig::default();
        if let Some(s) = file.speech {
            speech.queue_capacity = s.queue_capacity.unwrap_or(speech.queue_capacity);
        }

        Ok(Self {
            source,
            narrator,
            scheduler,
            alerts,
            hazard,
            movement,
            speech,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("PATHSENSE_SOURCE") {
            if !source.trim().is_empty() {
                self.source.spec = source;
            }
        }
        if let Ok(url) = std::env::var("PATHSENSE_NARRATOR_URL") {
            if !url.trim().is_empty() {
                self.narrator.url = Some(url);
            }
        }
        if let Ok(model) = std::env::var("PATHSENSE_NARRATOR_MODEL") {
            if !model.trim().is_empty() {
                self.narrator.model = model;
            }
        }
        if let Ok(classes) = std::env::var("PATHSENSE_HAZARD_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.hazard.classes = parsed;
            }
        }
        if let Ok(cooldown) = std::env::var("PATHSENSE_GLOBAL_COOLDOWN_SECS") {
            let seconds: f64 = cooldown.trim().parse().map_err(|_| {
                anyhow!("PATHSENSE_GLOBAL_COOLDOWN_SECS must be a number of seconds")
            })?;
            self.alerts.global_cooldown = secs("PATHSENSE_GLOBAL_COOLDOWN_SECS", seconds)?;
        }
        if let Ok(capacity) = std::env::var("PATHSENSE_HISTORY_CAPACITY") {
            self.scheduler.history_capacity = capacity.trim().parse().map_err(|_| {
                anyhow!("PATHSENSE_HISTORY_CAPACITY must be a positive integer")
            })?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.spec.trim().is_empty() {
            return Err(anyhow!("source spec must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        if let Some(url) = &self.narrator.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("narrator url must start with http:// or https://"));
            }
        }
        if self.scheduler.reflex_fps == 0 {
            return Err(anyhow!("reflex_fps must be greater than zero"));
        }
        if self.scheduler.frame_queue_capacity == 0 {
            return Err(anyhow!("frame_queue_capacity must be greater than zero"));
        }
        if self.scheduler.history_capacity == 0 {
            return Err(anyhow!("history capacity must be greater than zero"));
        }
        if self.speech.queue_capacity == 0 {
            return Err(anyhow!("speech queue_capacity must be greater than zero"));
        }
        let ratio = self.alerts.near_field_area_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(anyhow!("near_field_area_ratio must be within (0, 1]"));
        }
        for (name, value) in [
            ("expansion_threshold_pct", self.hazard.expansion_threshold_pct),
            ("shrink_threshold_pct", self.hazard.shrink_threshold_pct),
            ("window_secs", self.hazard.window_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("hazard {} must be a positive number", name));
            }
        }

        let mut classes: Vec<String> = self
            .hazard
            .classes
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        classes.sort();
        classes.dedup();
        if classes.is_empty() {
            return Err(anyhow!("at least one hazard class is required"));
        }
        self.hazard.classes = classes;

        // Hazard geometry follows the capture resolution.
        self.hazard.frame_width = self.source.width;
        self.hazard.frame_height = self.source.height;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            hazard: self.hazard.clone(),
            movement: self.movement.clone(),
            history_capacity: self.scheduler.history_capacity,
            cleanup_interval_frames: self.scheduler.cleanup_interval_frames,
            max_missing_frames: self.scheduler.max_missing_frames,
        }
    }
}

fn read_config_file(path: &Path) -> Result<PathsenseConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn secs(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("{} must be a non-negative number of seconds", name));
    }
    Ok(Duration::from_secs_f64(value))
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_module_defaults() -> Result<()> {
        let mut cfg = PathsenseConfig::from_file(PathsenseConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.source.spec, DEFAULT_SOURCE);
        assert!(cfg.source.looping);
        assert!(cfg.narrator.url.is_none());
        assert_eq!(cfg.scheduler.reflex_fps, 30);
        assert_eq!(cfg.alerts.global_cooldown, Duration::from_secs(5));
        assert_eq!(
            cfg.hazard.classes,
            vec!["bicycle", "bus", "car", "motorcycle", "person", "truck"]
        );
        assert_eq!((cfg.hazard.frame_width, cfg.hazard.frame_height), (1280, 720));
        Ok(())
    }

    #[test]
    fn rejects_negative_durations_and_bad_ratios() {
        assert!(secs("x", -1.0).is_err());
        assert!(secs("x", f64::NAN).is_err());

        let file = PathsenseConfigFile {
            alerts: Some(AlertConfigFile {
                near_field_area_ratio: Some(1.5),
                ..AlertConfigFile::default()
            }),
            ..PathsenseConfigFile::default()
        };
        let mut cfg = PathsenseConfig::from_file(file).unwrap();
        assert!(cfg.validate().is_err());
    }
}
