//! Read-only TOML configuration
//!
//! The file only describes deviations from the built-in defaults. Names stay strings
//! at this level so that a bad entry is reported on its own by the binding resolver
//! instead of rejecting the whole file.
//!
//! ```toml
//! version = 1
//! profile = "terminal"
//!
//! [mappings.button_x]
//! type = "keystroke"
//! key = "c"
//! modifiers = ["control"]
//! description = "Interrupt"
//!
//! [modifier_mappings.button_b]
//! type = "keystroke"
//! key = "delete"
//! repeat = { delay = 0.4, interval = 0.02 }
//!
//! [stick]
//! left_deadzone = 0.25
//! right_stick = { base = "scroll", modifier = "cursor" }
//! ```

use crate::mapping::bindings::{default_bindings, resolve, BindingOverride, BindingTable};
use crate::mapping::error::MappingError;
use crate::mapping::mapping_types::{Layer, RepeatPolicy};
use crate::mapping::stick::{StickBehavior, StickConfig, StickLayout};
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "padmapper";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    pub profile: String,
    /// Base layer overrides keyed by element name
    pub mappings: BTreeMap<String, ActionConfig>,
    /// Modifier layer overrides keyed by element name
    pub modifier_mappings: BTreeMap<String, ActionConfig>,
    pub stick: StickSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            profile: "default".to_string(),
            mappings: BTreeMap::new(),
            modifier_mappings: BTreeMap::new(),
            stick: StickSettings::default(),
        }
    }
}

/// One binding as written in the file
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ActionConfig {
    /// keystroke, sticky_keystroke, type_text, smart_paste or mouse_click
    #[serde(rename = "type")]
    pub action_type: String,
    pub key: Option<String>,
    pub modifiers: Vec<String>,
    pub sticky_modifiers: Vec<String>,
    pub text: Option<String>,
    pub button: Option<String>,
    pub description: Option<String>,
    pub repeat: Option<RepeatConfig>,
    pub trigger_mode: Option<String>,
}

/// Repeat timing in seconds
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct RepeatConfig {
    pub delay: f64,
    pub interval: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct StickSettings {
    pub left_deadzone: Option<f32>,
    pub right_deadzone: Option<f32>,
    pub trigger_press_threshold: Option<f32>,
    pub trigger_release_threshold: Option<f32>,
    pub arrow_press_threshold: Option<f32>,
    pub arrow_release_threshold: Option<f32>,
    pub arrow_repeat: Option<RepeatConfig>,
    pub scroll_sensitivity: Option<f32>,
    pub cursor_sensitivity: Option<f32>,
    pub left_stick: Option<LayoutConfig>,
    pub right_stick: Option<LayoutConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub base: Option<String>,
    pub modifier: Option<String>,
}

impl AppConfig {
    /// Overrides for the binding resolver, base layer first
    pub fn overrides(&self) -> Vec<BindingOverride> {
        let layers = [
            (Layer::Base, &self.mappings),
            (Layer::Modifier, &self.modifier_mappings),
        ];
        layers
            .into_iter()
            .flat_map(|(layer, entries)| {
                entries.iter().map(move |(element, action)| BindingOverride {
                    layer,
                    element: element.clone(),
                    action: action.clone(),
                })
            })
            .collect()
    }

    /// Defaults merged with this file's overrides
    pub fn bindings(&self) -> (BindingTable, Vec<MappingError>) {
        resolve(default_bindings(), &self.overrides())
    }

    /// Stick tuning with every unusable value replaced by its default
    pub fn stick_config(&self) -> (StickConfig, Vec<MappingError>) {
        let settings = &self.stick;
        let mut errors = Vec::new();
        let mut config = StickConfig::default();

        let apply = |target: &mut f32, value: Option<f32>| {
            if let Some(value) = value {
                *target = value;
            }
        };
        apply(&mut config.left_deadzone, settings.left_deadzone);
        apply(&mut config.right_deadzone, settings.right_deadzone);
        apply(
            &mut config.trigger_press_threshold,
            settings.trigger_press_threshold,
        );
        apply(
            &mut config.trigger_release_threshold,
            settings.trigger_release_threshold,
        );
        apply(
            &mut config.arrow_press_threshold,
            settings.arrow_press_threshold,
        );
        apply(
            &mut config.arrow_release_threshold,
            settings.arrow_release_threshold,
        );
        apply(&mut config.scroll_sensitivity, settings.scroll_sensitivity);
        apply(&mut config.cursor_sensitivity, settings.cursor_sensitivity);

        if let Some(repeat) = settings.arrow_repeat {
            match RepeatPolicy::from_secs(repeat.delay, repeat.interval) {
                Some(policy) => config.arrow_repeat = policy,
                None => {
                    warn!(
                        "Invalid arrow repeat ({}s / {}s), keeping default",
                        repeat.delay, repeat.interval
                    );
                    errors.push(MappingError::InvalidRepeat(format!(
                        "arrow repeat delay {}s, interval {}s",
                        repeat.delay, repeat.interval
                    )));
                }
            }
        }

        if let Some(layout) = &settings.left_stick {
            config.left_layout = parse_layout(layout, config.left_layout, &mut errors);
        }
        if let Some(layout) = &settings.right_stick {
            config.right_layout = parse_layout(layout, config.right_layout, &mut errors);
        }

        let (config, validation_errors) = config.validated();
        errors.extend(validation_errors);
        (config, errors)
    }
}

fn parse_layout(
    layout: &LayoutConfig,
    fallback: StickLayout,
    errors: &mut Vec<MappingError>,
) -> StickLayout {
    let mut parse = |name: &Option<String>, default: StickBehavior| match name.as_deref() {
        None => default,
        Some(name) => StickBehavior::from_name(name).unwrap_or_else(|| {
            warn!("Unknown stick behavior '{}', using {}", name, default);
            errors.push(MappingError::ConfigError(format!(
                "unknown stick behavior: {}",
                name
            )));
            default
        }),
    };

    StickLayout {
        base: parse(&layout.base, fallback.base),
        modifier: parse(&layout.modifier, fallback.modifier),
    }
}

/// `<config dir>/padmapper/config.toml`, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    })
}

/// Reads and parses the file at `path`; `Ok(None)` when it does not exist
pub async fn load(path: &Path) -> Result<Option<AppConfig>> {
    if !tokio::fs::try_exists(path)
        .await
        .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
    {
        return Ok(None);
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("Failed to read config file: {}", e))?;

    let config: AppConfig =
        toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;

    debug!("Parsed config: {:?}", config);
    Ok(Some(config))
}

/// Like [`load`], but any problem results in the defaults
pub async fn load_or_default(path: &Path) -> AppConfig {
    match load(path).await {
        Ok(Some(config)) => {
            info!(
                "Loaded config from {} (profile: {})",
                path.display(),
                config.profile
            );
            config
        }
        Ok(None) => {
            info!("No config file at {}, using defaults", path.display());
            AppConfig::default()
        }
        Err(e) => {
            warn!("{}. Using defaults.", e);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::keyboard::{Key, Modifier};
    use crate::mapping::mapping_types::{Action, InputElement};
    use std::io::Write;

    const SAMPLE: &str = r#"
version = 1
profile = "terminal"

[mappings.button_x]
type = "keystroke"
key = "k"
modifiers = ["command"]
description = "Clear"

[mappings.button_q]
type = "keystroke"
key = "q"

[modifier_mappings.button_a]
type = "type_text"
text = "yes\n"
trigger_mode = "on_release"

[stick]
left_deadzone = 0.25
scroll_sensitivity = 30.0
arrow_repeat = { delay = 0.2, interval = 0.05 }
right_stick = { base = "arrow_keys", modifier = "warp" }
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[tokio::test]
    async fn loads_overrides_and_stick_settings() {
        let file = write_config(SAMPLE);
        let config = load(file.path())
            .await
            .expect("parses")
            .expect("file exists");

        assert_eq!(config.profile, "terminal");

        let (table, errors) = config.bindings();
        assert_eq!(errors, vec![MappingError::UnknownElement("button_q".to_string())]);
        let k = Key::from_name("k").expect("known key");
        assert_eq!(
            table
                .entry(Layer::Base, InputElement::ButtonX)
                .map(|e| e.action.clone()),
            Some(Action::keystroke(k, &[Modifier::Command]))
        );
        assert!(table.entry(Layer::Modifier, InputElement::ButtonA).is_some());

        let (stick, errors) = config.stick_config();
        assert_eq!(errors.len(), 1);
        assert_eq!(stick.left_deadzone, 0.25);
        assert_eq!(stick.scroll_sensitivity, 30.0);
        assert_eq!(stick.arrow_repeat, RepeatPolicy::from_millis(200, 50));
        assert_eq!(stick.right_layout.base, StickBehavior::ArrowKeys);
        assert_eq!(stick.right_layout.modifier, StickBehavior::Cursor);
    }

    #[tokio::test]
    async fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.toml");

        assert!(load(&path).await.expect("no error").is_none());
        assert_eq!(load_or_default(&path).await, AppConfig::default());
    }

    #[tokio::test]
    async fn malformed_file_falls_back_to_defaults() {
        let file = write_config("version = \"one\"\n[mappings");

        assert!(load(file.path()).await.is_err());
        assert_eq!(load_or_default(file.path()).await, AppConfig::default());
    }

    #[test]
    fn empty_config_resolves_to_builtin_defaults() {
        let config: AppConfig = toml::from_str("").expect("empty config parses");
        let (table, errors) = config.bindings();
        assert!(errors.is_empty());
        assert_eq!(table, default_bindings());

        let (stick, errors) = config.stick_config();
        assert!(errors.is_empty());
        assert_eq!(stick, StickConfig::default());
    }

    #[test]
    fn inverted_trigger_thresholds_are_reset() {
        let config = AppConfig {
            stick: StickSettings {
                trigger_press_threshold: Some(0.2),
                trigger_release_threshold: Some(0.6),
                ..StickSettings::default()
            },
            ..AppConfig::default()
        };
        let (stick, errors) = config.stick_config();
        assert_eq!(errors.len(), 1);
        assert_eq!(stick.trigger_press_threshold, 0.5);
        assert_eq!(stick.trigger_release_threshold, 0.3);
    }
}
