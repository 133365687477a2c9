use crate::error::DriverError;
use crate::input::Keymap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// which keyboard layout drives the hex keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeymapKind {
    /// 1234 / qwer / asdf / zxcv, shaped like the COSMAC keypad
    #[default]
    Conventional,
    /// 0-9 and a-f, one key per hex digit
    Literal,
}

impl KeymapKind {
    pub fn keymap(self) -> Keymap {
        match self {
            KeymapKind::Conventional => Keymap::conventional(),
            KeymapKind::Literal => Keymap::literal(),
        }
    }
}

/// Host settings. Anything missing from a config file takes its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// instructions per frame; 10 at 60Hz is the classic ~600 instructions/s
    pub cycles_per_frame: u32,
    pub refresh_hz: u32,
    /// terminals don't report key-up, so a key counts as held for this many
    /// frames after its last press or auto-repeat
    pub key_hold_frames: u32,
    pub keymap: KeymapKind,
    pub sound: bool,
    /// fixes the random number generator
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cycles_per_frame: 10,
            refresh_hz: 60,
            key_hold_frames: 30,
            keymap: KeymapKind::Conventional,
            sound: false,
            seed: None,
        }
    }
}

impl Config {
    /// read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Config, DriverError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Config::from_json(&text)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(text: &str) -> Result<Config, DriverError> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.cycles_per_frame == 0 {
            return Err(DriverError::Config("cycles_per_frame must be at least 1".into()));
        }
        if self.refresh_hz == 0 || self.refresh_hz > 1000 {
            return Err(DriverError::Config(format!(
                "refresh_hz must be between 1 and 1000, not {}",
                self.refresh_hz
            )));
        }
        if self.key_hold_frames == 0 {
            return Err(DriverError::Config("key_hold_frames must be at least 1".into()));
        }
        Ok(())
    }
}
