use crate::machine::TimerSettings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub countdown_secs: u32,
    pub rest_target_secs: u32,
    pub transition_target_secs: u32,
    pub sound: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            rest_target_secs: 90,
            transition_target_secs: 180,
            sound: true,
        }
    }
}

impl Config {
    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            countdown_secs: self.countdown_secs,
            rest_target_secs: self.rest_target_secs,
            transition_target_secs: self.transition_target_secs,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "hevi") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("hevi_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
