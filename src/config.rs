use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::traffic::TrafficSpeeds;

/// Server configuration. Every field has a default so a partial file (or no
/// file at all) is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub traffic: TrafficSpeeds,
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_map_side")]
    pub width: i32,
    #[serde(default = "default_map_side")]
    pub height: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EconomyConfig {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_bot_balance")]
    pub bot_balance: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_traffic_ms")]
    pub traffic_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_map_side() -> i32 {
    64
}

fn default_starting_balance() -> i64 {
    100_000
}

fn default_bot_name() -> String {
    "Planner".to_string()
}

fn default_bot_balance() -> i64 {
    50_000
}

fn default_tick_ms() -> u64 {
    1_000
}

fn default_traffic_ms() -> u64 {
    100
}

fn default_outbound_queue() -> usize {
    128
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Largest accepted tile count; keeps row-major indices within `i32`.
pub const MAX_MAP_TILES: i64 = 1 << 24;

impl MapConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "map size must be positive, got {}x{}",
            self.width,
            self.height
        );
        let tiles = i64::from(self.width) * i64::from(self.height);
        ensure!(
            tiles <= MAX_MAP_TILES,
            "map of {tiles} tiles exceeds the {MAX_MAP_TILES} tile limit"
        );
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_side(),
            height: default_map_side(),
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            bot_name: default_bot_name(),
            bot_balance: default_bot_balance(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            traffic_ms: default_traffic_ms(),
        }
    }
}

impl TimingConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn traffic_period(&self) -> Duration {
        Duration::from_millis(self.traffic_ms.max(1))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            seed: None,
            map: MapConfig::default(),
            economy: EconomyConfig::default(),
            timing: TimingConfig::default(),
            traffic: TrafficSpeeds::default(),
            outbound_queue: default_outbound_queue(),
            logging: LoggingConfig::default(),
        }
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<ServerConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .map
            .validate()
            .with_context(|| format!("Invalid map in {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("server.yaml")).unwrap();
        writeln!(file, "port: 9001\nseed: 7\nmap:\n  width: 32\ntraffic:\n  vehicle: 3.0").unwrap();

        let config = ConfigLoader::new(dir.path()).load("server.yaml").unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.map.width, 32);
        assert_eq!(config.map.height, 64);
        assert_eq!(config.traffic.vehicle, 3.0);
        assert_eq!(config.traffic.citizen, 1.5);
        assert_eq!(config.economy.starting_balance, 100_000);
        assert_eq!(config.economy.bot_name, "Planner");
        assert_eq!(config.timing.tick_period(), Duration::from_secs(1));
        assert_eq!(config.outbound_queue, 128);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new(dir.path()).load("absent.yaml").unwrap_err();
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn test_shipped_config_is_unseeded() {
        let config = ConfigLoader::new(env!("CARGO_MANIFEST_DIR"))
            .load("config/citysim.yaml")
            .unwrap();
        assert_eq!(config.seed, None);
        assert_eq!((config.map.width, config.map.height), (64, 64));
        assert_eq!(config.economy.bot_name, "Planner");
    }

    #[test]
    fn test_map_size_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.yaml"), "map:\n  width: 0\n").unwrap();
        let err = ConfigLoader::new(dir.path()).load("empty.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("must be positive"));

        fs::write(dir.path().join("huge.yaml"), "map:\n  width: 100000\n  height: 100000\n")
            .unwrap();
        assert!(ConfigLoader::new(dir.path()).load("huge.yaml").is_err());
        assert!(MapConfig::default().validate().is_ok());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.yaml"), "port: [not, a, number]").unwrap();
        assert!(ConfigLoader::new(dir.path()).load("bad.yaml").is_err());
    }
}
