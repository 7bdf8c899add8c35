use serde::{Deserialize, Serialize};
use dirs_next::home_dir;
use log::info;
use std::{fs, net::{Ipv4Addr, SocketAddr, SocketAddrV4}, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::command::{ControllerState, interval_from_secs};
use crate::constants::*;
use crate::display::color;
use crate::glyphs::{FontError, FontTable};
use crate::lamps::DriverKind;
use crate::scheduler::Geometry;
use crate::transport::NodeTable;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Font error: {0}")]
    Font(#[from] FontError),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level configuration. Every section falls back to the reference
/// deployment, so an empty file (or none at all) is a working setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_level: String,  // e.g., "info" | "debug"
    pub grid: GridConfig,
    pub network: NetworkConfig,
    pub font: FontConfig,
    pub scroll: ScrollConfig,
    pub receiver: ReceiverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub stacks: usize,
    pub rows: usize,
    pub lamps: usize,   // per node
    pub subnet: Ipv4Addr,
    /// explicit node addresses, one list of `rows` per stack
    pub nodes: Option<Vec<Vec<Ipv4Addr>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub node_port: u16,
    pub controller_port: u16,
    pub broadcast: Ipv4Addr,
    pub send_timeout_ms: u64,
    /// copy of every unicast, for a bench node
    pub mirror: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FontConfig {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrollConfig {
    pub sleep: f64,         // seconds per column
    pub foreground: String,
    pub background: String,
    pub preview: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiverConfig {
    /// defaults to every interface on `network.node_port`
    pub bind: Option<SocketAddr>,
    pub driver: DriverKind,
    pub brightness: f32,    // 0.0-1.0
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".into(),
            grid: GridConfig::default(),
            network: NetworkConfig::default(),
            font: FontConfig::default(),
            scroll: ScrollConfig::default(),
            receiver: ReceiverConfig::default(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig { stacks: STACKS, rows: ROWS, lamps: LAMPS, subnet: NODE_SUBNET, nodes: None }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            node_port: NODE_PORT,
            controller_port: CONTROLLER_PORT,
            broadcast: BROADCAST_ADDR,
            send_timeout_ms: SEND_TIMEOUT_MS,
            mirror: None,
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        ScrollConfig {
            sleep: SLEEP_SECONDS,
            foreground: DEFAULT_FOREGROUND.into(),
            background: DEFAULT_BACKGROUND.into(),
            preview: false,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig { bind: None, driver: DriverKind::Terminal, brightness: RECEIVER_BRIGHTNESS }
    }
}

/// Command line overrides. All fields are Options so they layer over YAML.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub sleep: Option<f64>,
    pub foreground: Option<String>,
    pub background: Option<String>,
    pub preview: Option<bool>,
    pub controller_port: Option<u16>,
    pub node_port: Option<u16>,
    pub broadcast: Option<Ipv4Addr>,
    pub bind: Option<SocketAddr>,
    pub driver: Option<DriverKind>,
    pub brightness: Option<f32>,
    pub lamps: Option<usize>,
}

/// Public entry point: read YAML, apply overrides, validate.
pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Config, ConfigError> {
    // 1) defaults, filled in by serde for anything the file leaves out
    // 2) YAML file (explicit path or search)
    let mut cfg = match explicit {
        Some(p) if !p.exists() => return Err(ConfigError::NotFound(p.to_path_buf())),
        Some(p) => read_yaml(p)?,
        None => match find_config_file() {
            Some(p) => read_yaml(&p)?,
            None => {
                info!("No config file found, using built-in defaults");
                Config::default()
            }
        },
    };

    // 3) CLI overrides (highest precedence)
    apply_overrides(&mut cfg, overrides);

    // 4) Validate
    cfg.validate()?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
pub fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/marquee/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/marquee/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/marquee.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["marquee.yaml", "config.yaml", "config/marquee.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg = Config::from_yaml(&s)?;
    info!("Config loaded from {}", path.display());
    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, cli: &Overrides) {
    if let Some(v) = &cli.log_level      { cfg.log_level = v.clone(); }
    if let Some(v) = cli.sleep           { cfg.scroll.sleep = v; }
    if let Some(v) = &cli.foreground     { cfg.scroll.foreground = v.clone(); }
    if let Some(v) = &cli.background     { cfg.scroll.background = v.clone(); }
    if let Some(v) = cli.preview         { cfg.scroll.preview = v; }
    if let Some(v) = cli.controller_port { cfg.network.controller_port = v; }
    if let Some(v) = cli.node_port       { cfg.network.node_port = v; }
    if let Some(v) = cli.broadcast       { cfg.network.broadcast = v; }
    if cli.bind.is_some()                { cfg.receiver.bind = cli.bind; }
    if let Some(v) = cli.driver          { cfg.receiver.driver = v; }
    if let Some(v) = cli.brightness      { cfg.receiver.brightness = v; }
    if let Some(v) = cli.lamps           { cfg.grid.lamps = v; }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // an empty document is null to serde_yaml, not an empty map
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Pretty YAML of the effective config, for `--dump-config`.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = &self.grid;
        if grid.stacks == 0 || grid.rows == 0 || grid.lamps == 0 {
            return Err(invalid("grid stacks, rows and lamps must be > 0"));
        }
        // lamp indices travel as 0-255
        if grid.lamps > 256 {
            return Err(invalid("grid lamps must be <= 256"));
        }
        match &grid.nodes {
            Some(nodes) => {
                if nodes.len() != grid.stacks || nodes.iter().any(|stack| stack.len() != grid.rows) {
                    return Err(invalid(format!(
                        "grid nodes must list {} stacks of {} addresses",
                        grid.stacks, grid.rows
                    )));
                }
            }
            None => {
                if grid.rows > 9 || 10 * grid.stacks + grid.rows > 254 {
                    return Err(invalid(
                        "numbered node addresses need rows <= 9 and 10 * stacks + rows <= 254, list grid nodes instead",
                    ));
                }
            }
        }

        if self.network.send_timeout_ms == 0 {
            return Err(invalid("network send_timeout_ms must be > 0"));
        }

        if interval_from_secs(self.scroll.sleep).is_none() {
            return Err(invalid("scroll sleep must be a finite number of seconds > 0"));
        }
        for (key, spec) in [("foreground", &self.scroll.foreground), ("background", &self.scroll.background)] {
            color::try_resolve(spec).map_err(|e| invalid(format!("scroll {key}: {e}")))?;
        }

        if !(0.0..=1.0).contains(&self.receiver.brightness) {
            return Err(invalid("receiver brightness must be 0.0..=1.0"));
        }
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.grid.stacks, self.grid.rows, self.grid.lamps)
    }

    /// Node addresses: the explicit list, or the cluster numbering on `subnet`.
    pub fn node_table(&self) -> Result<NodeTable, ConfigError> {
        let port = self.network.node_port;
        match &self.grid.nodes {
            Some(nodes) => {
                let stacks = nodes
                    .iter()
                    .map(|stack| stack.iter().map(|ip| SocketAddr::V4(SocketAddrV4::new(*ip, port))).collect())
                    .collect();
                NodeTable::from_stacks(stacks).ok_or_else(|| invalid("grid nodes must be a full stacks x rows list"))
            }
            None => Ok(NodeTable::numbered(self.grid.subnet, self.grid.stacks, self.grid.rows, port)),
        }
    }

    pub fn broadcast_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.network.broadcast, self.network.node_port))
    }

    pub fn controller_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.network.controller_port))
    }

    pub fn receiver_addr(&self) -> SocketAddr {
        self.receiver
            .bind
            .unwrap_or(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.network.node_port)))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.network.send_timeout_ms)
    }

    /// Colours and interval a controller session starts with.
    pub fn initial_state(&self) -> Result<ControllerState, ConfigError> {
        let foreground = color::try_resolve(&self.scroll.foreground).map_err(|e| invalid(e.to_string()))?;
        let background = color::try_resolve(&self.scroll.background).map_err(|e| invalid(e.to_string()))?;
        let interval = interval_from_secs(self.scroll.sleep)
            .ok_or_else(|| invalid("scroll sleep must be a finite number of seconds > 0"))?;
        Ok(ControllerState::new(foreground, background, interval))
    }

    /// The configured font file, or the built-in font. Its height must
    /// match the grid.
    pub fn font_table(&self) -> Result<FontTable, ConfigError> {
        let font = match &self.font.file {
            Some(path) => FontTable::load(path)?,
            None => FontTable::builtin(),
        };
        if font.rows() != self.grid.rows {
            return Err(invalid(format!(
                "font is {} rows high but the grid has {} rows",
                font.rows(),
                self.grid.rows
            )));
        }
        Ok(font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::color::Rgb;

    #[test]
    fn test_defaults_are_the_reference_deployment() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.geometry(), Geometry::new(4, 5, 8));
        assert_eq!(cfg.broadcast_addr(), "192.168.254.255:13000".parse().unwrap());
        assert_eq!(cfg.controller_addr(), "0.0.0.0:13001".parse().unwrap());
        assert_eq!(cfg.receiver_addr(), "0.0.0.0:13000".parse().unwrap());
        assert_eq!(cfg.send_timeout(), Duration::from_millis(250));
        let table = cfg.node_table().unwrap();
        assert_eq!(table.get(0, 0), Some("192.168.254.11:13000".parse().unwrap()));
        assert_eq!(table.get(3, 4), Some("192.168.254.45:13000".parse().unwrap()));

        let state = cfg.initial_state().unwrap();
        assert_eq!(state.foreground, Rgb::WHITE);
        assert_eq!(state.background, Rgb::BLACK);
        assert_eq!(state.interval, Duration::from_millis(100));
        assert_eq!(cfg.font_table().unwrap().rows(), 5);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let cfg = Config::from_yaml(
            "log_level: debug\nscroll:\n  sleep: 0.05\n  foreground: red\nnetwork:\n  node_port: 14000\n",
        )
        .unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.scroll.sleep, 0.05);
        assert_eq!(cfg.scroll.background, "black");
        assert_eq!(cfg.network.controller_port, 13001);
        assert_eq!(cfg.broadcast_addr(), "192.168.254.255:14000".parse().unwrap());
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(Config::from_yaml("grid:\n  stack: 4\n"), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_explicit_nodes() {
        let cfg = Config::from_yaml(
            "grid:\n  stacks: 2\n  rows: 1\n  nodes:\n    - [10.0.0.5]\n    - [10.0.0.9]\n",
        )
        .unwrap();
        cfg.validate().unwrap();
        let table = cfg.node_table().unwrap();
        assert_eq!(table.get(1, 0), Some("10.0.0.9:13000".parse().unwrap()));

        let mut bad = cfg.clone();
        bad.grid.rows = 2;
        assert!(matches!(bad.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation() {
        let check = |edit: fn(&mut Config)| {
            let mut cfg = Config::default();
            edit(&mut cfg);
            cfg.validate()
        };
        assert!(check(|c| c.grid.lamps = 0).is_err());
        assert!(check(|c| c.grid.lamps = 300).is_err());
        assert!(check(|c| c.grid.rows = 10).is_err());
        assert!(check(|c| c.grid.stacks = 25).is_err());
        assert!(check(|c| c.scroll.sleep = 0.0).is_err());
        assert!(check(|c| c.scroll.sleep = f64::NAN).is_err());
        assert!(check(|c| c.scroll.foreground = "blurple".into()).is_err());
        assert!(check(|c| c.scroll.background = "random".into()).is_ok());
        assert!(check(|c| c.receiver.brightness = 1.5).is_err());
        assert!(check(|c| c.network.send_timeout_ms = 0).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let mut cfg = Config::default();
        let overrides = Overrides {
            sleep: Some(0.5),
            background: Some("navy".into()),
            node_port: Some(15000),
            broadcast: Some(Ipv4Addr::new(10, 0, 0, 255)),
            driver: Some(DriverKind::Memory),
            lamps: Some(16),
            ..Default::default()
        };
        apply_overrides(&mut cfg, &overrides);
        assert_eq!(cfg.scroll.sleep, 0.5);
        assert_eq!(cfg.scroll.background, "navy");
        assert_eq!(cfg.broadcast_addr(), "10.0.0.255:15000".parse().unwrap());
        assert_eq!(cfg.receiver_addr(), "0.0.0.0:15000".parse().unwrap());
        assert_eq!(cfg.receiver.driver, DriverKind::Memory);
        assert_eq!(cfg.geometry().screen_width(), 64);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = load(Some(Path::new("/nonexistent/marquee.yaml")), &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_dump_reloads_identically() {
        let mut cfg = Config::default();
        cfg.network.mirror = Some("127.0.0.1:14001".parse().unwrap());
        let yaml = cfg.to_yaml().unwrap();
        assert_eq!(Config::from_yaml(&yaml).unwrap(), cfg);
    }

    #[test]
    fn test_font_height_must_match_grid() {
        let mut cfg = Config::default();
        cfg.grid.rows = 7;
        assert!(matches!(cfg.font_table(), Err(ConfigError::Validation(_))));
    }
}
