//! Configuration types for the streaming diagram pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StreamError};
use crate::scene::ViewportRect;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InkConfig {
    /// Export and conversion settings.
    pub render: RenderConfig,
    /// Camera animation and user zoom settings.
    pub viewport: ViewportConfig,
    /// Display-mode transition settings.
    pub lifecycle: LifecycleConfig,
    /// Checkpoint persistence settings.
    pub checkpoint: CheckpointConfig,
    /// Host transport settings.
    pub host: HostConfig,
}

/// Export and conversion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Padding the exporter puts around the scene, in scene units.
    ///
    /// The viewport mapper uses the same value; if they differ the animated
    /// camera drifts away from the rendered image.
    pub export_padding: f64,
    /// Background fill of exported frames.
    pub background: String,
    /// Editor font family id applied to converted text.
    pub font_family: u32,
    /// Default font size for converted text.
    pub font_size: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            export_padding: 20.0,
            background: "#ffffff".to_owned(),
            font_family: 5,
            font_size: 20.0,
        }
    }
}

/// Camera animation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Fraction of the remaining distance covered per animation tick.
    pub lerp_factor: f64,
    /// Total absolute difference below which the camera is converged.
    pub convergence_threshold: f64,
    /// Interval between animation ticks in milliseconds.
    pub frame_interval_ms: u64,
    /// Allowed deviation from 4:3 before a viewport is normalized.
    pub aspect_tolerance: f64,
    /// Smallest user zoom factor.
    pub min_zoom: f64,
    /// Largest user zoom factor.
    pub max_zoom: f64,
    /// Viewport used when no camera instruction exists.
    pub default_viewport: ViewportRect,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            lerp_factor: 0.08,
            convergence_threshold: 0.5,
            frame_interval_ms: 16,
            aspect_tolerance: 0.01,
            min_zoom: 0.1,
            max_zoom: 10.0,
            default_viewport: ViewportRect::CANONICAL,
        }
    }
}

impl ViewportConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// Display-mode transition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Delay after fonts are ready before the editor surface may mount.
    pub settle_delay_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 60,
        }
    }
}

impl LifecycleConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Which checkpoint store backend to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    /// Process-local map; lost on exit.
    #[default]
    Memory,
    /// One JSON file per checkpoint on local disk.
    File,
    /// Remote REST key-value store with time-to-live.
    Remote,
}

impl CheckpointBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "file" | "fs" | "disk" => Some(Self::File),
            "remote" | "kv" | "redis" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Checkpoint persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    /// Directory for the file backend.
    pub directory: PathBuf,
    /// Base URL of the remote key-value REST endpoint.
    pub remote_url: Option<String>,
    /// Bearer token for the remote endpoint.
    pub remote_token: Option<String>,
    /// Time-to-live of remote checkpoints in seconds.
    pub ttl_secs: u64,
    /// Key prefix for remote checkpoints.
    pub key_prefix: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::Memory,
            directory: default_checkpoint_dir(),
            remote_url: None,
            remote_token: None,
            ttl_secs: 30 * 24 * 60 * 60,
            key_prefix: "checkpoint:".to_owned(),
        }
    }
}

/// Host transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// How long to wait for the first host message before giving up.
    pub connect_timeout_ms: u64,
    /// Capacity of the inbound event queue.
    pub event_capacity: usize,
    /// Capacity of the outbound message queue.
    pub request_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            event_capacity: 128,
            request_capacity: 64,
        }
    }
}

impl HostConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_checkpoint_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("inkstream")
        .join("checkpoints")
}

impl InkConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| StreamError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| StreamError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/inkstream/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("inkstream").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("inkstream")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/inkstream-config/config.toml")
        }
    }

    /// Apply `INKSTREAM_*` environment overrides.
    ///
    /// Checkpoint backend selection is environment-driven so the same binary
    /// can run against disk locally and a remote store when deployed.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("INKSTREAM_CHECKPOINT_BACKEND") {
            self.checkpoint.backend = CheckpointBackend::parse(&raw).ok_or_else(|| {
                StreamError::Config(format!("unknown checkpoint backend: {raw}"))
            })?;
        }
        if let Some(dir) = lookup("INKSTREAM_CHECKPOINT_DIR") {
            self.checkpoint.directory = PathBuf::from(dir);
        }
        if let Some(url) = lookup("INKSTREAM_KV_URL") {
            self.checkpoint.remote_url = Some(url);
            // A configured remote URL implies the remote backend unless
            // the backend was chosen explicitly.
            if lookup("INKSTREAM_CHECKPOINT_BACKEND").is_none() {
                self.checkpoint.backend = CheckpointBackend::Remote;
            }
        }
        if let Some(token) = lookup("INKSTREAM_KV_TOKEN") {
            self.checkpoint.remote_token = Some(token);
        }
        if let Some(ttl) = lookup("INKSTREAM_KV_TTL_SECS") {
            self.checkpoint.ttl_secs = ttl
                .trim()
                .parse()
                .map_err(|e| StreamError::Config(format!("invalid INKSTREAM_KV_TTL_SECS: {e}")))?;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let vp = &self.viewport;
        if !(vp.lerp_factor > 0.0 && vp.lerp_factor <= 1.0) {
            return Err(StreamError::Config(format!(
                "viewport.lerp_factor must be in (0, 1], got {}",
                vp.lerp_factor
            )));
        }
        if vp.convergence_threshold <= 0.0 {
            return Err(StreamError::Config(
                "viewport.convergence_threshold must be positive".to_owned(),
            ));
        }
        if vp.min_zoom <= 0.0 || vp.min_zoom > vp.max_zoom {
            return Err(StreamError::Config(format!(
                "invalid zoom range [{}, {}]",
                vp.min_zoom, vp.max_zoom
            )));
        }
        if self.render.export_padding < 0.0 {
            return Err(StreamError::Config(
                "render.export_padding must not be negative".to_owned(),
            ));
        }
        if self.checkpoint.backend == CheckpointBackend::Remote
            && self.checkpoint.remote_url.is_none()
        {
            return Err(StreamError::Config(
                "remote checkpoint backend requires checkpoint.remote_url".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = InkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.viewport.default_viewport, ViewportRect::CANONICAL);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
        assert!(config.render.export_padding >= 0.0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = InkConfig::default();
        config.viewport.lerp_factor = 0.2;
        config.checkpoint.backend = CheckpointBackend::File;
        config.lifecycle.settle_delay_ms = 250;

        assert!(config.save_to_file(&path).is_ok());
        let loaded = InkConfig::from_file(&path).unwrap();
        assert!((loaded.viewport.lerp_factor - 0.2).abs() < f64::EPSILON);
        assert_eq!(loaded.checkpoint.backend, CheckpointBackend::File);
        assert_eq!(loaded.lifecycle.settle_delay_ms, 250);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: InkConfig = toml::from_str("[render]\nexport_padding = 32.0\n").unwrap();
        assert!((config.render.export_padding - 32.0).abs() < f64::EPSILON);
        assert_eq!(config.viewport.frame_interval_ms, 16);
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(matches!(
            InkConfig::from_file(&path),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_select_remote_backend() {
        let env: HashMap<&str, &str> = [
            ("INKSTREAM_KV_URL", "https://kv.example.test"),
            ("INKSTREAM_KV_TOKEN", "secret"),
            ("INKSTREAM_KV_TTL_SECS", "3600"),
        ]
        .into_iter()
        .collect();
        let mut config = InkConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| (*v).to_owned()))
            .unwrap();
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Remote);
        assert_eq!(config.checkpoint.remote_token.as_deref(), Some("secret"));
        assert_eq!(config.checkpoint.ttl_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_override_rejects_unknown_backend() {
        let mut config = InkConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "INKSTREAM_CHECKPOINT_BACKEND").then(|| "floppy".to_owned())
        });
        assert!(result.is_err());
    }

    #[test]
    fn remote_without_url_is_invalid() {
        let mut config = InkConfig::default();
        config.checkpoint.backend = CheckpointBackend::Remote;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_lerp_is_invalid() {
        let mut config = InkConfig::default();
        config.viewport.lerp_factor = 0.0;
        assert!(config.validate().is_err());
        config.viewport.lerp_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn backend_parse_aliases() {
        assert_eq!(CheckpointBackend::parse("FS"), Some(CheckpointBackend::File));
        assert_eq!(CheckpointBackend::parse("kv"), Some(CheckpointBackend::Remote));
        assert_eq!(CheckpointBackend::parse("nope"), None);
    }
}
