//! Layered configuration
//!
//! Defaults, then `config/proctor.toml` (optional), then `PROCTOR__*`
//! environment variables, e.g. `PROCTOR__SERVER__ADDR=127.0.0.1:9000` or
//! `PROCTOR__SESSION__CAMERA__DEVICE=/var/lib/proctor/frames`.

use config::{Config, ConfigError, Environment, File};
use inference_engine::OnnxDetectorConfig;
use serde::{Deserialize, Serialize};
use session::SessionConfig;

/// Default config file, without extension
pub const DEFAULT_CONFIG_PATH: &str = "config/proctor";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn, error
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// ONNX model; object screening is disabled when unset or unloadable
    pub model_path: Option<String>,
    pub onnx: OnnxDetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON file for the session collection; in-memory when unset
    pub path: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: Some("data/exam_sessions.json".to_string()),
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub session: SessionConfig,
    pub detector: DetectorSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Load from the default file and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path` (any format `config` understands) and the environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("PROCTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load_from("does/not/exist").unwrap();
        assert_eq!(settings.server.addr, "0.0.0.0:8080");
        assert_eq!(settings.session.sample_interval_ms, 100);
        assert_eq!(settings.session.camera.width, 640);
        assert_eq!(settings.session.rules.yaw_limit_degrees, 25.0);
        assert!(settings.detector.model_path.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proctor.toml");
        std::fs::write(
            &path,
            r#"
[server]
addr = "127.0.0.1:9999"

[logging]
json = true

[session]
sample_interval_ms = 250

[session.camera]
device = "/tmp/frames"

[session.rules]
pitch_limit_degrees = 30.0

[detector]
model_path = "models/ssd.onnx"

[detector.onnx]
min_score = 0.6
"#,
        )
        .unwrap();

        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.server.addr, "127.0.0.1:9999");
        assert!(settings.logging.json);
        assert_eq!(settings.session.sample_interval_ms, 250);
        assert_eq!(settings.session.camera.device, "/tmp/frames");
        assert_eq!(settings.session.camera.height, 480);
        assert_eq!(settings.session.rules.pitch_limit_degrees, 30.0);
        assert_eq!(settings.session.rules.yaw_limit_degrees, 25.0);
        assert_eq!(settings.detector.model_path.as_deref(), Some("models/ssd.onnx"));
        assert_eq!(settings.detector.onnx.min_score, 0.6);
    }
}
