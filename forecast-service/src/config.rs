use serde::Deserialize;
use std::fs;

fn default_inference_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path of the JSON model artifact, read once at startup.
    pub path: String,
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus textfile written after each run.
    pub textfile_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("FORECAST_CONFIG").unwrap_or_else(|_| "forecast-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{path}': {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [model]
            path = "models/cnn_lstm.json"
            inference_timeout_ms = 2500

            [metrics]
            textfile_path = "/var/lib/node_exporter/forecast.prom"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.model.path, "models/cnn_lstm.json");
        assert_eq!(cfg.model.inference_timeout_ms, 2500);
        assert_eq!(
            cfg.metrics.unwrap().textfile_path,
            "/var/lib/node_exporter/forecast.prom"
        );
    }

    #[test]
    fn timeout_and_metrics_are_optional() {
        let cfg = AppConfig::from_toml_str("[model]\npath = \"m.json\"\n").unwrap();

        assert_eq!(cfg.model.inference_timeout_ms, 10_000);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn model_section_is_required() {
        assert!(AppConfig::from_toml_str("[metrics]\ntextfile_path = \"x\"\n").is_err());
    }
}
