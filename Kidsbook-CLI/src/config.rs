use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image_engine::ImageEngineConfig;
use scene_store::StoreConfig;
use story_engine::LlmConfig;

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub comfy_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub workflows_dir: PathBuf,
    pub workflow_name: String,
    pub output_dir: PathBuf,
    pub store: StoreConfig,
    /// Pause after unloading the text model.
    pub vram_cooldown: Duration,
    /// Upper bound on a single image job.
    pub comfy_timeout: Duration,
}

impl AppConfig {
    /// Read settings from the process environment. Blank values count as unset.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `COMFY_URL`             | `http://127.0.0.1:8188`  |
    /// | `COMFY_TIMEOUT_SECONDS` | `600`                    |
    /// | `WORKFLOWS_DIR`         | `workflows`              |
    /// | `WORKFLOW_NAME`         | `comfy_workflow_api`     |
    /// | `OUTPUT_DIR`            | `output`                 |
    /// | `OLLAMA_URL`            | `http://localhost:11434` |
    /// | `OLLAMA_MODEL`          | `llama3.1`               |
    /// | `VRAM_COOLDOWN_SECONDS` | `10`                     |
    /// | `STORE_BACKEND`         | `sqlite` (or `airtable`) |
    /// | `DATABASE_PATH`         | `kidsbook.db`            |
    /// | `AIRTABLE_API_KEY`      | required for airtable    |
    /// | `AIRTABLE_BASE_ID`      | required for airtable    |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a whole number of seconds, got '{}'", key, v)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let store = match get("STORE_BACKEND", "sqlite").to_ascii_lowercase().as_str() {
            "sqlite" => StoreConfig::sqlite(get("DATABASE_PATH", "kidsbook.db")),
            "airtable" => {
                let api_key = lookup("AIRTABLE_API_KEY").unwrap_or_default();
                let base_id = lookup("AIRTABLE_BASE_ID").unwrap_or_default();
                if api_key.trim().is_empty() || base_id.trim().is_empty() {
                    bail!("STORE_BACKEND=airtable requires AIRTABLE_API_KEY and AIRTABLE_BASE_ID");
                }
                StoreConfig::airtable(api_key, base_id)
            }
            other => bail!("Unknown STORE_BACKEND '{}' (expected 'sqlite' or 'airtable')", other),
        };

        Ok(Self {
            comfy_url: get("COMFY_URL", "http://127.0.0.1:8188"),
            ollama_url: get("OLLAMA_URL", "http://localhost:11434"),
            ollama_model: get("OLLAMA_MODEL", "llama3.1"),
            workflows_dir: PathBuf::from(get("WORKFLOWS_DIR", "workflows")),
            workflow_name: get("WORKFLOW_NAME", "comfy_workflow_api"),
            output_dir: PathBuf::from(get("OUTPUT_DIR", "output")),
            store,
            vram_cooldown: secs("VRAM_COOLDOWN_SECONDS", 10)?,
            comfy_timeout: secs("COMFY_TIMEOUT_SECONDS", 600)?,
        })
    }

    pub fn image_engine_config(&self) -> ImageEngineConfig {
        ImageEngineConfig::builder()
            .with_endpoint(self.comfy_url.clone())
            .with_workflows_dir(self.workflows_dir.clone())
            .with_workflow(self.workflow_name.clone())
            .with_output_dir(self.output_dir.clone())
            .with_timeout(self.comfy_timeout)
            .build()
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig::default().with_unload_cooldown(self.vram_cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    impl AppConfig {
        fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
            Self::from_lookup(|key| vars.get(key).cloned())
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(config.comfy_url, "http://127.0.0.1:8188");
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.ollama_model, "llama3.1");
        assert_eq!(config.workflow_name, "comfy_workflow_api");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.store, StoreConfig::sqlite("kidsbook.db"));
        assert_eq!(config.vram_cooldown, Duration::from_secs(10));
        assert_eq!(config.comfy_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_map(&vars(&[
            ("COMFY_URL", "http://gpu:8188"),
            ("OLLAMA_MODEL", "mistral"),
            ("WORKFLOW_NAME", "flux_api"),
            ("VRAM_COOLDOWN_SECONDS", "3"),
            ("COMFY_TIMEOUT_SECONDS", " 120 "),
            ("DATABASE_PATH", "/data/books.db"),
        ]))
        .unwrap();
        assert_eq!(config.comfy_url, "http://gpu:8188");
        assert_eq!(config.ollama_model, "mistral");
        assert_eq!(config.vram_cooldown, Duration::from_secs(3));
        assert_eq!(config.comfy_timeout, Duration::from_secs(120));
        assert_eq!(config.store, StoreConfig::sqlite("/data/books.db"));

        let engine = config.image_engine_config();
        assert_eq!(engine.endpoint, "http://gpu:8188");
        assert_eq!(engine.workflow, "flux_api");
        assert_eq!(engine.timeout, Duration::from_secs(120));
        assert_eq!(config.llm_config().unload_cooldown, Duration::from_secs(3));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = AppConfig::from_map(&vars(&[("COMFY_URL", ""), ("VRAM_COOLDOWN_SECONDS", " ")])).unwrap();
        assert_eq!(config.comfy_url, "http://127.0.0.1:8188");
        assert_eq!(config.vram_cooldown, Duration::from_secs(10));
    }

    #[test]
    fn test_airtable_backend() {
        let config = AppConfig::from_map(&vars(&[
            ("STORE_BACKEND", "Airtable"),
            ("AIRTABLE_API_KEY", "pat123"),
            ("AIRTABLE_BASE_ID", "appXYZ"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreConfig::airtable("pat123", "appXYZ"));
    }

    #[test]
    fn test_airtable_requires_credentials() {
        let err = AppConfig::from_map(&vars(&[("STORE_BACKEND", "airtable")])).unwrap_err();
        assert!(err.to_string().contains("AIRTABLE_API_KEY"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AppConfig::from_map(&vars(&[("STORE_BACKEND", "postgres")])).is_err());
        let err = AppConfig::from_map(&vars(&[("COMFY_TIMEOUT_SECONDS", "ten")])).unwrap_err();
        assert!(err.to_string().contains("COMFY_TIMEOUT_SECONDS"));
    }
}
