//! vidrelay configuration loaded from `vidrelay.toml`.
//!
//! [`AppConfig`] holds every parameter the job engine needs to reach the
//! execution backend. Fields missing from the file stay unset (or take a
//! default); environment variables take precedence over the file.
//! [`AppConfig::resolve`] turns a possibly-incomplete config into a
//! [`ResolvedConfig`] or reports every missing field at once.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::JobError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "vidrelay.toml";

/// Top-level configuration loaded from `vidrelay.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// AWS region hosting the cluster.
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Bucket holding the uploaded input videos.
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub cluster: Option<String>,

    /// Task definition (family or family:revision) launched per job.
    #[serde(default)]
    pub task_definition: Option<String>,

    #[serde(default)]
    pub subnets: Vec<String>,

    #[serde(default)]
    pub security_groups: Vec<String>,

    /// Container inside the task definition that receives the job environment.
    #[serde(default = "default_container_name")]
    pub container_name: String,

    #[serde(default = "default_assign_public_ip")]
    pub assign_public_ip: bool,

    /// Delay between two status polls of the same job.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_container_name() -> String {
    "transcoder".to_string()
}

fn default_assign_public_ip() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: None,
            access_key_id: None,
            secret_access_key: None,
            bucket: None,
            cluster: None,
            task_definition: None,
            subnets: Vec::new(),
            security_groups: Vec::new(),
            container_name: default_container_name(),
            assign_public_ip: default_assign_public_ip(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// A configuration with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub cluster: String,
    pub task_definition: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub container_name: String,
    pub assign_public_ip: bool,
}

impl AppConfig {
    /// Loads `vidrelay.toml` from the working directory, then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Loads the given file (defaults when it does not exist), then applies
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<AppConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        if config.poll_interval_secs == 0 {
            anyhow::bail!("{}: poll_interval_secs must be at least 1", path.display());
        }
        Ok(config)
    }

    /// Overrides fields from environment-style lookups. Empty values are
    /// ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AWS_REGION") {
            self.region = Some(v);
        }
        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            self.access_key_id = Some(v);
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            self.secret_access_key = Some(v);
        }
        if let Some(v) = get("VIDRELAY_BUCKET") {
            self.bucket = Some(v);
        }
        if let Some(v) = get("VIDRELAY_CLUSTER") {
            self.cluster = Some(v);
        }
        if let Some(v) = get("VIDRELAY_TASK_DEFINITION") {
            self.task_definition = Some(v);
        }
        if let Some(v) = get("VIDRELAY_SUBNETS") {
            self.subnets = split_list(&v);
        }
        if let Some(v) = get("VIDRELAY_SECURITY_GROUPS") {
            self.security_groups = split_list(&v);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Names of the required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());

        let mut missing = Vec::new();
        if blank(&self.region) {
            missing.push("region");
        }
        if blank(&self.access_key_id) {
            missing.push("access_key_id");
        }
        if blank(&self.secret_access_key) {
            missing.push("secret_access_key");
        }
        if blank(&self.bucket) {
            missing.push("bucket");
        }
        if blank(&self.cluster) {
            missing.push("cluster");
        }
        if blank(&self.task_definition) {
            missing.push("task_definition");
        }
        if self.subnets.is_empty() {
            missing.push("subnets");
        }
        if self.security_groups.is_empty() {
            missing.push("security_groups");
        }
        missing
    }

    /// Returns the complete configuration, or [`JobError::NotConfigured`]
    /// naming every missing field. A zero poll interval is rejected.
    pub fn resolve(&self) -> Result<ResolvedConfig, JobError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(JobError::NotConfigured { missing });
        }
        if self.poll_interval_secs == 0 {
            return Err(JobError::InvalidPollInterval);
        }

        let take = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(ResolvedConfig {
            region: take(&self.region),
            access_key_id: take(&self.access_key_id),
            secret_access_key: take(&self.secret_access_key),
            bucket: take(&self.bucket),
            cluster: take(&self.cluster),
            task_definition: take(&self.task_definition),
            subnets: self.subnets.clone(),
            security_groups: self.security_groups.clone(),
            container_name: self.container_name.clone(),
            assign_public_ip: self.assign_public_ip,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        region: Some("eu-west-1".into()),
        access_key_id: Some("AKIDEXAMPLE".into()),
        secret_access_key: Some("secret".into()),
        bucket: Some("uploads-bucket".into()),
        cluster: Some("transcode-cluster".into()),
        task_definition: Some("transcoder:3".into()),
        subnets: vec!["subnet-a".into(), "subnet-b".into()],
        security_groups: vec!["sg-1".into()],
        ..AppConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.container_name, "transcoder");
        assert!(config.assign_public_ip);
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert!(config.region.is_none());
        assert!(config.subnets.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            region = "us-east-1"
            cluster = "videos"
            subnets = ["subnet-1"]
            poll_interval_secs = 5
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.cluster.as_deref(), Some("videos"));
        assert_eq!(config.subnets, vec!["subnet-1"]);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.container_name, "transcoder");
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidrelay.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "bucket = \"media\"\ncontainer_name = \"ffmpeg\"").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.container_name, "ffmpeg");
        // The environment may override the bucket; only check it is set.
        assert!(config.bucket.is_some());
    }

    #[test]
    fn load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidrelay.toml");
        std::fs::write(&path, "subnets = 12").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn load_from_rejects_zero_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidrelay.toml");
        std::fs::write(&path, "poll_interval_secs = 0").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn resolve_rejects_zero_poll_interval() {
        let mut config = test_config();
        config.poll_interval_secs = 0;
        assert!(matches!(config.resolve(), Err(JobError::InvalidPollInterval)));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AWS_REGION", "ap-south-1"),
            ("VIDRELAY_SUBNETS", "subnet-x, subnet-y,,"),
            ("VIDRELAY_CLUSTER", "  "),
        ]);
        let mut config = test_config();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.region.as_deref(), Some("ap-south-1"));
        assert_eq!(config.subnets, vec!["subnet-x", "subnet-y"]);
        // Blank values do not clobber the file.
        assert_eq!(config.cluster.as_deref(), Some("transcode-cluster"));
    }

    #[test]
    fn resolve_reports_every_missing_field() {
        let config = AppConfig {
            region: Some("eu-west-1".into()),
            bucket: Some(" ".into()),
            ..AppConfig::default()
        };
        match config.resolve() {
            Err(JobError::NotConfigured { missing }) => assert_eq!(
                missing,
                vec![
                    "access_key_id",
                    "secret_access_key",
                    "bucket",
                    "cluster",
                    "task_definition",
                    "subnets",
                    "security_groups",
                ]
            ),
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }

    #[test]
    fn resolve_complete_config() {
        let resolved = test_config().resolve().unwrap();
        assert_eq!(resolved.cluster, "transcode-cluster");
        assert_eq!(resolved.subnets.len(), 2);
        assert_eq!(resolved.container_name, "transcoder");
    }
}
