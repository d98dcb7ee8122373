//! SchedulerConfig: everything tunable, loaded from JSON.
//!
//! Every field has a default, so `{}` is a valid config. Durations are plain
//! integers (`*_secs`, `*_ms`) to keep the file format obvious.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::TaskType;
use crate::exec::DEFAULT_TIMEOUT;
use crate::queue::RetentionPolicy;
use crate::ratelimit::{RateLimitPolicy, WindowMode};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tools running at once.
    pub max_concurrency: usize,
    /// Timeout for tools that do not set their own.
    pub default_timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
    /// Per task type, replaces `rate_limit` entirely.
    pub rate_limit_overrides: BTreeMap<String, RateLimitConfig>,
    pub retention: RetentionConfig,
    pub tools: ToolsConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            default_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            rate_limit: RateLimitConfig::default(),
            rate_limit_overrides: BTreeMap::new(),
            retention: RetentionConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".into()));
        }
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::Invalid("default_timeout_secs must be at least 1".into()));
        }
        self.rate_limit.validate("rate_limit")?;
        for (task_type, limit) in &self.rate_limit_overrides {
            limit.validate(&format!("rate_limit_overrides.{task_type}"))?;
        }
        for (name, tool) in [("email", &self.tools.email), ("phone", &self.tools.phone)] {
            if tool.program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("tools.{name}.program must be set")));
            }
        }
        if self.tools.directory.max_paths == 0 {
            return Err(ConfigError::Invalid("tools.directory.max_paths must be at least 1".into()));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn rate_limit_overrides(&self) -> impl Iterator<Item = (TaskType, RateLimitPolicy)> + '_ {
        self.rate_limit_overrides
            .iter()
            .map(|(task_type, limit)| (TaskType::new(task_type.as_str()), limit.policy()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub mode: WindowMode,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 60,
            mode: WindowMode::Sliding,
        }
    }
}

impl RateLimitConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.max_requests, Duration::from_secs(self.window_secs), self.mode)
    }

    fn validate(&self, at: &str) -> Result<(), ConfigError> {
        if self.max_requests == 0 || self.window_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "{at}: max_requests and window_secs must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Keep-forever unless one of these is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Terminal records older than this are evicted.
    pub ttl_secs: Option<u64>,
    /// At most this many terminal records are kept (oldest evicted first).
    pub max_terminal: Option<usize>,
    /// How often the pruning pass runs.
    pub prune_interval_secs: Option<u64>,
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            ttl: self.ttl_secs.map(Duration::from_secs),
            max_terminal: self.max_terminal,
        }
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.unwrap_or(60).max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub email: CommandToolConfig,
    pub phone: CommandToolConfig,
    pub directory: DirectoryToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            email: CommandToolConfig::new("holehe", ["{email}", "--only-used", "--no-color"]),
            phone: CommandToolConfig::new(
                "ignorant",
                ["{countryCode}", "{phoneNumber}", "--only-used", "--no-color"],
            ),
            directory: DirectoryToolConfig::default(),
        }
    }
}

/// An external binary and its argument template.
///
/// `{field}` in an argument is replaced by that payload field (camelCase).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandToolConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: Option<u64>,
}

impl CommandToolConfig {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout_secs: None,
        }
    }

    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_secs.map_or(default, Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryToolConfig {
    pub request_timeout_ms: u64,
    /// Probed when the payload has no `paths`.
    pub default_paths: Vec<String>,
    /// Upper bound on probes per task, whatever the payload asks for.
    pub max_paths: usize,
    pub timeout_secs: Option<u64>,
}

impl Default for DirectoryToolConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            default_paths: [
                "/admin",
                "/login",
                "/wp-admin",
                "/wp-login.php",
                "/.git/HEAD",
                "/.env",
                "/backup",
                "/config",
                "/server-status",
                "/robots.txt",
                "/sitemap.xml",
                "/api",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_paths: 200,
            timeout_secs: None,
        }
    }
}

impl DirectoryToolConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_secs.map_or(default, Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default() {
        let config = SchedulerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.default_timeout(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.policy(), RateLimitPolicy::default());
        assert_eq!(config.tools.email.program, "holehe");
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = SchedulerConfig::from_json_str(
            r#"{
                "max_concurrency": 8,
                "rate_limit_overrides": {
                    "directory-enumeration": { "max_requests": 1, "window_secs": 300, "mode": "fixed" }
                },
                "retention": { "ttl_secs": 3600 },
                "tools": { "email": { "program": "/opt/holehe/bin/holehe", "args": ["{email}"], "timeout_secs": 90 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        let overrides: Vec<_> = config.rate_limit_overrides().collect();
        assert_eq!(
            overrides,
            vec![(
                TaskType::new("directory-enumeration"),
                RateLimitPolicy::new(1, Duration::from_secs(300), WindowMode::Fixed)
            )]
        );
        assert_eq!(config.retention.policy().ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.retention.policy().max_terminal, None);
        assert_eq!(
            config.tools.email.timeout_or(config.default_timeout()),
            Duration::from_secs(90)
        );
        assert_eq!(config.tools.phone.program, "ignorant");
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let err = SchedulerConfig::from_json_str(r#"{ "max_concurrency": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_rate_limit_is_invalid() {
        let err = SchedulerConfig::from_json_str(
            r#"{ "rate_limit_overrides": { "x": { "max_requests": 0 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("rate_limit_overrides.x")));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SchedulerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SchedulerConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
