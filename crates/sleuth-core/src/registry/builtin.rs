//! Built-in tools: email / phone enumeration via external binaries and
//! directory enumeration via HTTP probing.

use std::marker::PhantomData;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::template::expand_args;
use super::{PayloadError, RegistryError, Tool, ToolPayload, ToolRegistry};
use crate::config::{CommandToolConfig, DirectoryToolConfig, ToolsConfig};
use crate::domain::TaskType;
use crate::exec::{CommandSpec, Invocation, ProbeSpec};
use crate::parser::{LineParser, OutputParser};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPayload {
    pub email: String,
}

impl ToolPayload for EmailPayload {
    const TYPE: &'static str = TaskType::EMAIL_ENUMERATION;

    fn validate(&self) -> Result<(), String> {
        let email = self.email.as_str();
        let Some((local, domain)) = email.split_once('@') else {
            return Err("email must contain '@'".into());
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(format!("`{email}` is not an email address"));
        }
        if email.chars().any(char::is_whitespace) {
            return Err("email must not contain whitespace".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonePayload {
    pub country_code: String,
    pub phone_number: String,
}

impl ToolPayload for PhonePayload {
    const TYPE: &'static str = TaskType::PHONE_ENUMERATION;

    fn validate(&self) -> Result<(), String> {
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if !digits(&self.country_code) || self.country_code.len() > 4 {
            return Err("countryCode must be 1-4 digits".into());
        }
        if !digits(&self.phone_number) || self.phone_number.len() > 15 {
            return Err("phoneNumber must be 1-15 digits".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryScanPayload {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_paths: Option<usize>,
}

impl DirectoryScanPayload {
    fn base_url(&self) -> Result<Url, String> {
        let url = Url::parse(&self.url).map_err(|e| format!("url: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("url scheme must be http or https, got `{}`", url.scheme()));
        }
        if url.host_str().is_none() {
            return Err("url must have a host".into());
        }
        Ok(url)
    }
}

impl ToolPayload for DirectoryScanPayload {
    const TYPE: &'static str = TaskType::DIRECTORY_ENUMERATION;

    fn validate(&self) -> Result<(), String> {
        self.base_url()?;
        if self.max_paths == Some(0) {
            return Err("maxPaths must be at least 1".into());
        }
        Ok(())
    }
}

/// Any external binary whose argv is a template over payload `P`.
pub struct CommandTool<P> {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    parser: LineParser,
    _marker: PhantomData<P>,
}

impl<P: ToolPayload> CommandTool<P> {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            parser: LineParser::default(),
            _marker: PhantomData,
        }
    }

    pub fn from_config(config: &CommandToolConfig, default_timeout: Duration) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            config.timeout_or(default_timeout),
        )
    }

    pub fn with_parser(mut self, parser: LineParser) -> Self {
        self.parser = parser;
        self
    }
}

impl<P: ToolPayload> Tool<P> for CommandTool<P> {
    fn invocation(&self, payload: P) -> Result<Invocation, PayloadError> {
        let args = expand_args(&self.args, &payload)?;
        Ok(Invocation::Process(
            CommandSpec::new(self.program.as_str())
                .args(args)
                .timeout(self.timeout),
        ))
    }

    fn parser(&self) -> &dyn OutputParser {
        &self.parser
    }
}

/// Directory enumeration: probes candidate paths under the payload's URL.
pub struct DirectoryScanTool {
    config: DirectoryToolConfig,
    timeout: Duration,
    parser: LineParser,
}

impl DirectoryScanTool {
    pub fn new(config: DirectoryToolConfig, default_timeout: Duration) -> Self {
        let timeout = config.timeout_or(default_timeout);
        Self {
            config,
            timeout,
            parser: LineParser::default(),
        }
    }
}

impl Tool<DirectoryScanPayload> for DirectoryScanTool {
    fn invocation(&self, payload: DirectoryScanPayload) -> Result<Invocation, PayloadError> {
        let base_url = payload.base_url().map_err(PayloadError::Invalid)?;
        let limit = payload
            .max_paths
            .map_or(self.config.max_paths, |n| n.min(self.config.max_paths));

        let mut paths = payload
            .paths
            .unwrap_or_else(|| self.config.default_paths.clone());
        paths.retain(|p| !p.trim().is_empty());
        paths.truncate(limit);

        Ok(Invocation::Http(
            ProbeSpec::new(base_url, paths)
                .request_timeout(self.config.request_timeout())
                .timeout(self.timeout),
        ))
    }

    fn parser(&self) -> &dyn OutputParser {
        &self.parser
    }
}

impl ToolRegistry {
    /// Registry with the three built-in tools configured from `tools`.
    pub fn with_builtins(tools: &ToolsConfig, default_timeout: Duration) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register_builtins(tools, default_timeout)?;
        Ok(registry)
    }

    pub fn register_builtins(
        &mut self,
        tools: &ToolsConfig,
        default_timeout: Duration,
    ) -> Result<(), RegistryError> {
        self.register::<EmailPayload, _>(CommandTool::from_config(&tools.email, default_timeout))?;
        self.register::<PhonePayload, _>(CommandTool::from_config(&tools.phone, default_timeout))?;
        self.register::<DirectoryScanPayload, _>(DirectoryScanTool::new(
            tools.directory.clone(),
            default_timeout,
        ))
    }
}
