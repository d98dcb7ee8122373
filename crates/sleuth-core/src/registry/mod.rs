//! Tool Registry: task type -> how to run it and how to read its output.
//!
//! # 二層構造
//! - **Typed**: `ToolPayload` + `Tool<P>` - the payload shape is a Rust type.
//! - **Dyn**: `DynTool` - object-safe, keyed by `TaskType` in the registry.
//!
//! `TypedTool<P, T>` bridges the two: it decodes the JSON payload into `P`
//! and hands it to the typed tool.

pub mod builtin;
pub mod template;

pub use builtin::{CommandTool, DirectoryScanPayload, DirectoryScanTool, EmailPayload, PhonePayload};

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::TaskType;
use crate::exec::Invocation;
use crate::parser::OutputParser;

/// A payload type bound to one task type string.
pub trait ToolPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    /// Shape checks beyond what deserialization enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A tool that turns a typed payload into something the executors can run.
pub trait Tool<P: ToolPayload>: Send + Sync {
    fn invocation(&self, payload: P) -> Result<Invocation, PayloadError>;

    fn parser(&self) -> &dyn OutputParser;
}

/// Payload did not fit the tool.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload does not match the expected shape: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid payload: {0}")]
    Invalid(String),
}

/// Object-safe view of a registered tool.
pub trait DynTool: Send + Sync {
    fn task_type(&self) -> &str;

    /// Decode + validate the payload and build the invocation.
    fn prepare(&self, payload: &serde_json::Value) -> Result<Invocation, PayloadError>;

    fn parser(&self) -> &dyn OutputParser;
}

pub struct TypedTool<P: ToolPayload, T: Tool<P>> {
    tool: T,
    _marker: PhantomData<P>,
}

impl<P: ToolPayload, T: Tool<P>> TypedTool<P, T> {
    pub fn new(tool: T) -> Self {
        Self {
            tool,
            _marker: PhantomData,
        }
    }
}

impl<P: ToolPayload, T: Tool<P>> DynTool for TypedTool<P, T> {
    fn task_type(&self) -> &str {
        P::TYPE
    }

    fn prepare(&self, payload: &serde_json::Value) -> Result<Invocation, PayloadError> {
        let payload: P =
            serde_json::from_value(payload.clone()).map_err(PayloadError::Decode)?;
        payload.validate().map_err(PayloadError::Invalid)?;
        self.tool.invocation(payload)
    }

    fn parser(&self) -> &dyn OutputParser {
        self.tool.parser()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no tool registered for task type '{0}'")]
    NotFound(TaskType),

    #[error("tool for task type '{0}' is already registered")]
    AlreadyRegistered(TaskType),
}

/// Read-only once the scheduler is built.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<TaskType, Arc<dyn DynTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ToolPayload, T: Tool<P> + 'static>(
        &mut self,
        tool: T,
    ) -> Result<(), RegistryError> {
        let task_type = TaskType::new(P::TYPE);
        if self.tools.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type));
        }
        self.tools.insert(task_type, Arc::new(TypedTool::new(tool)));
        Ok(())
    }

    pub fn lookup(&self, task_type: &TaskType) -> Result<Arc<dyn DynTool>, RegistryError> {
        self.tools
            .get(task_type)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(task_type.clone()))
    }

    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.tools.contains_key(task_type)
    }

    /// Sorted, so callers get a stable listing.
    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<_> = self.tools.keys().cloned().collect();
        types.sort();
        types
    }
}
