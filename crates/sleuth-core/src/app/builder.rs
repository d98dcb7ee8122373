//! SchedulerBuilder - wiring + fail-fast validation.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::error::BuildError;
use crate::exec::{DefaultExecutor, Executor};
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::ratelimit::RateLimiter;
use crate::registry::{RegistryError, Tool, ToolPayload, ToolRegistry};

use super::scheduler::Scheduler;

/// Builds a `Scheduler`.
///
/// ```ignore
/// let scheduler = SchedulerBuilder::new(config)
///     .with_builtin_tools()?
///     .expect_tools(&["email-enumeration", "phone-enumeration"])
///     .build()?;
/// let handle = scheduler.start();
/// ```
///
/// `build()` checks that every type passed to `expect_tools` is registered,
/// so a missing tool is a startup error rather than a stream of
/// `UnknownType` rejections.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    registry: ToolRegistry,
    expected_tools: Option<Vec<String>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    executor: Option<Arc<dyn Executor>>,
}

impl SchedulerBuilder {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            registry: ToolRegistry::new(),
            expected_tools: None,
            clock: None,
            ids: None,
            executor: None,
        }
    }

    /// Register email / phone / directory enumeration from `config.tools`.
    pub fn with_builtin_tools(mut self) -> Result<Self, RegistryError> {
        let default_timeout = self.config.default_timeout();
        self.registry
            .register_builtins(&self.config.tools, default_timeout)?;
        Ok(self)
    }

    pub fn register<P: ToolPayload, T: Tool<P> + 'static>(
        mut self,
        tool: T,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<P, T>(tool)?;
        Ok(self)
    }

    pub fn expect_tools(mut self, task_types: &[&str]) -> Self {
        self.expected_tools = Some(task_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Result<Scheduler, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_tools {
            let registered: Vec<String> = self
                .registry
                .registered_types()
                .into_iter()
                .map(|t| t.to_string())
                .collect();
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registered.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingToolTypes(missing));
            }
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(clock.clone())),
        };
        let executor: Arc<dyn Executor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(DefaultExecutor::try_default()?),
        };

        let mut limiter = RateLimiter::new(clock.clone(), self.config.rate_limit.policy());
        for (task_type, policy) in self.config.rate_limit_overrides() {
            limiter = limiter.with_override(task_type, policy);
        }

        Ok(Scheduler::new(
            self.config,
            self.registry,
            limiter,
            executor,
            clock,
            ids,
        ))
    }
}
