//! Tool routing across backends, agents and registry skills.

use crate::agent_bridge::services::AgentBridge;
use crate::backend::services::BackendRegistry;
use crate::catalog::domain::{
    NamespacedToolName, ProviderKind, ProviderName, ToolDefinition, ToolOutput,
};
use crate::catalog::services::CatalogAggregator;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::domain::{GatewayStatus, ServerInfo};
use crate::registry::domain::{ItemKind, Prompt};
use crate::registry::services::RegistryService;
use crate::settings::GatewaySettings;
use crate::workflow::domain::{CallContext, SkillRun};
use crate::workflow::ports::ToolInvoker;
use crate::workflow::services::SkillExecutor;
use async_trait::async_trait;
use mockable::Clock;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Inner<C> {
    catalog: Arc<CatalogAggregator>,
    backends: BackendRegistry<C>,
    agents: AgentBridge<C>,
    registry: Arc<RegistryService>,
    executor: SkillExecutor,
    settings: GatewaySettings,
}

/// Routes namespaced tool calls to their providers.
pub struct Gateway<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Gateway<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn skill_inputs(tool: &NamespacedToolName, arguments: Value) -> GatewayResult<Map<String, Value>> {
    match arguments {
        Value::Object(inputs) => Ok(inputs),
        Value::Null => Ok(Map::new()),
        other => Err(GatewayError::Configuration(format!(
            "arguments for '{tool}' must be an object, got {other}"
        ))),
    }
}

impl<C> Gateway<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a gateway over the given components.
    ///
    /// All components must publish into `catalog`.
    #[must_use]
    pub fn new(
        catalog: Arc<CatalogAggregator>,
        backends: BackendRegistry<C>,
        agents: AgentBridge<C>,
        registry: Arc<RegistryService>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                backends,
                agents,
                registry,
                executor: SkillExecutor::new(settings.skill_step_timeout),
                settings,
            }),
        }
    }

    /// Returns the shared catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<CatalogAggregator> {
        &self.inner.catalog
    }

    /// Returns the backend registry.
    #[must_use]
    pub fn backends(&self) -> &BackendRegistry<C> {
        &self.inner.backends
    }

    /// Returns the agent bridge.
    #[must_use]
    pub fn agents(&self) -> &AgentBridge<C> {
        &self.inner.agents
    }

    /// Returns the skill and prompt registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RegistryService> {
        &self.inner.registry
    }

    /// Returns the gateway identity.
    #[must_use]
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.inner.settings.server_name.clone(),
            version: self.inner.settings.server_version.clone(),
        }
    }

    /// Creates a call context for `caller` whose deadline is the default
    /// invocation timeout from now.
    #[must_use]
    pub fn context(&self, caller: Option<ProviderName>) -> CallContext {
        CallContext::new(caller, self.inner.settings.invocation_timeout)
    }

    /// Lists the tools `caller` may see, under their namespaced names.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] when the catalog is unavailable.
    pub fn list_tools(&self, caller: Option<&ProviderName>) -> GatewayResult<Vec<ToolDefinition>> {
        Ok(self.inner.catalog.view(caller)?.tools())
    }

    /// Calls a tool by its namespaced name with the default deadline.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for malformed or unknown names and
    /// any routing error from [`ToolInvoker::invoke_tool`].
    pub async fn call_tool(
        &self,
        caller: Option<ProviderName>,
        name: &str,
        arguments: Value,
    ) -> GatewayResult<ToolOutput> {
        let context = self.context(caller);
        self.call_tool_in(&context, name, arguments).await
    }

    /// Calls a tool by its namespaced name within `context`'s deadline.
    ///
    /// # Errors
    ///
    /// Same as [`Self::call_tool`]; a deadline that passes mid-call is an
    /// invocation failure.
    pub async fn call_tool_in(
        &self,
        context: &CallContext,
        name: &str,
        arguments: Value,
    ) -> GatewayResult<ToolOutput> {
        let tool = NamespacedToolName::parse(name)
            .map_err(|_| GatewayError::NotFound(format!("unknown tool '{name}'")))?;
        self.invoke_tool(context, &tool, arguments).await
    }

    /// Runs a skill in any lifecycle state and returns every step result.
    ///
    /// Used by the management surface to try definitions before activation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for unknown skills and the
    /// classified run failure otherwise.
    pub async fn execute_skill(
        &self,
        caller: Option<ProviderName>,
        name: &str,
        inputs: &Map<String, Value>,
    ) -> GatewayResult<SkillRun> {
        let skill = self.inner.registry.skill(name).await?;
        let context = self.context(caller);
        Ok(self
            .inner
            .executor
            .execute(&skill, inputs, self, &context)
            .await?)
    }

    /// Lists active prompts.
    #[must_use]
    pub async fn list_prompts(&self) -> Vec<Prompt> {
        self.inner.registry.active_prompts().await
    }

    /// Renders an active prompt.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for unknown or inactive prompts and
    /// [`GatewayError::Configuration`] for missing arguments.
    pub async fn render_prompt(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> GatewayResult<(Prompt, String)> {
        let text = self.inner.registry.render_prompt(name, arguments).await?;
        let prompt = self
            .inner
            .registry
            .active_prompts()
            .await
            .into_iter()
            .find(|prompt| prompt.name == name)
            .ok_or_else(|| GatewayError::NotFound(format!("prompt '{name}' not found")))?;
        Ok((prompt, text))
    }

    /// Collects the status of every component.
    #[must_use]
    pub async fn status(&self) -> GatewayStatus {
        let snapshot = self.inner.catalog.snapshot();
        GatewayStatus {
            server: self.server_info(),
            catalog_revision: snapshot.revision(),
            tools: snapshot.len(),
            backends: self.inner.backends.statuses().await,
            agents: self.inner.agents.statuses().await,
            active_prompts: self.inner.registry.list_active(ItemKind::Prompt).await.len(),
            active_skills: self.inner.registry.list_active(ItemKind::Skill).await.len(),
        }
    }

    async fn run_registry_skill(
        &self,
        context: &CallContext,
        tool: &NamespacedToolName,
        arguments: Value,
    ) -> GatewayResult<ToolOutput> {
        let skill = self.inner.registry.active_skill(tool.tool()).await?;
        let inputs = skill_inputs(tool, arguments)?;
        let run = self
            .inner
            .executor
            .execute(&skill, &inputs, self, context)
            .await?;
        info!(skill = %skill.name, run_id = %run.run_id, steps = run.steps.len(), "skill tool finished");
        Ok(run.final_output)
    }
}

#[async_trait]
impl<C> ToolInvoker for Gateway<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn invoke_tool(
        &self,
        context: &CallContext,
        tool: &NamespacedToolName,
        arguments: Value,
    ) -> GatewayResult<ToolOutput> {
        let kind = {
            let view = self.inner.catalog.view(context.caller.as_ref())?;
            let entry = view.resolve(&tool.to_string()).inspect_err(|err| {
                warn!(caller = ?context.caller, tool = %tool, "tool call rejected: {err}");
            })?;
            entry.kind()
        };
        if context.is_expired() {
            warn!(caller = ?context.caller, tool = %tool, "call deadline passed before routing");
            return Err(GatewayError::Invocation {
                provider: tool.provider().to_string(),
                tool: tool.tool().to_owned(),
                step: None,
                reason: "call deadline exceeded".to_owned(),
            });
        }
        debug!(caller = ?context.caller, tool = %tool, %kind, "routing tool call");
        match kind {
            ProviderKind::Backend => Ok(self
                .inner
                .backends
                .invoke(tool.provider(), tool.tool(), arguments, context.remaining())
                .await?),
            ProviderKind::Agent => Ok(self
                .inner
                .agents
                .invoke(tool.provider(), tool.tool(), arguments, context.remaining())
                .await?),
            ProviderKind::Registry => self.run_registry_skill(context, tool, arguments).await,
        }
    }
}
