//! Flow-directed agent orchestration
//!
//! [`AgentRearrange`] interprets a declarative flow string over a set of
//! registered agents: stages execute in declared order, concurrent groups
//! within a stage run together behind a per-stage barrier, and every output
//! is appended to a [`Transcript`] returned as the final result.

use crate::agent::TaskAgent;
use crate::error::{Error, Result};
use crate::flow::{FlowPlan, Stage};
use crate::registry::{AgentRegistry, DuplicatePolicy};
use crate::transcript::Transcript;
use crate::types::RunId;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How agent execution failures inside a run are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Log the failure and degrade the run result to `None` (default).
    /// Matches the tolerance callers of the original construct rely on.
    #[default]
    FailSafe,
    /// Propagate the failure to the caller
    FailFast,
}

/// Handler invoked in place of an agent when human-in-the-loop is enabled
#[async_trait]
pub trait InterventionHandler: Send + Sync {
    /// Produce the stage output for `agent`'s task
    async fn intervene(&self, agent: &str, task: &str) -> Result<String>;
}

/// Intervention handler backed by a plain synchronous function of the task
pub struct FnIntervention {
    func: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl FnIntervention {
    /// Create a function-backed intervention handler
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self { func: Arc::new(func) }
    }

    /// Create a function-backed handler already boxed as a trait object
    pub fn arc<F>(func: F) -> Arc<dyn InterventionHandler>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Arc::new(Self::new(func))
    }
}

#[async_trait]
impl InterventionHandler for FnIntervention {
    async fn intervene(&self, _agent: &str, task: &str) -> Result<String> {
        Ok((self.func)(task))
    }
}

/// Per-run options for [`AgentRearrange::run_with`]
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Per-agent task overrides; unknown keys are ignored
    pub custom_tasks: HashMap<String, String>,
    /// Override the orchestrator's `human_in_the_loop` field for this run
    pub human_in_the_loop: Option<bool>,
    /// Soft time budget: once exhausted, no further stages are launched and
    /// the transcript accumulated so far is returned
    pub deadline: Option<Duration>,
}

impl RunOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the task text for one agent
    pub fn custom_task(mut self, agent: impl Into<String>, task: impl Into<String>) -> Self {
        self.custom_tasks.insert(agent.into(), task.into());
        self
    }

    /// Set all task overrides at once
    pub fn custom_tasks(mut self, tasks: HashMap<String, String>) -> Self {
        self.custom_tasks = tasks;
        self
    }

    /// Enable or disable human-in-the-loop for this run
    pub fn human_in_the_loop(mut self, enabled: bool) -> Self {
        self.human_in_the_loop = Some(enabled);
        self
    }

    /// Set the run's soft time budget
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("custom_tasks", &self.custom_tasks.keys().collect::<Vec<_>>())
            .field("human_in_the_loop", &self.human_in_the_loop)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Orchestrator executing agents according to a textual flow.
///
/// The `flow` field is public and re-parsed on every run, so it can be
/// rewritten between runs to rearrange, narrow, or extend the pipeline.
///
/// ```
/// use agent_rearrange::{AgentRearrange, FnAgent};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> agent_rearrange::Result<()> {
/// let rearrange = AgentRearrange::new(
///     vec![
///         FnAgent::arc("Researcher", |task| format!("Researcher processed {task}")),
///         FnAgent::arc("Writer", |task| format!("Writer processed {task}")),
///     ],
///     "Researcher -> Writer",
/// );
///
/// let result = rearrange.run("Draft a report").await?;
/// assert!(result.unwrap().contains("Writer processed Draft a report"));
/// # Ok(())
/// # }
/// ```
pub struct AgentRearrange {
    registry: AgentRegistry,
    /// Flow string interpreted on each run
    pub flow: String,
    /// When true and a handler is configured, the handler replaces every
    /// stage's agent execution
    pub human_in_the_loop: bool,
    human_handler: Option<Arc<dyn InterventionHandler>>,
    failure_mode: FailureMode,
}

impl AgentRearrange {
    /// Create an orchestrator over the given agents and flow.
    /// Duplicate agent names replace earlier entries.
    pub fn new(agents: Vec<Arc<dyn TaskAgent>>, flow: impl Into<String>) -> Self {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            // Infallible under the default replace policy
            let _ = registry.add(agent);
        }
        Self {
            registry,
            flow: flow.into(),
            human_in_the_loop: false,
            human_handler: None,
            failure_mode: FailureMode::default(),
        }
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> AgentRearrangeBuilder {
        AgentRearrangeBuilder::default()
    }

    /// Register an agent under its own name
    pub fn add_agent(&mut self, agent: Arc<dyn TaskAgent>) -> Result<()> {
        self.registry.add(agent)
    }

    /// Register several agents, best effort
    pub fn add_agents(&mut self, agents: Vec<Arc<dyn TaskAgent>>) -> Result<()> {
        self.registry.add_many(agents)
    }

    /// Remove the agent registered under `name`, returning it if present
    pub fn remove_agent(&mut self, name: &str) -> Option<Arc<dyn TaskAgent>> {
        self.registry.remove(name)
    }

    /// Whether an agent is registered under `name`
    pub fn contains_agent(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Names of all registered agents
    pub fn agent_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Number of registered agents
    pub fn agent_count(&self) -> usize {
        self.registry.len()
    }

    /// The underlying registry
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Set the handler consulted when human-in-the-loop is enabled
    pub fn set_human_handler(&mut self, handler: Arc<dyn InterventionHandler>) {
        self.human_handler = Some(handler);
    }

    /// Set how agent execution failures are handled
    pub fn set_failure_mode(&mut self, mode: FailureMode) {
        self.failure_mode = mode;
    }

    /// Parse the current flow and check every referenced agent exists.
    ///
    /// Returns `Ok(true)` on success; fails with [`Error::MalformedFlow`] or
    /// [`Error::InvalidFlow`] (carrying all unknown names) otherwise.
    pub fn validate_flow(&self) -> Result<bool> {
        let plan = FlowPlan::parse(&self.flow)?;
        plan.validate(&self.registry)?;
        tracing::debug!(flow = %self.flow, "flow is valid");
        Ok(true)
    }

    /// Run the current flow with the given task. See [`Self::run_with`].
    pub async fn run(&self, task: &str) -> Result<Option<String>> {
        self.run_with(task, RunOptions::default()).await
    }

    /// Run the current flow with the given task and options.
    ///
    /// The flow is re-parsed and validated against a registry snapshot taken
    /// at call time; parse and validation errors propagate. Each stage's
    /// agents receive their `custom_tasks` override when present, the initial
    /// task otherwise. Group members run concurrently behind a per-stage
    /// barrier and their outputs append in declaration order.
    ///
    /// Agent execution failures follow the configured [`FailureMode`]: under
    /// `FailSafe` (default) the failure is logged and `Ok(None)` is returned,
    /// under `FailFast` it propagates as [`Error::AgentExecution`].
    pub async fn run_with(&self, task: &str, options: RunOptions) -> Result<Option<String>> {
        let run_id = RunId::new();
        let plan = FlowPlan::parse(&self.flow)?;

        // Snapshot so registry mutations after this point are not observed
        let registry = self.registry.snapshot();
        plan.validate(&registry)?;

        let hitl = options.human_in_the_loop.unwrap_or(self.human_in_the_loop);
        tracing::info!(
            %run_id,
            flow = %self.flow,
            stages = plan.stage_count(),
            human_in_the_loop = hitl,
            "starting run"
        );

        let started = Instant::now();
        let mut transcript = Transcript::new();

        for stage in plan.stages() {
            if let Some(deadline) = options.deadline {
                if started.elapsed() >= deadline {
                    tracing::warn!(%run_id, "deadline reached, returning partial transcript");
                    return Ok(Some(transcript.render()));
                }
            }

            match self
                .execute_stage(stage, task, &options.custom_tasks, hitl, &registry)
                .await
            {
                Ok(outputs) => {
                    for (agent, content) in outputs {
                        transcript.append(agent, content);
                    }
                }
                Err(err) => match self.failure_mode {
                    FailureMode::FailSafe => {
                        tracing::warn!(%run_id, error = %err, "stage failed, abandoning run");
                        return Ok(None);
                    }
                    FailureMode::FailFast => return Err(err),
                },
            }
        }

        tracing::info!(
            %run_id,
            entries = transcript.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run complete"
        );
        Ok(Some(transcript.render()))
    }

    /// Execute one stage, returning (agent, output) pairs in declaration order
    async fn execute_stage(
        &self,
        stage: &Stage,
        task: &str,
        custom_tasks: &HashMap<String, String>,
        hitl: bool,
        registry: &AgentRegistry,
    ) -> Result<Vec<(String, String)>> {
        match stage {
            Stage::Single(name) => {
                let output = self
                    .execute_member(name, task, custom_tasks, hitl, registry)
                    .await?;
                Ok(vec![(name.clone(), output)])
            }
            Stage::Group(names) => {
                let futures: Vec<_> = names
                    .iter()
                    .map(|name| self.execute_member(name, task, custom_tasks, hitl, registry))
                    .collect();
                // Barrier: the whole group finishes before the next stage.
                // join_all preserves declaration order for the transcript.
                let results = join_all(futures).await;
                names
                    .iter()
                    .zip(results)
                    .map(|(name, result)| result.map(|output| (name.clone(), output)))
                    .collect()
            }
        }
    }

    /// Execute one stage member: resolve its task override, route through the
    /// intervention handler when enabled, otherwise invoke the agent
    async fn execute_member(
        &self,
        name: &str,
        task: &str,
        custom_tasks: &HashMap<String, String>,
        hitl: bool,
        registry: &AgentRegistry,
    ) -> Result<String> {
        let task = custom_tasks.get(name).map(String::as_str).unwrap_or(task);

        if hitl {
            if let Some(handler) = &self.human_handler {
                tracing::debug!(agent = %name, "routing stage through intervention handler");
                return handler.intervene(name, task).await;
            }
        }

        let agent = registry.get(name)?;
        tracing::debug!(agent = %name, "executing agent");
        agent
            .execute(task, None)
            .await
            .map_err(|err| Error::agent_execution(name, err.to_string()))
    }
}

impl fmt::Debug for AgentRearrange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRearrange")
            .field("registry", &self.registry)
            .field("flow", &self.flow)
            .field("human_in_the_loop", &self.human_in_the_loop)
            .field("human_handler", &self.human_handler.is_some())
            .field("failure_mode", &self.failure_mode)
            .finish()
    }
}

/// Builder for [`AgentRearrange`]
#[derive(Default)]
pub struct AgentRearrangeBuilder {
    agents: Vec<Arc<dyn TaskAgent>>,
    flow: Option<String>,
    duplicate_policy: DuplicatePolicy,
    failure_mode: FailureMode,
    human_in_the_loop: bool,
    human_handler: Option<Arc<dyn InterventionHandler>>,
}

impl AgentRearrangeBuilder {
    /// Add an agent
    pub fn agent(mut self, agent: Arc<dyn TaskAgent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Add multiple agents
    pub fn agents(mut self, agents: Vec<Arc<dyn TaskAgent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Set the flow string
    pub fn flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = Some(flow.into());
        self
    }

    /// Set the duplicate registration policy
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the failure handling mode
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Enable human-in-the-loop from the start
    pub fn human_in_the_loop(mut self, enabled: bool) -> Self {
        self.human_in_the_loop = enabled;
        self
    }

    /// Set the intervention handler
    pub fn human_handler(mut self, handler: Arc<dyn InterventionHandler>) -> Self {
        self.human_handler = Some(handler);
        self
    }

    /// Build the orchestrator.
    ///
    /// Fails when the duplicate policy is [`DuplicatePolicy::Reject`] and two
    /// supplied agents share a name.
    pub fn build(self) -> Result<AgentRearrange> {
        let mut registry = AgentRegistry::with_policy(self.duplicate_policy);
        registry.add_many(self.agents)?;
        Ok(AgentRearrange {
            registry,
            flow: self.flow.unwrap_or_default(),
            human_in_the_loop: self.human_in_the_loop,
            human_handler: self.human_handler,
            failure_mode: self.failure_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::FnAgent;

    fn make_agent(name: &'static str) -> Arc<dyn TaskAgent> {
        FnAgent::arc(name, move |task| format!("{name} processed {task}"))
    }

    fn make_rearrange() -> AgentRearrange {
        AgentRearrange::new(
            vec![make_agent("Agent1"), make_agent("Agent2"), make_agent("Agent3")],
            "Agent1 -> Agent2 -> Agent3",
        )
    }

    #[derive(Debug)]
    struct FaultyAgent;

    #[async_trait]
    impl TaskAgent for FaultyAgent {
        fn name(&self) -> &str {
            "Faulty"
        }

        async fn execute(&self, _task: &str, _aux: Option<&str>) -> Result<String> {
            Err(Error::agent_execution("Faulty", "simulated failure"))
        }
    }

    #[test]
    fn test_initialization() {
        let rearrange = make_rearrange();
        assert_eq!(rearrange.agent_count(), 3);
        assert_eq!(rearrange.flow, "Agent1 -> Agent2 -> Agent3");
    }

    #[test]
    fn test_add_agent() {
        let mut rearrange = make_rearrange();
        rearrange.add_agent(make_agent("Agent4")).unwrap();
        assert!(rearrange.contains_agent("Agent4"));
    }

    #[test]
    fn test_remove_agent() {
        let mut rearrange = make_rearrange();
        rearrange.remove_agent("Agent2");
        assert!(!rearrange.contains_agent("Agent2"));
    }

    #[test]
    fn test_add_agents() {
        let mut rearrange = make_rearrange();
        rearrange
            .add_agents(vec![make_agent("Agent4"), make_agent("Agent5")])
            .unwrap();
        assert!(rearrange.contains_agent("Agent4"));
        assert!(rearrange.contains_agent("Agent5"));
    }

    #[test]
    fn test_validate_flow_valid() {
        let rearrange = make_rearrange();
        assert!(rearrange.validate_flow().unwrap());
    }

    #[test]
    fn test_validate_flow_unknown_agent() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1 -> Agent4".to_string();

        let err = rearrange.validate_flow().unwrap_err();
        assert_eq!(err.unknown_agents(), Some(&["Agent4".to_string()][..]));
    }

    #[test]
    fn test_validate_flow_honors_added_agent() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1 -> Agent4".to_string();
        assert!(rearrange.validate_flow().is_err());

        rearrange.add_agent(make_agent("Agent4")).unwrap();
        assert!(rearrange.validate_flow().unwrap());
    }

    #[tokio::test]
    async fn test_run_returns_conversation_string() {
        let rearrange = make_rearrange();
        let result = rearrange.run("Test Task").await.unwrap().unwrap();

        let first = result.find("Agent1 processed Test Task").unwrap();
        let second = result.find("Agent2 processed Test Task").unwrap();
        let third = result.find("Agent3 processed Test Task").unwrap();
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn test_run_with_custom_tasks() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1->Agent2->Agent3".to_string();

        let options = RunOptions::new().custom_task("Agent2", "Custom Task");
        let result = rearrange.run_with("Test Task", options).await.unwrap().unwrap();

        assert!(result.contains("Agent1 processed Test Task"));
        assert!(result.contains("Agent2 processed Custom Task"));
        assert!(result.contains("Agent3 processed Test Task"));
    }

    #[tokio::test]
    async fn test_run_ignores_unknown_custom_task_keys() {
        let rearrange = make_rearrange();
        let options = RunOptions::new().custom_task("NotInFlow", "ignored");
        let result = rearrange.run_with("Test Task", options).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_run_with_human_intervention() {
        let mut rearrange = make_rearrange();
        rearrange.human_in_the_loop = true;
        rearrange.set_human_handler(FnIntervention::arc(|_| "Human processed Task".to_string()));

        let result = rearrange.run("Test Task").await.unwrap().unwrap();
        // Handler replaces every stage; entries keep the agent names
        assert!(result.contains("Agent1: Human processed Task"));
        assert!(result.contains("Agent3: Human processed Task"));
        assert!(!result.contains("Agent1 processed"));
    }

    #[tokio::test]
    async fn test_human_in_the_loop_without_handler_runs_agents() {
        let mut rearrange = make_rearrange();
        rearrange.human_in_the_loop = true;

        let result = rearrange.run("Test Task").await.unwrap().unwrap();
        assert!(result.contains("Agent1 processed Test Task"));
    }

    #[tokio::test]
    async fn test_run_narrowed_flow_skips_agent() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1 -> Agent3".to_string();

        let result = rearrange.run("Sub Task").await.unwrap().unwrap();
        assert!(result.contains("Agent1 processed Sub Task"));
        assert!(result.contains("Agent3 processed Sub Task"));
        assert!(!result.contains("Agent2 processed"));
    }

    #[tokio::test]
    async fn test_run_single_agent_flow() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1".to_string();

        let result = rearrange.run("Process Task").await.unwrap().unwrap();
        assert!(result.contains("Agent1 processed Process Task"));
        assert!(!result.contains("Agent2"));
    }

    #[tokio::test]
    async fn test_run_group_stage_appends_in_declaration_order() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1 -> Agent2, Agent3".to_string();

        let result = rearrange.run("Test Task").await.unwrap().unwrap();
        let second = result.find("Agent2 processed Test Task").unwrap();
        let third = result.find("Agent3 processed Test Task").unwrap();
        assert!(second < third);
    }

    #[tokio::test]
    async fn test_run_group_members_resolve_own_overrides() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1 -> Agent2, Agent3".to_string();

        let options = RunOptions::new().custom_task("Agent3", "Side Task");
        let result = rearrange.run_with("Test Task", options).await.unwrap().unwrap();
        assert!(result.contains("Agent2 processed Test Task"));
        assert!(result.contains("Agent3 processed Side Task"));
    }

    #[tokio::test]
    async fn test_run_invalid_flow_propagates() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1 -> Ghost".to_string();

        let err = rearrange.run("Test Task").await.unwrap_err();
        assert!(matches!(err, Error::InvalidFlow(_)));
    }

    #[tokio::test]
    async fn test_run_malformed_flow_propagates() {
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1 -> ".to_string();

        let err = rearrange.run("Test Task").await.unwrap_err();
        assert!(matches!(err, Error::MalformedFlow(_)));
    }

    #[tokio::test]
    async fn test_fail_safe_returns_none_on_agent_failure() {
        let mut rearrange = make_rearrange();
        rearrange.add_agent(Arc::new(FaultyAgent)).unwrap();
        rearrange.flow = "Agent1 -> Faulty -> Agent3".to_string();

        let result = rearrange.run("Test Task").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fail_fast_propagates_agent_failure() {
        let mut rearrange = make_rearrange();
        rearrange.add_agent(Arc::new(FaultyAgent)).unwrap();
        rearrange.flow = "Agent1 -> Faulty".to_string();
        rearrange.set_failure_mode(FailureMode::FailFast);

        let err = rearrange.run("Test Task").await.unwrap_err();
        assert!(matches!(err, Error::AgentExecution { agent, .. } if agent == "Faulty"));
    }

    #[tokio::test]
    async fn test_deadline_returns_partial_transcript() {
        let rearrange = make_rearrange();
        let options = RunOptions::new().deadline(Duration::ZERO);

        // Budget already exhausted: no stage launches, empty transcript back
        let result = rearrange.run_with("Test Task", options).await.unwrap();
        assert_eq!(result.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_builder() {
        let rearrange = AgentRearrange::builder()
            .agent(make_agent("Agent1"))
            .agents(vec![make_agent("Agent2")])
            .flow("Agent1 -> Agent2")
            .failure_mode(FailureMode::FailFast)
            .build()
            .unwrap();

        let result = rearrange.run("Test Task").await.unwrap().unwrap();
        assert!(result.contains("Agent2 processed Test Task"));
    }

    #[test]
    fn test_builder_rejects_duplicates_when_configured() {
        let result = AgentRearrange::builder()
            .agent(make_agent("Agent1"))
            .agent(make_agent("Agent1"))
            .duplicate_policy(DuplicatePolicy::Reject)
            .flow("Agent1")
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_uses_registry_snapshot() {
        // Mutations after a run starts must not affect that run; here we just
        // confirm runs see the registry state at call time.
        let mut rearrange = make_rearrange();
        rearrange.flow = "Agent1".to_string();
        rearrange.remove_agent("Agent1");

        assert!(rearrange.run("Test Task").await.is_err());
    }
}
