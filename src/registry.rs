//! Agent registry
//!
//! Named collection of available agents, keyed by agent name. Flows are
//! validated against the registry's current contents; a run takes a snapshot
//! at validation time so mid-run mutations are never observed.

use crate::agent::TaskAgent;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Policy applied when an agent is registered under an already-taken name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replace the previous entry (default)
    #[default]
    Replace,
    /// Reject the registration with a configuration error
    Reject,
}

/// Mapping from agent name to agent, with a configurable duplicate policy
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn TaskAgent>>,
    policy: DuplicatePolicy,
}

impl AgentRegistry {
    /// Create an empty registry with the default (replace) duplicate policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given duplicate policy
    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            agents: HashMap::new(),
            policy,
        }
    }

    /// Register an agent under its own name.
    ///
    /// Under [`DuplicatePolicy::Replace`] this never fails; under
    /// [`DuplicatePolicy::Reject`] registering a taken name is an error.
    pub fn add(&mut self, agent: Arc<dyn TaskAgent>) -> Result<()> {
        let name = agent.name().to_string();
        if self.policy == DuplicatePolicy::Reject && self.agents.contains_key(&name) {
            return Err(Error::config(format!("agent {name} is already registered")));
        }
        tracing::debug!(agent = %name, "registering agent");
        self.agents.insert(name, agent);
        Ok(())
    }

    /// Register several agents, best effort.
    ///
    /// Every agent is attempted; the first rejection (if any) is reported
    /// after the remaining agents have been processed. No rollback.
    pub fn add_many(&mut self, agents: impl IntoIterator<Item = Arc<dyn TaskAgent>>) -> Result<()> {
        let mut first_err = None;
        for agent in agents {
            if let Err(err) = self.add(agent) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Remove the agent registered under `name`, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn TaskAgent>> {
        tracing::debug!(agent = %name, "removing agent");
        self.agents.remove(name)
    }

    /// Whether an agent is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Look up the agent registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<dyn TaskAgent>> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| Error::AgentNotFound(name.to_string()))
    }

    /// Names of all registered agents, in no particular order
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Cheap copy of the current registry contents (Arc clones only).
    /// Runs validate and execute against a snapshot so that registry
    /// mutations after validation are not observed mid-run.
    pub(crate) fn snapshot(&self) -> AgentRegistry {
        self.clone()
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}
