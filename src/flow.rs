//! Flow parsing and validation
//!
//! A flow is a declarative string describing ordered stages of named agents.
//! `->` separates stages; `,` groups agents for concurrent execution within a
//! stage. Whitespace around names is ignored, so `"A -> B"` and `"A->B"`
//! describe the same plan.
//!
//! # Flow syntax
//!
//! - Sequential: `"agent1 -> agent2 -> agent3"`
//! - Parallel: `"agent1, agent2 -> agent3"`
//! - Mixed: `"agent1 -> agent2, agent3 -> agent4"`

use crate::error::{Error, Result};
use crate::registry::AgentRegistry;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Separator between consecutive stages in a flow string
pub const STAGE_SEPARATOR: &str = "->";

/// Separator between concurrent agent names within one stage
pub const GROUP_SEPARATOR: char = ',';

/// One step of a flow: a single agent, or a group executed concurrently
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Single agent stage
    Single(String),
    /// Concurrent group stage; declaration order fixes transcript order
    Group(Vec<String>),
}

impl Stage {
    /// Agent names referenced by this stage, in declaration order
    pub fn members(&self) -> Vec<&str> {
        match self {
            Stage::Single(name) => vec![name.as_str()],
            Stage::Group(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Validated-parseable execution plan: an ordered sequence of stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPlan {
    stages: Vec<Stage>,
}

impl FlowPlan {
    /// Parse a flow string into an execution plan.
    ///
    /// Fails with [`Error::MalformedFlow`] when the string is empty or any
    /// stage is left with no agent name after trimming.
    pub fn parse(flow: &str) -> Result<Self> {
        if flow.trim().is_empty() {
            return Err(Error::malformed_flow("flow string is empty"));
        }

        let mut stages = Vec::new();
        for segment in flow.split(STAGE_SEPARATOR) {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(Error::malformed_flow(format!("empty stage in flow {flow:?}")));
            }

            let mut names: Vec<String> = segment
                .split(GROUP_SEPARATOR)
                .map(|name| name.trim().to_string())
                .collect();
            if names.iter().any(|name| name.is_empty()) {
                return Err(Error::malformed_flow(format!(
                    "stage {segment:?} contains an empty agent name"
                )));
            }

            let stage = if names.len() == 1 {
                Stage::Single(names.remove(0))
            } else {
                Stage::Group(names)
            };
            stages.push(stage);
        }

        Ok(Self { stages })
    }

    /// Check that every referenced agent name exists in the registry.
    ///
    /// Fails with [`Error::InvalidFlow`] carrying all unknown names in
    /// first-seen order, deduplicated. Reflects the registry's current
    /// contents at call time.
    pub fn validate(&self, registry: &AgentRegistry) -> Result<()> {
        let mut unknown: Vec<String> = Vec::new();
        for name in self.agent_names() {
            if !registry.contains(name) && !unknown.iter().any(|u| u == name) {
                unknown.push(name.to_string());
            }
        }
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidFlow(unknown))
        }
    }

    /// Stages of this plan, in execution order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Every agent name referenced by the plan, in flow order
    pub fn agent_names(&self) -> Vec<&str> {
        self.stages.iter().flat_map(|stage| stage.members()).collect()
    }

    /// Total number of agent invocations the plan describes
    pub fn agent_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.members().len()).sum()
    }
}

impl FromStr for FlowPlan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
