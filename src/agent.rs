//! Agent capability contract
//!
//! The orchestrator knows nothing about how an agent computes its result,
//! only that it has a name and can be invoked with a task string. Any value
//! implementing [`TaskAgent`] can participate in a flow.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Capability contract every orchestrated agent implements
#[async_trait]
pub trait TaskAgent: Send + Sync + fmt::Debug {
    /// Unique name of this agent; flows reference agents by this name
    fn name(&self) -> &str;

    /// Execute the given task and return the produced text.
    ///
    /// `aux` carries an optional auxiliary argument (e.g. an image path)
    /// that some agent implementations accept. The orchestrator always
    /// passes `None` and never interprets it.
    async fn execute(&self, task: &str, aux: Option<&str>) -> Result<String>;
}

/// Agent backed by a plain synchronous function.
///
/// The simplest way to bring a function into a flow:
///
/// ```
/// use agent_rearrange::FnAgent;
///
/// let agent = FnAgent::new("Summarizer", |task| format!("Summarizer processed {task}"));
/// ```
pub struct FnAgent {
    name: String,
    func: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl FnAgent {
    /// Create a function-backed agent with the given name
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Create a function-backed agent already boxed as a trait object
    pub fn arc<F>(name: impl Into<String>, func: F) -> Arc<dyn TaskAgent>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, func))
    }
}

#[async_trait]
impl TaskAgent for FnAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, task: &str, _aux: Option<&str>) -> Result<String> {
        Ok((self.func)(task))
    }
}

impl fmt::Debug for FnAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAgent").field("name", &self.name).finish()
    }
}
