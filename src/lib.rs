//! # agent-rearrange
//!
//! A flow-directed agent orchestration primitive built with Rust.
//!
//! A flow is a declarative string describing ordered stages of named agents:
//! `->` separates stages and `,` groups agents that execute concurrently
//! within one stage. [`AgentRearrange`] validates the flow against its agent
//! registry, executes the stages in order, and returns the accumulated
//! conversation transcript as the run result.
//!
//! ## Features
//!
//! - **Flow syntax**: `"researcher -> analyst, reviewer -> summarizer"`
//! - **Per-agent task overrides**: substitute custom task text per agent name
//! - **Human-in-the-loop**: route stages through a caller-supplied handler
//! - **Configurable failure handling**: degrade gracefully or fail fast
//!
//! ## Quick Start
//!
//! ```
//! use agent_rearrange::{AgentRearrange, FnAgent};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> agent_rearrange::Result<()> {
//!     let rearrange = AgentRearrange::new(
//!         vec![
//!             FnAgent::arc("Researcher", |task| format!("Researcher processed {task}")),
//!             FnAgent::arc("Writer", |task| format!("Writer processed {task}")),
//!         ],
//!         "Researcher -> Writer",
//!     );
//!
//!     rearrange.validate_flow()?;
//!     let transcript = rearrange.run("Summarize the findings").await?;
//!     println!("{}", transcript.unwrap_or_default());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod error;
pub mod flow;
pub mod rearrange;
pub mod registry;
pub mod transcript;
pub mod types;

// Re-exports for convenience
pub use agent::{FnAgent, TaskAgent};
pub use error::{Error, Result};
pub use flow::{FlowPlan, Stage};
pub use rearrange::{
    AgentRearrange, AgentRearrangeBuilder, FailureMode, FnIntervention, InterventionHandler,
    RunOptions,
};
pub use registry::{AgentRegistry, DuplicatePolicy};
pub use transcript::{Transcript, TranscriptEntry};
pub use types::RunId;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::{FnAgent, TaskAgent};
    pub use crate::error::{Error, Result};
    pub use crate::flow::{FlowPlan, Stage};
    pub use crate::rearrange::{AgentRearrange, FailureMode, RunOptions};
    pub use crate::registry::{AgentRegistry, DuplicatePolicy};
    pub use crate::transcript::Transcript;
}
