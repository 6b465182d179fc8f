//! ReAct agent
//!
//! - `parser`   -- model turn parsing into tool selections and final answers
//! - `trace`    -- append-only per-run transcript
//! - `executor` -- the think/act/observe loop

pub mod executor;
pub mod parser;
pub mod trace;

pub use executor::{AgentExecutor, AgentResponse};
pub use parser::{AgentAction, AgentFinish, ParsedTurn, ReactParser};
pub use trace::{AgentStep, Transcript};
