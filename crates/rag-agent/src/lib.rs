//! rag-agent - Query routing and the tool-using agent
//!
//! - [`QueryRouter`]: heuristic intent classification with keyword-first
//!   file lookup, fused answering and a single quoted-token retry.
//! - [`ToolAgentLoop`]: a bounded ReAct loop where the model picks among
//!   keyword, semantic and hybrid retrieval before answering.
//!
//! Both return the same [`rag_core::Response`] contract.

mod agent;
mod files;
pub mod intent;
mod protocol;
mod router;
mod tools;
mod transcript;

#[cfg(test)]
mod testing;

pub use agent::{ToolAgentLoop, COULD_NOT_DECIDE};
pub use files::{preview, rank_by_hit_count, rank_fused, PREVIEW_CHARS};
pub use protocol::{parse_reply, system_prompt, Action, Invalid, Reply};
pub use router::QueryRouter;
pub use tools::{ToolEffect, ToolFailure, ToolOutcome, ToolRunner};
pub use transcript::{Role, Transcript, Turn};
