//! Tool execution for the agent loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use rag_core::{EngineHit, FusedResult, Generator, QueryContext, RagError, Result};
use rag_query::{build_prompt, ContextAssembler, DateCutoff, RetrievalFusionEngine};

use crate::protocol::Action;

/// What a successful tool call produced.
#[derive(Debug, Clone)]
pub enum ToolEffect {
    /// Keyword rows, remembered for file-list decoration.
    Keyword(Vec<EngineHit>),
    /// Context block and the hits it numbers, remembered for citations.
    Hybrid {
        context: String,
        chosen: Vec<FusedResult>,
    },
    /// Nothing for the loop to remember.
    None,
}

#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub observation: Value,
    pub effect: ToolEffect,
}

/// A tool call that produced no outcome.
#[derive(Debug)]
pub enum ToolFailure {
    TimedOut,
    Failed(RagError),
}

impl ToolFailure {
    pub fn observation(&self, tool: &str) -> String {
        match self {
            Self::TimedOut => format!("Observation: tool '{}' timed out", tool),
            Self::Failed(e) => format!("Observation: tool '{}' errored: {}", tool, e),
        }
    }
}

/// Runs [`Action`]s against the retrieval engine and the writer model.
pub struct ToolRunner {
    engine: Arc<RetrievalFusionEngine>,
    writer: Arc<dyn Generator>,
    assembler: ContextAssembler,
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(
        engine: Arc<RetrievalFusionEngine>,
        writer: Arc<dyn Generator>,
        assembler: ContextAssembler,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            writer,
            assembler,
            timeout,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Execute one action under the tool timeout.
    pub async fn execute(
        &self,
        ctx: &QueryContext,
        action: &Action,
        cutoff: Option<&DateCutoff>,
    ) -> std::result::Result<ToolOutcome, ToolFailure> {
        match tokio::time::timeout(self.timeout, self.dispatch(ctx, action, cutoff)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                debug!(tool = action.tool_name(), error = %e, "tool failed");
                Err(ToolFailure::Failed(e))
            }
            Err(_) => {
                debug!(tool = action.tool_name(), timeout_secs = self.timeout.as_secs(), "tool timed out");
                Err(ToolFailure::TimedOut)
            }
        }
    }

    async fn dispatch(
        &self,
        ctx: &QueryContext,
        action: &Action,
        cutoff: Option<&DateCutoff>,
    ) -> Result<ToolOutcome> {
        match action {
            Action::KeywordSearch(args) => {
                let rows = self
                    .engine
                    .keyword_search(ctx, &args.query, args.depth, cutoff)
                    .await?;
                let observation = json!({
                    "rows": rows.iter().map(|r| json!({
                        "chunk_id": r.chunk_id,
                        "source": r.source,
                        "page": r.page,
                        "snippet": r.text,
                    })).collect::<Vec<_>>(),
                });
                Ok(ToolOutcome {
                    observation,
                    effect: ToolEffect::Keyword(rows),
                })
            }
            Action::SemanticSearch(args) => {
                let rows = self
                    .engine
                    .semantic_search(ctx, &args.query, args.depth, cutoff)
                    .await?;
                let observation = json!({
                    "rows": rows.iter().map(|r| json!({
                        "id": r.chunk_id,
                        "source": r.source,
                        "page": r.page,
                        "distance": r.native_score,
                    })).collect::<Vec<_>>(),
                });
                Ok(ToolOutcome {
                    observation,
                    effect: ToolEffect::None,
                })
            }
            Action::HybridRetrieve(args) => {
                let hits = self
                    .engine
                    .retrieve(ctx, &args.query, cutoff, args.keyword_depth, args.semantic_depth)
                    .await?;
                let (context, chosen) = self.assembler.build(&hits, args.context_limit);
                let observation = json!({
                    "context_block": context,
                    "hits": chosen.iter().map(|h| json!({
                        "chunk_id": h.chunk_id,
                        "source": h.source,
                        "page": h.page,
                        "rrf_score": h.rrf_score,
                    })).collect::<Vec<_>>(),
                    "num_hits": hits.len(),
                });
                Ok(ToolOutcome {
                    observation,
                    effect: ToolEffect::Hybrid { context, chosen },
                })
            }
            Action::FinalAnswer(args) => {
                let prompt = build_prompt(&args.question, &args.context_block);
                let answer = self.writer.generate(&prompt).await?;
                Ok(ToolOutcome {
                    observation: json!({ "answer": answer }),
                    effect: ToolEffect::None,
                })
            }
        }
    }
}
