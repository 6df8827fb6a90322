//! Bounded ReAct loop over the retrieval tools.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn, Instrument};

use rag_core::{
    AgentConfig, Citation, EngineHit, FusedResult, Generator, QueryContext, RagError, Response,
    Result, RouterConfig, SearchConfig, Via,
};
use rag_query::{build_prompt, truncate_chars, ContextAssembler, DateCutoff, RetrievalFusionEngine};

use crate::files::rank_by_hit_count;
use crate::protocol::{parse_reply, system_prompt, Reply};
use crate::tools::{ToolEffect, ToolRunner};
use crate::transcript::{Role, Transcript};

/// Terminal text when the budget runs out with no retrieved context.
pub const COULD_NOT_DECIDE: &str =
    "I couldn't decide on a tool. Please rephrase or be more specific.";

const TRUNCATION_MARKER: &str = "...(truncated)";

/// Turns seeded before the first model call (system + user).
const SEED_TURNS: usize = 2;

/// Which retrieval the loop saw last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastRetrieval {
    Keyword,
    Hybrid,
}

/// Retrieval results remembered across turns.
///
/// Only non-empty retrievals are recorded, so an empty search leaves the
/// previous results (and the decoration they drive) in place.
#[derive(Debug, Default)]
struct Memory {
    keyword_rows: Option<Vec<EngineHit>>,
    hybrid: Option<(String, Vec<FusedResult>)>,
    last: Option<LastRetrieval>,
}

impl Memory {
    fn record(&mut self, effect: ToolEffect) {
        match effect {
            ToolEffect::Keyword(rows) if !rows.is_empty() => {
                self.keyword_rows = Some(rows);
                self.last = Some(LastRetrieval::Keyword);
            }
            ToolEffect::Hybrid { context, chosen } if !chosen.is_empty() => {
                self.hybrid = Some((context, chosen));
                self.last = Some(LastRetrieval::Hybrid);
            }
            _ => {}
        }
    }
}

/// Model-driven tool loop.
///
/// Each turn the model sees the flattened transcript and replies with either
/// an action or a final answer. Tool problems become observations; the loop
/// stops after `max_steps` model turns.
pub struct ToolAgentLoop {
    tools: ToolRunner,
    generator: Arc<dyn Generator>,
    max_steps: usize,
    observation_cap: usize,
    max_files: usize,
    rrf_k: u32,
}

impl ToolAgentLoop {
    pub fn new(engine: Arc<RetrievalFusionEngine>, generator: Arc<dyn Generator>) -> Self {
        Self::with_config(
            engine,
            generator,
            &AgentConfig::default(),
            &SearchConfig::default(),
            &RouterConfig::default(),
        )
    }

    pub fn with_config(
        engine: Arc<RetrievalFusionEngine>,
        generator: Arc<dyn Generator>,
        agent: &AgentConfig,
        search: &SearchConfig,
        router: &RouterConfig,
    ) -> Self {
        let rrf_k = engine.rrf_k();
        let tools = ToolRunner::new(
            engine,
            generator.clone(),
            ContextAssembler::new(search.max_chunk_chars),
            Duration::from_secs(agent.tool_timeout_secs),
        );
        Self {
            tools,
            generator,
            max_steps: agent.max_steps,
            observation_cap: agent.observation_cap,
            max_files: router.max_files,
            rrf_k,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tools.set_timeout(timeout);
        self
    }

    pub async fn run(
        &self,
        ctx: &QueryContext,
        question: &str,
        cutoff: Option<&DateCutoff>,
    ) -> Result<Response> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::invalid_argument("question must not be empty"));
        }
        self.run_inner(ctx, question, cutoff)
            .instrument(ctx.span().clone())
            .await
    }

    async fn run_inner(
        &self,
        ctx: &QueryContext,
        question: &str,
        cutoff: Option<&DateCutoff>,
    ) -> Result<Response> {
        let mut transcript = Transcript::new()
            .append(Role::System, system_prompt(self.max_steps))
            .append(Role::User, question);
        let mut memory = Memory::default();

        for step in 1..=self.max_steps {
            let reply = self.generator.generate(&transcript.flatten()).await?;
            let reply = reply.trim().to_string();
            debug!(step, reply = %reply, "model turn");
            transcript = transcript.append(Role::Assistant, reply.as_str());

            let action = match parse_reply(&reply) {
                Reply::Final(text) => {
                    info!(step, "final answer");
                    return Ok(self.decorate(text, &memory, &transcript));
                }
                Reply::Invalid(invalid) => {
                    debug!(step, ?invalid, "unusable reply");
                    transcript = transcript.append(Role::Tool, invalid.observation());
                    continue;
                }
                Reply::Act(action) => action,
            };

            info!(step, tool = action.tool_name(), "executing tool");
            let observation = match self.tools.execute(ctx, &action, cutoff).await {
                Ok(outcome) => {
                    memory.record(outcome.effect);
                    format!("Observation: {}", self.cap(&outcome.observation.to_string()))
                }
                Err(failure) => {
                    warn!(step, tool = action.tool_name(), "tool did not complete");
                    failure.observation(action.tool_name())
                }
            };
            transcript = transcript.append(Role::Tool, observation);
        }

        info!(max_steps = self.max_steps, "step budget exhausted");
        self.exhausted(question, &memory, &transcript).await
    }

    /// Attach citations or a file list matching the latest retrieval.
    fn decorate(&self, text: String, memory: &Memory, transcript: &Transcript) -> Response {
        match memory.last {
            Some(LastRetrieval::Keyword) => {
                let rows = memory.keyword_rows.as_deref().unwrap_or_default();
                Response::Files {
                    via: Via::Agent,
                    files: rank_by_hit_count(rows, self.max_files, self.rrf_k),
                }
            }
            Some(LastRetrieval::Hybrid) => {
                let citations = memory
                    .hybrid
                    .as_ref()
                    .map(|(_, chosen)| chosen.iter().map(Citation::from).collect())
                    .unwrap_or_default();
                self.answer(text, citations, transcript)
            }
            None => self.answer(text, Vec::new(), transcript),
        }
    }

    /// Answer from the last hybrid context, or give up.
    async fn exhausted(
        &self,
        question: &str,
        memory: &Memory,
        transcript: &Transcript,
    ) -> Result<Response> {
        match &memory.hybrid {
            Some((context, chosen)) => {
                let answer = self.generator.generate(&build_prompt(question, context)).await?;
                let citations = chosen.iter().map(Citation::from).collect();
                Ok(self.answer(answer, citations, transcript))
            }
            None => Ok(self.answer(COULD_NOT_DECIDE.to_string(), Vec::new(), transcript)),
        }
    }

    fn answer(&self, answer_text: String, citations: Vec<Citation>, transcript: &Transcript) -> Response {
        Response::Answer {
            via: Via::Agent,
            answer_text,
            citations,
            trace: Some(transcript.rendered_from(SEED_TURNS)),
        }
    }

    fn cap(&self, observation: &str) -> String {
        let kept = truncate_chars(observation, self.observation_cap);
        if kept.len() < observation.len() {
            format!("{}{}", kept, TRUNCATION_MARKER)
        } else {
            observation.to_string()
        }
    }
}
