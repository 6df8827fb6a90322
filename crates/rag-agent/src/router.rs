//! Heuristic query router.
//!
//! Classifies the question, runs the matching retrieval branch with at most
//! one retry, and produces either a ranked file list or a cited answer.

use std::sync::Arc;

use tracing::{debug, info, Instrument};

use rag_core::{
    Citation, FusedResult, Generator, QueryContext, RagError, Response, Result, RouterConfig,
    SearchConfig, Via,
};
use rag_query::{build_prompt, ContextAssembler, DateCutoff, RetrievalFusionEngine};

use crate::files::{rank_by_hit_count, rank_fused};
use crate::intent::{self, Intent};

/// Semantic/keyword depths for one retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Depths {
    semantic: usize,
    keyword: usize,
}

/// Routes a question to file lookup or grounded answering.
pub struct QueryRouter {
    engine: Arc<RetrievalFusionEngine>,
    generator: Arc<dyn Generator>,
    assembler: ContextAssembler,
    context_limit: usize,
    balanced: Depths,
    file_lookup_depth: usize,
    max_files: usize,
}

impl QueryRouter {
    pub fn new(engine: Arc<RetrievalFusionEngine>, generator: Arc<dyn Generator>) -> Self {
        Self::with_config(
            engine,
            generator,
            &SearchConfig::default(),
            &RouterConfig::default(),
        )
    }

    pub fn with_config(
        engine: Arc<RetrievalFusionEngine>,
        generator: Arc<dyn Generator>,
        search: &SearchConfig,
        router: &RouterConfig,
    ) -> Self {
        Self {
            engine,
            generator,
            assembler: ContextAssembler::new(search.max_chunk_chars),
            context_limit: search.context_limit,
            balanced: Depths {
                semantic: search.semantic_depth,
                keyword: search.keyword_depth,
            },
            file_lookup_depth: router.file_lookup_depth,
            max_files: router.max_files,
        }
    }

    /// Number of chunks passed to the model in answer mode.
    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    /// Answer `question`, optionally restricted to sources modified before `cutoff`.
    pub async fn route(
        &self,
        ctx: &QueryContext,
        question: &str,
        cutoff: Option<&DateCutoff>,
    ) -> Result<Response> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::invalid_argument("question must not be empty"));
        }

        self.route_inner(ctx, question, cutoff)
            .instrument(ctx.span().clone())
            .await
    }

    async fn route_inner(
        &self,
        ctx: &QueryContext,
        question: &str,
        cutoff: Option<&DateCutoff>,
    ) -> Result<Response> {
        let tokens = intent::strong_tokens(question);
        debug!(?tokens, "strong tokens");

        match intent::classify(question) {
            Intent::FileLookup => {
                info!(mode = "files", "routing");
                if let Some(response) = self.file_lookup_fast(ctx, question, &tokens, cutoff).await? {
                    return Ok(response);
                }
                self.file_lookup_fused(ctx, question, &tokens, cutoff).await
            }
            Intent::Answer => {
                info!(mode = "answer", "routing");
                self.answer(ctx, question, &tokens, cutoff).await
            }
        }
    }

    /// Keyword-only lookup. `None` when nothing matched.
    async fn file_lookup_fast(
        &self,
        ctx: &QueryContext,
        question: &str,
        tokens: &[String],
        cutoff: Option<&DateCutoff>,
    ) -> Result<Option<Response>> {
        let query = if tokens.is_empty() {
            intent::general_query(question)
        } else {
            intent::fast_path_query(tokens)
        };
        debug!(query = %query, "fast path query");

        let mut rows = self
            .engine
            .keyword_search(ctx, &query, self.file_lookup_depth, cutoff)
            .await?;

        if rows.is_empty() && !tokens.is_empty() {
            let general = intent::general_query(question);
            debug!(query = %general, "fast path retry");
            rows = self
                .engine
                .keyword_search(ctx, &general, self.file_lookup_depth, cutoff)
                .await?;
        }

        if rows.is_empty() {
            return Ok(None);
        }

        let files = rank_by_hit_count(&rows, self.max_files, self.engine.rrf_k());
        info!(rows = rows.len(), files = files.len(), "fast path matched");
        Ok(Some(Response::Files {
            via: Via::Router,
            files,
        }))
    }

    async fn file_lookup_fused(
        &self,
        ctx: &QueryContext,
        question: &str,
        tokens: &[String],
        cutoff: Option<&DateCutoff>,
    ) -> Result<Response> {
        let depths = if tokens.is_empty() {
            Depths {
                semantic: 2,
                keyword: 80,
            }
        } else {
            Depths {
                semantic: 1,
                keyword: 100,
            }
        };
        let retry = Depths {
            semantic: depths.semantic,
            keyword: depths.keyword.max(120),
        };

        let hits = self
            .retrieve_with_retry(ctx, question, tokens, cutoff, depths, retry)
            .await?;

        Ok(Response::Files {
            via: Via::Router,
            files: rank_fused(&hits, self.max_files),
        })
    }

    async fn answer(
        &self,
        ctx: &QueryContext,
        question: &str,
        tokens: &[String],
        cutoff: Option<&DateCutoff>,
    ) -> Result<Response> {
        let depths = if tokens.is_empty() {
            self.balanced
        } else {
            Depths {
                semantic: 6,
                keyword: 50,
            }
        };
        let retry = Depths {
            semantic: depths.semantic.saturating_sub(2).max(2),
            keyword: depths.keyword.max(60),
        };

        let hits = self
            .retrieve_with_retry(ctx, question, tokens, cutoff, depths, retry)
            .await?;
        if hits.is_empty() {
            info!("no context retrieved");
            return Ok(Response::insufficient(Via::Router));
        }

        let (context, chosen) = self.assembler.build(&hits, self.context_limit);
        if chosen.is_empty() {
            info!(hits = hits.len(), context_limit = self.context_limit, "context block empty");
            return Ok(Response::insufficient(Via::Router));
        }
        let answer_text = self.generator.generate(&build_prompt(question, &context)).await?;

        Ok(Response::Answer {
            via: Via::Router,
            answer_text,
            citations: chosen.iter().map(Citation::from).collect(),
            trace: None,
        })
    }

    /// Fused retrieval, retried once with the quoted-token variant when empty.
    async fn retrieve_with_retry(
        &self,
        ctx: &QueryContext,
        question: &str,
        tokens: &[String],
        cutoff: Option<&DateCutoff>,
        first: Depths,
        retry: Depths,
    ) -> Result<Vec<FusedResult>> {
        let hits = self
            .engine
            .retrieve(ctx, question, cutoff, first.keyword, first.semantic)
            .await?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        let quoted = intent::quoted_variant(question, tokens);
        info!(query = %quoted, semantic = retry.semantic, keyword = retry.keyword, "retrying");
        self.engine
            .retrieve(ctx, &quoted, cutoff, retry.keyword, retry.semantic)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    use crate::testing::{
        engine, engine_with_mtimes, hit, CannedEngine, FixedMtimes, ScriptedGenerator,
    };
    use rag_core::INSUFFICIENT_INFORMATION;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    /// `/old.txt` before a cutoff at 2000s, `/new.txt` exactly at it, `/ghost.txt` unknown.
    fn mtimes() -> FixedMtimes {
        FixedMtimes::default()
            .with("/old.txt", at(1_000))
            .with("/new.txt", at(2_000))
    }

    fn router(
        keyword: Arc<CannedEngine>,
        semantic: Arc<CannedEngine>,
        generator: Arc<ScriptedGenerator>,
    ) -> QueryRouter {
        QueryRouter::new(engine(keyword, semantic), generator)
    }

    #[tokio::test]
    async fn test_file_lookup_ranks_by_hit_count() {
        let keyword = Arc::new(CannedEngine::default().with(
            r#""HTTP_500" OR "HTTP_500s""#,
            vec![
                hit("/logs/a.txt", 0, "HTTP_500 once"),
                hit("/logs/b.txt", 0, "HTTP_500 first"),
                hit("/logs/b.txt", 1, "HTTP_500 again"),
            ],
        ));
        let semantic = Arc::new(CannedEngine::default());
        let generator = Arc::new(ScriptedGenerator::default());
        let router = router(keyword.clone(), semantic.clone(), generator.clone());

        let ctx = QueryContext::new("router");
        let response = router.route(&ctx, "which file mentions HTTP_500", None).await.unwrap();

        match response {
            Response::Files { via, files } => {
                assert_eq!(via, Via::Router);
                let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
                assert_eq!(paths, vec!["/logs/b.txt", "/logs/a.txt"]);
            }
            other => panic!("expected files, got {:?}", other),
        }
        assert_eq!(keyword.seen(), vec![(r#""HTTP_500" OR "HTTP_500s""#.to_string(), 100)]);
        assert!(semantic.seen().is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_fast_path_retries_with_general_query() {
        let keyword = Arc::new(CannedEngine::default().with(
            "vpn OR vpns OR setup OR setups",
            vec![hit("/it/vpn.md", 0, "vpn setup")],
        ));
        let router = router(
            keyword.clone(),
            Arc::new(CannedEngine::default()),
            Arc::new(ScriptedGenerator::default()),
        );

        let ctx = QueryContext::new("router");
        let response = router.route(&ctx, "which file has vpn setup", None).await.unwrap();
        assert_eq!(response.mode(), "files");
        assert_eq!(keyword.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_fused_file_lookup_after_empty_fast_path() {
        let semantic = Arc::new(CannedEngine::default().with(
            "which document covers onboarding",
            vec![hit("/hr/onboarding.md", 0, "first week")],
        ));
        let router = router(
            Arc::new(CannedEngine::default()),
            semantic.clone(),
            Arc::new(ScriptedGenerator::default()),
        );

        let ctx = QueryContext::new("router");
        let response = router
            .route(&ctx, "which document covers onboarding", None)
            .await
            .unwrap();

        match response {
            Response::Files { files, .. } => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].path, "/hr/onboarding.md");
                assert!(!files[0].has_keyword_hit);
            }
            other => panic!("expected files, got {:?}", other),
        }
        // strong tokens present: semantic depth 1
        assert_eq!(semantic.seen(), vec![("which document covers onboarding".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_fused_file_lookup_empty_list() {
        let semantic = Arc::new(CannedEngine::default());
        let router = router(
            Arc::new(CannedEngine::default()),
            semantic.clone(),
            Arc::new(ScriptedGenerator::default()),
        );

        let ctx = QueryContext::new("router");
        let response = router.route(&ctx, "which file mentions zebra", None).await.unwrap();
        assert_eq!(
            response,
            Response::Files {
                via: Via::Router,
                files: Vec::new()
            }
        );
        // first attempt plus exactly one retry
        assert_eq!(semantic.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_answer_with_citations() {
        let semantic = Arc::new(CannedEngine::default().with(
            "who captured Rome in 455",
            vec![
                hit("/hist/rome.txt", 0, "The Vandals captured Rome in 455."),
                hit("/hist/rome.txt", 1, "Gaiseric led them."),
            ],
        ));
        let generator = Arc::new(ScriptedGenerator::new(&["The Vandals [1][2]."]));
        let router = router(Arc::new(CannedEngine::default()), semantic.clone(), generator.clone());

        let ctx = QueryContext::new("router");
        let response = router.route(&ctx, "who captured Rome in 455", None).await.unwrap();

        match response {
            Response::Answer {
                via,
                answer_text,
                citations,
                trace,
            } => {
                assert_eq!(via, Via::Router);
                assert_eq!(answer_text, "The Vandals [1][2].");
                assert_eq!(citations.len(), 2);
                assert_eq!(citations[0].chunk_id.as_str(), "/hist/rome.txt:0:0");
                assert!(trace.is_none());
            }
            other => panic!("expected answer, got {:?}", other),
        }
        assert_eq!(generator.calls(), 1);
        let prompt = generator.prompt(0);
        assert!(prompt.contains("[1] source=/hist/rome.txt page=0 chunk=/hist/rome.txt:0:0"));
        // strong tokens present: keyword-boosted depths
        assert_eq!(semantic.seen()[0].1, 6);
    }

    #[tokio::test]
    async fn test_empty_answer_path_never_calls_model() {
        let semantic = Arc::new(CannedEngine::default());
        let generator = Arc::new(ScriptedGenerator::default());
        let router = router(Arc::new(CannedEngine::default()), semantic.clone(), generator.clone());

        let ctx = QueryContext::new("router");
        let response = router.route(&ctx, "who founded Carthage", None).await.unwrap();

        assert_eq!(response, Response::insufficient(Via::Router));
        match response {
            Response::Answer { answer_text, .. } => assert_eq!(answer_text, INSUFFICIENT_INFORMATION),
            other => panic!("expected answer, got {:?}", other),
        }
        assert_eq!(generator.calls(), 0);

        let seen = semantic.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], (r#"who "founded" "Carthage""#.to_string(), 4));
    }

    #[tokio::test]
    async fn test_zero_context_limit_is_insufficient() {
        let semantic = Arc::new(CannedEngine::default().with(
            "what is the retention policy",
            vec![hit("/policy/retention.md", 0, "Logs are kept for 30 days.")],
        ));
        let generator = Arc::new(ScriptedGenerator::new(&["made up"]));
        let router = router(Arc::new(CannedEngine::default()), semantic, generator.clone())
            .with_context_limit(0);

        let ctx = QueryContext::new("router");
        let response = router
            .route(&ctx, "what is the retention policy", None)
            .await
            .unwrap();

        assert_eq!(response, Response::insufficient(Via::Router));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_cutoff_filters_file_lookup() {
        let keyword = Arc::new(CannedEngine::default().with(
            r#""HTTP_500" OR "HTTP_500s""#,
            vec![
                hit("/new.txt", 0, "HTTP_500"),
                hit("/new.txt", 1, "HTTP_500"),
                hit("/ghost.txt", 0, "HTTP_500"),
                hit("/old.txt", 0, "HTTP_500"),
            ],
        ));
        let router = QueryRouter::new(
            engine_with_mtimes(keyword, Arc::new(CannedEngine::default()), mtimes()),
            Arc::new(ScriptedGenerator::default()),
        );

        let ctx = QueryContext::new("router");
        let cutoff = DateCutoff::from_system_time(at(2_000));
        let response = router
            .route(&ctx, "which file mentions HTTP_500", Some(&cutoff))
            .await
            .unwrap();

        match response {
            Response::Files { files, .. } => {
                let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
                assert_eq!(paths, vec!["/old.txt"]);
            }
            other => panic!("expected files, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cutoff_filters_answer_sources() {
        let semantic = Arc::new(CannedEngine::default().with(
            "who captured Rome in 455",
            vec![
                hit("/new.txt", 0, "Rewritten history."),
                hit("/ghost.txt", 0, "Unknown provenance."),
                hit("/old.txt", 0, "The Vandals captured Rome in 455."),
            ],
        ));
        let generator = Arc::new(ScriptedGenerator::new(&["The Vandals [1]."]));
        let router = QueryRouter::new(
            engine_with_mtimes(Arc::new(CannedEngine::default()), semantic, mtimes()),
            generator.clone(),
        );

        let ctx = QueryContext::new("router");
        let cutoff = DateCutoff::from_system_time(at(2_000));
        let response = router
            .route(&ctx, "who captured Rome in 455", Some(&cutoff))
            .await
            .unwrap();

        match response {
            Response::Answer { citations, .. } => {
                assert_eq!(citations.len(), 1);
                assert_eq!(citations[0].path, "/old.txt");
            }
            other => panic!("expected answer, got {:?}", other),
        }
        let prompt = generator.prompt(0);
        assert!(!prompt.contains("/new.txt"));
        assert!(!prompt.contains("/ghost.txt"));
    }

    #[tokio::test]
    async fn test_cutoff_excluding_everything_is_insufficient() {
        let semantic = Arc::new(CannedEngine::default().with(
            "who captured Rome in 455",
            vec![hit("/new.txt", 0, "Rewritten history."), hit("/ghost.txt", 0, "?")],
        ));
        let generator = Arc::new(ScriptedGenerator::default());
        let router = QueryRouter::new(
            engine_with_mtimes(Arc::new(CannedEngine::default()), semantic, mtimes()),
            generator.clone(),
        );

        let ctx = QueryContext::new("router");
        let cutoff = DateCutoff::from_system_time(at(2_000));
        let response = router
            .route(&ctx, "who captured Rome in 455", Some(&cutoff))
            .await
            .unwrap();

        assert_eq!(response, Response::insufficient(Via::Router));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let router = router(
            Arc::new(CannedEngine::default()),
            Arc::new(CannedEngine::default()),
            Arc::new(ScriptedGenerator::default()),
        );
        let ctx = QueryContext::new("router");
        let err = router.route(&ctx, "   ", None).await.unwrap_err();
        assert!(err.is_input_error());
    }
}
