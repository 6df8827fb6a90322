//! Model-output grammar for the agent loop.
//!
//! A reply is either `FinalAnswer: <text>` or
//!
//! ```text
//! Action: <tool>
//! Args: {"key": "value"}
//! ```
//!
//! The final-answer shape is checked first. Anything else is reported back to
//! the model as a synthetic observation.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

pub const KEYWORD_SEARCH: &str = "keyword_search";
pub const SEMANTIC_SEARCH: &str = "semantic_search";
pub const HYBRID_RETRIEVE: &str = "hybrid_retrieve";
pub const FINAL_ANSWER: &str = "final_answer";

/// Instructions and tool registry seeded into every transcript.
pub fn system_prompt(max_steps: usize) -> String {
    format!(
        r#"You are a helpful research assistant with tool access.
Decide which tool to use and in what order. Use short reasoning and act.

TOOLS (Action -> Args JSON):
- keyword_search: {{"query": str, "k": int?}}
- semantic_search: {{"query": str, "k": int?}}
- hybrid_retrieve: {{"query": str, "ck": int?, "bk": int?, "k_ctx": int?}}
- final_answer: {{"question": str, "context_block": str}}

Protocol you MUST follow:
1) To call a tool, output EXACTLY:
   Action: <keyword_search|semantic_search|hybrid_retrieve|final_answer>
   Args: {{"key": "value", ...}}
2) When you are ready to answer, output:
   FinalAnswer: <final user-facing text>
3) Always choose an action. Do not ask the user to rephrase.

Guidance:
- If the user asks which/what file or document, prefer keyword_search first (you can stop there).
- If the user asks who/what/when/why/how, call hybrid_retrieve then final_answer.
- Use at most {max_steps} actions. Cite sources only via final_answer.
"#
    )
}

fn default_keyword_depth() -> usize {
    30
}

fn default_semantic_depth() -> usize {
    10
}

fn default_hybrid_semantic_depth() -> usize {
    8
}

fn default_hybrid_keyword_depth() -> usize {
    20
}

fn default_context_limit() -> usize {
    6
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordArgs {
    pub query: String,
    #[serde(default = "default_keyword_depth", alias = "k")]
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SemanticArgs {
    pub query: String,
    #[serde(default = "default_semantic_depth", alias = "k")]
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HybridArgs {
    pub query: String,
    #[serde(default = "default_hybrid_semantic_depth", alias = "ck")]
    pub semantic_depth: usize,
    #[serde(default = "default_hybrid_keyword_depth", alias = "bk")]
    pub keyword_depth: usize,
    #[serde(default = "default_context_limit", alias = "k_ctx")]
    pub context_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FinalAnswerArgs {
    pub question: String,
    pub context_block: String,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    KeywordSearch(KeywordArgs),
    SemanticSearch(SemanticArgs),
    HybridRetrieve(HybridArgs),
    FinalAnswer(FinalAnswerArgs),
}

impl Action {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::KeywordSearch(_) => KEYWORD_SEARCH,
            Self::SemanticSearch(_) => SEMANTIC_SEARCH,
            Self::HybridRetrieve(_) => HYBRID_RETRIEVE,
            Self::FinalAnswer(_) => FINAL_ANSWER,
        }
    }

    /// Build an action from a tool name and its JSON arguments.
    pub fn from_parts(tool: &str, args: Value) -> Result<Self, Invalid> {
        let canonical = match tool.to_ascii_lowercase().as_str() {
            KEYWORD_SEARCH | "bm25_search" => KEYWORD_SEARCH,
            SEMANTIC_SEARCH | "chroma_search" => SEMANTIC_SEARCH,
            HYBRID_RETRIEVE => HYBRID_RETRIEVE,
            FINAL_ANSWER => FINAL_ANSWER,
            _ => return Err(Invalid::UnknownTool(tool.to_string())),
        };

        if !args.is_object() {
            return Err(Invalid::BadArgs {
                tool: canonical.to_string(),
                reason: "Args must be a JSON object".to_string(),
            });
        }

        match canonical {
            KEYWORD_SEARCH => decode(canonical, args).map(Self::KeywordSearch),
            SEMANTIC_SEARCH => decode(canonical, args).map(Self::SemanticSearch),
            HYBRID_RETRIEVE => decode(canonical, args).map(Self::HybridRetrieve),
            _ => decode(canonical, args).map(Self::FinalAnswer),
        }
    }
}

fn decode<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, Invalid> {
    serde_json::from_value(args).map_err(|e| Invalid::BadArgs {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Why a reply could not be turned into a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalid {
    /// Neither reply shape was found.
    Unparseable,
    /// The tool exists but its arguments did not decode.
    BadArgs { tool: String, reason: String },
    UnknownTool(String),
}

impl Invalid {
    /// Observation text fed back to the model.
    pub fn observation(&self) -> String {
        match self {
            Self::Unparseable => "Observation: invalid or missing Action/Args. Try again.".to_string(),
            Self::BadArgs { tool, reason } => {
                format!("Observation: Args for '{}' could not be parsed: {}", tool, reason)
            }
            Self::UnknownTool(tool) => format!("Observation: unknown tool '{}'.", tool),
        }
    }
}

/// One parsed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Final(String),
    Act(Action),
    Invalid(Invalid),
}

fn final_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)FinalAnswer:\s*(.+)").expect("valid regex"))
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)Action:\s*([A-Za-z_][A-Za-z0-9_]*)\s*Args:\s*").expect("valid regex")
    })
}

/// Parse a model reply.
pub fn parse_reply(text: &str) -> Reply {
    if let Some(caps) = final_re().captures(text) {
        let answer = caps.get(1).map_or("", |m| m.as_str()).trim();
        if !answer.is_empty() {
            return Reply::Final(answer.to_string());
        }
    }

    let Some(caps) = action_re().captures(text) else {
        return Reply::Invalid(Invalid::Unparseable);
    };
    let tool = caps.get(1).map_or("", |m| m.as_str());
    let rest = caps.get(0).map_or("", |m| &text[m.end()..]);

    let args = match first_json_value(rest) {
        Ok(value) => value,
        Err(reason) => {
            return Reply::Invalid(Invalid::BadArgs {
                tool: tool.to_string(),
                reason,
            })
        }
    };

    match Action::from_parts(tool, args) {
        Ok(action) => Reply::Act(action),
        Err(invalid) => Reply::Invalid(invalid),
    }
}

/// First JSON value in `text`; trailing prose is ignored.
fn first_json_value(text: &str) -> Result<Value, String> {
    let text = text
        .trim_start()
        .trim_start_matches("```json")
        .trim_start_matches("```");
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("missing Args JSON".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_answer_checked_first() {
        let reply = parse_reply(
            "Action: keyword_search\nArgs: {\"query\": \"x\"}\nFinalAnswer: Rome fell in 455 [1].",
        );
        assert_eq!(reply, Reply::Final("Rome fell in 455 [1].".to_string()));
    }

    #[test]
    fn test_action_with_defaults() {
        let reply = parse_reply("Thought: look it up\nAction: keyword_search\nArgs: {\"query\": \"HTTP_500\"}");
        assert_eq!(
            reply,
            Reply::Act(Action::KeywordSearch(KeywordArgs {
                query: "HTTP_500".to_string(),
                depth: 30,
            }))
        );
    }

    #[test]
    fn test_short_aliases_and_legacy_names() {
        let reply = parse_reply(
            "Action: hybrid_retrieve\nArgs: {\"query\": \"rome\", \"ck\": 4, \"bk\": 40, \"k_ctx\": 3}",
        );
        assert_eq!(
            reply,
            Reply::Act(Action::HybridRetrieve(HybridArgs {
                query: "rome".to_string(),
                semantic_depth: 4,
                keyword_depth: 40,
                context_limit: 3,
            }))
        );

        let reply = parse_reply("Action: chroma_search\nArgs: {\"query\": \"rome\", \"k\": 3}");
        assert!(matches!(reply, Reply::Act(Action::SemanticSearch(SemanticArgs { depth: 3, .. }))));
    }

    #[test]
    fn test_nested_braces_and_trailing_text() {
        let reply = parse_reply(
            "Action: final_answer\nArgs: {\"question\": \"q\", \"context_block\": \"{not json}\"} then stop",
        );
        assert_eq!(
            reply,
            Reply::Act(Action::FinalAnswer(FinalAnswerArgs {
                question: "q".to_string(),
                context_block: "{not json}".to_string(),
            }))
        );
    }

    #[test]
    fn test_fenced_args() {
        let reply = parse_reply("Action: semantic_search\nArgs: ```json\n{\"query\": \"vpn\"}\n```");
        assert!(matches!(reply, Reply::Act(Action::SemanticSearch(_))));
    }

    #[test]
    fn test_invalid_replies() {
        assert_eq!(parse_reply("I think I need more info"), Reply::Invalid(Invalid::Unparseable));
        assert_eq!(
            parse_reply("Action: web_search\nArgs: {\"query\": \"x\"}"),
            Reply::Invalid(Invalid::UnknownTool("web_search".to_string()))
        );
        assert!(matches!(
            parse_reply("Action: keyword_search\nArgs: {query: x}"),
            Reply::Invalid(Invalid::BadArgs { .. })
        ));
        assert!(matches!(
            parse_reply("Action: keyword_search\nArgs: [\"x\"]"),
            Reply::Invalid(Invalid::BadArgs { .. })
        ));
        assert!(matches!(
            parse_reply("Action: keyword_search\nArgs: {\"k\": 5}"),
            Reply::Invalid(Invalid::BadArgs { .. })
        ));
    }

    #[test]
    fn test_observation_text() {
        assert!(Invalid::UnknownTool("x".into()).observation().contains("unknown tool 'x'"));
        assert!(Invalid::Unparseable.observation().starts_with("Observation:"));
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let prompt = system_prompt(4);
        for tool in [KEYWORD_SEARCH, SEMANTIC_SEARCH, HYBRID_RETRIEVE, FINAL_ANSWER] {
            assert!(prompt.contains(tool));
        }
        assert!(prompt.contains("at most 4 actions"));
    }
}
