//! Core domain types shared by both indexes, the fusion engine and the agents.

use serde::{Deserialize, Serialize};

/// Literal answer returned when no context could be retrieved.
pub const INSUFFICIENT_INFORMATION: &str = "insufficient information";

/// Deterministic chunk identifier, rendered as `<source>:<page>:<index>`.
///
/// Both indexes key their rows by this value so fusion can join them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Wrap an already-rendered identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the rendered identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A loaded document page, before splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Absolute path of the source file.
    pub source: String,

    /// Page number (0 for unpaginated files).
    pub page: u32,

    /// Full page text.
    pub text: String,
}

/// An indexed chunk with its deterministic identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Derived identifier.
    pub id: ChunkId,

    /// Source path.
    pub source: String,

    /// Page number.
    pub page: u32,

    /// Chunk text.
    pub text: String,
}

/// One engine's positional result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHit {
    /// Chunk identifier.
    pub chunk_id: ChunkId,

    /// Source path.
    pub source: String,

    /// Page number.
    pub page: u32,

    /// Snippet (keyword engine) or full payload (semantic engine).
    pub text: String,

    /// Engine-native score, if the engine produced one.
    ///
    /// bm25 for the keyword engine, cosine distance for the semantic engine,
    /// `None` for the unranked substring fallback.
    pub native_score: Option<f64>,
}

/// A chunk after reciprocal rank fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub chunk_id: ChunkId,
    pub source: String,
    pub page: u32,
    /// Full chunk text, resolved from the semantic payload or a batch lookup.
    pub text: String,
    /// 1-based position in the semantic list.
    pub semantic_rank: Option<usize>,
    /// 1-based position in the keyword list.
    pub keyword_rank: Option<usize>,
    /// Sum of `1 / (K + rank)` over every engine that returned the chunk.
    pub rrf_score: f64,
}

impl FusedResult {
    /// Whether the keyword engine returned this chunk.
    pub fn has_keyword_hit(&self) -> bool {
        self.keyword_rank.is_some()
    }
}

/// A citation aligned with a bracket index in the answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub path: String,
    pub page: u32,
    pub chunk_id: ChunkId,
}

impl From<&FusedResult> for Citation {
    fn from(hit: &FusedResult) -> Self {
        Self {
            path: hit.source.clone(),
            page: hit.page,
            chunk_id: hit.chunk_id.clone(),
        }
    }
}

/// A ranked file in a file-lookup response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHit {
    pub path: String,
    /// Page of the representative hit.
    pub top_page: u32,
    /// One-line preview of the representative hit.
    pub preview: String,
    /// Best fused contribution among this file's chunks.
    pub fused_score: f64,
    /// Whether any of this file's chunks came from the keyword engine.
    pub has_keyword_hit: bool,
}

/// Which entry point produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Via {
    Router,
    Agent,
}

impl std::fmt::Display for Via {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Router => "router",
            Self::Agent => "agent",
        };
        write!(f, "{}", s)
    }
}

/// Final output contract of the router and the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Response {
    /// Ranked list of files.
    Files { via: Via, files: Vec<FileHit> },

    /// Cited answer.
    #[serde(rename_all = "camelCase")]
    Answer {
        via: Via,
        answer_text: String,
        citations: Vec<Citation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace: Option<Vec<String>>,
    },
}

impl Response {
    /// Answer response with the literal "insufficient information" text.
    pub fn insufficient(via: Via) -> Self {
        Self::Answer {
            via,
            answer_text: INSUFFICIENT_INFORMATION.to_string(),
            citations: Vec::new(),
            trace: None,
        }
    }

    /// Output mode name as it appears on the wire.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Files { .. } => "files",
            Self::Answer { .. } => "answer",
        }
    }

    /// Entry point that produced the response.
    pub fn via(&self) -> Via {
        match self {
            Self::Files { via, .. } | Self::Answer { via, .. } => *via,
        }
    }
}

/// Index statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of chunks stored.
    pub chunks: usize,

    /// Number of distinct source files.
    pub sources: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_response_wire_shape() {
        let response = Response::Files {
            via: Via::Router,
            files: vec![FileHit {
                path: "/notes/errors.txt".to_string(),
                top_page: 0,
                preview: "HTTP_500 seen".to_string(),
                fused_score: 0.5,
                has_keyword_hit: true,
            }],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "files");
        assert_eq!(json["via"], "router");
        assert_eq!(json["files"][0]["topPage"], 0);
        assert_eq!(json["files"][0]["hasKeywordHit"], true);
    }

    #[test]
    fn test_answer_response_wire_shape() {
        let response = Response::Answer {
            via: Via::Agent,
            answer_text: "It rained [1].".to_string(),
            citations: vec![Citation {
                path: "/notes/a.md".to_string(),
                page: 0,
                chunk_id: ChunkId::new("/notes/a.md:0:0"),
            }],
            trace: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "answer");
        assert_eq!(json["answerText"], "It rained [1].");
        assert_eq!(json["citations"][0]["chunkId"], "/notes/a.md:0:0");
        assert!(json.get("trace").is_none());

        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_insufficient_response() {
        let response = Response::insufficient(Via::Router);
        assert_eq!(response.mode(), "answer");
        match response {
            Response::Answer {
                answer_text,
                citations,
                ..
            } => {
                assert_eq!(answer_text, INSUFFICIENT_INFORMATION);
                assert!(citations.is_empty());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
