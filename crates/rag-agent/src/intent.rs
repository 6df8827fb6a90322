//! Intent and query-token heuristics.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Phrases that mark a question as a file lookup.
pub const FILE_LOOKUP_TRIGGERS: &[&str] = &[
    "which file",
    "what file",
    "which document",
    "what document",
    "which doc",
    "where is the file",
    "where can i find the file",
    "which note",
    "which txt",
    "which pdf",
];

/// Glue words ignored when building keyword queries.
pub const STOPWORDS: &[&str] = &[
    "which", "what", "who", "where", "when", "how", "why", "file", "document", "doc",
    "contains", "contain", "mentions", "about", "answers", "answer", "info", "is", "are",
    "was", "were", "be", "to", "of", "in", "on", "for", "with", "and", "or", "the", "a",
    "an", "has", "have", "had", "talk", "talks", "regarding",
];

/// What the router should do with a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    FileLookup,
    Answer,
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("valid regex"))
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9_-]{2,}").expect("valid regex"))
}

fn general_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_-]{3,}").expect("valid regex"))
}

fn quote_or_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[^"]*"|[A-Za-z0-9_-]+"#).expect("valid regex"))
}

fn is_stopword(token: &str) -> bool {
    let lower = token.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// Case-insensitive trigger match.
pub fn classify(question: &str) -> Intent {
    let q = question.to_lowercase();
    if FILE_LOOKUP_TRIGGERS.iter().any(|t| q.contains(t)) {
        Intent::FileLookup
    } else {
        Intent::Answer
    }
}

/// Quoted phrases, then identifier-like words, first-seen order, stopwords removed.
pub fn strong_tokens(question: &str) -> Vec<String> {
    let phrases = quoted_re()
        .captures_iter(question)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str());
    let words = identifier_re().find_iter(question).map(|m| m.as_str());

    let mut seen = HashSet::new();
    phrases
        .chain(words)
        .filter(|t| !is_stopword(t))
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect()
}

/// Quoted tokens, each paired with a naive singular/plural variant, OR-joined.
pub fn fast_path_query(tokens: &[String]) -> String {
    let mut seen = HashSet::new();
    let mut variants = Vec::with_capacity(tokens.len() * 2);

    for token in tokens {
        let alternate = if token.ends_with('s') && token.chars().count() > 3 {
            token[..token.len() - 1].to_string()
        } else {
            format!("{}s", token)
        };
        for v in [format!("\"{}\"", token), format!("\"{}\"", alternate)] {
            if seen.insert(v.clone()) {
                variants.push(v);
            }
        }
    }

    variants.join(" OR ")
}

/// Stopword-filtered OR-of-tokens query with naive plurals.
///
/// Falls back to the question itself when nothing survives.
pub fn general_query(question: &str) -> String {
    let lower = question.to_lowercase();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for m in general_token_re().find_iter(&lower) {
        let token = m.as_str();
        if STOPWORDS.contains(&token) || !seen.insert(token.to_string()) {
            continue;
        }
        tokens.push(token.to_string());
        if !token.ends_with('s') {
            let plural = format!("{}s", token);
            if seen.insert(plural.clone()) {
                tokens.push(plural);
            }
        }
    }

    if tokens.is_empty() {
        question.to_string()
    } else {
        tokens.join(" OR ")
    }
}

/// Wrap bare occurrences of the strong tokens in double quotes.
///
/// Text already inside quotes is left alone. Returns the query unchanged
/// when there are no tokens.
pub fn quoted_variant(query: &str, tokens: &[String]) -> String {
    if tokens.is_empty() {
        return query.to_string();
    }

    let mut out = String::with_capacity(query.len() + tokens.len() * 2);
    let mut last = 0;
    for m in quote_or_word_re().find_iter(query) {
        out.push_str(&query[last..m.start()]);
        let piece = m.as_str();
        if !piece.starts_with('"') && tokens.iter().any(|t| t == piece) {
            out.push('"');
            out.push_str(piece);
            out.push('"');
        } else {
            out.push_str(piece);
        }
        last = m.end();
    }
    out.push_str(&query[last..]);
    out
}
