//! Answer prompt.

/// Grounded-answer prompt over a numbered context block.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a careful research assistant. Answer ONLY using the sources below.\n\
         If the sources do not contain the answer, say you don't have enough information.\n\
         Cite sources inline using square brackets like [1] or [1][3] at the end of sentences.\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Sources:\n\
         {context}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("who captured Rome in 455?", "[1] source=/r.txt page=0 chunk=/r.txt:0:0\nVandals\n");
        assert!(prompt.starts_with("You are a careful research assistant."));
        let q = prompt.find("Question:\nwho captured Rome in 455?").unwrap();
        let s = prompt.find("Sources:\n[1] source=/r.txt").unwrap();
        assert!(q < s);
        assert!(prompt.contains("[1][3]"));
    }
}
