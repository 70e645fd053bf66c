//! Primitive token-overlap "semantic" scorer (spec.md §4.3, §9).
//!
//! Deliberately crude: implementations are explicitly free to swap in
//! embeddings or an LLM judge behind the same
//! `(agent, task_text) -> score in [0,1]` contract without touching the
//! outer scoring arithmetic in [`crate::matcher`].

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "is", "are", "was", "were", "be", "to", "of", "in", "for",
    "on", "with", "as", "at", "by", "from", "this", "that", "it", "its",
];

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| token.len() > 2 && !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

/// Token-overlap score of `task_description` against the agent/card
/// description and every matched capability description.
///
/// Returns `(score, confidence)` both in `[0, 1]`. `score` is the
/// fraction of task tokens found in at least one of the provided
/// description strings; `confidence` scales with the absolute number
/// of matched tokens, saturating at 5.
#[must_use]
pub fn overlap_score(task_description: &str, descriptions: &[&str]) -> (f64, f64) {
    let task_tokens = tokenize(task_description);
    if task_tokens.is_empty() {
        return (0.0, 0.0);
    }

    let corpus_tokens: HashSet<String> = descriptions.iter().flat_map(|d| tokenize(d)).collect();
    let matches = task_tokens.iter().filter(|t| corpus_tokens.contains(*t)).count();

    let score = (matches as f64 / task_tokens.len() as f64).min(1.0);
    let confidence = (matches as f64 / 5.0).min(1.0);
    (score, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_task_description_scores_zero() {
        assert_eq!(overlap_score("", &["reviews code"]), (0.0, 0.0));
    }

    #[test]
    fn full_overlap_scores_one() {
        let (score, confidence) = overlap_score("python code changes", &["reviews python code changes"]);
        assert!((score - 1.0).abs() < f64::EPSILON);
        assert!(confidence > 0.0);
    }

    #[test]
    fn stop_words_and_short_tokens_are_ignored() {
        let (score, _) = overlap_score("is a to of in", &["anything"]);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn partial_overlap_is_fractional() {
        let (score, _) = overlap_score("review the deployment pipeline", &["reviews pipeline"]);
        assert!(score > 0.0 && score < 1.0);
    }
}
