// crates/analytics-core/src/text.rs
//! Shared text-processing helpers for the analyzers: tokenization,
//! stopword filtering, n-gram extraction, and the technical/business
//! pattern sets used to score candidate topics.

use regex_lite::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &[
    "the", "and", "that", "this", "with", "from", "have", "what", "when", "where", "which",
    "would", "could", "should", "about", "there", "their", "them", "then", "than", "into",
    "your", "just", "like", "does", "also", "some", "will", "been", "were", "being", "they",
    "these", "those", "such", "only", "over", "more", "most", "very", "each", "other", "here",
    "because", "while", "after", "before", "again", "still", "even", "much", "many", "both",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static CELL: OnceLock<HashSet<&'static str>> = OnceLock::new();
    CELL.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Lowercased alphanumeric-word tokens, punctuation stripped.
pub fn tokenize(content: &str) -> Vec<String> {
    content
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Meaningful single words: length >= 4, not a stopword.
pub fn meaningful_words(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|w| w.len() >= 4 && !stopwords().contains(w.as_str()))
        .cloned()
        .collect()
}

/// Adjacent-word bigrams over the raw token stream, skipping any pair
/// where either half is a stopword.
pub fn bigrams(tokens: &[String]) -> Vec<String> {
    tokens
        .windows(2)
        .filter(|w| !stopwords().contains(w[0].as_str()) && !stopwords().contains(w[1].as_str()))
        .map(|w| format!("{} {}", w[0], w[1]))
        .collect()
}

/// A curated set of technical trigrams recognized verbatim when they
/// occur as a contiguous token run.
const TECHNICAL_TRIGRAMS: &[&str] = &[
    "single point failure",
    "root cause analysis",
    "continuous integration pipeline",
    "object relational mapping",
    "content delivery network",
];

pub fn technical_trigrams(tokens: &[String]) -> Vec<String> {
    tokens
        .windows(3)
        .map(|w| format!("{} {} {}", w[0], w[1], w[2]))
        .filter(|t| TECHNICAL_TRIGRAMS.contains(&t.as_str()))
        .collect()
}

fn technical_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r"(?i)\b(api|database|server|client|algorithm|function|variable|deploy\w*|cach\w*|queue|thread|async|latency|throughput|schema|endpoint|kubernetes|docker|container)\b").unwrap()
    })
}

fn business_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r"(?i)\b(budget|revenue|stakeholder|roadmap|deadline|customer|market\w*|pricing|roi|kpi|strategy|quarter\w*)\b").unwrap()
    })
}

/// Matches of the recognized technical vocabulary in `content`, lowercased.
pub fn technical_terms(content: &str) -> Vec<String> {
    technical_pattern().find_iter(content).map(|m| m.as_str().to_lowercase()).collect()
}

/// Matches of the recognized business vocabulary in `content`, lowercased.
pub fn business_terms(content: &str) -> Vec<String> {
    business_pattern().find_iter(content).map(|m| m.as_str().to_lowercase()).collect()
}

/// A candidate topic with its raw frequency and whether it is
/// multi-word / a recognized technical term (both earn score boosts).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTopic {
    pub topic: String,
    pub frequency: u32,
    pub score: f64,
}

/// Extracts and frequency-scores candidate topics from `content`:
/// meaningful single words, bigrams, recognized technical trigrams, and
/// the technical/business pattern sets. Multi-word topics get a 1.5x
/// boost; recognized technical terms get 1.3x.
pub fn extract_topics(content: &str) -> Vec<ScoredTopic> {
    let tokens = tokenize(content);
    let mut counts: BTreeMap<String, (u32, bool, bool)> = BTreeMap::new();

    let mut bump = |key: String, multi_word: bool, technical: bool| {
        let entry = counts.entry(key).or_insert((0, multi_word, technical));
        entry.0 += 1;
        entry.1 |= multi_word;
        entry.2 |= technical;
    };

    for word in meaningful_words(&tokens) {
        bump(word, false, false);
    }
    for bg in bigrams(&tokens) {
        bump(bg, true, false);
    }
    for tg in technical_trigrams(&tokens) {
        bump(tg, true, true);
    }
    for term in technical_terms(content) {
        bump(term, false, true);
    }
    for term in business_terms(content) {
        bump(term, false, false);
    }

    counts
        .into_iter()
        .map(|(topic, (frequency, multi_word, technical))| {
            let mut score = frequency as f64;
            if multi_word {
                score *= 1.5;
            }
            if technical {
                score *= 1.3;
            }
            ScoredTopic { topic, frequency, score }
        })
        .collect()
}

/// Heuristic "is this message a question" check: ends with '?' or opens
/// with a wh-word/how.
pub fn is_question(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.ends_with('?') {
        return true;
    }
    let lower = trimmed.to_lowercase();
    ["what", "why", "how", "when", "where", "which", "who", "could you", "can you"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Weight applied to a question by its probing depth: "why"/"how"/"what if"
/// questions dig deeper than simple yes/no or factual "what is" questions.
pub fn question_depth_weight(content: &str) -> f64 {
    let lower = content.to_lowercase();
    if lower.contains("what if") || lower.starts_with("why") || lower.contains(" why ") {
        1.0
    } else if lower.starts_with("how") || lower.contains(" how ") {
        0.75
    } else if is_question(content) {
        0.4
    } else {
        0.0
    }
}

/// Explicit uncertainty markers ("not sure", "unclear", "confused", ...),
/// used by the knowledge-gap detector to find unresolved questions.
pub fn has_uncertainty_marker(content: &str) -> bool {
    let lower = content.to_lowercase();
    ["not sure", "unsure", "unclear", "confused", "don't understand", "no idea", "uncertain"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_punctuation_and_lowercases() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn meaningful_words_drops_short_and_stop_words() {
        let tokens = tokenize("the cat sat on a mat about databases");
        let words = meaningful_words(&tokens);
        assert!(words.contains(&"databases".to_string()));
        assert!(!words.contains(&"the".to_string()));
    }

    #[test]
    fn extract_topics_boosts_multi_word_and_technical() {
        let topics = extract_topics("the database schema and the database schema design");
        let schema_bigram = topics.iter().find(|t| t.topic == "database schema");
        assert!(schema_bigram.is_some());
        assert!(schema_bigram.unwrap().score > schema_bigram.unwrap().frequency as f64);
    }

    #[test]
    fn is_question_detects_question_mark_and_wh_prefix() {
        assert!(is_question("What is the plan?"));
        assert!(is_question("why does this fail"));
        assert!(!is_question("The plan is set."));
    }

    #[test]
    fn question_depth_weight_ranks_why_above_how_above_factual() {
        assert!(question_depth_weight("why did this happen") > question_depth_weight("how do I fix it"));
        assert!(question_depth_weight("how do I fix it") > question_depth_weight("is this done?"));
    }

    #[test]
    fn uncertainty_marker_detects_common_phrasings() {
        assert!(has_uncertainty_marker("I'm not sure how this works"));
        assert!(!has_uncertainty_marker("This works as expected"));
    }
}
