//! Deterministic re-ranking and extractive summaries.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::{FetchOutcome, Query, SearchResult};

/// Character budget of the overview.
pub const DEFAULT_OVERVIEW_CHARS: usize = 600;

/// Maximum number of highlights.
pub const DEFAULT_MAX_HIGHLIGHTS: usize = 5;

/// Overview used when no source carries a snippet.
pub const EMPTY_OVERVIEW: &str = "No concise results matched this query.";

const KEYWORD_WEIGHT: f64 = 0.5;
const MIN_SENTENCE_CHARS: usize = 40;
const MAX_SENTENCE_CHARS: usize = 300;
const NEAR_DUPLICATE_SIMILARITY: f64 = 0.8;

/// Reference sites that get a bonus by default, matched by host suffix.
const DEFAULT_DOMAIN_BONUSES: &[(&str, f64)] = &[
    ("wikipedia.org", 0.3),
    ("rust-lang.org", 0.3),
    ("docs.rs", 0.3),
    ("developer.mozilla.org", 0.3),
    ("python.org", 0.2),
    ("stackoverflow.com", 0.2),
    ("github.com", 0.2),
    ("reuters.com", 0.2),
    ("bbc.com", 0.2),
    ("bbc.co.uk", 0.2),
];

/// Overview and highlights for a set of ranked sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub overview: String,
    pub highlights: Vec<String>,
}

/// Scores, orders and summarizes search results.
#[derive(Debug, Clone)]
pub struct Summarizer {
    /// Host suffix bonuses; the first matching entry applies.
    domain_bonuses: Vec<(String, f64)>,
    overview_chars: usize,
    max_highlights: usize,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self {
            domain_bonuses: DEFAULT_DOMAIN_BONUSES
                .iter()
                .map(|(suffix, bonus)| (suffix.to_string(), *bonus))
                .collect(),
            overview_chars: DEFAULT_OVERVIEW_CHARS,
            max_highlights: DEFAULT_MAX_HIGHLIGHTS,
        }
    }
}

impl Summarizer {
    /// Creates a summarizer with the default bonus table and limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a summarizer with no domain bonuses.
    pub fn without_domain_bonuses() -> Self {
        Self {
            domain_bonuses: Vec::new(),
            ..Self::default()
        }
    }

    /// Sets the bonus for hosts equal to or under `suffix`.
    pub fn set_domain_bonus(&mut self, suffix: impl Into<String>, bonus: f64) {
        let suffix = suffix.into().to_lowercase();
        match self.domain_bonuses.iter_mut().find(|(s, _)| *s == suffix) {
            Some(entry) => entry.1 = bonus,
            None => self.domain_bonuses.push((suffix, bonus)),
        }
    }

    /// Sets the overview budget and highlight count.
    pub fn with_limits(mut self, overview_chars: usize, max_highlights: usize) -> Self {
        self.overview_chars = overview_chars.max(1);
        self.max_highlights = max_highlights;
        self
    }

    /// Bonus for the host of `url`, or 0 when no entry matches.
    pub fn domain_bonus(&self, url: &str) -> f64 {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return 0.0;
        };
        self.domain_bonuses
            .iter()
            .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{suffix}")))
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0.0)
    }

    /// Score of the result at provider position `index` (0-based).
    ///
    /// Rank score `1/(index+1)`, plus the domain bonus, plus
    /// `0.5 × matched/total` query terms found in the title or snippet.
    pub fn score(&self, terms: &[String], index: usize, result: &SearchResult) -> f64 {
        let rank = 1.0 / (index as f64 + 1.0);
        let keyword = if terms.is_empty() {
            0.0
        } else {
            let words = word_set(&format!("{} {}", result.title, result.snippet));
            let matched = terms.iter().filter(|t| words.contains(t.as_str())).count();
            KEYWORD_WEIGHT * matched as f64 / terms.len() as f64
        };
        rank + self.domain_bonus(&result.url) + keyword
    }

    /// Re-orders `results` by descending score. Equal scores keep provider order.
    pub fn rank(&self, query: &Query, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let terms = query.terms();
        let mut scored: Vec<(f64, SearchResult)> = results
            .into_iter()
            .enumerate()
            .map(|(i, result)| (self.score(&terms, i, &result), result))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.into_iter().map(|(_, result)| result).collect()
    }

    /// Builds the overview and highlights from ranked sources and whatever
    /// pages were fetched. Failed fetches are ignored.
    pub fn assemble(
        &self,
        query: &Query,
        sources: &[SearchResult],
        pages: &[FetchOutcome],
    ) -> Summary {
        let snippets = distinct_snippets(sources);
        Summary {
            overview: self.overview(&snippets),
            highlights: self.highlights(&query.terms(), &snippets, pages),
        }
    }

    fn overview(&self, snippets: &[&str]) -> String {
        let Some((first, rest)) = snippets.split_first() else {
            return EMPTY_OVERVIEW.to_string();
        };

        let mut overview = if first.chars().count() > self.overview_chars {
            let mut cut: String = first.chars().take(self.overview_chars - 1).collect();
            cut.truncate(cut.trim_end().len());
            cut.push('…');
            return cut;
        } else {
            first.to_string()
        };

        let mut used = overview.chars().count();
        for snippet in rest {
            let len = snippet.chars().count();
            if used + 1 + len > self.overview_chars {
                break;
            }
            overview.push(' ');
            overview.push_str(snippet);
            used += 1 + len;
        }
        overview
    }

    fn highlights(
        &self,
        terms: &[String],
        snippets: &[&str],
        pages: &[FetchOutcome],
    ) -> Vec<String> {
        let mut candidates: Vec<(usize, &str)> = snippets
            .iter()
            .map(|snippet| (overlap(terms, snippet), *snippet))
            .collect();

        for text in pages.iter().filter_map(FetchOutcome::text) {
            for sentence in sentences(text) {
                let len = sentence.chars().count();
                if !(MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&len) {
                    continue;
                }
                let hits = overlap(terms, sentence);
                if hits > 0 {
                    candidates.push((hits, sentence));
                }
            }
        }

        // Stable: equal overlap keeps origin order.
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let mut chosen: Vec<(String, HashSet<String>)> = Vec::new();
        for (_, text) in candidates {
            if chosen.len() >= self.max_highlights {
                break;
            }
            let words = word_set(text);
            if chosen
                .iter()
                .any(|(_, seen)| jaccard(seen, &words) >= NEAR_DUPLICATE_SIMILARITY)
            {
                continue;
            }
            chosen.push((text.to_string(), words));
        }
        chosen.into_iter().map(|(text, _)| text).collect()
    }
}

/// Non-empty snippets in source order, skipping case-insensitive repeats.
fn distinct_snippets(sources: &[SearchResult]) -> Vec<&str> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .map(|s| s.snippet.trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}

/// Lowercased alphanumeric words.
fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Number of distinct query terms present in `text`.
fn overlap(terms: &[String], text: &str) -> usize {
    let words = word_set(text);
    terms.iter().filter(|t| words.contains(t.as_str())).count()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    let total = a.union(b).count();
    shared as f64 / total as f64
}

fn sentences(text: &str) -> Vec<&str> {
    static SENTENCE: OnceLock<Option<Regex>> = OnceLock::new();
    match SENTENCE.get_or_init(|| Regex::new(r"[^.!?]+(?:[.!?]+|$)").ok()) {
        Some(pattern) => pattern
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect(),
        None => vec![text.trim()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchErrorKind;

    fn query(text: &str) -> Query {
        Query::new(text)
    }

    fn result(title: &str, url: &str, snippet: &str) -> SearchResult {
        SearchResult::new(title, url, snippet)
    }

    #[test]
    fn test_domain_bonus_suffix_match() {
        let summarizer = Summarizer::new();
        assert_eq!(summarizer.domain_bonus("https://en.wikipedia.org/wiki/Rust"), 0.3);
        assert_eq!(summarizer.domain_bonus("https://doc.rust-lang.org/book/"), 0.3);
        assert_eq!(summarizer.domain_bonus("https://notwikipedia.org/"), 0.0);
        assert_eq!(summarizer.domain_bonus("not a url"), 0.0);
    }

    #[test]
    fn test_set_domain_bonus_overrides() {
        let mut summarizer = Summarizer::without_domain_bonuses();
        assert_eq!(summarizer.domain_bonus("https://example.com/"), 0.0);
        summarizer.set_domain_bonus("example.com", 1.0);
        summarizer.set_domain_bonus("Example.com", 2.0);
        assert_eq!(summarizer.domain_bonus("https://www.example.com/"), 2.0);
    }

    #[test]
    fn test_score_components() {
        let summarizer = Summarizer::without_domain_bonuses();
        let terms = query("rust ownership").terms();
        let r = result("Rust book", "https://example.com", "Ownership rules");
        assert!((summarizer.score(&terms, 0, &r) - 1.5).abs() < 1e-9);
        let r = result("Rust book", "https://example.com", "Borrowing");
        assert!((summarizer.score(&terms, 1, &r) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_rank_keeps_provider_order_on_ties() {
        let summarizer = Summarizer::without_domain_bonuses();
        let q = query("zzz");
        // Rank score strictly decreases, so provider order is kept.
        let ranked = summarizer.rank(
            &q,
            vec![
                result("A", "https://a.com", "a"),
                result("B", "https://b.com", "b"),
                result("C", "https://c.com", "c"),
            ],
        );
        let titles: Vec<_> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn test_rank_equal_scores_are_stable() {
        let mut summarizer = Summarizer::without_domain_bonuses();
        // 1/1 + 0 == 1/2 + 0.5
        summarizer.set_domain_bonus("b.com", 0.5);
        let ranked = summarizer.rank(
            &query("zzz"),
            vec![result("A", "https://a.com", "a"), result("B", "https://b.com", "b")],
        );
        assert_eq!(ranked[0].title, "A");
        assert_eq!(ranked[1].title, "B");
    }

    #[test]
    fn test_rank_promotes_keyword_and_domain_matches() {
        let summarizer = Summarizer::new();
        let ranked = summarizer.rank(
            &query("rust ownership model"),
            vec![
                result("Cooking", "https://recipes.com", "Pasta tonight"),
                result(
                    "Rust ownership",
                    "https://doc.rust-lang.org/book/ch04",
                    "The ownership model",
                ),
            ],
        );
        assert_eq!(ranked[0].url, "https://doc.rust-lang.org/book/ch04");
    }

    #[test]
    fn test_overview_joins_snippets_within_budget() {
        let summarizer = Summarizer::new().with_limits(20, 5);
        let sources = vec![
            result("1", "https://a.com", "First part."),
            result("2", "https://b.com", "Second."),
            result("3", "https://c.com", "Third one."),
        ];
        let summary = summarizer.assemble(&query("x"), &sources, &[]);
        assert_eq!(summary.overview, "First part. Second.");
    }

    #[test]
    fn test_overview_truncates_long_first_snippet() {
        let summarizer = Summarizer::new().with_limits(10, 5);
        let sources = vec![result("1", "https://a.com", "abcdefghijklmnop")];
        let summary = summarizer.assemble(&query("x"), &sources, &[]);
        assert_eq!(summary.overview, "abcdefghi…");
        assert_eq!(summary.overview.chars().count(), 10);
    }

    #[test]
    fn test_overview_skips_duplicate_and_empty_snippets() {
        let summarizer = Summarizer::new();
        let sources = vec![
            result("1", "https://a.com", "Same text"),
            result("2", "https://b.com", "  "),
            result("3", "https://c.com", "same TEXT"),
            result("4", "https://d.com", "Other"),
        ];
        let summary = summarizer.assemble(&query("x"), &sources, &[]);
        assert_eq!(summary.overview, "Same text Other");
    }

    #[test]
    fn test_overview_fallback_without_snippets() {
        let summarizer = Summarizer::new();
        let summary = summarizer.assemble(&query("x"), &[result("1", "https://a.com", "")], &[]);
        assert_eq!(summary.overview, EMPTY_OVERVIEW);
        assert!(summary.highlights.is_empty());
    }

    #[test]
    fn test_highlights_include_matching_page_sentences() {
        let summarizer = Summarizer::new();
        let sources = vec![result("1", "https://a.com", "Unrelated snippet text")];
        let page = FetchOutcome::page(
            "https://a.com",
            200,
            Some("text/plain".into()),
            None,
            Some(
                "Short. Rust ownership means each value has a single owner at a time. \
                 This sentence is long enough but mentions nothing relevant at all."
                    .into(),
            ),
        );
        let summary = summarizer.assemble(&query("rust ownership"), &sources, &[page]);
        assert_eq!(
            summary.highlights,
            [
                "Rust ownership means each value has a single owner at a time.",
                "Unrelated snippet text",
            ]
        );
    }

    #[test]
    fn test_highlights_ignore_failed_pages() {
        let summarizer = Summarizer::new();
        let sources = vec![result("1", "https://a.com", "Rust ownership basics")];
        let failed = FetchOutcome::failed("https://a.com", FetchErrorKind::Timeout);
        let summary = summarizer.assemble(&query("rust ownership"), &sources, &[failed]);
        assert_eq!(summary.overview, "Rust ownership basics");
        assert_eq!(summary.highlights, ["Rust ownership basics"]);
    }

    #[test]
    fn test_highlights_drop_near_duplicates_and_cap() {
        let summarizer = Summarizer::new().with_limits(600, 2);
        let sources = vec![
            result("1", "https://a.com", "rust ownership model explained for beginners today"),
            result("2", "https://b.com", "Rust ownership model explained for beginners today!"),
            result("3", "https://c.com", "rust borrow checker"),
            result("4", "https://d.com", "rust lifetimes"),
        ];
        let summary = summarizer.assemble(&query("rust ownership"), &sources, &[]);
        assert_eq!(
            summary.highlights,
            ["rust ownership model explained for beginners today", "rust borrow checker"]
        );
    }

    #[test]
    fn test_sentences() {
        assert_eq!(sentences("One. Two! Three?"), ["One.", "Two!", "Three?"]);
        assert_eq!(sentences("No terminator"), ["No terminator"]);
        assert!(sentences("").is_empty());
    }

    #[test]
    fn test_jaccard() {
        let a = word_set("a b c d");
        let b = word_set("a b c e");
        assert!((jaccard(&a, &b) - 0.6).abs() < 1e-9);
        assert_eq!(jaccard(&a, &a), 1.0);
    }
}
