//! Fuzzy matching of transcripts against the catalog's variant list.
//!
//! Scores are on a 0–100 scale:
//!
//! ```text
//! similarity(a, b) = max(ratio, 0.95 × token_sort_ratio, 0.95 × token_set_ratio)
//! ratio(a, b)      = 200 × LCS(a, b) / (|a| + |b|)      (characters)
//! ```
//!
//! Inputs are lowercased and punctuation is folded to spaces before scoring,
//! so `"Turn on the light."` and `"turn on the light"` score identically.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::catalog::CommandCatalog;

/// Weight applied to the token-based scores so an exact character match
/// always outranks a reordered one.
const TOKEN_WEIGHT: f64 = 0.95;

fn preprocess(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized indel similarity of two strings.  `0.0` when either is empty.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / (a.len() + b.len()) as f64
}

/// [`ratio`] after sorting the whitespace-separated tokens of both sides.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    fn sorted(s: &str) -> String {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    }
    ratio(&sorted(a), &sorted(b))
}

/// Set-based comparison: shared tokens score 100 when one side's tokens are
/// a subset of the other's.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let sect: Vec<&str> = ta.intersection(&tb).copied().collect();
    let diff_ab: Vec<&str> = ta.difference(&tb).copied().collect();
    let diff_ba: Vec<&str> = tb.difference(&ta).copied().collect();

    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = sect.join(" ");
    let join = |diff: &[&str]| {
        if sect.is_empty() {
            diff.join(" ")
        } else {
            format!("{sect} {}", diff.join(" "))
        }
    };
    let sect_ab = join(&diff_ab);
    let sect_ba = join(&diff_ba);

    ratio(&sect, &sect_ab)
        .max(ratio(&sect, &sect_ba))
        .max(ratio(&sect_ab, &sect_ba))
}

/// Combined similarity score in `[0, 100]`.
///
/// ```
/// use voice_trigger::commands::similarity;
///
/// assert_eq!(similarity("light on", "Light on!"), 100.0);
/// assert!(similarity("turn on the light", "light on") >= 70.0);
/// assert!(similarity("play music", "light on") < 70.0);
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = preprocess(a);
    let b = preprocess(b);
    ratio(&a, &b)
        .max(TOKEN_WEIGHT * token_sort_ratio(&a, &b))
        .max(TOKEN_WEIGHT * token_set_ratio(&a, &b))
}

/// Index and score of the best candidate at or above `cutoff`.  Ties keep the
/// earliest candidate.
pub fn best_match_in<S: AsRef<str>>(
    query: &str,
    candidates: &[S],
    cutoff: f64,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let score = similarity(query, candidate.as_ref());
        if score < cutoff {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((i, score));
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub key: String,
    pub variant: String,
    pub action: String,
    pub score: f64,
}

pub struct CommandMatcher {
    catalog: Arc<CommandCatalog>,
    cutoff: f64,
}

impl CommandMatcher {
    pub fn new(catalog: Arc<CommandCatalog>, cutoff: f64) -> Self {
        Self { catalog, cutoff }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn best_match(&self, text: &str) -> Option<MatchResult> {
        let variants = self.catalog.variants();
        let (index, score) = best_match_in(text, variants, self.cutoff)?;
        let variant = &variants[index];
        let target = self.catalog.lookup(variant)?;
        Some(MatchResult {
            key: target.key.clone(),
            variant: variant.clone(),
            action: target.action.clone(),
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<CommandCatalog> {
        let csv = "\
key,variants,action
Light On,light on|turn on light|led ON,led ON
Light Off,light off|turn off light,led OFF
Motor Forward,motor forward|go forward,motor FORWARD
";
        Arc::new(CommandCatalog::from_reader(csv.as_bytes()).unwrap())
    }

    #[test]
    fn ratio_basics() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("", "abc"), 0.0);
        assert_eq!(ratio("", ""), 0.0);
        // LCS("abcd", "abxd") = 3 → 200·3/8
        assert!((ratio("abcd", "abxd") - 75.0).abs() < 1e-9);
    }

    #[test]
    fn token_sort_ignores_order() {
        assert_eq!(token_sort_ratio("light on", "on light"), 100.0);
        assert!((similarity("light on", "on light") - 95.0).abs() < 1e-9);
    }

    #[test]
    fn token_set_subset_scores_full() {
        assert_eq!(token_set_ratio("turn on the light", "light on"), 100.0);
        assert!(token_set_ratio("turn on the light", "led on") < 70.0);
    }

    #[test]
    fn turn_on_the_light_resolves_to_led_on() {
        let m = CommandMatcher::new(catalog(), 70.0);
        let result = m.best_match("turn on the light").unwrap();
        assert_eq!(result.key, "Light On");
        assert_eq!(result.variant, "light on");
        assert_eq!(result.action, "led ON");
        assert!(result.score >= 70.0);
    }

    #[test]
    fn ties_keep_catalog_order() {
        let (index, score) =
            best_match_in("turn on the light", &["light on", "turn on light"], 70.0).unwrap();
        assert_eq!(index, 0);
        assert!((score - 95.0).abs() < 1e-9);
    }

    #[test]
    fn below_cutoff_is_no_match() {
        let m = CommandMatcher::new(catalog(), 70.0);
        assert_eq!(m.best_match("play some music"), None);
        assert_eq!(m.best_match(""), None);
    }

    #[test]
    fn punctuation_does_not_affect_score() {
        assert_eq!(
            similarity("Go forward.", "go forward"),
            similarity("go forward", "go forward")
        );
    }

    #[test]
    fn matching_is_deterministic() {
        let m = CommandMatcher::new(catalog(), 70.0);
        let first = m.best_match("motor go forward please");
        for _ in 0..10 {
            assert_eq!(m.best_match("motor go forward please"), first);
        }
        assert_eq!(first.unwrap().action, "motor FORWARD");
    }
}
