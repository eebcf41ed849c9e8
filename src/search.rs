use std::collections::HashMap;
use std::time::{Duration, Instant};

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
pub const SEARCH_LIMIT: usize = 20;
pub const MENTION_LIMIT: usize = 8;

/// Holds the latest query until it has been quiet for the delay.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Every keystroke restarts the timer.
    pub fn input(&mut self, query: impl Into<String>, now: Instant) {
        self.pending = Some((query.into(), now + self.delay));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(query, _)| query),
            _ => None,
        }
    }
}

/// Last-request-wins: only the newest generation may apply its result.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestGate {
    generation: u64,
}

impl RequestGate {
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, token: u64) -> bool {
        token == self.generation
    }

    /// Makes every outstanding token stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }
}

/// Per-key generations, e.g. one position write stream per node.
#[derive(Debug, Clone, Default)]
pub struct KeyedGate {
    next: u64,
    latest: HashMap<String, u64>,
}

impl KeyedGate {
    pub fn begin(&mut self, key: &str) -> u64 {
        self.next += 1;
        self.latest.insert(key.to_owned(), self.next);
        self.next
    }

    pub fn is_current(&self, key: &str, token: u64) -> bool {
        self.latest.get(key) == Some(&token)
    }

    /// Returns whether the completion was the latest one for `key`.
    pub fn finish(&mut self, key: &str, token: u64) -> bool {
        let current = self.is_current(key, token);
        if current {
            self.latest.remove(key);
        }
        current
    }

    pub fn in_flight(&self) -> usize {
        self.latest.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionCandidate {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// The `@word` being typed at `cursor` (a byte offset), as `(at_index, query)`.
///
/// The `@` must start the text or follow whitespace.
pub fn mention_query(text: &str, cursor: usize) -> Option<(usize, &str)> {
    let before = text.get(..cursor)?;
    let at = before.rfind('@')?;
    let query = &before[at + 1..];
    if query.chars().any(char::is_whitespace) {
        return None;
    }
    let starts_word = before[..at]
        .chars()
        .next_back()
        .is_none_or(char::is_whitespace);
    starts_word.then_some((at, query))
}

/// Best title matches first; an empty query lists candidates alphabetically.
pub fn mention_suggestions<'a>(
    candidates: &'a [MentionCandidate],
    query: &str,
    limit: usize,
) -> Vec<&'a MentionCandidate> {
    if query.is_empty() {
        let mut all = candidates.iter().collect::<Vec<_>>();
        all.sort_by(|a, b| a.title.cmp(&b.title));
        all.truncate(limit);
        return all;
    }

    let matcher = SkimMatcherV2::default();
    let mut scored = candidates
        .iter()
        .filter_map(|candidate| {
            let score = fuzzy_match_score(&matcher, &candidate.title, query)
                .max(fuzzy_match_score(&matcher, &candidate.id, query))?;
            Some((score, candidate))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|(left_score, left), (right_score, right)| {
        right_score
            .cmp(left_score)
            .then_with(|| left.title.cmp(&right.title))
    });
    scored.into_iter().take(limit).map(|(_, candidate)| candidate).collect()
}

/// Replace the `@query` at `at` with `@id ` and return the new cursor offset.
pub fn insert_mention(text: &mut String, at: usize, cursor: usize, id: &str) -> usize {
    let replacement = format!("@{id} ");
    text.replace_range(at..cursor, &replacement);
    at + replacement.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str) -> MentionCandidate {
        MentionCandidate {
            id: id.to_owned(),
            title: title.to_owned(),
        }
    }

    #[test]
    fn debouncer_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.input("ca", start);
        debouncer.input("cache", start + Duration::from_millis(200));

        assert_eq!(debouncer.poll(start + Duration::from_millis(400)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(500)),
            Some("cache".to_owned())
        );
        assert_eq!(debouncer.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn cancelled_debounce_never_fires() {
        let start = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.input("x", start);
        debouncer.cancel();
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.poll(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn slow_earlier_response_is_discarded() {
        let mut gate = RequestGate::default();
        let first = gate.begin();
        let second = gate.begin();
        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));
        gate.invalidate();
        assert!(!gate.is_current(second));
    }

    #[test]
    fn keyed_gate_tracks_each_node_separately() {
        let mut gate = KeyedGate::default();
        let a1 = gate.begin("a");
        let b1 = gate.begin("b");
        let a2 = gate.begin("a");

        assert!(!gate.finish("a", a1));
        assert!(gate.finish("b", b1));
        assert_eq!(gate.in_flight(), 1);
        assert!(gate.finish("a", a2));
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn mention_query_requires_word_start() {
        assert_eq!(mention_query("hi @cac", 7), Some((3, "cac")));
        assert_eq!(mention_query("@", 1), Some((0, "")));
        assert_eq!(mention_query("mail@host", 9), None);
        assert_eq!(mention_query("@done now", 9), None);
        assert_eq!(mention_query("short", 99), None);
    }

    #[test]
    fn suggestions_rank_fuzzy_title_matches() {
        let candidates = [
            candidate("bm_1", "Cache layer"),
            candidate("bm_2", "Release checklist"),
            candidate("bm_3", "Archive"),
        ];
        let found = mention_suggestions(&candidates, "cache", MENTION_LIMIT);
        assert_eq!(found.first().map(|item| item.id.as_str()), Some("bm_1"));
        assert_eq!(found.len(), 1);

        let all = mention_suggestions(&candidates, "", 2);
        assert_eq!(
            all.iter().map(|item| item.title.as_str()).collect::<Vec<_>>(),
            ["Archive", "Cache layer"]
        );
    }

    #[test]
    fn inserting_a_mention_replaces_the_query() {
        let mut text = "see @cac please".to_owned();
        let cursor = insert_mention(&mut text, 4, 8, "bm_1");
        assert_eq!(text, "see @bm_1  please");
        assert_eq!(cursor, 10);
    }
}
