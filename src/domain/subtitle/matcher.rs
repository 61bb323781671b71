use lazy_static::lazy_static;
use regex::Regex;

use super::model::{
    ProcessedGroup, ProcessedLine, ProcessedWord, SubtitleGroup, WordTimestamp,
};

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"[A-Za-z0-9]+(?:'[A-Za-z0-9]+)?").expect("Expect a valid word token regex");
}

/// Words of a phrase as matched against the transcript.
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    TOKEN.find_iter(text).map(|m| m.as_str())
}

/// Lowercases and drops punctuation, keeping word characters and inner whitespace.
pub fn normalize(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Position of a phrase in the transcript word list, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PhraseMatch {
    first: usize,
    last: usize,
    start: f64,
    end: f64,
}

/// Aligns generated groups with transcript word timestamps.
///
/// Matching is sequential: each group is searched after the previous matched group, and each
/// line after the previous matched line of its group.
pub struct TimestampMatcher<'w> {
    words: &'w [WordTimestamp],
    normalized: Vec<String>,
}

impl<'w> TimestampMatcher<'w> {
    pub fn new(words: &'w [WordTimestamp]) -> Self {
        Self {
            normalized: words.iter().map(|w| normalize(&w.word)).collect(),
            words,
        }
    }

    fn find_at(&self, phrase: &[String], range: std::ops::Range<usize>) -> Option<PhraseMatch> {
        let len = phrase.len();
        if len == 0 || len > self.normalized.len() {
            return None;
        }

        let last_start = self.normalized.len() - len;
        range
            .filter(|i| *i <= last_start)
            .find(|i| self.normalized[*i..*i + len] == *phrase)
            .map(|first| PhraseMatch {
                first,
                last: first + len - 1,
                start: self.words[first].start,
                end: self.words[first + len - 1].end,
            })
    }

    fn find_phrase(&self, phrase: &str, from: usize) -> Option<PhraseMatch> {
        let wanted: Vec<String> = tokens(phrase)
            .map(normalize)
            .filter(|w| !w.is_empty())
            .collect();
        if wanted.is_empty() {
            return None;
        }

        if let Some(found) = self.find_at(&wanted, from..self.normalized.len()) {
            return Some(found);
        }

        if let Some(found) = self.find_at(&wanted, 0..from) {
            tracing::warn!(
                phrase,
                index = found.first,
                expected_after = from,
                "phrase found before the cursor, possible duplicate or out of order match"
            );
            return Some(found);
        }

        tracing::error!(phrase, "could not find phrase anywhere in transcript");
        None
    }

    fn line_words(&self, text: &str, found: PhraseMatch) -> Vec<ProcessedWord> {
        let mut words = Vec::new();
        for (offset, token) in tokens(text).enumerate() {
            let index = found.first + offset;
            if index > found.last {
                tracing::warn!(line = text, "more words in line than matched transcript words");
                break;
            }
            let timestamp = &self.words[index];
            words.push(ProcessedWord {
                id: format!("word-{index}"),
                word: token.to_owned(),
                start: timestamp.start,
                end: timestamp.end,
            });
        }
        words
    }

    /// Adds group, line and word times to the groups of one transcript chunk.
    pub fn process_groups(&self, groups: &[SubtitleGroup]) -> Vec<ProcessedGroup> {
        let mut cursor = 0;
        let mut processed = Vec::with_capacity(groups.len());

        for (idx, group) in groups.iter().enumerate() {
            let group_match = self.find_phrase(&group.group_text, cursor);
            let (start, end) = match group_match {
                Some(found) => {
                    cursor = found.last + 1;
                    (found.start, found.end)
                }
                None => {
                    tracing::warn!(group = idx, text = %group.group_text, "missing timestamp for group");
                    (0.0, 0.0)
                }
            };

            let mut line_cursor = group_match.map(|found| found.first).unwrap_or(cursor);
            let mut lines = Vec::with_capacity(group.lines.len());

            for line in &group.lines {
                let line_match = self.find_phrase(&line.text, line_cursor);

                let (mut line_start, mut line_end) = match line_match {
                    Some(found) => (found.start, found.end),
                    None if group_match.is_some() => (start, end),
                    None => (0.0, 0.0),
                };
                if group_match.is_some() {
                    if line_start < start {
                        tracing::warn!(line = %line.text, "line matched before group start, constraining to group bounds");
                        line_start = start;
                    }
                    if line_end > end {
                        tracing::warn!(line = %line.text, "line matched after group end, constraining to group bounds");
                        line_end = end;
                    }
                }

                let words = match line_match {
                    Some(found) => {
                        line_cursor = found.last + 1;
                        self.line_words(&line.text, found)
                    }
                    None => Vec::new(),
                };

                lines.push(ProcessedLine {
                    id: None,
                    text: line.text.clone(),
                    font_type: line.font_type,
                    start: line_start,
                    end: line_end,
                    words,
                });
            }

            processed.push(ProcessedGroup {
                id: format!("group-{idx}"),
                group_text: group.group_text.clone(),
                start,
                end,
                lines,
            });
        }

        processed
    }
}
