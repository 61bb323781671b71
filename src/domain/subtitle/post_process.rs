use super::model::GroupWithHighlight;

/// Default word limit of a group before it is split.
pub const DEFAULT_MAX_WORDS: usize = 8;

fn strip_non_word(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// First longest word, by character count.
fn longest(words: &[&str]) -> Option<String> {
    let mut best: Option<&str> = None;
    for word in words {
        if best.map_or(true, |b| word.chars().count() > b.chars().count()) {
            best = Some(word);
        }
    }
    best.map(String::from)
}

/// Splits oversized groups into the fewest groups within the limit, sizes differing by at most one.
#[derive(Debug, Clone, Copy)]
pub struct EvenSplit {
    max_words: usize,
}

impl Default for EvenSplit {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORDS)
    }
}

impl EvenSplit {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
        }
    }

    pub fn process(&self, groups: Vec<String>) -> Vec<String> {
        let mut result = Vec::with_capacity(groups.len());
        for group in groups {
            let words: Vec<&str> = group.split_whitespace().collect();
            if words.len() <= self.max_words {
                result.push(group);
                continue;
            }

            let parts = self.split(&words);
            tracing::info!(
                words = words.len(),
                parts = parts.len(),
                "split oversized group"
            );
            result.extend(parts);
        }
        result
    }

    fn split(&self, words: &[&str]) -> Vec<String> {
        let count = words.len();
        let parts = (count + self.max_words - 1) / self.max_words;
        let base = count / parts;
        let remainder = count % parts;

        let mut result = Vec::with_capacity(parts);
        let mut offset = 0;
        for i in 0..parts {
            let size = base + usize::from(i < remainder);
            result.push(words[offset..offset + size].join(" "));
            offset += size;
        }
        result
    }
}

/// Splits oversized highlighted groups in two, keeping one highlight per half.
#[derive(Debug, Clone, Copy)]
pub struct HighlightSplit {
    max_words: usize,
}

impl Default for HighlightSplit {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORDS)
    }
}

impl HighlightSplit {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }

    pub fn process(&self, groups: Vec<GroupWithHighlight>) -> Vec<GroupWithHighlight> {
        let mut result = Vec::with_capacity(groups.len());
        for group in groups {
            if group.group_text.split_whitespace().count() <= self.max_words {
                result.push(group);
            } else {
                result.extend(Self::split(&group));
            }
        }
        result
    }

    fn split(group: &GroupWithHighlight) -> Vec<GroupWithHighlight> {
        let words: Vec<&str> = group.group_text.split_whitespace().collect();
        let highlight = group.highlight_word.as_deref();

        let clean_highlight = highlight.map(strip_non_word).unwrap_or_default();
        let highlight_idx = if clean_highlight.is_empty() {
            None
        } else {
            words.iter().position(|w| strip_non_word(w) == clean_highlight)
        };

        let split_point = words.len() / 2;
        let (first, second) = words.split_at(split_point);
        let fallback = |half: &[&str]| {
            if half.len() > 1 {
                longest(half)
            } else {
                None
            }
        };

        let (first_highlight, second_highlight) = match highlight_idx {
            Some(idx) if idx < split_point => (highlight.map(String::from), fallback(second)),
            Some(_) => (fallback(first), highlight.map(String::from)),
            None => (fallback(first), fallback(second)),
        };

        [(first, first_highlight), (second, second_highlight)]
            .into_iter()
            .filter(|(half, _)| !half.is_empty())
            .map(|(half, highlight_word)| GroupWithHighlight {
                group_text: half.join(" "),
                highlight_word,
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn words(n: usize) -> String {
        (1..=n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn even_split_keeps_small_groups() {
        let groups = vec!["a b c".to_owned()];
        assert_eq!(EvenSplit::default().process(groups.clone()), groups);
    }

    #[test]
    fn even_split_balances_parts() {
        let parts = EvenSplit::new(8).process(vec![words(12)]);
        assert_eq!(parts, vec!["w1 w2 w3 w4 w5 w6", "w7 w8 w9 w10 w11 w12"]);

        let parts = EvenSplit::new(8).process(vec![words(17)]);
        let sizes: Vec<usize> = parts.iter().map(|p| p.split(' ').count()).collect();
        assert_eq!(sizes, vec![6, 6, 5]);
        assert_eq!(parts.join(" "), words(17));
    }

    #[test]
    fn highlight_stays_in_its_half() {
        let group = GroupWithHighlight::new(
            "one two three four five six seven eight nine ten",
            Some("two"),
        );
        let parts = HighlightSplit::new(8).process(vec![group]);

        assert_eq!(
            parts,
            vec![
                GroupWithHighlight::new("one two three four five", Some("two")),
                GroupWithHighlight::new("six seven eight nine ten", Some("seven")),
            ]
        );
    }

    #[test]
    fn highlight_in_second_half() {
        let group = GroupWithHighlight::new("a bb ccc dd e f g h hi", Some("Hi!"));
        let parts = HighlightSplit::new(8).process(vec![group]);

        assert_eq!(parts[0].highlight_word.as_deref(), Some("ccc"));
        assert_eq!(parts[1].highlight_word.as_deref(), Some("Hi!"));
    }

    #[test]
    fn missing_highlight_picks_longest_words() {
        let group = GroupWithHighlight::new("aa bbb cc dd ee ffff g hh i", None);
        let parts = HighlightSplit::new(8).process(vec![group]);

        assert_eq!(parts[0].group_text, "aa bbb cc dd");
        assert_eq!(parts[0].highlight_word.as_deref(), Some("bbb"));
        assert_eq!(parts[1].highlight_word.as_deref(), Some("ffff"));
    }
}
