use super::model::{FontType, GroupWithHighlight, SubtitleGroup, SubtitleLine};

/// Maximum lines a group is displayed on.
const MAX_LINES: usize = 3;

/// Fonts a rule based style draws lines with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontConfig {
    /// Font of the highlight line, `None` when the style does not isolate highlights.
    pub highlight: Option<FontType>,
    /// Fonts alternated across the other lines.
    pub supporting: Vec<FontType>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            highlight: None,
            supporting: vec![FontType::Normal],
        }
    }
}

impl FontConfig {
    pub fn uses_highlight(&self) -> bool {
        self.highlight.is_some()
    }

    pub fn highlight_font(&self) -> FontType {
        self.highlight.unwrap_or(FontType::Bold)
    }

    pub fn supporting_fonts(&self) -> Vec<FontType> {
        if self.supporting.is_empty() {
            vec![FontType::Normal]
        } else {
            self.supporting.clone()
        }
    }
}

fn clean_word(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_owned()
}

fn chunk_words(words: &[&str], size: usize) -> Vec<String> {
    words.chunks(size.max(1)).map(|c| c.join(" ")).collect()
}

fn merge_lines(first: &SubtitleLine, second: &SubtitleLine) -> SubtitleLine {
    SubtitleLine::new(format!("{} {}", first.text, second.text), first.font_type)
}

/// Rule based line breaking anchored on the highlight word of a group.
#[derive(Debug, Clone)]
pub struct HybridLineDivider {
    max_words: usize,
    fonts: FontConfig,
}

impl HybridLineDivider {
    pub const DEFAULT_MAX_WORDS_PER_LINE: usize = 3;

    pub fn new(max_words_per_line: usize, fonts: FontConfig) -> Self {
        Self {
            max_words: max_words_per_line,
            fonts,
        }
    }

    pub fn divide_groups(&self, groups: &[GroupWithHighlight]) -> Vec<SubtitleGroup> {
        groups.iter().map(|g| self.divide_group(g)).collect()
    }

    pub fn divide_group(&self, group: &GroupWithHighlight) -> SubtitleGroup {
        let text = &group.group_text;
        let highlight = match group.highlight_word.as_deref() {
            Some(highlight)
                if self.fonts.uses_highlight()
                    && !highlight.is_empty()
                    && text.contains(highlight) =>
            {
                highlight
            }
            _ => return self.divide_plain(text),
        };

        let words: Vec<&str> = text.split_whitespace().collect();
        let clean_highlight = clean_word(highlight);
        let Some(highlight_idx) = words.iter().position(|w| clean_word(w) == clean_highlight)
        else {
            tracing::warn!(highlight, group = %text, "highlight word not found in group");
            return self.divide_plain(text);
        };

        let supporting = self.fonts.supporting_fonts();
        let before = chunk_words(&words[..highlight_idx], self.max_words);
        let after = chunk_words(&words[highlight_idx + 1..], self.max_words);

        let mut lines: Vec<SubtitleLine> = Vec::with_capacity(before.len() + after.len() + 1);
        for (i, chunk) in before.iter().enumerate() {
            lines.push(SubtitleLine::new(chunk.as_str(), supporting[i % supporting.len()]));
        }
        lines.push(SubtitleLine::new(
            words[highlight_idx],
            self.fonts.highlight_font(),
        ));
        let offset = before.len() % supporting.len();
        for (i, chunk) in after.iter().enumerate() {
            lines.push(SubtitleLine::new(
                chunk.as_str(),
                supporting[(offset + i) % supporting.len()],
            ));
        }

        SubtitleGroup {
            group_text: text.clone(),
            lines: self.optimize_lines(lines, &supporting),
        }
    }

    fn divide_plain(&self, text: &str) -> SubtitleGroup {
        let words: Vec<&str> = text.split_whitespace().collect();
        let supporting = self.fonts.supporting_fonts();

        SubtitleGroup {
            group_text: text.to_owned(),
            lines: chunk_words(&words, self.max_words)
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| SubtitleLine::new(chunk, supporting[i % supporting.len()]))
                .collect(),
        }
    }

    /// Reduces the lines to at most three, merging supporting lines around the highlight.
    fn optimize_lines(
        &self,
        lines: Vec<SubtitleLine>,
        supporting: &[FontType],
    ) -> Vec<SubtitleLine> {
        if lines.len() <= MAX_LINES {
            return lines;
        }

        let highlight_font = self.fonts.highlight_font();
        let Some(highlight_idx) = lines.iter().position(|l| l.font_type == highlight_font) else {
            return lines
                .into_iter()
                .take(MAX_LINES)
                .enumerate()
                .map(|(i, l)| SubtitleLine::new(l.text, supporting[i % supporting.len()]))
                .collect();
        };

        let mut before = lines[..highlight_idx].to_vec();
        let highlight = lines[highlight_idx].clone();
        let mut after = lines[highlight_idx + 1..].to_vec();

        let merge_before = |before: &mut Vec<SubtitleLine>| {
            let last = before.pop();
            if let (Some(last), Some(prev)) = (last, before.last_mut()) {
                *prev = merge_lines(prev, &last);
            }
        };
        let merge_after = |after: &mut Vec<SubtitleLine>| {
            let second = after.remove(1);
            after[0] = merge_lines(&after[0], &second);
        };

        while before.len() > 1 && after.len() > 1 {
            if before.len() >= after.len() {
                merge_before(&mut before);
            } else {
                merge_after(&mut after);
            }
        }

        while before.len() + 1 + after.len() > MAX_LINES {
            if before.len() > 1 {
                merge_before(&mut before);
            } else if after.len() > 1 {
                merge_after(&mut after);
            } else {
                break;
            }
        }

        let mut result = before;
        result.push(highlight);
        result.extend(after);

        if result.len() == MAX_LINES && supporting.len() >= 2 {
            let others: Vec<usize> = result
                .iter()
                .enumerate()
                .filter(|(_, l)| l.font_type != highlight_font)
                .map(|(i, _)| i)
                .collect();
            if let [first, second] = others[..] {
                if result[first].font_type == result[second].font_type {
                    result[second].font_type = if result[first].font_type == supporting[0] {
                        supporting[1]
                    } else {
                        supporting[0]
                    };
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn divider() -> HybridLineDivider {
        HybridLineDivider::new(
            3,
            FontConfig {
                highlight: Some(FontType::Bold),
                supporting: vec![FontType::Normal, FontType::Thin],
            },
        )
    }

    fn shape(group: &SubtitleGroup) -> Vec<(&str, FontType)> {
        group
            .lines
            .iter()
            .map(|l| (l.text.as_str(), l.font_type))
            .collect()
    }

    #[test]
    fn highlight_isolated_on_its_line() {
        let group = divider().divide_group(&GroupWithHighlight::new(
            "The secret ingredient to make",
            Some("ingredient"),
        ));

        assert_eq!(
            shape(&group),
            vec![
                ("The secret", FontType::Normal),
                ("ingredient", FontType::Bold),
                ("to make", FontType::Thin),
            ]
        );
    }

    #[test]
    fn highlight_keeps_group_punctuation() {
        let group =
            divider().divide_group(&GroupWithHighlight::new("Stop. Right now!", Some("now")));

        assert_eq!(
            shape(&group),
            vec![("Stop. Right", FontType::Normal), ("now!", FontType::Bold)]
        );
    }

    #[test]
    fn no_highlight_alternates_supporting_fonts() {
        let group = divider().divide_group(&GroupWithHighlight::new("a b c d e f g", None));

        assert_eq!(
            shape(&group),
            vec![
                ("a b c", FontType::Normal),
                ("d e f", FontType::Thin),
                ("g", FontType::Normal),
            ]
        );
    }

    #[test]
    fn style_without_highlight_ignores_it() {
        let plain = HybridLineDivider::new(3, FontConfig::default());
        let group = plain.divide_group(&GroupWithHighlight::new("one two", Some("two")));

        assert_eq!(shape(&group), vec![("one two", FontType::Normal)]);
    }

    #[test]
    fn unknown_highlight_falls_back_to_plain() {
        let group = divider().divide_group(&GroupWithHighlight::new("one two", Some("three")));
        assert_eq!(shape(&group), vec![("one two", FontType::Normal)]);
    }

    #[test]
    fn long_groups_are_reduced_to_three_lines() {
        let group = divider().divide_group(&GroupWithHighlight::new(
            "a b c d e f g HERE h i j k",
            Some("HERE"),
        ));

        assert_eq!(
            shape(&group),
            vec![
                ("a b c d e f g", FontType::Normal),
                ("HERE", FontType::Bold),
                ("h i j k", FontType::Thin),
            ]
        );
    }

    #[test]
    fn merged_supporting_lines_alternate_fonts() {
        let group = divider().divide_group(&GroupWithHighlight::new(
            "a b c d e f HERE g",
            Some("HERE"),
        ));

        assert_eq!(
            shape(&group),
            vec![
                ("a b c d e f", FontType::Normal),
                ("HERE", FontType::Bold),
                ("g", FontType::Thin),
            ]
        );
    }
}
