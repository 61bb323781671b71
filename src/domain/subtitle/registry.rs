use serde_json::Value;

use super::{
    divider::FontConfig,
    model::{FontType, GROUPS_SCHEMA, HIGHLIGHT_SCHEMA, TIMELINE_SCHEMA},
};

/// What the language model is asked to produce for a style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Complete groups with their lines and fonts.
    Timeline,
    /// Groups with a highlight word, broken into lines by rule.
    Highlight(FontConfig),
    /// Plain groups, evenly split and broken into lines by rule.
    Groups(FontConfig),
}

impl Generation {
    pub fn schema(&self) -> (&'static str, &'static Value) {
        match self {
            Generation::Timeline => ("subtitle_timeline", &*TIMELINE_SCHEMA),
            Generation::Highlight(_) => ("highlight_groups", &*HIGHLIGHT_SCHEMA),
            Generation::Groups(_) => ("subtitle_groups", &*GROUPS_SCHEMA),
        }
    }
}

/// Caption generation strategy of a named style.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub generation: Generation,
    pub max_words_special: usize,
    pub max_words_regular: usize,
    pub model: &'static str,
    pub max_concurrent: usize,
    /// Maximum transcript chunk length sent in one request, in seconds.
    pub max_chunk: f64,
}

impl StyleConfig {
    pub const DEFAULT_MODEL: &'static str = "gpt-5.1";
    pub const DEFAULT_MAX_CONCURRENT: usize = 30;
    pub const DEFAULT_MAX_CHUNK: f64 = 59.0;

    fn new(
        name: &'static str,
        system_prompt: &'static str,
        generation: Generation,
        max_words_special: usize,
        max_words_regular: usize,
    ) -> Self {
        Self {
            name,
            system_prompt,
            generation,
            max_words_special,
            max_words_regular,
            model: Self::DEFAULT_MODEL,
            max_concurrent: Self::DEFAULT_MAX_CONCURRENT,
            max_chunk: Self::DEFAULT_MAX_CHUNK,
        }
    }
}

pub const STYLE_NAMES: [&str; 5] = ["two_line", "matt", "three_line_margin", "highlight", "minimal"];

/// Looks up a style by name.
pub fn style_config(name: &str) -> Option<StyleConfig> {
    let config = match name {
        "two_line" => StyleConfig::new(
            "two_line",
            include_str!("prompts/two_line.md"),
            Generation::Timeline,
            5,
            3,
        ),
        "matt" => StyleConfig::new(
            "matt",
            include_str!("prompts/matt.md"),
            Generation::Timeline,
            6,
            4,
        ),
        "three_line_margin" => StyleConfig::new(
            "three_line_margin",
            include_str!("prompts/three_line_margin.md"),
            Generation::Timeline,
            7,
            3,
        ),
        "highlight" => StyleConfig::new(
            "highlight",
            include_str!("prompts/highlight.md"),
            Generation::Highlight(FontConfig {
                highlight: Some(FontType::Bold),
                supporting: vec![FontType::Normal, FontType::Thin],
            }),
            8,
            3,
        ),
        "minimal" => StyleConfig::new(
            "minimal",
            include_str!("prompts/minimal.md"),
            Generation::Groups(FontConfig::default()),
            6,
            3,
        ),
        _ => return None,
    };
    Some(config)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn every_listed_style_resolves() {
        for name in STYLE_NAMES {
            let config = style_config(name).unwrap();
            assert_eq!(config.name, name);
            assert!(!config.system_prompt.is_empty());
            assert_eq!(config.model, "gpt-5.1");
            assert_eq!(config.max_concurrent, 30);
            assert_eq!(config.max_chunk, 59.0);
        }
    }

    #[test]
    fn word_limits() {
        let limits = |name| {
            let c = style_config(name).unwrap();
            (c.max_words_special, c.max_words_regular)
        };
        assert_eq!(limits("two_line"), (5, 3));
        assert_eq!(limits("matt"), (6, 4));
        assert_eq!(limits("three_line_margin"), (7, 3));
    }

    #[test]
    fn unknown_style() {
        assert!(style_config("default").is_none());
    }
}
