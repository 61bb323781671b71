use derive_more::Display;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl WordTimestamp {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontType {
    #[default]
    #[display(fmt = "normal")]
    Normal,
    #[display(fmt = "bold")]
    Bold,
    #[display(fmt = "thin")]
    Thin,
    #[display(fmt = "italic")]
    Italic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleLine {
    pub text: String,
    #[serde(default)]
    pub font_type: FontType,
}

impl SubtitleLine {
    pub fn new(text: impl Into<String>, font_type: FontType) -> Self {
        Self {
            text: text.into(),
            font_type,
        }
    }
}

/// Consecutive transcript words shown together, broken into one to three lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleGroup {
    pub group_text: String,
    pub lines: Vec<SubtitleLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTimeline {
    pub timeline: Vec<SubtitleGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWithHighlight {
    pub group_text: String,
    #[serde(default)]
    pub highlight_word: Option<String>,
}

impl GroupWithHighlight {
    pub fn new(group_text: impl Into<String>, highlight_word: Option<&str>) -> Self {
        Self {
            group_text: group_text.into(),
            highlight_word: highlight_word.map(String::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightDivision {
    pub groups: Vec<GroupWithHighlight>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDivision {
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedWord {
    pub id: String,
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedLine {
    pub id: Option<String>,
    pub text: String,
    pub font_type: FontType,
    pub start: f64,
    pub end: f64,
    pub words: Vec<ProcessedWord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedGroup {
    pub id: String,
    pub group_text: String,
    pub start: f64,
    pub end: f64,
    pub lines: Vec<ProcessedLine>,
}

lazy_static! {
    /// Structured output schema of [`SubtitleTimeline`].
    pub static ref TIMELINE_SCHEMA: Value = json!({
        "type": "object",
        "properties": {
            "timeline": {
                "type": "array",
                "description": "Ordered list of groups covering entire transcript",
                "items": {
                    "type": "object",
                    "properties": {
                        "group_text": {
                            "type": "string",
                            "description": "Consecutive words forming this group"
                        },
                        "lines": {
                            "type": "array",
                            "description": "Lines created from group_text with strategic breaks",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "text": {
                                        "type": "string",
                                        "description": "Exact word-for-word text from transcript"
                                    },
                                    "font_type": {
                                        "type": "string",
                                        "enum": ["normal", "bold", "thin", "italic"],
                                        "description": "Font weight for visual hierarchy"
                                    }
                                },
                                "required": ["text", "font_type"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["group_text", "lines"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["timeline"],
        "additionalProperties": false
    });

    /// Structured output schema of [`HighlightDivision`].
    pub static ref HIGHLIGHT_SCHEMA: Value = json!({
        "type": "object",
        "properties": {
            "groups": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "group_text": {
                            "type": "string",
                            "description": "Consecutive words forming this group"
                        },
                        "highlight_word": {
                            "type": ["string", "null"],
                            "description": "Single word of the group to emphasize"
                        }
                    },
                    "required": ["group_text", "highlight_word"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["groups"],
        "additionalProperties": false
    });

    /// Structured output schema of [`GroupDivision`].
    pub static ref GROUPS_SCHEMA: Value = json!({
        "type": "object",
        "properties": {
            "groups": {
                "type": "array",
                "items": {
                    "type": "string",
                    "description": "Consecutive words forming a group"
                }
            }
        },
        "required": ["groups"],
        "additionalProperties": false
    });
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn line_font_defaults_to_normal() {
        let line: SubtitleLine = serde_json::from_value(json!({"text": "hello"})).unwrap();
        assert_eq!(line.font_type, FontType::Normal);

        let line: SubtitleLine =
            serde_json::from_value(json!({"text": "hi", "font_type": "italic"})).unwrap();
        assert_eq!(line.font_type, FontType::Italic);
    }

    #[test]
    fn unknown_font_is_rejected() {
        let parsed =
            serde_json::from_value::<SubtitleLine>(json!({"text": "x", "font_type": "heavy"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn processed_group_layout() {
        let group = ProcessedGroup {
            id: "group-0".into(),
            group_text: "Hi".into(),
            start: 0.0,
            end: 0.5,
            lines: vec![ProcessedLine {
                id: Some("group-0-line-0".into()),
                text: "Hi".into(),
                font_type: FontType::Bold,
                start: 0.0,
                end: 0.5,
                words: vec![ProcessedWord {
                    id: "group-0-line-0-word-0".into(),
                    word: "Hi".into(),
                    start: 0.0,
                    end: 0.5,
                }],
            }],
        };

        assert_eq!(
            serde_json::to_value(&group).unwrap(),
            json!({
                "id": "group-0",
                "group_text": "Hi",
                "start": 0.0,
                "end": 0.5,
                "lines": [{
                    "id": "group-0-line-0",
                    "text": "Hi",
                    "font_type": "bold",
                    "start": 0.0,
                    "end": 0.5,
                    "words": [{"id": "group-0-line-0-word-0", "word": "Hi", "start": 0.0, "end": 0.5}]
                }]
            })
        );
    }
}
