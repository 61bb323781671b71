use super::model::ProcessedGroup;

/// Allowed overlap between consecutive groups, in seconds.
const CONTINUITY_TOLERANCE: f64 = 0.1;

/// Concatenates chunk timelines, assigning sequential hierarchical ids.
pub fn merge(chunks: Vec<Vec<ProcessedGroup>>) -> Vec<ProcessedGroup> {
    let chunk_count = chunks.len();
    let mut timeline: Vec<ProcessedGroup> = chunks.into_iter().flatten().collect();

    for (g, group) in timeline.iter_mut().enumerate() {
        group.id = format!("group-{g}");
        for (l, line) in group.lines.iter_mut().enumerate() {
            line.id = Some(format!("group-{g}-line-{l}"));
            for (w, word) in line.words.iter_mut().enumerate() {
                word.id = format!("group-{g}-line-{l}-word-{w}");
            }
        }
    }

    tracing::info!(
        chunks = chunk_count,
        groups = timeline.len(),
        "merged chunk timelines"
    );
    timeline
}

/// Checks that no group starts before the previous one ended.
pub fn validate_continuity(timeline: &[ProcessedGroup]) -> bool {
    let mut prev_end = 0.0;
    for group in timeline {
        if group.start < prev_end - CONTINUITY_TOLERANCE {
            tracing::warn!(
                start = group.start,
                previous_end = prev_end,
                "timeline overlap detected"
            );
            return false;
        }
        prev_end = group.end;
    }
    true
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::domain::subtitle::model::{FontType, ProcessedLine, ProcessedWord};

    fn group(start: f64, end: f64, words: usize) -> ProcessedGroup {
        ProcessedGroup {
            id: "group-x".into(),
            group_text: String::new(),
            start,
            end,
            lines: vec![ProcessedLine {
                id: None,
                text: String::new(),
                font_type: FontType::Normal,
                start,
                end,
                words: (0..words)
                    .map(|i| ProcessedWord {
                        id: format!("word-{i}"),
                        word: String::new(),
                        start,
                        end,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn ids_continue_across_chunks() {
        let merged = merge(vec![vec![group(0.0, 1.0, 1)], vec![group(1.0, 2.0, 2)]]);

        assert_eq!(merged[0].id, "group-0");
        assert_eq!(merged[1].id, "group-1");
        assert_eq!(merged[1].lines[0].id.as_deref(), Some("group-1-line-0"));
        assert_eq!(merged[1].lines[0].words[1].id, "group-1-line-0-word-1");
    }

    #[test]
    fn continuity_tolerates_small_overlap() {
        assert!(validate_continuity(&[]));
        assert!(validate_continuity(&[group(0.0, 1.0, 0), group(0.95, 2.0, 0)]));
        assert!(!validate_continuity(&[group(0.0, 1.0, 0), group(0.5, 2.0, 0)]));
    }
}
