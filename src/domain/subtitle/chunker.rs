use serde_json::Value;

use super::model::WordTimestamp;

/// Transcript segment keeping the absolute times of the original audio.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptChunk {
    pub index: usize,
    pub text: String,
    pub words: Vec<WordTimestamp>,
    pub start: f64,
    pub end: f64,
}

impl TranscriptChunk {
    fn new(index: usize, start: f64, words: Vec<WordTimestamp>) -> Self {
        let text = words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let end = words.last().map(|w| w.end).unwrap_or(start);

        Self {
            index,
            text,
            words,
            start,
            end,
        }
    }
}

/// Reads the word timestamps of a transcription, from `words` or else `word_timestamps`.
pub fn extract_words(transcript: &Value) -> Vec<WordTimestamp> {
    let non_empty = |key: &str| {
        transcript
            .get(key)
            .and_then(Value::as_array)
            .filter(|words| !words.is_empty())
    };

    let Some(raw) = non_empty("words").or_else(|| non_empty("word_timestamps")) else {
        return Vec::new();
    };

    raw.iter()
        .filter(|w| w.is_object())
        .map(|w| WordTimestamp {
            word: w
                .get("word")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            start: w.get("start").and_then(Value::as_f64).unwrap_or(0.0),
            end: w.get("end").and_then(Value::as_f64).unwrap_or(0.0),
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct TranscriptChunker {
    max_duration: f64,
}

impl Default for TranscriptChunker {
    fn default() -> Self {
        Self::new(55.0)
    }
}

impl TranscriptChunker {
    pub fn new(max_duration: f64) -> Self {
        Self { max_duration }
    }

    /// Splits words into chunks strictly shorter than the maximum duration.
    pub fn chunk(&self, words: Vec<WordTimestamp>) -> Vec<TranscriptChunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<WordTimestamp> = Vec::new();
        let mut chunk_start = 0.0;

        for word in words {
            if current.is_empty() {
                chunk_start = word.start;
            }

            if word.end - chunk_start >= self.max_duration && !current.is_empty() {
                let next_start = word.start;
                let full = std::mem::replace(&mut current, vec![word]);
                chunks.push(TranscriptChunk::new(chunks.len(), chunk_start, full));
                chunk_start = next_start;
            } else {
                current.push(word);
            }
        }

        if !current.is_empty() {
            chunks.push(TranscriptChunk::new(chunks.len(), chunk_start, current));
        }

        tracing::info!(
            chunks = chunks.len(),
            max_duration = self.max_duration,
            "chunked transcript"
        );
        chunks
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn words(spans: &[(&str, f64, f64)]) -> Vec<WordTimestamp> {
        spans
            .iter()
            .map(|(w, s, e)| WordTimestamp::new(*w, *s, *e))
            .collect()
    }

    #[test]
    fn short_transcript_is_a_single_chunk() {
        let chunks = TranscriptChunker::new(10.0).chunk(words(&[
            ("Hello", 0.0, 0.5),
            ("world", 0.6, 1.0),
        ]));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world");
        assert_eq!((chunks[0].start, chunks[0].end), (0.0, 1.0));
    }

    #[test]
    fn word_reaching_the_limit_starts_next_chunk() {
        let chunks = TranscriptChunker::new(5.0).chunk(words(&[
            ("a", 1.0, 2.0),
            ("b", 2.0, 5.9),
            ("c", 5.9, 6.0),
            ("d", 6.5, 7.0),
        ]));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a b");
        assert_eq!((chunks[0].start, chunks[0].end), (1.0, 5.9));
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].text, "c d");
        assert_eq!((chunks[1].start, chunks[1].end), (5.9, 7.0));
    }

    #[test]
    fn long_single_word_is_kept() {
        let chunks = TranscriptChunker::new(1.0).chunk(words(&[("loooong", 0.0, 3.0)]));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_transcript_has_no_chunks() {
        assert!(TranscriptChunker::default().chunk(Vec::new()).is_empty());
    }

    #[test]
    fn extract_from_either_key() {
        let transcript = json!({
            "text": "hi there",
            "words": [],
            "word_timestamps": [{"word": "hi", "start": 0, "end": 0.4}, {"start": 0.5}]
        });

        assert_eq!(
            extract_words(&transcript),
            vec![WordTimestamp::new("hi", 0.0, 0.4), WordTimestamp::new("", 0.5, 0.0)]
        );
        assert!(extract_words(&json!({"text": "nothing"})).is_empty());
    }
}
