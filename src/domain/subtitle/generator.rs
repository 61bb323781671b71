use std::time::{Duration, Instant};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::Semaphore;

use super::{
    chunker::TranscriptChunk,
    model::{GroupDivision, GroupWithHighlight, HighlightDivision, SubtitleGroup, SubtitleTimeline},
    registry::{Generation, StyleConfig},
};
use crate::{
    domain::service::{LanguageModel, StructuredPrompt},
    error::service::{ServiceError, ServiceKind},
};

/// Attempts per chunk before the generation fails.
pub const MAX_ATTEMPTS: u32 = 3;

/// Language model output for one transcript chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutput {
    Timeline(Vec<SubtitleGroup>),
    Highlights(Vec<GroupWithHighlight>),
    Groups(Vec<String>),
}

pub fn user_prompt(chunk: &TranscriptChunk) -> String {
    format!(
        "## VIDEO TRANSCRIPT (Segment {index})\n{text}\n\n\
         Analyze this transcript segment and create optimized subtitle groups. \n\
         Note: This is segment {index} of a longer video (starts at {start:.1}s).",
        index = chunk.index,
        text = chunk.text,
        start = chunk.start,
    )
}

/// Backoff before the next attempt, spread by chunk so parallel retries do not align.
pub fn retry_delay(attempt: u32, chunk_index: usize) -> Duration {
    let jitter = (chunk_index % 10) as f64 / 10.0;
    let secs = (2f64.powi(attempt as i32) + jitter).min(30.0);
    Duration::from_secs_f64(secs)
}

pub struct ChunkGenerator<'a, L: ?Sized> {
    model: &'a L,
    config: &'a StyleConfig,
}

impl<'a, L: LanguageModel + ?Sized> ChunkGenerator<'a, L> {
    pub fn new(model: &'a L, config: &'a StyleConfig) -> Self {
        Self { model, config }
    }

    fn parse(&self, value: Value) -> Result<ChunkOutput, serde_json::Error> {
        Ok(match self.config.generation {
            Generation::Timeline => {
                ChunkOutput::Timeline(serde_json::from_value::<SubtitleTimeline>(value)?.timeline)
            }
            Generation::Highlight(_) => {
                ChunkOutput::Highlights(serde_json::from_value::<HighlightDivision>(value)?.groups)
            }
            Generation::Groups(_) => {
                ChunkOutput::Groups(serde_json::from_value::<GroupDivision>(value)?.groups)
            }
        })
    }

    async fn attempt(&self, prompt: &StructuredPrompt<'_>) -> Result<ChunkOutput, ServiceError> {
        let value = self.model.complete_json(prompt).await?;
        self.parse(value).map_err(|err| {
            ServiceError::new(
                ServiceKind::LanguageModel,
                format!("invalid structured output: {err}"),
            )
        })
    }

    pub async fn generate(&self, chunk: &TranscriptChunk) -> Result<ChunkOutput, ServiceError> {
        let (schema_name, schema) = self.config.generation.schema();
        let prompt = StructuredPrompt {
            model: self.config.model,
            system: self.config.system_prompt,
            user: user_prompt(chunk),
            schema_name,
            schema,
        };

        let started = Instant::now();
        tracing::info!(chunk = chunk.index, "starting completion");

        let mut attempt = 0;
        loop {
            match self.attempt(&prompt).await {
                Ok(output) => {
                    tracing::info!(
                        chunk = chunk.index,
                        elapsed = ?started.elapsed(),
                        "completion finished"
                    );
                    return Ok(output);
                }
                Err(err) if attempt + 1 < MAX_ATTEMPTS => {
                    let wait = retry_delay(attempt, chunk.index);
                    tracing::warn!(
                        chunk = chunk.index,
                        attempt = attempt + 1,
                        ?wait,
                        "completion failed: {err}, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(chunk = chunk.index, "all retries exhausted: {err}");
                    return Err(err);
                }
            }
        }
    }

    /// Generates every chunk with bounded concurrency, results in chunk order.
    pub async fn generate_all(
        &self,
        chunks: &[TranscriptChunk],
    ) -> Result<Vec<ChunkOutput>, ServiceError> {
        let total = chunks.len();
        tracing::info!(
            chunks = total,
            max_concurrent = self.config.max_concurrent,
            "submitting chunks"
        );

        let permits = Semaphore::new(self.config.max_concurrent.max(1));
        let mut pending = chunks
            .iter()
            .map(|chunk| -> BoxFuture<'_, _> {
                let permits = &permits;
                async move {
                    let _permit = permits.acquire().await;
                    (chunk.index, self.generate(chunk).await)
                }
                .boxed()
            })
            .collect::<FuturesUnordered<_>>();

        let mut results = Vec::with_capacity(total);
        while let Some((index, result)) = pending.next().await {
            let output = result.map_err(|err| {
                tracing::error!(chunk = index, "chunk failed: {err}");
                err
            })?;
            results.push((index, output));
            tracing::info!(completed = results.len(), total, "chunk progress");
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, output)| output).collect())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::domain::subtitle::{model::WordTimestamp, registry::style_config};

    /// Language model answering from a queue of canned responses.
    pub struct ScriptedModel {
        pub responses: Mutex<Vec<Result<Value, ServiceError>>>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(responses: Vec<Result<Value, ServiceError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete_json(
            &self,
            prompt: &StructuredPrompt<'_>,
        ) -> Result<Value, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.user.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ServiceError::new(ServiceKind::LanguageModel, "no response"));
            }
            responses.remove(0)
        }
    }

    fn chunk(index: usize, text: &str, start: f64) -> TranscriptChunk {
        TranscriptChunk {
            index,
            text: text.into(),
            words: vec![WordTimestamp::new(text, start, start + 1.0)],
            start,
            end: start + 1.0,
        }
    }

    #[test]
    fn prompt_names_the_segment() {
        let prompt = user_prompt(&chunk(2, "hello there", 61.25));

        assert_eq!(
            prompt,
            "## VIDEO TRANSCRIPT (Segment 2)\nhello there\n\nAnalyze this transcript segment and \
             create optimized subtitle groups. \nNote: This is segment 2 of a longer video \
             (starts at 61.2s)."
        );
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        assert_eq!(retry_delay(0, 0), Duration::from_secs(1));
        assert_eq!(retry_delay(1, 3), Duration::from_secs_f64(2.3));
        assert_eq!(retry_delay(10, 0), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn retries_until_a_valid_answer() {
        let config = style_config("matt").unwrap();
        let model = ScriptedModel::new(vec![
            Ok(json!({"unexpected": true})),
            Ok(json!({"timeline": [{"group_text": "hi", "lines": [{"text": "hi", "font_type": "bold"}]}]})),
        ]);

        let output = ChunkGenerator::new(&model, &config)
            .generate(&chunk(0, "hi", 0.0))
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        match output {
            ChunkOutput::Timeline(groups) => assert_eq!(groups[0].group_text, "hi"),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[tokio::test]
    async fn fails_after_all_attempts() {
        let config = style_config("minimal").unwrap();
        let model = ScriptedModel::new(Vec::new());

        let result = ChunkGenerator::new(&model, &config)
            .generate(&chunk(0, "hi", 0.0))
            .await;

        assert!(result.is_err());
        assert_eq!(model.calls.load(Ordering::SeqCst), MAX_ATTEMPTS as usize);
    }

    /// Language model answering slowly, recording how many requests overlap.
    struct SlowModel {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete_json(&self, _: &StructuredPrompt<'_>) -> Result<Value, ServiceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(json!({"groups": ["x"]}))
        }
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn fan_out_can_run_on_a_worker_thread() {
        let config = style_config("minimal").unwrap();
        let scripted = ScriptedModel::new(Vec::new());
        let model: &dyn LanguageModel = &scripted;
        let chunks = [chunk(0, "a", 0.0)];

        let generator = ChunkGenerator::new(model, &config);
        assert_send(&generator.generate_all(&chunks));
    }

    #[tokio::test]
    async fn concurrent_requests_are_capped() {
        let mut config = style_config("minimal").unwrap();
        config.max_concurrent = 2;
        let model = SlowModel {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let chunks: Vec<_> = (0..6).map(|index| chunk(index, "a", index as f64)).collect();

        let outputs = ChunkGenerator::new(&model, &config)
            .generate_all(&chunks)
            .await
            .unwrap();

        assert_eq!(outputs.len(), 6);
        assert_eq!(model.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn results_follow_chunk_order() {
        let config = style_config("minimal").unwrap();
        let model = ScriptedModel::new(vec![
            Ok(json!({"groups": ["first"]})),
            Ok(json!({"groups": ["second"]})),
        ]);

        let outputs = ChunkGenerator::new(&model, &config)
            .generate_all(&[chunk(0, "a", 0.0), chunk(1, "b", 1.0)])
            .await
            .unwrap();

        assert_eq!(outputs.len(), 2);
        assert!(outputs
            .iter()
            .all(|output| matches!(output, ChunkOutput::Groups(groups) if groups.len() == 1)));
    }
}
