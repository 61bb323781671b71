use derive_more::Display;
use serde_json::Value;

use super::{
    chunker::{extract_words, TranscriptChunker},
    divider::{FontConfig, HybridLineDivider},
    generator::{ChunkGenerator, ChunkOutput},
    matcher::TimestampMatcher,
    merger::{merge, validate_continuity},
    model::{GroupWithHighlight, ProcessedGroup, SubtitleGroup},
    post_process::{EvenSplit, HighlightSplit},
    registry::{Generation, StyleConfig},
};
use crate::{domain::service::LanguageModel, error::service::ServiceError};

#[derive(Debug, Display)]
pub enum PipelineError {
    #[display(fmt = "No chunks generated")]
    NoChunks,
    #[display(fmt = "{_0}")]
    Generation(ServiceError),
}

impl std::error::Error for PipelineError {}

impl From<ServiceError> for PipelineError {
    fn from(err: ServiceError) -> Self {
        Self::Generation(err)
    }
}

/// Turns a word level transcript into a timed caption timeline for one style.
pub struct SubtitlePipeline<'a, L: ?Sized> {
    model: &'a L,
    config: StyleConfig,
}

impl<'a, L: LanguageModel + ?Sized> SubtitlePipeline<'a, L> {
    pub fn new(model: &'a L, config: StyleConfig) -> Self {
        Self { model, config }
    }

    fn divider(&self) -> HybridLineDivider {
        let fonts = match &self.config.generation {
            Generation::Highlight(fonts) | Generation::Groups(fonts) => fonts.clone(),
            Generation::Timeline => FontConfig::default(),
        };
        HybridLineDivider::new(HybridLineDivider::DEFAULT_MAX_WORDS_PER_LINE, fonts)
    }

    /// Breaks model output into display lines.
    fn layout(&self, output: ChunkOutput) -> Vec<SubtitleGroup> {
        match output {
            ChunkOutput::Timeline(groups) => groups,
            ChunkOutput::Highlights(groups) => {
                let groups = HighlightSplit::new(self.config.max_words_special).process(groups);
                self.divider().divide_groups(&groups)
            }
            ChunkOutput::Groups(groups) => {
                let divider = self.divider();
                EvenSplit::new(self.config.max_words_special)
                    .process(groups)
                    .into_iter()
                    .map(|text| divider.divide_group(&GroupWithHighlight::new(text, None)))
                    .collect()
            }
        }
    }

    pub async fn run(&self, transcript: &Value) -> Result<Vec<ProcessedGroup>, PipelineError> {
        let words = extract_words(transcript);
        let chunks = TranscriptChunker::new(self.config.max_chunk).chunk(words);
        if chunks.is_empty() {
            return Err(PipelineError::NoChunks);
        }
        tracing::info!(
            style = self.config.name,
            chunks = chunks.len(),
            "generating captions"
        );

        let outputs = ChunkGenerator::new(self.model, &self.config)
            .generate_all(&chunks)
            .await?;

        let timelines = chunks
            .iter()
            .zip(outputs)
            .map(|(chunk, output)| {
                let groups = self.layout(output);
                TimestampMatcher::new(&chunk.words).process_groups(&groups)
            })
            .collect();

        let timeline = merge(timelines);
        if !validate_continuity(&timeline) {
            tracing::warn!(style = self.config.name, "caption timeline is not continuous");
        }
        Ok(timeline)
    }
}
