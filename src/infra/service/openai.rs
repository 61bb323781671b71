use std::{path::Path, time::Duration};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

use crate::{
    domain::service::{LanguageModel, StructuredPrompt, Transcriber},
    error::service::{DispatchError, ServiceError, ServiceKind},
};

const API_URL: &str = "https://api.openai.com/v1";
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const TRANSCRIPTION_ATTEMPTS: u32 = 3;

/// Chat completion body asking for output matching `prompt.schema`.
pub fn completion_request(prompt: &StructuredPrompt<'_>) -> Value {
    json!({
        "model": prompt.model,
        "messages": [
            {"role": "system", "content": prompt.system},
            {"role": "user", "content": prompt.user},
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": prompt.schema_name,
                "strict": true,
                "schema": prompt.schema,
            },
        },
    })
}

/// Parsed JSON content of the first completion choice.
pub fn completion_content(response: &Value) -> Result<Value, ServiceError> {
    let message = &response["choices"][0]["message"];
    if let Some(refusal) = message["refusal"].as_str() {
        return Err(ServiceError::new(
            ServiceKind::LanguageModel,
            format!("model refused: {refusal}"),
        ));
    }

    let content = message["content"].as_str().ok_or_else(|| {
        ServiceError::new(ServiceKind::LanguageModel, "completion without content")
    })?;
    serde_json::from_str(content).map_err(|err| {
        ServiceError::new(
            ServiceKind::LanguageModel,
            format!("completion content is not JSON: {err}"),
        )
    })
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    async fn request_transcription(&self, audio: &Path) -> Result<Value, ServiceError> {
        let bytes = tokio::fs::read(audio).await.map_err(|err| {
            ServiceError::dispatch(ServiceKind::Transcription, DispatchError::from(err))
        })?;
        let filename = audio
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".into());

        let file = Part::bytes(bytes)
            .file_name(filename)
            .mime_str("audio/mpeg")
            .map_err(|err| {
                ServiceError::dispatch(ServiceKind::Transcription, DispatchError::from(err))
            })?;
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .part("file", file);

        let dispatch =
            |err: reqwest::Error| ServiceError::dispatch(ServiceKind::Transcription, err.into());
        self.client
            .post(format!("{API_URL}/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(dispatch)?
            .json()
            .await
            .map_err(dispatch)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete_json(&self, prompt: &StructuredPrompt<'_>) -> Result<Value, ServiceError> {
        let dispatch =
            |err: reqwest::Error| ServiceError::dispatch(ServiceKind::LanguageModel, err.into());

        let response: Value = self
            .client
            .post(format!("{API_URL}/chat/completions"))
            .bearer_auth(&self.api_key)
            .timeout(COMPLETION_TIMEOUT)
            .json(&completion_request(prompt))
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(dispatch)?
            .json()
            .await
            .map_err(dispatch)?;

        completion_content(&response)
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: &Path) -> Result<Value, ServiceError> {
        let mut attempt = 0;
        loop {
            match self.request_transcription(audio).await {
                Ok(transcript) => {
                    tracing::info!(
                        size = transcript.to_string().len(),
                        "transcript received"
                    );
                    return Ok(transcript);
                }
                Err(err) if attempt + 1 < TRANSCRIPTION_ATTEMPTS => {
                    tracing::warn!(attempt = attempt + 1, "transcription failed: {err}");
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn request_carries_strict_schema() {
        let schema = json!({"type": "object"});
        let prompt = StructuredPrompt {
            model: "gpt-5.1",
            system: "system",
            user: "user".into(),
            schema_name: "subtitle_groups",
            schema: &schema,
        };

        let request = completion_request(&prompt);

        assert_eq!(request["model"], "gpt-5.1");
        assert_eq!(request["messages"][1]["content"], "user");
        assert_eq!(request["response_format"]["json_schema"]["strict"], true);
        assert_eq!(request["response_format"]["json_schema"]["schema"], schema);
    }

    #[test]
    fn content_is_parsed() {
        let response = json!({"choices": [{"message": {"content": "{\"groups\": []}"}}]});
        assert_eq!(completion_content(&response).unwrap(), json!({"groups": []}));
    }

    #[test]
    fn refusal_is_an_error() {
        let response = json!({"choices": [{"message": {"content": null, "refusal": "no"}}]});
        assert!(completion_content(&response).is_err());
    }
}
