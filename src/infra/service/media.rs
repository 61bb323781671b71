use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::{
    domain::{datatype::media::MediaMetadata, service::MediaProcessor},
    error::service::{DispatchError, ServiceError, ServiceKind},
};

const DEFAULT_FPS: f64 = 30.0;
const AUDIO_ATTEMPTS: u32 = 3;
const AUDIO_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Frames per second of an ffprobe rational such as `30000/1001`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.parse::<f64>().ok()?, den.parse::<f64>().ok()?),
        None => (rate.parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// `dir/name<suffix>` for an input `dir/name.ext`, `ext` replaced when given.
pub fn derived_path(path: &Path, suffix: &str, ext: Option<&str>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = match ext {
        Some(ext) => ext.to_owned(),
        None => path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let name = if ext.is_empty() {
        format!("{stem}{suffix}")
    } else {
        format!("{stem}{suffix}.{ext}")
    };
    path.with_file_name(name)
}

fn probe_metadata(output: FfprobeOutput) -> Result<MediaMetadata, ServiceError> {
    let format_duration = output
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    let stream = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ServiceError::new(ServiceKind::Media, "no video stream found"))?;

    Ok(MediaMetadata {
        width: stream.width.unwrap_or_default(),
        height: stream.height.unwrap_or_default(),
        duration: stream
            .duration
            .and_then(|d| d.parse::<f64>().ok())
            .or(format_duration)
            .unwrap_or_default(),
        fps: stream
            .r_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .unwrap_or(DEFAULT_FPS),
    })
}

async fn run(program: &str, args: &[&str], input: &Path, output: &Path) -> Result<(), ServiceError> {
    let result = Command::new(program)
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(args)
        .arg(output)
        .output()
        .await
        .map_err(|err| ServiceError::dispatch(ServiceKind::Media, DispatchError::from(err)))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
        return Err(ServiceError::new(
            ServiceKind::Media,
            format!(
                "{program} exited with code {}: {tail}",
                result.status.code().unwrap_or(-1)
            ),
        ));
    }
    Ok(())
}

/// Media processing through the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Default, Clone)]
pub struct FfmpegProcessor;

impl FfmpegProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn probe(&self, path: &Path) -> Result<MediaMetadata, ServiceError> {
        let result = Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .await
            .map_err(|err| ServiceError::dispatch(ServiceKind::Media, DispatchError::from(err)))?;

        if !result.status.success() {
            return Err(ServiceError::new(
                ServiceKind::Media,
                format!(
                    "ffprobe exited with code {}",
                    result.status.code().unwrap_or(-1)
                ),
            ));
        }

        let output: FfprobeOutput = serde_json::from_slice(&result.stdout).map_err(|err| {
            ServiceError::new(ServiceKind::Media, format!("invalid ffprobe output: {err}"))
        })?;
        let metadata = probe_metadata(output)?;

        tracing::info!(
            width = metadata.width,
            height = metadata.height,
            duration = metadata.duration,
            fps = metadata.fps,
            "media probed"
        );
        Ok(metadata)
    }

    async fn transcode_low_res(&self, path: &Path, height: u32) -> Result<PathBuf, ServiceError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ServiceError::new(
                ServiceKind::Media,
                format!("input file not found: {}", path.display()),
            ));
        }

        let output = derived_path(path, &format!("_{height}p"), None);
        let scale = format!("scale=-2:{height}");
        run(
            "ffmpeg",
            &["-vf", &scale, "-c:v", "libx264", "-c:a", "aac", "-strict", "experimental"],
            path,
            &output,
        )
        .await?;

        tracing::info!(output = %output.display(), "low resolution rendition created");
        Ok(output)
    }

    async fn extract_audio(&self, path: &Path) -> Result<PathBuf, ServiceError> {
        let output = derived_path(path, "_audio", Some("mp3"));
        let args = [
            "-vn", "-ac", "1", "-ar", "16000", "-f", "mp3", "-b:a", "192k", "-q:a", "2",
        ];

        let mut attempt = 1;
        loop {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(ServiceError::new(
                    ServiceKind::Media,
                    format!("input file not found: {}", path.display()),
                ));
            }

            match run("ffmpeg", &args, path, &output).await {
                Ok(()) => {
                    tracing::info!(output = %output.display(), "audio extracted");
                    return Ok(output);
                }
                Err(err) if attempt < AUDIO_ATTEMPTS => {
                    tracing::warn!(attempt, "audio extraction failed: {err}");
                    tokio::time::sleep(AUDIO_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(attempts = AUDIO_ATTEMPTS, "audio extraction failed: {err}");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn frame_rates() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn derived_paths() {
        let input = Path::new("/tmp/u-v/clip.mp4");
        assert_eq!(
            derived_path(input, "_360p", None),
            PathBuf::from("/tmp/u-v/clip_360p.mp4")
        );
        assert_eq!(
            derived_path(&derived_path(input, "_360p", None), "_audio", Some("mp3")),
            PathBuf::from("/tmp/u-v/clip_360p_audio.mp3")
        );
    }

    #[test]
    fn metadata_from_first_video_stream() {
        let output: FfprobeOutput = serde_json::from_str(
            r#"{
                "streams": [
                    {"codec_type": "audio", "duration": "9.0"},
                    {"codec_type": "video", "width": 1080, "height": 1920, "r_frame_rate": "0/0"}
                ],
                "format": {"duration": "10.5"}
            }"#,
        )
        .unwrap();

        let metadata = probe_metadata(output).unwrap();

        assert_eq!(
            metadata,
            MediaMetadata {
                width: 1080,
                height: 1920,
                duration: 10.5,
                fps: 30.0
            }
        );
    }
}
