use uuid::Uuid;

/// Extensions accepted when the content type is not recognisable as audio or video.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["mp4", "mov", "webm", "mp3", "wav", "m4a", "ogg"];

/// Upload size limit, 2 GiB.
pub const MAX_UPLOAD_SIZE: u64 = 2 * 1024 * 1024 * 1024;

const OCTET_STREAM: &str = "application/octet-stream";

/// Stream properties read from a media file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaMetadata {
    pub width: i32,
    pub height: i32,
    pub duration: f64,
    pub fps: f64,
}

/// Description of a file stored in the object store on upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub name: Option<String>,
    pub original_url: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
}

/// Lowercased extension after the last dot of a file name.
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
}

/// Content type an upload is stored with, `None` when the file is neither audio nor video.
///
/// The declared type wins unless it is missing or generic, then it is guessed from the
/// file name. Known extensions force their own type when the result is not audio or video.
pub fn resolve_content_type(declared: Option<&str>, filename: &str) -> Option<String> {
    let content_type = match declared {
        Some(declared) if !declared.is_empty() && declared != OCTET_STREAM => declared.to_owned(),
        _ => mime_guess::from_path(filename)
            .first()
            .map(|mime| mime.essence_str().to_owned())
            .unwrap_or_else(|| OCTET_STREAM.to_owned()),
    };

    if content_type.starts_with("video/") || content_type.starts_with("audio/") {
        return Some(content_type);
    }

    let ext = file_extension(filename)?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    Some(match ext.as_str() {
        "mov" => "video/quicktime".to_owned(),
        "mp4" | "webm" => format!("video/{ext}"),
        _ => format!("audio/{ext}"),
    })
}

/// Object key for a user upload: a short random name keeping the original extension.
pub fn upload_key(user_id: Uuid, filename: &str) -> String {
    let ext = file_extension(filename).unwrap_or_else(|| "mp4".into());
    let unique = Uuid::new_v4().simple().to_string();
    format!("videos/user_{user_id}/{}.{ext}", &unique[..12])
}

/// Object key for the low resolution rendition of a video.
pub fn low_res_key(user_id: Uuid, video_id: Uuid, filename: &str) -> String {
    format!("videos/user_{user_id}/lowres/{video_id}_{filename}")
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn declared_media_type_is_kept() {
        assert_eq!(
            resolve_content_type(Some("video/x-matroska"), "clip.mkv").as_deref(),
            Some("video/x-matroska")
        );
    }

    #[test]
    fn generic_type_is_guessed_from_name() {
        assert_eq!(
            resolve_content_type(Some(OCTET_STREAM), "clip.mp4").as_deref(),
            Some("video/mp4")
        );
        assert_eq!(
            resolve_content_type(None, "voice.wav").map(|ct| ct.starts_with("audio/")),
            Some(true)
        );
    }

    #[test]
    fn known_extension_forces_type() {
        assert_eq!(
            resolve_content_type(Some("text/plain"), "take.MOV").as_deref(),
            Some("video/quicktime")
        );
        assert_eq!(
            resolve_content_type(Some("text/plain"), "take.m4a").as_deref(),
            Some("audio/m4a")
        );
    }

    #[test]
    fn other_files_are_rejected() {
        assert_eq!(resolve_content_type(Some("text/plain"), "notes.txt"), None);
        assert_eq!(resolve_content_type(Some("text/plain"), "README"), None);
    }

    #[test]
    fn upload_keys() {
        let user = Uuid::new_v4();
        let key = upload_key(user, "Holiday.MP4");
        let prefix = format!("videos/user_{user}/");

        assert!(key.starts_with(&prefix));
        let name = &key[prefix.len()..];
        assert_eq!(name.len(), 12 + ".mp4".len());
        assert!(name.ends_with(".mp4"));

        assert!(upload_key(user, "noext").ends_with(".mp4"));

        let video = Uuid::new_v4();
        assert_eq!(
            low_res_key(user, video, "clip_360p.mp4"),
            format!("videos/user_{user}/lowres/{video}_clip_360p.mp4")
        );
    }
}
