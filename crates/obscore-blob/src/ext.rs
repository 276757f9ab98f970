/// Exact MIME-type → file extension table. Falls back to `.bin` for
/// anything not listed, never guesses from the byte content.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "audio/wav" | "audio/wave" | "audio/x-wav" => ".wav",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/ogg" => ".ogg",
        "audio/opus" => ".opus",
        "audio/flac" => ".flac",
        "audio/L16" | "audio/pcm" => ".pcm",
        "audio/webm" => ".webm",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/quicktime" => ".mov",
        "video/x-msvideo" => ".avi",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/bmp" => ".bmp",
        _ => ".bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_types() {
        assert_eq!(extension_for_mime("audio/wav"), ".wav");
        assert_eq!(extension_for_mime("video/mp4"), ".mp4");
        assert_eq!(extension_for_mime("image/png"), ".png");
    }

    #[test]
    fn falls_back_to_bin() {
        assert_eq!(extension_for_mime("application/octet-stream"), ".bin");
    }
}
