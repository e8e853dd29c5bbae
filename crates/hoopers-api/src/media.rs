use hoopers_types::models::MediaKind;

/// Build the client-facing URL for a stored media key. Keys are opaque blob
/// names; the extension follows the content kind.
pub fn media_url(base: &str, key: &str, kind: MediaKind) -> String {
    let ext = match kind {
        MediaKind::Image => "webp",
        MediaKind::Video => "mp4",
        MediaKind::Avatar => "png",
    };
    format!("{}/{key}.{ext}", base.trim_end_matches('/'))
}

pub fn avatar_url(base: &str, key: Option<&str>) -> Option<String> {
    key.map(|k| media_url(base, k, MediaKind::Avatar))
}
