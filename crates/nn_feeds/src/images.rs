use lazy_static::lazy_static;
use nn_core::{Article, Media};
use regex::Regex;

const IMAGE_EXTENSIONS: [&str; 8] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".tiff", ".svg"];
const VIDEO_EXTENSIONS: [&str; 7] = [".mp4", ".webm", ".avi", ".mov", ".wmv", ".flv", ".mkv"];

lazy_static! {
    static ref IMG_SRC: Regex = Regex::new(r#"<img[^>]+src=["']([^"'>]+)["']"#).expect("valid img pattern");
    static ref TAG: Regex = Regex::new(r"<[^>]*>").expect("valid tag pattern");
}

/// True when the URL points at a still image rather than a video or player.
/// Query strings and fragments are ignored when checking the extension.
pub fn is_valid_image_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    let lower = url.to_lowercase();
    let path = lower.split(|c| c == '?' || c == '#').next().unwrap_or_default();

    let is_image = IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
    let is_video = VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
    let looks_like_player = lower.contains("video") || lower.contains("player");
    is_image && !is_video && !looks_like_player
}

/// The first `<img src>` found in an HTML fragment.
pub fn first_img_src(html: &str) -> Option<String> {
    IMG_SRC
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Drops markup from an RSS description and collapses whitespace.
pub fn strip_html(html: &str) -> String {
    TAG.replace_all(html, " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Picks the image for a neutral summary: the valid image of the member with
/// the highest neutrality score. Members without a score rank as 0.
pub fn most_neutral_image(members: &[Article]) -> Option<(String, Media)> {
    let mut best: Option<(&Article, i32)> = None;
    for article in members {
        let Some(url) = article.image_url.as_deref() else { continue };
        if !is_valid_image_url(url) {
            continue;
        }
        let score = article.neutral_score.unwrap_or(0);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((article, score));
        }
    }
    best.and_then(|(a, _)| a.image_url.clone().map(|url| (url, a.source_medium)))
}
