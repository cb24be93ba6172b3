use regex::Regex;
use std::sync::OnceLock;

/// Neutral description used when a caption is empty or unusable.
pub const DEFAULT_CAPTION: &str = "A scene with various objects.";

const UNSAFE_WORDS: [&str; 6] = ["cock", "penis", "sex", "nude", "naked", "explicit"];

fn mirror_fixes() -> &'static [(Regex, &'static str)] {
    static FIXES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    FIXES.get_or_init(|| {
        [
            (r"(?i)in front of a mirror", "facing the camera"),
            (r"(?i)looking in(to)? a mirror", "looking at the camera"),
            (r"(?i)at a mirror", "at the camera"),
            (r"(?i)mirror", "camera"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

fn unsafe_word() -> Option<&'static Regex> {
    static UNSAFE: OnceLock<Option<Regex>> = OnceLock::new();
    UNSAFE
        .get_or_init(|| Regex::new(&format!(r"(?i)\b({})\b", UNSAFE_WORDS.join("|"))).ok())
        .as_ref()
}

/// Clean up a raw caption.
///
/// Captioning models describe a person facing a webcam as standing at a
/// mirror; those phrases are rewritten to refer to the camera. Captions with
/// unsafe words are replaced by a neutral description built from the safe
/// keywords they contain.
pub fn sanitize_caption(raw: &str) -> String {
    let mut caption = raw.trim().to_string();
    if caption.is_empty() {
        return DEFAULT_CAPTION.to_string();
    }

    if caption.to_lowercase().contains("mirror") {
        log::info!("correcting 'mirror' hallucination in caption: {}", caption);
        for (re, replacement) in mirror_fixes() {
            caption = re.replace_all(&caption, *replacement).into_owned();
        }
    }

    if unsafe_word().is_some_and(|re| re.is_match(&caption)) {
        log::warn!(
            "filtering unsafe caption: {}",
            crate::speech::truncate(&caption, 50)
        );
        return neutral_description(&caption.to_lowercase());
    }

    caption
}

fn neutral_description(lower: &str) -> String {
    let mut parts = Vec::new();
    if lower.contains("man") || lower.contains("person") {
        parts.push("a person");
    }
    if lower.contains("room") {
        parts.push("in a room");
    }
    if lower.contains("shirt") {
        parts.push("wearing a shirt");
    }
    if parts.is_empty() {
        return "A person in a room.".to_string();
    }
    format!("{}.", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_phrases_are_rewritten() {
        assert_eq!(
            sanitize_caption("a woman looking into a mirror"),
            "a woman looking at the camera"
        );
        assert_eq!(
            sanitize_caption("A man smiling at a Mirror"),
            "A man smiling at the camera"
        );
        assert_eq!(
            sanitize_caption("a mirror on the wall"),
            "a camera on the wall"
        );
    }

    #[test]
    fn unsafe_captions_become_neutral() {
        assert_eq!(
            sanitize_caption("a naked man in a room"),
            "a person in a room."
        );
        assert_eq!(sanitize_caption("explicit"), "A person in a room.");
        // Word boundaries: "sextant" is fine.
        assert_eq!(sanitize_caption("a sextant on a desk"), "a sextant on a desk");
    }

    #[test]
    fn empty_caption_gets_default() {
        assert_eq!(sanitize_caption("   "), DEFAULT_CAPTION);
    }
}
