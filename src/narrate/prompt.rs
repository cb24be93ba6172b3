use regex::Regex;
use std::sync::OnceLock;

const SYSTEM_PREAMBLE: &str = "SYSTEM: You are a helpful assistant for a blind user. \
Be concise and direct. Only describe what is certainly present. Do not ask questions.\n\
If the context mentions a \"mirror\" or \"reflection\" and it seems to be describing the user \
themselves (e.g., \"standing in front of a mirror\"), assume it is a hallucination caused by the \
camera feed and describe it as the person being present or facing the camera.";

const TASK_RULES: &str = "TASK: Synthesize the context and entities into one natural sentence.\n\
IMPORTANT RULES:\n\
1. PRIORITIZE ENTITY COUNT: The \"Entities\" list comes from an object detector and is more \
reliable for counting objects than the Context. If they disagree, use the count from Entities.\n\
2. MERGE SUBJECTS: Count repeated entity types separately (e.g., \"Car: Stationary\" and \
\"Car: Approaching\" = 2 cars). Only merge if the Context explicitly describes the same single object.\n\
3. If the context mentions a person holding an object that also appears in Entities, do NOT \
describe the object as moving independently. It moves with the person.\n\
4. Small handheld objects moving in the same direction as a person are held items, not \
independent threats.\n\
5. Prioritize safety information about independently moving objects (vehicles, other people, animals).\n\
6. Ignore any coordinates or bounding box numbers. Treat an entity \"at box\" as present in front \
of the user.";

/// Build the narration prompt from a caption and movement descriptions.
pub fn compose_prompt(caption: &str, movements: &[String]) -> String {
    let entities = if movements.is_empty() {
        "- No objects detected.".to_string()
    } else {
        movements
            .iter()
            .map(|m| format!("- {}", m))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "{}\n\nUSER:\nContext: \"{}\"\nEntities (detected by object detection system):\n{}\n\n{}",
        SYSTEM_PREAMBLE, caption, entities, TASK_RULES
    )
}

struct CleanupPatterns {
    follow_ups: Vec<Regex>,
    ellipsis: Option<Regex>,
    whitespace: Option<Regex>,
}

fn cleanup_patterns() -> &'static CleanupPatterns {
    static PATTERNS: OnceLock<CleanupPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CleanupPatterns {
        follow_ups: [
            r"(?is)Is there anything else I can assist you with\?.*",
            r"(?is)Let me know if you need.*",
            r"(?is)Feel free to ask.*",
            r"(?is)Would you like.*",
            r"(?is)I can help.*",
            r"(?is)Please let me know.*",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect(),
        ellipsis: Regex::new(r"\.{2,}").ok(),
        whitespace: Regex::new(r"\s+").ok(),
    })
}

/// Strip assistant follow-up offers and normalize whitespace.
pub fn clean_narration(raw: &str) -> String {
    let patterns = cleanup_patterns();
    let mut cleaned = raw.to_string();
    for re in &patterns.follow_ups {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    if let Some(re) = &patterns.ellipsis {
        cleaned = re.replace_all(&cleaned, ".").into_owned();
    }
    if let Some(re) = &patterns.whitespace {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }
    let mut cleaned = cleaned.trim().to_string();

    if cleaned.ends_with('?') {
        let lower = cleaned.to_lowercase();
        if ["anything else", "need help", "assist", "let me know"]
            .iter()
            .any(|phrase| lower.contains(phrase))
        {
            cleaned = format!("{}.", cleaned.trim_end_matches('?').trim_end());
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_entities() {
        let prompt = compose_prompt(
            "a street with cars",
            &["Car: Approaching".to_string(), "Person: Stationary".to_string()],
        );
        assert!(prompt.contains("Context: \"a street with cars\""));
        assert!(prompt.contains("- Car: Approaching\n- Person: Stationary"));
        assert!(prompt.starts_with("SYSTEM:"));
    }

    #[test]
    fn prompt_without_entities() {
        let prompt = compose_prompt("an empty hallway", &[]);
        assert!(prompt.contains("- No objects detected."));
    }

    #[test]
    fn follow_up_offers_are_removed() {
        assert_eq!(
            clean_narration("A car is approaching from the left.  Would you like more details?"),
            "A car is approaching from the left."
        );
        assert_eq!(
            clean_narration("A bus waits ahead... Is there anything else I can assist you with? Thanks"),
            "A bus waits ahead."
        );
        assert_eq!(
            clean_narration("  A person\nstands nearby.\n\nLet me know if you need anything."),
            "A person stands nearby."
        );
    }

    #[test]
    fn trailing_assistant_question_becomes_statement() {
        assert_eq!(
            clean_narration("Can I assist further?"),
            "Can I assist further."
        );
        assert_eq!(clean_narration("Is that a dog?"), "Is that a dog?");
    }
}
