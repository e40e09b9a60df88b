//! Renders the instruction text sent to the model.

const FALLBACK_TONE: &str = "professional and appropriate";

/// Descriptive phrase for a tone name. Unknown tones get a neutral phrase.
pub fn tone_instruction(tone: &str) -> &'static str {
    match tone {
        "professional" => "professional, polished, and business-appropriate",
        "friendly" => "warm, friendly, and approachable while remaining professional",
        "formal" => "formal, respectful, and highly professional with traditional business language",
        "casual" => "casual, relaxed, and conversational",
        _ => FALLBACK_TONE,
    }
}

/// Builds the prompt. Names, email and context are embedded verbatim.
pub fn build_prompt(
    user_name: &str,
    sender_name: &str,
    received_email: &str,
    tone: &str,
    additional_context: Option<&str>,
) -> String {
    let tone_phrase = tone_instruction(tone);

    let context_section = match additional_context {
        Some(context) if !context.is_empty() => {
            format!("\nAdditional context from {}:\n{}\n", user_name, context)
        }
        _ => String::new(),
    };

    format!(
        "You are helping {user} write a reply to an email they received.

Sender: {sender}
Recipient: {user}

Received Email:
{email}
{context}
Please write a {tone} email response that:
1. Addresses the sender by name ({sender})
2. Responds to every key point in their email
3. Keeps a {tone} tone throughout
4. Opens with a greeting and ends with a closing
5. Is signed by {user}

Generate only the email response text, without any additional commentary.",
        user = user_name,
        sender = sender_name,
        email = received_email,
        context = context_section,
        tone = tone_phrase,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_inputs_verbatim() {
        let email = "Line one\n\n  indented <b>tag</b> & \"quotes\" {braces}\r\nend";
        let prompt = build_prompt("José Ñ", "O'Brien", email, "casual", None);
        assert!(prompt.contains("José Ñ"));
        assert!(prompt.contains("O'Brien"));
        assert!(prompt.contains(email));
        assert!(prompt.contains("casual, relaxed, and conversational"));
    }

    #[test]
    fn test_long_email_is_not_truncated() {
        let email = "word ".repeat(3000);
        let prompt = build_prompt("a", "b", &email, "formal", None);
        assert!(prompt.contains(&email));
    }

    #[test]
    fn test_context_included_only_when_present() {
        let with = build_prompt("a", "b", "c", "friendly", Some("We met last week.\nBe brief."));
        assert!(with.contains("We met last week.\nBe brief."));

        let without = build_prompt("a", "b", "c", "friendly", None);
        assert!(!without.contains("Additional context"));
        assert_eq!(without, build_prompt("a", "b", "c", "friendly", Some("")));
    }

    #[test]
    fn test_unknown_tone_uses_neutral_phrase() {
        let prompt = build_prompt("a", "b", "c", "pirate", None);
        assert!(prompt.contains(FALLBACK_TONE));
    }

    #[test]
    fn test_sender_label_present() {
        let prompt = build_prompt("John Doe", "Jane Smith", "Can we meet Tuesday?", "professional", None);
        assert!(prompt.contains("Sender: Jane Smith"));
    }

    #[test]
    fn test_is_deterministic() {
        let a = build_prompt("a", "b", "c", "formal", Some("d"));
        let b = build_prompt("a", "b", "c", "formal", Some("d"));
        assert_eq!(a, b);
    }
}
