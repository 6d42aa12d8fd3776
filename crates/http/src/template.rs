//! ChatML prompt rendering for Qwen-family models.

use xiyan_llm::ChatMessage;

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

/// Renders chat messages into the single prompt string the engine consumes.
#[derive(Debug, Clone, Default)]
pub struct ChatTemplate {
    /// Inserted when the conversation does not open with a system message.
    default_system: Option<String>,
}

impl ChatTemplate {
    #[must_use]
    pub fn new(default_system: Option<String>) -> Self {
        Self { default_system }
    }

    /// Renders `messages` and appends the assistant generation prompt.
    #[must_use]
    pub fn render(&self, messages: &[ChatMessage]) -> String {
        let mut prompt = String::new();
        let opens_with_system =
            messages.first().is_some_and(|m| m.role == xiyan_llm::Role::System);
        if let Some(system) = self.default_system.as_deref().filter(|_| !opens_with_system) {
            push_turn(&mut prompt, "system", system);
        }
        for message in messages {
            push_turn(&mut prompt, message.role.as_str(), &message.content);
        }
        prompt.push_str(IM_START);
        prompt.push_str("assistant\n");
        prompt
    }
}

fn push_turn(prompt: &mut String, role: &str, content: &str) {
    prompt.push_str(IM_START);
    prompt.push_str(role);
    prompt.push('\n');
    prompt.push_str(content);
    prompt.push_str(IM_END);
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_generation_prompt() {
        let prompt = ChatTemplate::default()
            .render(&[ChatMessage::system("schema"), ChatMessage::user("question")]);
        assert_eq!(
            prompt,
            "<|im_start|>system\nschema<|im_end|>\n\
             <|im_start|>user\nquestion<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_default_system_only_when_missing() {
        let template = ChatTemplate::new(Some("You are a helpful assistant.".to_owned()));
        let without = template.render(&[ChatMessage::user("hi")]);
        assert!(without.starts_with("<|im_start|>system\nYou are a helpful assistant.<|im_end|>\n"));

        let with = template.render(&[ChatMessage::system("custom"), ChatMessage::user("hi")]);
        assert!(!with.contains("helpful assistant"));
        assert!(with.starts_with("<|im_start|>system\ncustom"));
    }
}
