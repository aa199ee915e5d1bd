use serde::{Deserialize, Serialize};

use crate::config::LlmSettings;
use crate::retrieve_chunks::Hit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

pub fn build_prompt_with_context(
    settings: &LlmSettings,
    question: &str,
    hits: &[Hit],
) -> (Vec<Message>, String) {
    let context = format_context_from_hits(hits);

    let user_content = format!(
        "Context information is below.\n---------------------\n{}\n---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}\nAnswer: ",
        context, question
    );

    let messages = vec![
        Message::new(Role::System, settings.system_prompt.clone()),
        Message::new(Role::User, user_content),
    ];

    (messages, context)
}

/// Asks the model to fold the conversation into one standalone question.
pub fn build_condense_prompt(history: &[Message], question: &str) -> Vec<Message> {
    let chat_history = history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let content = format!(
        "Given a conversation (between Human and Assistant) and a follow up message from Human, \
         rewrite the message to be a standalone question that captures all relevant context \
         from the conversation.\n\n<Chat History>\n{}\n\n<Follow Up Message>\n{}\n\n<Standalone question>\n",
        chat_history, question
    );

    vec![Message::new(Role::User, content)]
}

pub fn format_context_from_hits(hits: &[Hit]) -> String {
    let context_lines: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] {} (chunk {})\n{}", i + 1, hit.path, hit.chunk_index, hit.text))
        .collect();

    if context_lines.is_empty() {
        "(no context found)".to_string()
    } else {
        context_lines.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, idx: usize, text: &str) -> Hit {
        Hit {
            path: path.to_string(),
            chunk_index: idx,
            text: text.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn qa_prompt_carries_system_prompt_and_context() {
        let settings = LlmSettings::default();
        let hits = vec![hit("docs/x.md", 0, "Feature X requires configuration Y")];
        let (messages, context) = build_prompt_with_context(&settings, "What does X need?", &hits);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, settings.system_prompt);
        assert_eq!(context, "[1] docs/x.md (chunk 0)\nFeature X requires configuration Y");
        assert!(messages[1].content.contains(&context));
        assert!(messages[1].content.contains("Query: What does X need?"));
    }

    #[test]
    fn empty_hits_say_so() {
        assert_eq!(format_context_from_hits(&[]), "(no context found)");
    }

    #[test]
    fn condense_prompt_lists_history_in_order() {
        let history = vec![
            Message::new(Role::User, "What is Feature X?"),
            Message::new(Role::Assistant, "A toggle."),
        ];
        let messages = build_condense_prompt(&history, "How do I enable it?");
        assert_eq!(messages.len(), 1);
        let body = &messages[0].content;
        let user_at = body.find("user: What is Feature X?").unwrap();
        let assistant_at = body.find("assistant: A toggle.").unwrap();
        assert!(user_at < assistant_at);
        assert!(body.contains("<Follow Up Message>\nHow do I enable it?"));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::new(Role::Assistant, "hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
