use crate::build_prompt::{Message, Role};

/// Append-only record of what the user and assistant have said this session.
#[derive(Clone, Debug)]
pub struct Transcript {
    entries: Vec<Message>,
}

impl Transcript {
    /// Starts a transcript with a single assistant greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            entries: vec![Message::new(Role::Assistant, greeting)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.entries.push(Message::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.entries.push(Message::new(Role::Assistant, content));
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    /// True when the latest entry is not the assistant's.
    pub fn needs_response(&self) -> bool {
        self.last().is_some_and(|m| m.role != Role::Assistant)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_one_greeting() {
        let t = Transcript::new("Ask me a question about SuccessFactors MDC document!");
        assert_eq!(t.len(), 1);
        assert_eq!(t.entries()[0].role, Role::Assistant);
        assert!(!t.needs_response());
    }

    #[test]
    fn user_entry_needs_a_response_until_answered() {
        let mut t = Transcript::new("hello");
        t.push_user("What is MDC?");
        assert!(t.needs_response());
        t.push_assistant("Metadata driven control.");
        assert!(!t.needs_response());
        let roles: Vec<Role> = t.entries().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
    }
}
