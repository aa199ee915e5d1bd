use std::sync::Arc;

use crate::build_prompt::{build_condense_prompt, build_prompt_with_context, Message, Role};
use crate::config::LlmSettings;
use crate::embed_chunks::Embedder;
use crate::error::Result;
use crate::generate::ChatModel;
use crate::index::VectorIndex;
use crate::retrieve_chunks::Hit;

/// Result of one chat turn.
#[derive(Clone, Debug)]
pub struct ChatResponse {
    pub response: String,
    /// The question actually used for retrieval.
    pub condensed_question: String,
    pub sources: Vec<Hit>,
}

/// Chat over an index in condense-question mode.
///
/// Each follow-up is first rewritten into a standalone question using the
/// conversation so far; that question drives retrieval, and the answer is
/// generated from the retrieved chunks only.
pub struct CondenseQuestionEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    settings: LlmSettings,
    top_k: usize,
    history: Vec<Message>,
}

impl CondenseQuestionEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        settings: LlmSettings,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            chat,
            settings,
            top_k: top_k.max(1),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn condense_question(&self, message: &str) -> Result<String> {
        if self.history.is_empty() {
            return Ok(message.to_string());
        }
        let prompt = build_condense_prompt(&self.history, message);
        let condensed = self.chat.complete(&prompt)?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            return Ok(message.to_string());
        }
        tracing::info!(original = message, condensed, "condensed question");
        Ok(condensed.to_string())
    }

    /// Runs one turn, passing answer tokens to `on_token` as they arrive.
    ///
    /// History is only extended when the whole turn succeeds.
    pub fn stream_chat(&mut self, message: &str, on_token: &mut dyn FnMut(&str)) -> Result<ChatResponse> {
        let condensed_question = self.condense_question(message)?;
        let query = self.embedder.embed_query(&condensed_question)?;
        let sources = self.index.retrieve(&query, self.top_k);
        tracing::info!(
            question = %condensed_question,
            sources = sources.len(),
            "retrieved context"
        );

        let (messages, _context) = build_prompt_with_context(&self.settings, &condensed_question, &sources);
        let response = self.chat.stream(&messages, on_token)?;

        self.history.push(Message::new(Role::User, message));
        self.history.push(Message::new(Role::Assistant, response.clone()));
        Ok(ChatResponse {
            response,
            condensed_question,
            sources,
        })
    }

    pub fn chat(&mut self, message: &str) -> Result<ChatResponse> {
        self.stream_chat(message, &mut |_: &str| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mock::{MockChat, MockEmbedder};
    use crate::scan_files::Document;
    use crate::test_support::test_config;
    use std::path::Path;

    fn engine(chat: Arc<MockChat>) -> CondenseQuestionEngine {
        let mut cfg: Config = test_config(Path::new("."));
        cfg.chunk_size = 0;
        let embedder = Arc::new(MockEmbedder::default());
        let docs = vec![
            Document {
                path: "x.md".to_string(),
                text: "Feature X requires configuration Y".to_string(),
            },
            Document {
                path: "sync.md".to_string(),
                text: "Offline sync uses a local database".to_string(),
            },
        ];
        let index = Arc::new(VectorIndex::from_documents(&docs, &cfg, embedder.as_ref()).unwrap());
        CondenseQuestionEngine::new(index, embedder, chat, LlmSettings::default(), 1)
    }

    #[test]
    fn first_turn_skips_condensing_and_streams() {
        let chat = Arc::new(MockChat::new());
        let mut engine = engine(chat.clone());

        let mut tokens = Vec::new();
        let res = engine
            .stream_chat("What does Feature X require?", &mut |t: &str| tokens.push(t.to_string()))
            .unwrap();

        assert_eq!(chat.complete_calls(), 0);
        assert_eq!(res.condensed_question, "What does Feature X require?");
        assert_eq!(res.sources[0].path, "x.md");
        assert!(res.response.contains("configuration Y"));
        assert_eq!(tokens.concat(), res.response);
        assert!(tokens.len() > 1);
        assert_eq!(engine.history().len(), 2);

        let prompt = chat.last_prompt();
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains("MDC"));
    }

    #[test]
    fn follow_up_is_condensed_before_retrieval() {
        let chat = Arc::new(MockChat::new().with_condensed("How is offline sync stored?"));
        let mut engine = engine(chat.clone());
        engine.chat("Tell me about Feature X").unwrap();

        let res = engine.chat("and the other thing?").unwrap();
        assert_eq!(chat.complete_calls(), 1);
        assert_eq!(res.condensed_question, "How is offline sync stored?");
        assert_eq!(res.sources[0].path, "sync.md");
        assert_eq!(engine.history().len(), 4);
        assert_eq!(engine.history()[2].content, "and the other thing?");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn condensed_question_is_logged_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let chat = Arc::new(MockChat::new().with_condensed("How is offline sync stored?"));
        let mut engine = engine(chat);
        tracing::subscriber::with_default(subscriber, || {
            engine.chat("Tell me about Feature X").unwrap();
            engine.chat("and the other thing?").unwrap();
        });

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("condensed question"), "log was: {}", out);
        assert!(out.contains("How is offline sync stored?"));
    }

    #[test]
    fn failed_turn_leaves_history_untouched() {
        let chat = Arc::new(MockChat::new().failing());
        let mut engine = engine(chat);
        assert!(engine.chat("What does Feature X require?").is_err());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn reset_forgets_the_conversation() {
        let chat = Arc::new(MockChat::new());
        let mut engine = engine(chat.clone());
        engine.chat("first").unwrap();
        engine.reset();
        engine.chat("second").unwrap();
        assert_eq!(chat.complete_calls(), 0);
    }
}
