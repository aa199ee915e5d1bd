use std::fs;
use std::sync::Arc;

use docrag::mock::{MockChat, MockEmbedder};
use docrag::{
    respond, CondenseQuestionEngine, Dispatch, Interaction, LlmSettings, Role, Session, VectorIndex,
    DEFAULT_GREETING,
};

fn index_over(text: &str) -> Arc<VectorIndex> {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("feature.md"), text).unwrap();
    let cfg = docrag::Config::from_lookup(
        |key| match key {
            "DOCRAG_DOCS_DIR" => Some(dir.path().display().to_string()),
            _ => None,
        },
        docrag::Secrets {
            openai_key: Some("sk-test".to_string()),
            base_url: None,
        },
    )
    .unwrap();
    Arc::new(docrag::build_from_docs(&cfg, &MockEmbedder::default()).unwrap())
}

/// Drives one dispatch to completion the way the terminal app does.
fn drive(session: &mut Session, dispatch: Dispatch, chat: &Arc<MockChat>, index: &Arc<VectorIndex>) {
    let Dispatch::Generate { prompt } = dispatch else {
        return;
    };
    let engine = session.chat_engine(|| {
        CondenseQuestionEngine::new(
            index.clone(),
            Arc::new(MockEmbedder::default()),
            chat.clone(),
            LlmSettings::default(),
            2,
        )
    });
    let mut tokens = Vec::new();
    let result = respond(&engine, &prompt, &mut |t: &str| tokens.push(t.to_string()));
    for token in &tokens {
        session.push_token(token);
    }
    session.finish(result.map(|r| r.response).map_err(|e| e.to_string()));
}

#[test]
fn a_question_gets_one_streamed_answer() {
    let index = index_over("Feature X requires configuration Y");
    let chat = Arc::new(MockChat::new());
    let mut session = Session::new(DEFAULT_GREETING);

    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.transcript().entries()[0].role, Role::Assistant);

    let dispatch = session.handle(Interaction::Message("What does Feature X need?".to_string()));
    drive(&mut session, dispatch, &chat, &index);

    let entries = session.transcript().entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].role, Role::User);
    assert_eq!(entries[1].content, "What does Feature X need?");
    assert_eq!(entries[2].role, Role::Assistant);
    assert!(!entries[2].content.is_empty());
    assert!(entries[2].content.contains("configuration Y"));
    assert_eq!(chat.stream_calls(), 1);

    let dispatch = session.handle(Interaction::Rerender);
    assert_eq!(dispatch, Dispatch::Idle);
    drive(&mut session, dispatch, &chat, &index);
    assert_eq!(session.transcript().len(), 3);
    assert_eq!(chat.stream_calls(), 1);
}

#[test]
fn follow_ups_reuse_the_session_engine() {
    let index = index_over("Feature X requires configuration Y");
    let chat = Arc::new(MockChat::new());
    let mut session = Session::new(DEFAULT_GREETING);

    for question in ["What is Feature X?", "How do I configure it?"] {
        let dispatch = session.handle(Interaction::Message(question.to_string()));
        drive(&mut session, dispatch, &chat, &index);
    }

    assert_eq!(session.transcript().len(), 5);
    assert_eq!(chat.stream_calls(), 2);
    // The second turn had history to condense, the first did not.
    assert_eq!(chat.complete_calls(), 1);
}

#[test]
fn a_failed_turn_can_be_retried() {
    let index = index_over("Feature X requires configuration Y");
    let failing = Arc::new(MockChat::new().failing());
    let mut session = Session::new(DEFAULT_GREETING);

    let dispatch = session.handle(Interaction::Message("What is Feature X?".to_string()));
    drive(&mut session, dispatch, &failing, &index);
    assert_eq!(session.transcript().len(), 2);
    assert!(session.last_error().unwrap().contains("mock stream failure"));

    let dispatch = session.handle(Interaction::Rerender);
    assert_eq!(
        dispatch,
        Dispatch::Generate {
            prompt: "What is Feature X?".to_string()
        }
    );
}
