use std::sync::{Arc, Mutex, PoisonError};

use crate::chat_engine::{ChatResponse, CondenseQuestionEngine};
use crate::error::Result;
use crate::transcript::Transcript;

pub type SharedEngine = Arc<Mutex<CondenseQuestionEngine>>;

/// What the user just did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interaction {
    Message(String),
    /// Redraw without new input. Retries a question left unanswered by a failure.
    Rerender,
}

/// What the caller should do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Idle,
    /// A response is already streaming; the submission was dropped.
    Busy,
    Generate { prompt: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    AwaitingInput,
    AwaitingResponse,
}

/// Per-session chat state: the transcript, the in-flight answer and the cached engine.
pub struct Session {
    transcript: Transcript,
    engine: Option<SharedEngine>,
    state: TurnState,
    streaming: String,
    last_error: Option<String>,
}

impl Session {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::new(greeting),
            engine: None,
            state: TurnState::AwaitingInput,
            streaming: String::new(),
            last_error: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Partial answer while a response is streaming.
    pub fn streaming(&self) -> Option<&str> {
        match self.state {
            TurnState::AwaitingResponse => Some(&self.streaming),
            TurnState::AwaitingInput => None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn handle(&mut self, interaction: Interaction) -> Dispatch {
        match interaction {
            Interaction::Message(text) => {
                if text.trim().is_empty() {
                    return Dispatch::Idle;
                }
                if self.state == TurnState::AwaitingResponse {
                    tracing::debug!("submission rejected while a response is streaming");
                    return Dispatch::Busy;
                }
                self.transcript.push_user(text);
                self.guard()
            }
            Interaction::Rerender => self.guard(),
        }
    }

    fn guard(&mut self) -> Dispatch {
        if self.state == TurnState::AwaitingResponse || !self.transcript.needs_response() {
            return Dispatch::Idle;
        }
        let Some(prompt) = self.transcript.last().map(|m| m.content.clone()) else {
            return Dispatch::Idle;
        };
        self.state = TurnState::AwaitingResponse;
        self.streaming.clear();
        self.last_error = None;
        Dispatch::Generate { prompt }
    }

    pub fn push_token(&mut self, token: &str) {
        if self.state == TurnState::AwaitingResponse {
            self.streaming.push_str(token);
        }
    }

    /// Ends the in-flight turn. Errors are kept for display and add no entry.
    pub fn finish(&mut self, result: std::result::Result<String, String>) {
        if self.state != TurnState::AwaitingResponse {
            tracing::debug!("ignoring result with no turn in flight");
            return;
        }
        self.state = TurnState::AwaitingInput;
        self.streaming.clear();
        match result {
            Ok(text) => {
                let text = if text.trim().is_empty() {
                    "(empty response)".to_string()
                } else {
                    text
                };
                self.transcript.push_assistant(text);
            }
            Err(err) => {
                tracing::warn!(error = %err, "turn failed");
                self.last_error = Some(err);
            }
        }
    }

    /// The session's chat engine, created by `make` on first use.
    pub fn chat_engine<F>(&mut self, make: F) -> SharedEngine
    where
        F: FnOnce() -> CondenseQuestionEngine,
    {
        Arc::clone(
            self.engine
                .get_or_insert_with(|| Arc::new(Mutex::new(make()))),
        )
    }

    pub fn has_chat_engine(&self) -> bool {
        self.engine.is_some()
    }
}

/// Streams one answer from a shared engine.
pub fn respond(engine: &SharedEngine, prompt: &str, on_token: &mut dyn FnMut(&str)) -> Result<ChatResponse> {
    let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
    engine.stream_chat(prompt, on_token)
}
