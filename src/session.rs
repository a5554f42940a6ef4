//! Client-side state of one interview.
//!
//! [`InterviewSession`] is the transcript plus the currently outstanding
//! question. It can be driven by the non-streaming calls
//! ([`InterviewSession::add_question`], [`InterviewSession::add_answer`]) or
//! by answer stream events via [`InterviewSession::apply`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::model::{InterviewStartResponse, NextQuestionResponse, SubmitAnswerResponse};
use crate::stream::AnswerEvent;

/// Question type the backend uses for the opening question of a round.
pub const MAIN_QUESTION: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Question,
    Answer,
}

/// One entry in the interview transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewMessage {
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub question_id: Option<u64>,
    pub rating: Option<String>,
    pub notes: Option<Value>,
}

impl InterviewMessage {
    fn question(content: String, question_id: Option<u64>) -> Self {
        Self {
            kind: MessageKind::Question,
            content,
            timestamp: Utc::now(),
            question_id,
            rating: None,
            notes: None,
        }
    }

    fn answer(content: String) -> Self {
        Self {
            kind: MessageKind::Answer,
            content,
            timestamp: Utc::now(),
            question_id: None,
            rating: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InterviewSession {
    pub session_id: Option<u64>,
    pub job_posting_id: Option<u64>,
    pub selected_experience_ids: Vec<u64>,
    pub messages: Vec<InterviewMessage>,
    pub current_question_id: Option<u64>,
    pub current_question_type: Option<String>,
    pub current_round: u32,
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
    streaming_question: Option<String>,
}

impl InterviewSession {
    /// Begin a session from the backend's start response.
    pub fn start(response: &InterviewStartResponse, job_posting_id: u64, selected_experience_ids: Vec<u64>) -> Self {
        Self {
            session_id: Some(response.session_id),
            job_posting_id: Some(job_posting_id),
            selected_experience_ids,
            messages: vec![InterviewMessage::question(
                response.first_question.clone(),
                Some(response.first_question_id),
            )],
            current_question_id: Some(response.first_question_id),
            current_question_type: Some(MAIN_QUESTION.to_string()),
            current_round: 1,
            is_active: true,
            started_at: Some(Utc::now()),
            streaming_question: None,
        }
    }

    pub fn add_question(&mut self, question: &NextQuestionResponse) {
        self.messages.push(InterviewMessage::question(
            question.question.clone(),
            Some(question.question_id),
        ));
        self.current_question_id = Some(question.question_id);
        self.current_question_type = Some(question.question_type.clone());
        self.current_round = question.round_index;
    }

    /// Record an answer together with its evaluation (non-streaming flow).
    pub fn add_answer(&mut self, answer: &str, response: &SubmitAnswerResponse) {
        let mut message = InterviewMessage::answer(answer.to_string());
        message.rating = Some(response.rating.clone());
        message.notes = Some(Value::Object(response.notes.clone()));
        self.messages.push(message);
    }

    /// Record an answer whose evaluation will arrive on the answer stream.
    pub fn record_answer(&mut self, answer: &str) {
        self.messages.push(InterviewMessage::answer(answer.to_string()));
        self.streaming_question = None;
    }

    /// Fold one answer stream event into the session.
    pub fn apply(&mut self, event: &AnswerEvent) {
        match event {
            AnswerEvent::Evaluation(evaluation) => {
                match self.messages.iter_mut().rev().find(|m| m.kind == MessageKind::Answer) {
                    Some(answer) => {
                        answer.rating = Some(evaluation.rating.clone());
                        answer.notes = Some(evaluation.notes.clone());
                    }
                    None => warn!("evaluation received with no recorded answer"),
                }
            }
            AnswerEvent::QuestionChunk(chunk) => {
                self.streaming_question.get_or_insert_with(String::new).push_str(chunk);
            }
            AnswerEvent::QuestionEnd(end) => {
                let content = self.streaming_question.take().unwrap_or_default();
                self.messages
                    .push(InterviewMessage::question(content, Some(end.question_id)));
                self.current_question_id = Some(end.question_id);
                self.current_question_type = Some(end.question_type.clone());
                self.current_round = end.round_index;
            }
        }
    }

    /// Text of the question currently being streamed, if any.
    pub fn streaming_question(&self) -> Option<&str> {
        self.streaming_question.as_deref()
    }

    pub fn end(&mut self) {
        self.is_active = false;
        self.streaming_question = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
