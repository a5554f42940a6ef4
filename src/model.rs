//! Request and response models for the interview backend REST API.

use chrono::NaiveDateTime;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON object as used by the backend for structured content.
pub type JsonObject = Map<String, Value>;

/// An authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Partial user update applied on top of the stored user.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Body of `/auth/signup` and `/auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

/// Successful authentication response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

/// A personal experience (project, career, education, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experience {
    pub id: u64,
    pub user_id: String,
    /// One of `project | career | education | certification | language`
    pub category: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub content: JsonObject,
    /// Absent from the backend's read schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub content: JsonObject,
}

/// A registered job posting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobPosting {
    pub id: u64,
    pub user_id: String,
    /// `url` or `manual`
    pub source_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub sections: JsonObject,
    /// `draft | applied | interviewing | offer | rejected`
    pub status: String,
    #[serde(default)]
    pub application_qa: Vec<JsonObject>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPostingCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_qa: Option<Vec<JsonObject>>,
}

/// Response of the delete endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSummary {
    pub experiences: u64,
    pub jobs: u64,
    pub sessions: u64,
    #[serde(default)]
    pub recent: Vec<RecentSession>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentSession {
    pub id: u64,
    pub job_posting_id: u64,
    pub status: String,
    pub round: u32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub job_posting_id: u64,
    /// When absent the backend scores every experience of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RecommendedItem {
    pub experience_id: u64,
    pub score: f32,
    pub selected: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationResponse {
    pub items: Vec<RecommendedItem>,
}

/// Starts an interview; at least one experience must be selected.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewStartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub job_posting_id: u64,
    pub selected_experience_ids: NonEmpty<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewStartResponse {
    pub session_id: u64,
    pub first_question: String,
    pub first_question_id: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NextQuestionResponse {
    pub question: String,
    pub question_id: u64,
    pub question_type: String,
    pub round_index: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAnswerRequest<'a> {
    pub answer: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerResponse {
    pub rating: String,
    #[serde(default)]
    pub notes: JsonObject,
    /// `next_question | follow_up | end`
    pub next_action: String,
    pub follow_up_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndInterviewResponse {
    pub message: String,
    pub session_id: u64,
    pub report_id: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedbackResponse {
    pub overall: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas: Vec<String>,
    #[serde(default)]
    pub model_answer: String,
}

/// Progress of the asynchronous feedback report generation.
///
/// Only `status` is guaranteed; a `not_found` answer carries nothing else.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackStatus {
    pub status: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub report: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
}

impl FeedbackStatus {
    pub const PENDING: &'static str = "pending";
    pub const PROCESSING: &'static str = "processing";
    pub const COMPLETED: &'static str = "completed";
    pub const FAILED: &'static str = "failed";
    pub const NOT_FOUND: &'static str = "not_found";
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewSessionSummary {
    pub id: u64,
    pub user_id: String,
    pub job_posting_id: u64,
    pub status: String,
    pub current_round: u32,
    pub follow_up_count: u32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptItem {
    pub round: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub evaluation: Option<JsonObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResponse {
    pub items: Vec<TranscriptItem>,
}

/// Assessment of a submitted answer, delivered by the `evaluation` stream event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub rating: String,
    #[serde(default)]
    pub notes: Value,
}

/// Metadata closing a streamed question, delivered by `question_end`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEnd {
    pub question_id: u64,
    pub question_type: String,
    pub round_index: u32,
}
