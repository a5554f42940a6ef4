//! Error types and the REST client for the interview backend.

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::AuthContext;
use crate::http::{add_bearer, add_extra_headers, build_http_client, build_streaming_client, status_error};
use crate::model::{
    AuthResponse, Credentials, DashboardSummary, DeleteResponse, EndInterviewResponse, Experience,
    ExperienceCreate, FeedbackResponse, FeedbackStatus, InterviewSessionSummary,
    InterviewStartRequest, InterviewStartResponse, JobPosting, JobPostingCreate,
    NextQuestionResponse, RecommendationRequest, RecommendationResponse, SubmitAnswerRequest,
    SubmitAnswerResponse, TranscriptResponse,
};
use crate::options::TransportOptions;
use crate::stream::{AnswerHandler, AnswerStreamHandle, StreamingAnswerChannel};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A single stream record carried a payload that could not be decoded.
    #[error("malformed {} frame: {source}", .event.as_deref().unwrap_or("untagged"))]
    Frame {
        event: Option<String>,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The backend answered `401`; stored credentials have been cleared.
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Response has no body to stream")]
    MissingBody,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the error ends a stream (as opposed to a single bad record).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ClientError::Frame { .. })
    }
}

/// Check a response status, expiring the shared auth store on `401`.
pub(crate) async fn check_response(
    response: reqwest::Response,
    auth: &AuthContext,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        warn!(url = %response.url(), "backend rejected credentials, clearing stored session");
        if let Err(e) = auth.write().await.expire() {
            warn!(error = %e, "failed to persist cleared credentials");
        }
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

async fn send_checked(req: RequestBuilder, auth: AuthContext) -> Result<reqwest::Response, ClientError> {
    let response = req.send().await?;
    check_response(response, &auth).await
}

/// Client for the interview preparation backend.
///
/// Every request carries the bearer token held by the shared [`AuthContext`],
/// and any `401` clears that context.
///
/// # Example
/// ```no_run
/// use interview_client::auth::AuthStore;
/// use interview_client::client::InterviewClient;
/// use interview_client::options::TransportOptions;
///
/// # async fn run() -> Result<(), interview_client::ClientError> {
/// let auth = AuthStore::in_memory().into_context();
/// let client = InterviewClient::new(TransportOptions::from_env()?, auth)?;
/// client.login("me@example.com", "hunter2").await?;
/// for job in client.list_jobs().await? {
///     println!("{} {}", job.id, job.status);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InterviewClient {
    http: reqwest::Client,
    streaming: reqwest::Client,
    options: TransportOptions,
    auth: AuthContext,
}

impl InterviewClient {
    pub fn new(options: TransportOptions, auth: AuthContext) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client(&options)?,
            streaming: build_streaming_client(&options)?,
            options,
            auth,
        })
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// The auth context shared with this client.
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    async fn request(&self, client: &reqwest::Client, method: Method, path: &str) -> RequestBuilder {
        let url = self.options.url(path);
        debug!(%method, %url, "api request");

        let token = self.auth.read().await.token().cloned();
        let req = add_bearer(client.request(method, url), token.as_ref());
        add_extra_headers(req, &self.options.extra_headers)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let response = check_response(req.send().await?, &self.auth).await?;
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let req = self.request(&self.http, Method::GET, path).await;
        self.send(req).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let req = self.request(&self.http, Method::POST, path).await.json(body);
        self.send(req).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let req = self.request(&self.http, Method::PUT, path).await.json(body);
        self.send(req).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let req = self.request(&self.http, Method::DELETE, path).await;
        self.send(req).await
    }

    // --- Auth ---

    pub async fn signup(&self, email: &str, password: &str, name: Option<&str>) -> Result<AuthResponse, ClientError> {
        let response: AuthResponse = self
            .post("/auth/signup", &Credentials { email, password, name })
            .await?;
        self.remember(&response).await?;
        Ok(response)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let response: AuthResponse = self
            .post("/auth/login", &Credentials { email, password, name: None })
            .await?;
        self.remember(&response).await?;
        Ok(response)
    }

    async fn remember(&self, response: &AuthResponse) -> Result<(), ClientError> {
        info!(user_id = response.user.id, "authenticated");
        self.auth
            .write()
            .await
            .set_auth(response.user.clone(), response.access_token.clone().into())
    }

    /// Forget the stored credentials.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.auth.write().await.logout()
    }

    // --- Dashboard ---

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ClientError> {
        self.get("/dashboard/summary").await
    }

    // --- Experiences ---

    pub async fn list_experiences(&self) -> Result<Vec<Experience>, ClientError> {
        self.get("/experiences/").await
    }

    pub async fn get_experience(&self, id: u64) -> Result<Experience, ClientError> {
        self.get(&format!("/experiences/{id}")).await
    }

    pub async fn create_experience(&self, data: &ExperienceCreate) -> Result<Experience, ClientError> {
        self.post("/experiences/", data).await
    }

    pub async fn update_experience(&self, id: u64, data: &ExperienceCreate) -> Result<Experience, ClientError> {
        self.put(&format!("/experiences/{id}"), data).await
    }

    pub async fn delete_experience(&self, id: u64) -> Result<DeleteResponse, ClientError> {
        self.delete(&format!("/experiences/{id}")).await
    }

    // --- Job postings ---

    pub async fn list_jobs(&self) -> Result<Vec<JobPosting>, ClientError> {
        self.get("/jobs/").await
    }

    pub async fn get_job(&self, id: u64) -> Result<JobPosting, ClientError> {
        self.get(&format!("/jobs/{id}")).await
    }

    pub async fn create_job(&self, data: &JobPostingCreate) -> Result<JobPosting, ClientError> {
        self.post("/jobs/", data).await
    }

    pub async fn update_job(&self, id: u64, data: &JobPostingCreate) -> Result<JobPosting, ClientError> {
        self.put(&format!("/jobs/{id}"), data).await
    }

    pub async fn delete_job(&self, id: u64) -> Result<DeleteResponse, ClientError> {
        self.delete(&format!("/jobs/{id}")).await
    }

    // --- Recommendations ---

    pub async fn recommendations(&self, request: &RecommendationRequest) -> Result<RecommendationResponse, ClientError> {
        self.post("/recommendations/", request).await
    }

    // --- Interviews ---

    pub async fn start_interview(&self, request: &InterviewStartRequest) -> Result<InterviewStartResponse, ClientError> {
        self.post("/interviews/start", request).await
    }

    pub async fn next_question(&self, session_id: u64) -> Result<NextQuestionResponse, ClientError> {
        self.get(&format!("/interviews/{session_id}/next")).await
    }

    /// Submit an answer and wait for the full evaluation (non-streaming).
    pub async fn submit_answer(
        &self,
        session_id: u64,
        question_id: u64,
        answer: &str,
    ) -> Result<SubmitAnswerResponse, ClientError> {
        self.post(
            &format!("/interviews/{session_id}/answer/{question_id}"),
            &SubmitAnswerRequest { answer },
        )
        .await
    }

    /// Submit a recorded answer as an audio file (`file` multipart field).
    ///
    /// The backend transcribes it and evaluates the text like
    /// [`submit_answer`](Self::submit_answer).
    pub async fn submit_answer_audio(
        &self,
        session_id: u64,
        question_id: u64,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<SubmitAnswerResponse, ClientError> {
        let form = Form::new().part("file", Part::bytes(audio).file_name(file_name.to_string()));
        let req = self
            .request(
                &self.http,
                Method::POST,
                &format!("/interviews/{session_id}/answer/{question_id}/audio"),
            )
            .await
            .multipart(form);
        self.send(req).await
    }

    /// Submit an answer and stream the evaluation plus the next question.
    ///
    /// Events are delivered to `handler` in arrival order on a spawned task;
    /// see [`StreamingAnswerChannel`] for the delivery and cancellation
    /// contract. Must be called from within a tokio runtime.
    pub async fn submit_answer_stream<H>(
        &self,
        session_id: u64,
        question_id: u64,
        answer: &str,
        handler: H,
    ) -> AnswerStreamHandle
    where
        H: AnswerHandler + 'static,
    {
        let req = self
            .request(
                &self.streaming,
                Method::POST,
                &format!("/interviews/{session_id}/answer/{question_id}/stream"),
            )
            .await
            .json(&SubmitAnswerRequest { answer });

        StreamingAnswerChannel::open(send_checked(req, self.auth.clone()), handler)
    }

    pub async fn end_interview(&self, session_id: u64) -> Result<EndInterviewResponse, ClientError> {
        let req = self
            .request(&self.http, Method::POST, &format!("/interviews/{session_id}/end"))
            .await;
        self.send(req).await
    }

    pub async fn feedback(&self, session_id: u64) -> Result<FeedbackResponse, ClientError> {
        self.get(&format!("/interviews/{session_id}/feedback")).await
    }

    pub async fn feedback_status(&self, session_id: u64) -> Result<FeedbackStatus, ClientError> {
        self.get(&format!("/interviews/{session_id}/feedback/status")).await
    }

    pub async fn transcript(&self, session_id: u64) -> Result<TranscriptResponse, ClientError> {
        self.get(&format!("/interviews/{session_id}/transcript")).await
    }

    pub async fn list_sessions(&self, include_legacy: bool) -> Result<Vec<InterviewSessionSummary>, ClientError> {
        let mut req = self.request(&self.http, Method::GET, "/interviews/").await;
        if include_legacy {
            req = req.query(&[("include_legacy", "true")]);
        }
        self.send(req).await
    }
}
