//! Streaming answer submission.
//!
//! Submitting an answer to `/interviews/{session}/answer/{question}/stream`
//! returns an SSE body carrying, in order:
//!
//! 1. one `evaluation` record for the submitted answer,
//! 2. zero or more `question_chunk` records with fragments of the next question,
//! 3. one `question_end` record with the new question's metadata,
//! 4. optionally a trailing `done` record.
//!
//! [`StreamingAnswerChannel`] reads that body and hands typed events to an
//! [`AnswerHandler`] in arrival order.
//!
//! Cancellation is silent: once the [`CancellationToken`] fires no handler
//! method is called again, `on_error` included, and the outcome is
//! [`StreamOutcome::Cancelled`].

use std::future::Future;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::client::ClientError;
use crate::model::{Evaluation, QuestionEnd};
use crate::sse::{SseRecord, SseStreamExt};

pub const EVENT_EVALUATION: &str = "evaluation";
pub const EVENT_QUESTION_CHUNK: &str = "question_chunk";
pub const EVENT_QUESTION_END: &str = "question_end";
pub const EVENT_DONE: &str = "done";

/// A decoded event from the answer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    /// Assessment of the submitted answer
    Evaluation(Evaluation),

    /// Fragment of the next question's text
    QuestionChunk(String),

    /// Metadata of the fully streamed question
    QuestionEnd(QuestionEnd),
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    content: Option<String>,
}

/// Decode one record into an [`AnswerEvent`].
///
/// Returns `Ok(None)` for `done` and for tags this client does not know,
/// whatever their payload. Fails with [`ClientError::Frame`] when the data
/// of a recognised record is not JSON or does not match the shape its tag
/// requires.
pub fn decode_event(record: &SseRecord) -> Result<Option<AnswerEvent>, ClientError> {
    let tag = match record.event.as_deref() {
        Some(tag @ (EVENT_EVALUATION | EVENT_QUESTION_CHUNK | EVENT_QUESTION_END)) => tag,
        Some(EVENT_DONE) => return Ok(None),
        other => {
            debug!(event = ?other, "ignoring unrecognised answer stream event");
            return Ok(None);
        }
    };

    let frame_error = |source| ClientError::Frame {
        event: record.event.clone(),
        source,
    };

    let payload: Value = serde_json::from_str(&record.data).map_err(frame_error)?;

    let event = match tag {
        EVENT_EVALUATION => AnswerEvent::Evaluation(serde_json::from_value(payload).map_err(frame_error)?),
        EVENT_QUESTION_CHUNK => {
            let chunk: ChunkPayload = serde_json::from_value(payload).map_err(frame_error)?;
            AnswerEvent::QuestionChunk(chunk.content.unwrap_or_default())
        }
        _ => AnswerEvent::QuestionEnd(serde_json::from_value(payload).map_err(frame_error)?),
    };

    Ok(Some(event))
}

/// Receiver of answer stream events.
///
/// Every method defaults to doing nothing, so implementors only override
/// what they care about. Calls happen sequentially on the stream's task.
pub trait AnswerHandler: Send {
    fn on_evaluation(&mut self, _evaluation: Evaluation) {}

    fn on_chunk(&mut self, _chunk: String) {}

    fn on_end(&mut self, _end: QuestionEnd) {}

    /// Transport failures, non-success statuses, and malformed records.
    ///
    /// Malformed records do not end the stream; check
    /// [`ClientError::is_fatal`] to tell them apart.
    fn on_error(&mut self, _error: ClientError) {}

    fn dispatch(&mut self, event: AnswerEvent) {
        match event {
            AnswerEvent::Evaluation(evaluation) => self.on_evaluation(evaluation),
            AnswerEvent::QuestionChunk(chunk) => self.on_chunk(chunk),
            AnswerEvent::QuestionEnd(end) => self.on_end(end),
        }
    }
}

/// Queue-based consumption: events and errors are pushed in arrival order.
impl AnswerHandler for mpsc::UnboundedSender<Result<AnswerEvent, ClientError>> {
    fn on_error(&mut self, error: ClientError) {
        let _ = self.send(Err(error));
    }

    fn dispatch(&mut self, event: AnswerEvent) {
        let _ = self.send(Ok(event));
    }
}

type Callback<T> = Box<dyn FnMut(T) + Send>;

/// Closure-based handler with one optional callback per event.
///
/// # Example
/// ```
/// use interview_client::stream::Callbacks;
///
/// let handler = Callbacks::new()
///     .on_chunk(|text| print!("{text}"))
///     .on_end(|end| println!("\n(question {})", end.question_id));
/// # drop(handler);
/// ```
#[derive(Default)]
pub struct Callbacks {
    evaluation: Option<Callback<Evaluation>>,
    chunk: Option<Callback<String>>,
    end: Option<Callback<QuestionEnd>>,
    error: Option<Callback<ClientError>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_evaluation(mut self, f: impl FnMut(Evaluation) + Send + 'static) -> Self {
        self.evaluation = Some(Box::new(f));
        self
    }

    pub fn on_chunk(mut self, f: impl FnMut(String) + Send + 'static) -> Self {
        self.chunk = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl FnMut(QuestionEnd) + Send + 'static) -> Self {
        self.end = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(ClientError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl AnswerHandler for Callbacks {
    fn on_evaluation(&mut self, evaluation: Evaluation) {
        if let Some(f) = self.evaluation.as_mut() {
            f(evaluation);
        }
    }

    fn on_chunk(&mut self, chunk: String) {
        if let Some(f) = self.chunk.as_mut() {
            f(chunk);
        }
    }

    fn on_end(&mut self, end: QuestionEnd) {
        if let Some(f) = self.end.as_mut() {
            f(end);
        }
    }

    fn on_error(&mut self, error: ClientError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }
}

/// How a streamed answer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The server closed the stream.
    Completed,
    /// The caller cancelled; nothing was reported after that point.
    Cancelled,
    /// A fatal error was reported through `on_error`.
    Failed,
}

/// Handle to an in-flight streamed answer.
///
/// Dropping the handle does not cancel the stream.
#[derive(Debug)]
pub struct AnswerStreamHandle {
    token: CancellationToken,
    task: JoinHandle<StreamOutcome>,
}

impl AnswerStreamHandle {
    /// Abort the request. No handler method runs after this returns,
    /// except one that was already executing.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A clone of the token driving cancellation, e.g. to race it against a timer.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the stream to end.
    pub async fn join(self) -> StreamOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => StreamOutcome::Cancelled,
            Err(e) => {
                error!(error = %e, "answer stream task panicked");
                StreamOutcome::Failed
            }
        }
    }
}

/// Reads one streamed answer response and dispatches its events.
pub struct StreamingAnswerChannel;

impl StreamingAnswerChannel {
    /// Spawn the request and the read loop with a fresh cancellation token.
    ///
    /// `response` is the pending HTTP exchange; it must already have mapped
    /// non-success statuses to errors.
    pub fn open<F, H>(response: F, handler: H) -> AnswerStreamHandle
    where
        F: Future<Output = Result<reqwest::Response, ClientError>> + Send + 'static,
        H: AnswerHandler + 'static,
    {
        Self::open_with_token(response, handler, CancellationToken::new())
    }

    /// Like [`open`](Self::open) but cancelled through a caller-owned token.
    pub fn open_with_token<F, H>(response: F, mut handler: H, token: CancellationToken) -> AnswerStreamHandle
    where
        F: Future<Output = Result<reqwest::Response, ClientError>> + Send + 'static,
        H: AnswerHandler + 'static,
    {
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let response = tokio::select! {
                biased;
                _ = task_token.cancelled() => return StreamOutcome::Cancelled,
                response = response => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    if task_token.is_cancelled() {
                        return StreamOutcome::Cancelled;
                    }
                    handler.on_error(e);
                    return StreamOutcome::Failed;
                }
            };

            if response.content_length() == Some(0) {
                handler.on_error(ClientError::MissingBody);
                return StreamOutcome::Failed;
            }

            Self::drive(response.bytes_stream(), &mut handler, &task_token).await
        });

        AnswerStreamHandle { token, task }
    }

    /// Read loop over any byte stream.
    ///
    /// Checks the token before every dispatch, so records that were already
    /// buffered are dropped once cancellation is requested. A frame error is
    /// reported and reading continues; a transport error is reported and
    /// ends the loop.
    pub async fn drive<S, E, H>(bytes: S, handler: &mut H, token: &CancellationToken) -> StreamOutcome
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<ClientError> + Send,
        H: AnswerHandler + ?Sized,
    {
        let records = bytes.sse_records();
        futures::pin_mut!(records);

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return StreamOutcome::Cancelled,
                next = records.next() => next,
            };

            if token.is_cancelled() {
                return StreamOutcome::Cancelled;
            }

            match next {
                None => {
                    debug!("answer stream closed by server");
                    return StreamOutcome::Completed;
                }
                Some(Err(e)) => {
                    handler.on_error(e);
                    return StreamOutcome::Failed;
                }
                Some(Ok(record)) => match decode_event(&record) {
                    Ok(Some(event)) => handler.dispatch(event),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "skipping malformed answer stream record");
                        handler.on_error(e);
                    }
                },
            }
        }
    }
}
