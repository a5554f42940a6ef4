//! # interview_client - Interview Preparation Client Library
//!
//! An async client for the interview preparation backend: job postings,
//! personal experiences, and AI-run mock interviews.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Typed request/response models for every REST endpoint
//! - Streaming answer submission via Server-Sent Events, with typed events,
//!   in-order delivery, and silent cancellation
//! - Persisted auth state, cleared automatically when the backend answers `401`
//! - Feedback report polling with a single cancellable task per owner
//!
//! ## Architecture
//!
//! - **`sse`**: byte stream to SSE records (UTF-8 carry, record framing)
//! - **`stream`**: SSE records to [`AnswerEvent`]s dispatched to an [`AnswerHandler`]
//! - **`client`**: [`InterviewClient`] REST calls and the [`ClientError`] taxonomy
//! - **`auth`**, **`session`**, **`poll`**: explicit state owned by the caller
//!
//! ## Example
//! ```no_run
//! use interview_client::auth::AuthStore;
//! use interview_client::client::InterviewClient;
//! use interview_client::options::TransportOptions;
//! use interview_client::stream::Callbacks;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = AuthStore::from_default_location()
//!         .unwrap_or_else(AuthStore::in_memory)
//!         .into_context();
//!     let client = InterviewClient::new(TransportOptions::from_env()?, auth)?;
//!
//!     let handle = client
//!         .submit_answer_stream(
//!             12,
//!             340,
//!             "I led the migration to async IO.",
//!             Callbacks::new()
//!                 .on_evaluation(|e| println!("rating: {}", e.rating))
//!                 .on_chunk(|text| print!("{text}"))
//!                 .on_end(|end| println!("\nnext question id: {}", end.question_id))
//!                 .on_error(|e| eprintln!("stream error: {e}")),
//!         )
//!         .await;
//!
//!     println!("{:?}", handle.join().await);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod poll;
pub mod session;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use auth::{AuthContext, AuthStore};
pub use client::{ClientError, InterviewClient};
pub use stream::{AnswerEvent, AnswerHandler, AnswerStreamHandle, StreamOutcome, StreamingAnswerChannel};
