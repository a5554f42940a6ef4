//! HTTP client utilities for talking to the interview backend.
//!
//! This module provides client construction, header handling, and the
//! status check shared by every REST call and the answer stream.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;

use crate::client::ClientError;
use crate::options::{SecretString, TransportOptions};

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, reqwest::Error> {
    build_client(transport_options, true)
}

/// Build a client for long-lived streamed responses.
///
/// Identical to [`build_http_client`] except no overall request timeout is
/// set, since a streamed answer legitimately stays open while tokens arrive.
pub fn build_streaming_client(transport_options: &TransportOptions) -> Result<Client, reqwest::Error> {
    build_client(transport_options, false)
}

fn build_client(transport_options: &TransportOptions, with_timeout: bool) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if with_timeout {
        if let Some(timeout) = transport_options.timeout {
            builder = builder.timeout(timeout);
        }
    }

    if let Some(proxy_url) = &transport_options.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Attach `Authorization: Bearer <token>` when a token is present.
pub fn add_bearer(request: RequestBuilder, token: Option<&SecretString>) -> RequestBuilder {
    match token {
        Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret())),
        None => request,
    }
}

/// FastAPI error body: `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Map a non-success status and its body to a [`ClientError`].
///
/// `401` maps to [`ClientError::SessionExpired`]; clearing stored
/// credentials is the caller's job.
pub fn status_error(status: StatusCode, body: &str) -> ClientError {
    if status == StatusCode::UNAUTHORIZED {
        return ClientError::SessionExpired;
    }

    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { detail: serde_json::Value::String(detail) }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.to_string(),
    };

    ClientError::Status { status, message }
}
