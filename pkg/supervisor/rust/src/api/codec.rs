// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Wire shapes and response builders shared by every handler.

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use log::error;
use serde::{Deserialize, Serialize};

pub type ApiBody = BoxBody<Bytes, std::io::Error>;
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest request body a handler will buffer.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

pub const INVALID_REQUEST: &str = "not a valid request";
pub const INVALID_REQUEST_FORMAT: &str = "not a valid request format";
pub const SHUTDOWN_MESSAGE: &str = "Shutdown...";

static NOTFOUND: &[u8] = b"Not found";
static METHOD_NOT_ALLOWED: &[u8] = b"Method not allowed";
static INTERNAL_ERROR: &[u8] = b"Internal server error";

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

/// Body of every mutating endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
}

impl OperationResult {
    pub fn new(success: bool) -> Self {
        Self { success }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramOutcome {
    pub name: String,
    pub success: bool,
}

/// Strict-mode bulk response. Clients that only read `success` still work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub success: bool,
    pub results: Vec<ProgramOutcome>,
}

fn full(bytes: impl Into<Bytes>) -> ApiBody {
    Full::new(bytes.into()).map_err(|e| match e {}).boxed()
}

fn respond(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: ApiBody,
) -> Response<ApiBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

/// 200 with `value` as JSON, newline-terminated.
pub fn json<T: Serialize>(value: &T) -> Response<ApiBody> {
    match serde_json::to_vec(value) {
        Ok(mut body) => {
            body.push(b'\n');
            respond(StatusCode::OK, Some(JSON), full(body))
        }
        Err(e) => {
            error!("Failed to serialize response: {e}");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(TEXT),
                full(INTERNAL_ERROR),
            )
        }
    }
}

pub fn text(status: StatusCode, message: &'static str) -> Response<ApiBody> {
    respond(status, Some(TEXT), full(message))
}

pub fn bad_request(message: &'static str) -> Response<ApiBody> {
    text(StatusCode::BAD_REQUEST, message)
}

/// 200 with no content.
pub fn empty() -> Response<ApiBody> {
    respond(
        StatusCode::OK,
        None,
        Empty::<Bytes>::new().map_err(|e| match e {}).boxed(),
    )
}

pub fn not_found() -> Response<ApiBody> {
    respond(StatusCode::NOT_FOUND, Some(TEXT), full(NOTFOUND))
}

pub fn method_not_allowed(allowed: &[&str]) -> Response<ApiBody> {
    let mut response = respond(
        StatusCode::METHOD_NOT_ALLOWED,
        Some(TEXT),
        full(METHOD_NOT_ALLOWED),
    );
    match HeaderValue::from_str(&allowed.join(", ")) {
        Ok(value) => {
            response.headers_mut().insert(ALLOW, value);
        }
        Err(e) => error!("Failed to build Allow header: {e}"),
    }
    response
}

/// Collect a request body into memory, failing past [`MAX_BODY_SIZE`].
pub async fn read_body<B>(body: B) -> Result<Bytes, BoxError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    Ok(Limited::new(body, MAX_BODY_SIZE).collect().await?.to_bytes())
}
