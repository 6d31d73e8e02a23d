use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::debug;

use crate::{
    connection::ConnectionCell,
    db::{SpanStore, StoreError},
    types::{SpanId, SpanIdError},
    utils::decode_hex_payload,
};

pub const SPAN_ROUTE_PREFIX: &str = "/bor/span/";
pub const CLERK_STUB_BODY: &[u8] = br#"{"height":"0","result":[]}"#;
pub const SPAN_NOT_FOUND_MESSAGE: &str = "could not get span; span not found for id";

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    InvalidSpanId(SpanIdError),
    StoreUnavailable(StoreError),
    StoreData(StoreError),
    SpanNotFound(SpanId),
    MalformedSpan(eyre::Report),
}

impl From<SpanIdError> for ApiError {
    fn from(err: SpanIdError) -> Self {
        ApiError::InvalidSpanId(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_connection_error() {
            ApiError::StoreUnavailable(err)
        } else {
            ApiError::StoreData(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Same shape the upstream REST API uses: the inner SDK error is
        // carried as a JSON string.
        #[derive(Serialize)]
        struct SdkError {
            codespace: &'static str,
            code: u32,
            message: &'static str,
        }

        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        debug!("Request failed: {self:?}");

        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::InvalidSpanId(_) => StatusCode::BAD_REQUEST.into_response(),
            ApiError::StoreUnavailable(_)
            | ApiError::StoreData(_)
            | ApiError::MalformedSpan(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            ApiError::SpanNotFound(_) => {
                let body = serde_json::to_string(&SdkError {
                    codespace: "sdk",
                    code: 1,
                    message: SPAN_NOT_FOUND_MESSAGE,
                })
                .and_then(|error| serde_json::to_vec(&ErrorResponse { error }));

                match body {
                    Ok(body) => json_response(StatusCode::INTERNAL_SERVER_ERROR, body),
                    Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                }
            }
        }
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_LENGTH, HeaderValue::from(body.len())),
        ],
        body,
    )
        .into_response()
}

/// `GET /bor/span/{id}`: the stored span payload, hex-decoded, as the body.
pub async fn get_span<S: SpanStore>(
    State(cell): State<Arc<ConnectionCell<S>>>,
    method: Method,
    uri: Uri,
) -> Result<Response, ApiError> {
    if method != Method::GET {
        return Err(ApiError::NotFound);
    }

    let id: SpanId = uri
        .path()
        .strip_prefix(SPAN_ROUTE_PREFIX)
        .unwrap_or_default()
        .parse()?;
    debug!("Received request for span {id}");

    let payload = cell.fetch_span(id).await?.ok_or(ApiError::SpanNotFound(id))?;
    let body = decode_hex_payload(&payload).map_err(ApiError::MalformedSpan)?;

    Ok(json_response(StatusCode::OK, body))
}

/// `GET /clerk/*`: no state sync events are ever served.
pub async fn get_clerk(method: Method) -> Result<Response, ApiError> {
    if method != Method::GET {
        return Err(ApiError::NotFound);
    }

    Ok(json_response(StatusCode::OK, CLERK_STUB_BODY.to_vec()))
}
