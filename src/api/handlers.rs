//! `POST /{fileref}` and `GET /{fileref}` handlers (spec.md §4.3, §6).

use crate::core::error::Error;
use crate::distributor::DataDistributor;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

pub type SharedDistributor = Arc<DataDistributor>;

/// `POST /{fileref}`: splits and forwards the request body, per spec.md's
/// store path. `Content-Length` is required; its absence maps to 400.
pub async fn store(
    State(distributor): State<SharedDistributor>,
    Path(fileref): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let size = match content_length(&headers) {
        Some(n) => n,
        None => return (StatusCode::BAD_REQUEST, "missing Content-Length").into_response(),
    };

    let stream = body
        .into_data_stream()
        .map(|res| res.map_err(|e| Error::Wire(e.to_string())));

    match distributor.store(&fileref, size, stream).await {
        Ok(()) => {
            info!(fileref = %fileref, size, "store complete");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            warn!(fileref = %fileref, error = %e, "store failed");
            (StatusCode::from_u16(e.to_status_code()).unwrap(), e.to_string()).into_response()
        }
    }
}

/// `GET /{fileref}`: streams the reassembled object back, per spec.md's
/// retrieve path. A mid-stream failure after headers are sent simply ends
/// the body early — there is no clean way to report it to the client once
/// status 200 has committed (spec.md §9's open question).
pub async fn retrieve(
    State(distributor): State<SharedDistributor>,
    Path(fileref): Path<String>,
) -> Response {
    match distributor.retrieve(&fileref).await {
        Ok(stream) => {
            info!(fileref = %fileref, "retrieve starting");
            Body::from_stream(stream).into_response()
        }
        Err(e) => {
            warn!(fileref = %fileref, error = %e, "retrieve failed");
            (StatusCode::from_u16(e.to_status_code()).unwrap(), e.to_string()).into_response()
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(axum::http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn content_length_parses_present_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_LENGTH,
            HeaderValue::from_static("9007"),
        );
        assert_eq!(content_length(&headers), Some(9007));
    }

    #[test]
    fn content_length_absent_is_none() {
        assert_eq!(content_length(&HeaderMap::new()), None);
    }
}
