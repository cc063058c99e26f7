//! `GET /video/:name`: byte-range streaming with seek throttling.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::Extension;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use serde::Deserialize;

use super::error::AppError;
use super::request_id::RequestId;
use super::AppContext;
use crate::auth::Credential;
use crate::streaming::StreamRequest;

/// Origin used when neither the socket address nor a trusted header is known.
const UNKNOWN_ORIGIN: &str = "unknown";

#[derive(Debug, Default, Deserialize)]
pub struct VideoQuery {
    /// Credential for clients that cannot set headers (e.g. `<video src>`).
    pub token: Option<String>,
}

pub async fn stream_video(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
    Query(query): Query<VideoQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request_id: Option<Extension<RequestId>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let credential = bearer
        .and_then(|TypedHeader(auth)| Credential::new(auth.token()))
        .or_else(|| query.token.and_then(Credential::new));

    let request = StreamRequest {
        resource: name,
        credential,
        origin: client_origin(
            &headers,
            connect_info.map(|ConnectInfo(addr)| addr),
            ctx.config.server.trust_forwarded_for,
        ),
        range: headers
            .get(header::RANGE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
    };

    ctx.engine.serve(request).await.map_err(|e| {
        let err = AppError::from(e);
        match request_id {
            Some(Extension(RequestId(id))) => err.with_request_id(id),
            None => err,
        }
    })
}

/// Network origin of the request: the first `X-Forwarded-For` hop when
/// trusted, otherwise the peer IP.
fn client_origin(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string())
}
