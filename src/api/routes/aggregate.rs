//! Aggregation handler

use super::AggregateParams;
use crate::aggregator::Aggregator;
use crate::api::AppState;
use crate::error::Result;
use axum::{
    extract::{RawQuery, State},
    http::{Method, Uri, header},
    response::{IntoResponse, Response},
};

/// ANY /* - Fetch every `id:url` in `requests` concurrently and answer with all results
///
/// Responds 200 whenever the query is valid, even if every target failed; per-target
/// failures are part of the body. Invalid queries get a 400 before anything is fetched.
pub async fn aggregate(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    tracing::info!(
        method = %method,
        path = uri.path(),
        query = query.as_deref().unwrap_or_default(),
        "aggregation request"
    );

    let params = AggregateParams::from_query(query.as_deref())?;

    let mut aggregator = Aggregator::with_client(state.client.clone(), params.targets.clone());
    params.configure(&mut aggregator, &state.config.fetch);

    let mut body = Vec::new();
    aggregator.process(&mut body).await?;

    Ok(([(header::CONTENT_TYPE, aggregator.content_type())], body).into_response())
}
