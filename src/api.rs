// src/api.rs
//! HTTP surface: health, filtered news, sport ids.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregate::NewsAggregator;
use crate::query::{parse_limit, NewsQuery};

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsAggregator>,
}

impl AppState {
    pub fn new(news: NewsAggregator) -> Self {
        Self {
            news: Arc::new(news),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(get_news))
        .route("/api/news/sports", get(get_sports))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn news_query(params: &HashMap<String, String>) -> NewsQuery {
    NewsQuery {
        sport: params.get("sport").cloned(),
        search: params.get("q").cloned(),
        limit: parse_limit(params.get("limit").map(String::as_str)),
    }
}

async fn get_news(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = news_query(&params);
    match state.news.get_articles(&query).await {
        Ok(feed) => {
            let cache = format!("public, max-age={}", state.news.ttl().num_seconds().max(0));
            ([(header::CACHE_CONTROL, cache)], Json(feed)).into_response()
        }
        Err(e) => {
            tracing::warn!(target: "news_cache", error = ?e, "news request failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": format!("{e:#}") })),
            )
                .into_response()
        }
    }
}

async fn get_sports(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "sports": state.news.sport_ids() }))
}
