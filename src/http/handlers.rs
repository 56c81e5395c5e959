//! Route handlers.
//!
//! `/ok` and `/error` simulate work with a random delay; the cart routes
//! read and mutate the shared [`Cart`](crate::cart::Cart).

use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;

use crate::cart::effective_count;
use crate::http::server::AppState;

/// Simulated successful endpoint.
pub async fn ok(State(state): State<AppState>) -> impl IntoResponse {
    simulate_latency(&state, state.simulation.ok_delay_ms).await;
    (StatusCode::OK, "ok")
}

/// Simulated failing endpoint.
pub async fn error(State(state): State<AppState>) -> impl IntoResponse {
    simulate_latency(&state, state.simulation.error_delay_ms).await;
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

/// Add items to the cart, defaulting to one.
///
/// Only the first `count` in the query is used; repeats are ignored.
pub async fn cart_add(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let first = params
        .iter()
        .find(|(key, _)| key == "count")
        .map(|(_, value)| value.as_str());
    let count = effective_count(first);
    let total = state.cart.add(count);
    tracing::debug!(count, total, "Cart updated");
    (StatusCode::OK, format!("cartItems={total}"))
}

/// Current cart size.
pub async fn cart_items(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.cart.items().to_string())
}

async fn simulate_latency(state: &AppState, (min, max): (u64, u64)) {
    if !state.simulation.enabled || min >= max {
        return;
    }
    let delay = rand::thread_rng().gen_range(min..max);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}
