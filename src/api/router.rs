use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, add_copy, add_film, add_member, borrow_copy, get_copy, get_film, get_member,
    list_active_loans, list_loans, list_members, list_overdue_loans, member_loans, rename_member,
    return_copy, search_films,
};

/// Creates the API router with all lending endpoints
///
/// Catalogue:
/// - POST /films, GET /films, GET /films/:title, POST /films/:title/copies
/// - GET /copies/:id
///
/// Members:
/// - POST /members, GET /members, GET /members/:number, PUT /members/:number
/// - GET /members/:number/loans
///
/// Lending:
/// - POST /loans, POST /copies/:id/return
/// - GET /loans, GET /loans/active, GET /loans/overdue
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Catalogue
        .route("/films", post(add_film).get(search_films))
        .route("/films/:title", get(get_film))
        .route("/films/:title/copies", post(add_copy))
        .route("/copies/:id", get(get_copy))
        // Members
        .route("/members", post(add_member).get(list_members))
        .route("/members/:number", get(get_member).put(rename_member))
        .route("/members/:number/loans", get(member_loans))
        // Lending
        .route("/loans", post(borrow_copy).get(list_loans))
        .route("/loans/active", get(list_active_loans))
        .route("/loans/overdue", get(list_overdue_loans))
        .route("/copies/:id/return", post(return_copy))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
