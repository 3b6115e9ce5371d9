//! The single front-end page.

use axum::{extract::State, response::Html};

use super::super::templates;
use super::super::AppState;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(templates::index_page(&state.settings))
}
