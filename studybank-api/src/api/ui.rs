//! Service banner and researcher admin page

use axum::response::Html;

const ADMIN_HTML: &str = include_str!("../ui/admin.html");

/// GET /
pub async fn root() -> &'static str {
    "This is the studybank backend. Visit /admin if you are a researcher."
}

/// GET /admin
///
/// Serves the static researcher form for creating studies and downloading
/// results.
pub async fn admin_page() -> Html<&'static str> {
    Html(ADMIN_HTML)
}
