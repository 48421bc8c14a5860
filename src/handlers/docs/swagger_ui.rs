// Swagger UI page for the Profitum API

use axum::response::{Html, IntoResponse};

const OPENAPI_JSON_PATH: &str = "/api/docs/openapi.json";
const SWAGGER_DIST: &str = "https://unpkg.com/swagger-ui-dist@5.9.0";

/// Swagger UI page at /api/docs, loading the OpenAPI document from /api/docs/openapi.json
pub async fn serve_swagger_ui() -> impl IntoResponse {
    Html(render_page(OPENAPI_JSON_PATH))
}

/// The bearer token entered once is kept across reloads, since every
/// client, expert, apporteur and admin route needs one.
fn render_page(spec_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
    <meta charset="UTF-8">
    <title>Profitum API</title>
    <link rel="stylesheet" href="{dist}/swagger-ui.css" />
    <style>
        body {{ margin: 0; }}
        .topbar {{ display: none; }}
        .profitum-banner {{ padding: 1rem 2rem; background: #0f2d52; color: #fff; font-family: sans-serif; }}
        .profitum-banner code {{ color: #ffd166; }}
    </style>
</head>
<body>
    <div class="profitum-banner">
        Log in with <code>POST /api/auth/{{type}}/login</code>, then paste the token in <em>Authorize</em>.
    </div>
    <div id="swagger-ui"></div>
    <script src="{dist}/swagger-ui-bundle.js"></script>
    <script>
        window.ui = SwaggerUIBundle({{
            url: '{spec_url}',
            dom_id: '#swagger-ui',
            persistAuthorization: true,
            tagsSorter: 'alpha',
            docExpansion: 'none',
            filter: true,
            validatorUrl: null
        }});
    </script>
</body>
</html>"#,
        dist = SWAGGER_DIST,
        spec_url = spec_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_points_at_openapi_document() {
        let page = render_page(OPENAPI_JSON_PATH);
        assert!(page.contains("url: '/api/docs/openapi.json'"));
        assert!(page.contains("persistAuthorization: true"));
        assert!(page.contains("/api/auth/{type}/login"));
    }
}
