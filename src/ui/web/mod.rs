use axum::{
    http::header,
    response::{Html, IntoResponse},
};
use html_escape::encode_text;

//-- HELPER FUNCS
const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; object-src 'none'; base-uri 'none'; frame-ancestors 'none'";

const INDEX_TEMPLATE: &str = include_str!("index.html");

fn hardening_headers() -> [(header::HeaderName, &'static str); 4] {
    [
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::REFERRER_POLICY, "no-referrer"),
    ]
}

/// Fill the landing page template. Host comes from the client, so both
/// values are escaped.
pub fn render_index(key: &str, host: &str) -> String {
    INDEX_TEMPLATE
        .replace("{{key}}", &encode_text(key))
        .replace("{{host}}", &encode_text(host))
}

//-- INDEX PAGE
pub fn serve_index_page(key: &str, host: &str) -> impl IntoResponse {
    (hardening_headers(), Html(render_index(key, host)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_key_and_host() {
        let page = render_index("abc123", "relay.example:8080");
        assert!(page.contains("http://relay.example:8080/upload/abc123"));
        assert!(page.contains("http://relay.example:8080/download/abc123"));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn escapes_hostile_host() {
        let page = render_index("abc123", "<script>x</script>");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn escapes_ampersand_in_host() {
        let page = render_index("abc123", "a&b");
        assert!(page.contains("http://a&amp;b/status/abc123"));
        assert!(!page.contains("http://a&b/"));
    }
}
