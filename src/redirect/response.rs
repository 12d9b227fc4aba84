//! HTTP responses produced by the redirect handler.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue, LOCATION, X_CONTENT_TYPE_OPTIONS};
use hyper::{Response, StatusCode};
use tracing::warn;

/// Body type of every response the service sends.
pub type RedirectBody = Full<Bytes>;

/// `302 Found` pointing at `location`, with a short HTML body for clients
/// that don't follow redirects.
pub fn found(location: &str) -> Response<RedirectBody> {
    let Ok(location_value) = HeaderValue::from_str(location) else {
        warn!(%location, "Redirect location is not a valid header value");
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect location");
    };

    let body = format!("<a href=\"{}\">Found</a>.\n", html_escape(location));
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = StatusCode::FOUND;

    let headers = response.headers_mut();
    headers.insert(LOCATION, location_value);
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// `400 Bad Request` with a plain-text message.
pub fn bad_request(message: &str) -> Response<RedirectBody> {
    text_response(StatusCode::BAD_REQUEST, message)
}

fn text_response(status: StatusCode, message: &str) -> Response<RedirectBody> {
    let mut response = Response::new(Full::new(Bytes::from(format!("{}\n", message))));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Escape the characters that are significant inside an HTML attribute.
fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response<RedirectBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_found_response() {
        let response = found("https://example.com/a?b=1&c=2");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "https://example.com/a?b=1&c=2");
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(
            body_string(response).await,
            "<a href=\"https://example.com/a?b=1&amp;c=2\">Found</a>.\n"
        );
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response = bad_request("HTTP Method Unsupported");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(response.headers().get(LOCATION).is_none());
        assert_eq!(body_string(response).await, "HTTP Method Unsupported\n");
    }

    #[test]
    fn test_found_with_invalid_header_value() {
        let response = found("https://example.com/\n");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(LOCATION).is_none());
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href='x'>&\""), "&lt;a href=&#39;x&#39;&gt;&amp;&#34;");
    }
}
