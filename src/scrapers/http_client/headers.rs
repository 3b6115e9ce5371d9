//! Browser-like request headers for the lookup form.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};

/// Mobile Edge user agent; the lookup form rejects obvious bot agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Mobile Safari/537.36 Edg/139.0.0.0";

const STATIC_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "max-age=0"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
    (
        "sec-ch-ua",
        "\"Not;A=Brand\";v=\"99\", \"Microsoft Edge\";v=\"139\", \"Chromium\";v=\"139\"",
    ),
    ("sec-ch-ua-mobile", "?1"),
    ("sec-ch-ua-platform", "\"Android\""),
];

/// Build the default header set sent with every lookup.
pub fn browser_headers(origin: &str, referer: &str) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    for (name, value) in STATIC_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers.insert(header::ORIGIN, HeaderValue::from_str(origin)?);
    headers.insert(header::REFERER, HeaderValue::from_str(referer)?);
    Ok(headers)
}

/// Cookie header carrying the opaque session credential.
pub fn session_cookie(session_id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("f5_cspm=1234; JSESSIONID={}", session_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers("https://example.gov", "https://example.gov/index").unwrap();
        assert_eq!(headers[header::ORIGIN], "https://example.gov");
        assert_eq!(headers[header::REFERER], "https://example.gov/index");
        assert_eq!(headers["sec-fetch-mode"], "navigate");
    }

    #[test]
    fn test_session_cookie_rejects_control_chars() {
        assert_eq!(
            session_cookie("ABC").unwrap(),
            "f5_cspm=1234; JSESSIONID=ABC"
        );
        assert!(session_cookie("bad\nvalue").is_err());
    }
}
