use axum::http::HeaderMap;

/// The API gateway authenticates callers and forwards the member id in this
/// header; nothing else about identity is handled in this service.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn extract_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
}

pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers.get("x-forwarded-for")?.to_str().ok()?;
    forwarded
        .split(',')
        .next()
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_positive_user_id() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        assert_eq!(extract_user_id(&headers), Some(42));
    }

    #[test]
    fn rejects_missing_or_invalid_ids() {
        let headers = HeaderMap::new();
        assert_eq!(extract_user_id(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("0"));
        assert_eq!(extract_user_id(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(extract_user_id(&headers), None);
    }

    #[test]
    fn takes_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("203.0.113.9".to_string()));
    }
}
