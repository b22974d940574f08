use std::collections::HashMap;
use std::time::Duration;

/// Extracts the numeric `Retry-After` header, in seconds.
///
/// HTTP-date values are ignored; both vendors send the numeric form. The value is
/// only surfaced to callers inside the rate-limit error, nothing here retries.
pub(crate) fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_retry_after_case_insensitively() {
        let headers = HashMap::from([("Retry-After".to_string(), " 7 ".to_string())]);
        assert_eq!(
            retry_after_from_headers(&headers),
            Some(Duration::from_secs(7))
        );

        let headers = HashMap::from([(
            "retry-after".to_string(),
            "Wed, 21 Oct 2015 07:28:00 GMT".to_string(),
        )]);
        assert_eq!(retry_after_from_headers(&headers), None);
    }
}
