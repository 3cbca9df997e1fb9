/// Namespace segment shared by all five metric keys: the override when one is
/// given, otherwise the URL with its first `://` turned into `_`, sanitized.
pub fn resolve_metric_key(url: &str, metric_key: Option<&str>) -> String {
    match metric_key {
        Some(key) if !key.is_empty() => sanitize(key),
        _ => sanitize(&url.replacen("://", "_", 1)),
    }
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_allowed(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-'
    }

    #[test]
    fn derives_from_url_when_no_override() {
        assert_eq!(
            resolve_metric_key("http://example.com", None),
            "http_example_com"
        );
        assert_eq!(
            resolve_metric_key("https://example.com:8443/a/b?c=d", Some("")),
            "https_example_com_8443_a_b_c_d"
        );
    }

    #[test]
    fn only_the_first_scheme_separator_becomes_underscore() {
        let url = "http://proxy.local/?next=https://example.com";
        assert_eq!(
            url.replacen("://", "_", 1),
            "http_proxy.local/?next=https://example.com"
        );
        assert_eq!(
            resolve_metric_key(url, None),
            "http_proxy_local__next_https___example_com"
        );
    }

    #[test]
    fn override_wins_and_is_sanitized() {
        assert_eq!(
            resolve_metric_key("http://a.com/x?y=1", Some("My Key!")),
            "My_Key_"
        );
        assert_eq!(resolve_metric_key("http://a.com", Some("api-v2_ok")), "api-v2_ok");
    }

    #[test]
    fn each_non_ascii_char_becomes_one_underscore() {
        assert_eq!(sanitize("café"), "caf_");
        assert_eq!(sanitize("日本"), "__");
    }

    #[test]
    fn sanitize_is_idempotent_and_restricted() {
        for input in [
            "",
            "plain",
            "http://example.com/path?x=1&y=2",
            "  spaces\tand\nnewlines ",
            "ünïcödé/☃",
            "already_clean-key",
        ] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
            assert!(once.chars().all(is_allowed), "{once:?}");
            assert_eq!(once.chars().count(), input.chars().count());
        }
    }
}
