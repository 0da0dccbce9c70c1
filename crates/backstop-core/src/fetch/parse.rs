//! Parse HTTP response header lines collected by the transport.

/// Parse header lines into `(name, value)` pairs.
///
/// libcurl reports every response it sees (interim `100 Continue` included),
/// so a new status line starts the list over and only the final response's
/// headers are kept.
pub(crate) fn parse_headers(lines: &[String]) -> Vec<(String, String)> {
    let mut headers = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            headers.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn names_are_lowercased_and_values_trimmed() {
        let h = parse_headers(&lines(&[
            "HTTP/1.1 429 Too Many Requests",
            "Retry-After:  7 ",
            "Content-Type: application/json",
        ]));
        assert_eq!(
            h,
            vec![
                ("retry-after".to_string(), "7".to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ]
        );
    }

    #[test]
    fn interim_response_is_discarded() {
        let h = parse_headers(&lines(&[
            "HTTP/1.1 100 Continue",
            "X-Interim: yes",
            "",
            "HTTP/1.1 200 OK",
            "Content-Length: 2",
        ]));
        assert_eq!(h, vec![("content-length".to_string(), "2".to_string())]);
    }

    #[test]
    fn value_with_colon_kept_whole() {
        let h = parse_headers(&lines(&["Date: Wed, 21 Oct 2015 07:28:00 GMT"]));
        assert_eq!(h[0].1, "Wed, 21 Oct 2015 07:28:00 GMT");
    }
}
