use url::Url;

// Hosts where plain http is always a stale spelling of https.
const HTTPS_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
    "crates.io",
    "docs.rs",
    "sourceforge.net",
    "savannah.gnu.org",
];

// Forges where a trailing .git is repository-address noise.
const GIT_SUFFIX_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
    "sourceforge.net",
    "savannah.gnu.org",
];

const TRACKING_PREFIXES: &[&str] = &["utm_", "fbclid", "gclid"];

#[derive(Debug, PartialEq, Eq)]
pub enum MalformedUrl {
    Parse(url::ParseError),
    EmptyHost,
    UnsupportedScheme(String),
}

impl std::error::Error for MalformedUrl {}

impl std::fmt::Display for MalformedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedUrl::Parse(e) => write!(f, "unparseable url: {}", e),
            MalformedUrl::EmptyHost => write!(f, "url has an empty host"),
            MalformedUrl::UnsupportedScheme(s) => write!(f, "unsupported scheme: {}", s),
        }
    }
}

impl From<url::ParseError> for MalformedUrl {
    fn from(e: url::ParseError) -> Self {
        MalformedUrl::Parse(e)
    }
}

/// Normalizes a URL to the fixed-point form used as an identity key across
/// ecosystems. Canonicalization is deterministic and idempotent:
/// `canonical(canonical(u)) == canonical(u)`.
pub fn canonical(raw: &str) -> Result<String, MalformedUrl> {
    let trimmed = raw.trim();

    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        // "example.com/proj" style input: retry as https
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", trimmed))?
        }
        Err(e) => return Err(e.into()),
    };

    let mut scheme = match parsed.scheme() {
        "http" | "https" | "git" => parsed.scheme().to_string(),
        other => return Err(MalformedUrl::UnsupportedScheme(other.to_string())),
    };

    let host = match parsed.host_str() {
        Some(h) if !h.is_empty() => h.to_lowercase(),
        _ => return Err(MalformedUrl::EmptyHost),
    };

    if scheme == "http" && HTTPS_HOSTS.contains(&host.as_str()) {
        scheme = "https".to_string();
    }

    let port = match (parsed.port(), scheme.as_str()) {
        (Some(80), "http") | (Some(443), "https") | (Some(9418), "git") | (None, _) => None,
        (Some(p), _) => Some(p),
    };

    let mut path = parsed.path().trim_end_matches('/').to_string();
    if let Some(stripped) = path.strip_suffix("/index.html") {
        path = stripped.to_string();
    }
    if GIT_SUFFIX_HOSTS.contains(&host.as_str()) {
        if let Some(stripped) = path.strip_suffix(".git") {
            path = stripped.to_string();
        }
    }

    let query: Vec<&str> = parsed
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| {
            !pair.is_empty()
                && !TRACKING_PREFIXES
                    .iter()
                    .any(|prefix| pair.starts_with(prefix))
        })
        .collect();

    // userinfo and fragment are dropped on the floor
    let mut out = format!("{}://{}", scheme, host);
    if let Some(p) = port {
        out.push(':');
        out.push_str(&p.to_string());
    }
    out.push_str(&path);
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query.join("&"));
    }
    Ok(out)
}

pub fn is_canonical(raw: &str) -> bool {
    match canonical(raw) {
        Ok(c) => c == raw,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{canonical, is_canonical, MalformedUrl};
    use test_case::test_case;

    #[test_case("https://serde.rs/", "https://serde.rs" ; "trailing_slash")]
    #[test_case("https://serde.rs", "https://serde.rs" ; "no_trailing_slash")]
    #[test_case("https://Example.COM/Proj/", "https://example.com/Proj")]
    #[test_case("https://example.com:443/x", "https://example.com/x")]
    #[test_case("http://example.com:80/x", "http://example.com/x")]
    #[test_case("https://example.com/docs/index.html", "https://example.com/docs")]
    #[test_case("https://example.com/index.html", "https://example.com")]
    #[test_case(
        "https://example.com/p?utm_source=x&page=2",
        "https://example.com/p?page=2"
    )]
    #[test_case("https://example.com/p?utm_source=x", "https://example.com/p")]
    #[test_case("http://github.com/serde-rs/serde", "https://github.com/serde-rs/serde")]
    #[test_case(
        "https://github.com/serde-rs/serde.git",
        "https://github.com/serde-rs/serde"
    )]
    #[test_case("git://github.com/a/b.git", "git://github.com/a/b")]
    #[test_case("https://user:pw@example.com/x", "https://example.com/x")]
    #[test_case("https://example.com/x#readme", "https://example.com/x")]
    #[test_case("example.com/proj", "https://example.com/proj")]
    #[test_case("https://example.com///", "https://example.com")]
    #[test_case("https://example.com:8080/x", "https://example.com:8080/x")]
    fn canonicalizes(input: &str, expected: &str) {
        assert_eq!(canonical(input).unwrap(), expected);
    }

    // http stays http off the well-known list; we cannot probe every host
    #[test]
    fn http_kept_for_unknown_hosts() {
        assert_eq!(
            canonical("http://example.com/x").unwrap(),
            "http://example.com/x"
        );
    }

    #[test_case("https://serde.rs/")]
    #[test_case("http://github.com/a/b.git")]
    #[test_case("https://example.com/p?utm_source=x&page=2&fbclid=1")]
    #[test_case("git://github.com/a/b")]
    #[test_case("example.com/proj")]
    fn idempotent(input: &str) {
        let once = canonical(input).unwrap();
        assert_eq!(canonical(&once).unwrap(), once);
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert_eq!(
            canonical("ftp://example.com/x"),
            Err(MalformedUrl::UnsupportedScheme("ftp".to_string()))
        );
        assert!(canonical("mailto:dev@example.com").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(canonical("").is_err());
        assert!(canonical("https://").is_err());
        assert!(canonical("https://[::1::2]/x").is_err());
    }

    #[test]
    fn is_canonical_only_for_fixed_points() {
        assert!(is_canonical("https://serde.rs"));
        assert!(!is_canonical("https://serde.rs/"));
        assert!(!is_canonical("not a url"));
    }
}
