//! Line grammar for marker-style OSINT tool output.
//!
//! ```text
//! [+] github.com / https://github.com/x     -> MatchedPositive
//! [-] twitter.com                           -> MatchedNegative
//! [x] instagram.com                         -> MatchedError
//! [!] /slow (error: timed out)              -> MatchedError
//! anything else                             -> Unrecognized
//! ```

use std::sync::LazyLock;

use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ansi regex"));

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s)"'<>]+"#).expect("valid url regex"));

static TRAILING_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)\s*$").expect("valid paren regex"));

/// Classification of one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    MatchedPositive {
        site: String,
        evidence_url: Option<String>,
        note: Option<String>,
    },
    MatchedNegative {
        site: String,
        note: Option<String>,
    },
    MatchedError {
        site: String,
        reason: Option<String>,
    },
    Unrecognized,
}

impl LineMatch {
    pub fn is_match(&self) -> bool {
        !matches!(self, LineMatch::Unrecognized)
    }
}

#[derive(Clone, Copy)]
enum Marker {
    Positive,
    Negative,
    Error,
}

const MARKERS: &[(&str, Marker)] = &[
    ("[+]", Marker::Positive),
    ("[-]", Marker::Negative),
    ("[x]", Marker::Error),
    ("[X]", Marker::Error),
    ("[!]", Marker::Error),
];

/// Remove terminal color codes; several tools colorize unconditionally.
pub fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(line, "")
}

/// How many markers appear anywhere in `line`.
pub fn marker_count(line: &str) -> usize {
    MARKERS
        .iter()
        .map(|(prefix, _)| line.matches(prefix).count())
        .sum()
}

/// Classify one line. Noise filtering is a separate step (`NoiseFilter`).
pub fn classify_line(line: &str) -> LineMatch {
    let clean = strip_ansi(line);
    let trimmed = clean.trim();

    let Some((rest, marker)) = MARKERS
        .iter()
        .find_map(|(prefix, marker)| trimmed.strip_prefix(prefix).map(|rest| (rest, *marker)))
    else {
        return LineMatch::Unrecognized;
    };

    let rest = rest.trim();
    let Some(site) = rest.split_whitespace().next() else {
        return LineMatch::Unrecognized;
    };
    let tail = rest[site.len()..].trim();

    let evidence_url = URL.find(tail).map(|m| m.as_str().to_string());
    let note = leftover_note(tail, evidence_url.as_deref());
    let site = site.to_string();

    match marker {
        Marker::Positive => LineMatch::MatchedPositive {
            site,
            evidence_url,
            note,
        },
        Marker::Negative => LineMatch::MatchedNegative { site, note },
        Marker::Error => LineMatch::MatchedError { site, reason: note },
    }
}

/// Whatever is left after the site token and the URL, minus separators.
fn leftover_note(tail: &str, url: Option<&str>) -> Option<String> {
    let without_url = match url {
        Some(url) => tail.replacen(url, "", 1),
        None => tail.to_string(),
    };

    let mut note = without_url.trim().to_string();
    if let Some(caps) = TRAILING_PAREN.captures(&note) {
        let inner = caps[1].trim().to_string();
        let head = note[..caps.get(0).map_or(note.len(), |m| m.start())]
            .trim()
            .trim_matches('/')
            .trim()
            .to_string();
        note = if head.is_empty() {
            inner
        } else {
            format!("{head} {inner}")
        };
    }

    let note = note.trim().trim_matches('/').trim();
    (!note.is_empty()).then(|| note.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn positive_with_url() {
        assert_eq!(
            classify_line("[+] github.com / https://github.com/x"),
            LineMatch::MatchedPositive {
                site: "github.com".into(),
                evidence_url: Some("https://github.com/x".into()),
                note: None,
            }
        );
    }

    #[test]
    fn negative_bare() {
        assert_eq!(
            classify_line("[-] twitter.com"),
            LineMatch::MatchedNegative {
                site: "twitter.com".into(),
                note: None,
            }
        );
    }

    #[test]
    fn positive_with_recovery_hint_keeps_it_as_note() {
        assert_eq!(
            classify_line("[+] twitter.com / ex****@gmail.com"),
            LineMatch::MatchedPositive {
                site: "twitter.com".into(),
                evidence_url: None,
                note: Some("ex****@gmail.com".into()),
            }
        );
    }

    #[test]
    fn http_probe_lines() {
        assert_eq!(
            classify_line("[+] /admin / http://127.0.0.1:8080/admin (200)"),
            LineMatch::MatchedPositive {
                site: "/admin".into(),
                evidence_url: Some("http://127.0.0.1:8080/admin".into()),
                note: Some("200".into()),
            }
        );
        assert_eq!(
            classify_line("[-] /backup (404)"),
            LineMatch::MatchedNegative {
                site: "/backup".into(),
                note: Some("404".into()),
            }
        );
    }

    #[test]
    fn colored_output_is_understood() {
        assert_eq!(
            classify_line("\x1b[32m[+] github.com\x1b[0m"),
            LineMatch::MatchedPositive {
                site: "github.com".into(),
                evidence_url: None,
                note: None,
            }
        );
    }

    #[rstest]
    #[case::rate_limited("[x] instagram.com", "instagram.com", None)]
    #[case::upper("[X] amazon.com", "amazon.com", None)]
    #[case::bang_with_reason("[!] /slow (error: timed out)", "/slow", Some("error: timed out"))]
    fn error_markers(#[case] line: &str, #[case] site: &str, #[case] reason: Option<&str>) {
        assert_eq!(
            classify_line(line),
            LineMatch::MatchedError {
                site: site.into(),
                reason: reason.map(Into::into),
            }
        );
    }

    #[rstest]
    #[case::empty("")]
    #[case::marker_only("[+]")]
    #[case::prose("Checking 121 websites")]
    #[case::marker_inside("see [+] later")]
    fn unrecognized(#[case] line: &str) {
        assert_eq!(classify_line(line), LineMatch::Unrecognized);
    }
}
