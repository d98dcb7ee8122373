//! Output parsing: raw tool text -> ordered `Finding`s.
//!
//! Grammar first, fallback second:
//! 1. Every line of stdout, then stderr, goes through `classify_line`. Among
//!    matched lines only legends are noise; unmatched lines go through the
//!    `NoiseFilter` denylist.
//! 2. If nothing matched, a substring pass over the unmatched, non-noise
//!    lines looks for known site names. That pass is a heuristic and is reported as
//!    `ParseStrategy::Fallback` so callers can treat it as lower-confidence.
//!
//! Parsing never fails; odd output degrades to fewer findings.

pub mod grammar;
pub mod noise;
pub mod sites;

pub use grammar::{LineMatch, classify_line};
pub use noise::NoiseFilter;

use tracing::{debug, warn};

use crate::domain::{Finding, ParseStrategy};
use crate::exec::RawOutput;

const RATE_LIMITED: &str = "rate limited";

/// Parsed findings plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReport {
    pub findings: Vec<Finding>,
    pub strategy: ParseStrategy,
    /// Lines that matched the grammar.
    pub matched_lines: usize,
    /// Lines dropped by the noise filter.
    pub noise_lines: usize,
}

impl ParseReport {
    pub fn is_degraded(&self) -> bool {
        self.strategy == ParseStrategy::Fallback
    }
}

/// Turns raw output into findings. Implementations must be deterministic.
pub trait OutputParser: Send + Sync {
    fn parse(&self, output: &RawOutput) -> ParseReport;
}

/// The marker grammar + noise filter + site-name fallback.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    noise: NoiseFilter,
}

impl LineParser {
    pub fn new(noise: NoiseFilter) -> Self {
        Self { noise }
    }

    fn finding_for(&self, matched: LineMatch) -> Option<Finding> {
        match matched {
            LineMatch::MatchedPositive {
                site,
                evidence_url,
                note,
            } => {
                let evidence_url =
                    evidence_url.or_else(|| sites::lookup(&site).map(|s| s.url.to_string()));
                Some(Finding {
                    site,
                    found: true,
                    evidence_url,
                    note,
                })
            }
            LineMatch::MatchedNegative { site, note } => Some(Finding {
                site,
                found: false,
                evidence_url: None,
                note,
            }),
            LineMatch::MatchedError { site, reason } => Some(Finding {
                site,
                found: false,
                evidence_url: None,
                note: Some(reason.unwrap_or_else(|| RATE_LIMITED.to_string())),
            }),
            LineMatch::Unrecognized => None,
        }
    }

    /// Substring pass over the non-noise text, in site-table order.
    fn fallback(&self, text: &str) -> Vec<Finding> {
        let haystack = text.to_lowercase();
        sites::KNOWN_SITES
            .iter()
            .filter(|site| haystack.contains(&site.display.to_lowercase()))
            .map(|site| Finding::found(site.display))
            .collect()
    }
}

impl OutputParser for LineParser {
    fn parse(&self, output: &RawOutput) -> ParseReport {
        let mut findings = Vec::new();
        let mut matched_lines = 0;
        let mut noise_lines = 0;

        // 未分類かつノイズでない行だけがフォールバックの対象
        let mut leftover = String::new();

        for line in output.stdout.lines().chain(output.stderr.lines()) {
            let clean = grammar::strip_ansi(line);
            let matched = classify_line(&clean);
            if matched.is_match() {
                if self.noise.is_legend(&clean) {
                    noise_lines += 1;
                } else if let Some(finding) = self.finding_for(matched) {
                    matched_lines += 1;
                    findings.push(finding);
                }
            } else if self.noise.is_noise(&clean) {
                noise_lines += 1;
            } else {
                leftover.push_str(&clean);
                leftover.push('\n');
            }
        }

        if matched_lines > 0 {
            debug!(matched_lines, noise_lines, "parsed tool output with line grammar");
            return ParseReport {
                findings,
                strategy: ParseStrategy::Grammar,
                matched_lines,
                noise_lines,
            };
        }

        let findings = self.fallback(&leftover);
        warn!(
            signal = "parse-degraded",
            heuristic_findings = findings.len(),
            noise_lines,
            "no marker lines matched; used site-name substring fallback"
        );
        ParseReport {
            findings,
            strategy: ParseStrategy::Fallback,
            matched_lines,
            noise_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(stdout: &str) -> ParseReport {
        LineParser::default().parse(&RawOutput::from_stdout(stdout))
    }

    #[test]
    fn positive_line_keeps_embedded_url() {
        let report = parse("[+] github.com / https://github.com/x");
        assert_eq!(report.strategy, ParseStrategy::Grammar);
        assert_eq!(
            report.findings,
            vec![Finding::found("github.com").with_evidence("https://github.com/x")]
        );
    }

    #[test]
    fn negative_line() {
        let report = parse("[-] twitter.com");
        assert_eq!(report.findings, vec![Finding::not_found("twitter.com")]);
    }

    #[test]
    fn fallback_finds_site_names() {
        let report = parse("Account exists on Facebook apparently");
        assert_eq!(report.strategy, ParseStrategy::Fallback);
        assert!(report.is_degraded());
        assert_eq!(report.findings, vec![Finding::found("Facebook")]);
    }

    #[test]
    fn positive_without_url_gets_canonical_one() {
        let report = parse("[+] Instagram.com");
        assert_eq!(
            report.findings,
            vec![Finding::found("Instagram.com").with_evidence("https://www.instagram.com")]
        );
    }

    #[test]
    fn error_marker_defaults_to_rate_limited_note() {
        let report = parse("[x] amazon.com");
        assert_eq!(
            report.findings,
            vec![Finding::not_found("amazon.com").with_note("rate limited")]
        );
    }

    #[test]
    fn realistic_holehe_run() {
        let stdout = "\
********************
   test@example.com
********************
[+] github.com
[-] twitter.com
[x] instagram.com
[+] spotify.com

[+] Email used, [-] Email not used, [x] Rate limit
121 websites checked in 10.53 seconds
Twitter : @palenath
Github : https://github.com/megadose/holehe
For BTC Donations : 1FHDM49QfZX6pJmhjLE5tB2K6CaTLMZpXZ
";
        let report = parse(stdout);
        assert_eq!(report.strategy, ParseStrategy::Grammar);
        assert_eq!(report.matched_lines, 4);
        assert_eq!(
            report.findings,
            vec![
                Finding::found("github.com").with_evidence("https://github.com"),
                Finding::not_found("twitter.com"),
                Finding::not_found("instagram.com").with_note("rate limited"),
                Finding::found("spotify.com").with_evidence("https://open.spotify.com"),
            ]
        );
    }

    #[test]
    fn stderr_is_read_after_stdout() {
        let output = RawOutput {
            stdout: "[+] github.com\n".into(),
            stderr: "[-] gitlab.com\n".into(),
            exit_code: Some(0),
        };
        let report = LineParser::default().parse(&output);
        let sites: Vec<_> = report.findings.iter().map(|f| f.site.as_str()).collect();
        assert_eq!(sites, vec!["github.com", "gitlab.com"]);
    }

    #[test]
    fn banner_only_output_falls_back_without_banner_names() {
        let report = parse("Twitter : @palenath\nGithub : https://github.com/megadose/holehe\n");
        assert_eq!(report.strategy, ParseStrategy::Fallback);
        assert_eq!(report.noise_lines, 2);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn rate_limit_errors_with_reasons_are_findings() {
        let report = parse(
            "[+] github.com\n[x] instagram.com (rate limit)\n[!] amazon.com rate limited, retry later\n",
        );
        assert_eq!(report.strategy, ParseStrategy::Grammar);
        assert_eq!(report.noise_lines, 0);
        assert_eq!(
            report.findings,
            vec![
                Finding::found("github.com").with_evidence("https://github.com"),
                Finding::not_found("instagram.com").with_note("rate limit"),
                Finding::not_found("amazon.com").with_note("rate limited, retry later"),
            ]
        );
    }

    #[test]
    fn marker_lines_with_noise_words_are_not_dropped() {
        let report = parse("[+] foursquare.com checked in\n[+] Email used, [-] Email not used\n");
        assert_eq!(report.matched_lines, 1);
        assert_eq!(report.noise_lines, 1);
        assert_eq!(report.findings[0].site, "foursquare.com");
        assert!(report.findings[0].found);
    }

    #[test]
    fn empty_output_is_empty_fallback() {
        let report = parse("");
        assert_eq!(report.strategy, ParseStrategy::Fallback);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn parsing_is_deterministic() {
        let stdout = "noise\nGitHub and Facebook and Amazon mentioned\n";
        let first = parse(stdout);
        for _ in 0..20 {
            assert_eq!(parse(stdout), first);
        }
        let sites: Vec<_> = first.findings.iter().map(|f| f.site.as_str()).collect();
        assert_eq!(sites, vec!["Amazon", "Facebook", "GitHub"]);
    }
}
