//! Denylist of banner / progress / usage lines.
//!
//! Kept apart from the grammar so both can change independently: a legend
//! line such as `[+] Email used, [-] Email not used` starts with a marker and
//! would otherwise be read as a finding.

/// Substrings that mark a line as noise (matched case-insensitively).
pub const DEFAULT_NOISE: &[&str] = &[
    // legends
    "email used",
    "email not used",
    "phone number used",
    "phone number not used",
    "rate limit",
    // summaries and progress
    "websites checked",
    "checked in",
    "it/s]",
    "%|",
    "\u{2588}",
    "\u{2501}",
    // usage / help
    "usage:",
    "--help",
    "positional arguments",
    "optional arguments",
    // credits
    "for btc donations",
    "twitter : @",
    "github : ",
];

#[derive(Debug, Clone)]
pub struct NoiseFilter {
    patterns: Vec<String>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE.iter().copied())
    }
}

impl NoiseFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Add more patterns on top of the current set.
    pub fn extend<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns.extend(
            patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty()),
        );
        self
    }

    /// Legend lines (`[+] Email used, [-] Email not used, [x] Rate limit`)
    /// start with a marker, so they are told apart from findings by carrying
    /// more than one.
    pub fn is_legend(&self, line: &str) -> bool {
        super::grammar::marker_count(line) > 1
    }

    /// For lines the grammar did not match. Blank lines count as noise too.
    pub fn is_noise(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }
        let lower = line.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}
