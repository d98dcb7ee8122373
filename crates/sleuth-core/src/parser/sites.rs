//! Static site table: canonical URLs for findings that carry none, and the
//! name list for the substring fallback.
//!
//! The table is an ordered slice so every pass over it is deterministic.

/// One known site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownSite {
    /// Normalized lookup key (`github`).
    pub key: &'static str,
    /// Name as people write it (`GitHub`); used by the fallback pass.
    pub display: &'static str,
    pub url: &'static str,
}

const fn site(key: &'static str, display: &'static str, url: &'static str) -> KnownSite {
    KnownSite { key, display, url }
}

pub const KNOWN_SITES: &[KnownSite] = &[
    site("adobe", "Adobe", "https://www.adobe.com"),
    site("amazon", "Amazon", "https://www.amazon.com"),
    site("discord", "Discord", "https://discord.com"),
    site("duolingo", "Duolingo", "https://www.duolingo.com"),
    site("ebay", "eBay", "https://www.ebay.com"),
    site("facebook", "Facebook", "https://www.facebook.com"),
    site("flickr", "Flickr", "https://www.flickr.com"),
    site("github", "GitHub", "https://github.com"),
    site("gitlab", "GitLab", "https://gitlab.com"),
    site("gravatar", "Gravatar", "https://gravatar.com"),
    site("imgur", "Imgur", "https://imgur.com"),
    site("instagram", "Instagram", "https://www.instagram.com"),
    site("lastpass", "LastPass", "https://www.lastpass.com"),
    site("linkedin", "LinkedIn", "https://www.linkedin.com"),
    site("office365", "Office365", "https://www.office.com"),
    site("pinterest", "Pinterest", "https://www.pinterest.com"),
    site("protonmail", "ProtonMail", "https://proton.me"),
    site("reddit", "Reddit", "https://www.reddit.com"),
    site("snapchat", "Snapchat", "https://www.snapchat.com"),
    site("soundcloud", "SoundCloud", "https://soundcloud.com"),
    site("spotify", "Spotify", "https://open.spotify.com"),
    site("strava", "Strava", "https://www.strava.com"),
    site("telegram", "Telegram", "https://telegram.org"),
    site("tumblr", "Tumblr", "https://www.tumblr.com"),
    site("twitter", "Twitter", "https://twitter.com"),
    site("vimeo", "Vimeo", "https://vimeo.com"),
    site("whatsapp", "WhatsApp", "https://www.whatsapp.com"),
    site("wordpress", "WordPress", "https://wordpress.com"),
    site("yahoo", "Yahoo", "https://www.yahoo.com"),
];

/// Suffixes trimmed during normalization, longest first.
const SUFFIXES: &[&str] = &[
    ".co.uk", ".com.br", ".com", ".net", ".org", ".io", ".me", ".fr", ".de", ".tv", ".co",
];

/// `WWW.GitHub.com` -> `github`, `accounts.spotify.com` -> `accounts.spotify`.
pub fn normalize(site: &str) -> String {
    let mut key = site.trim().to_lowercase();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = key.strip_prefix(prefix) {
            key = rest.to_string();
        }
    }
    if let Some(rest) = key.strip_prefix("www.") {
        key = rest.to_string();
    }
    let key = key.trim_end_matches('/');
    SUFFIXES
        .iter()
        .find_map(|suffix| key.strip_suffix(suffix))
        .unwrap_or(key)
        .to_string()
}

/// Look a reported site name up in the table.
///
/// Tries the full normalized key first, then its last dotted label, so
/// `accounts.spotify.com` still resolves to Spotify.
pub fn lookup(site: &str) -> Option<&'static KnownSite> {
    let key = normalize(site);
    if key.is_empty() {
        return None;
    }
    let by_key = |k: &str| KNOWN_SITES.iter().find(|s| s.key == k);
    by_key(&key).or_else(|| key.rsplit('.').next().and_then(by_key))
}
