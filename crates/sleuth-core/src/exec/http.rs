//! HttpProber: directory enumeration done with outbound requests instead of
//! an external binary.
//!
//! Each probed path becomes one marker line on `stdout`:
//! - `[+] /admin / https://host/admin (200)` for anything that exists
//! - `[-] /backup (404)` for misses
//! - `[x] /slow (error: ...)` for transport errors

use std::fmt::Write as _;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::redirect::Policy;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::{DEFAULT_TIMEOUT, ExecError, RawOutput};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URL + candidate paths + budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub base_url: Url,
    pub paths: Vec<String>,
    pub request_timeout: Duration,
    pub timeout: Duration,
}

impl ProbeSpec {
    pub fn new(base_url: Url, paths: Vec<String>) -> Self {
        Self {
            base_url,
            paths,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `path` against the base URL, keeping the base's own path.
    fn target(&self, path: &str) -> Option<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/')).ok()
    }
}

/// Existence heuristic: auth walls and redirects still reveal the path.
fn path_exists(status: StatusCode) -> bool {
    status.is_success()
        || status.is_redirection()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
}

pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, ExecError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("sleuth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExecError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn run(
        &self,
        spec: &ProbeSpec,
        cancel: &CancellationToken,
    ) -> Result<RawOutput, ExecError> {
        let mut stdout = String::new();
        let label = spec.base_url.to_string();

        let interrupted = {
            let probe_all = self.probe_all(spec, &mut stdout);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(true),
                _ = tokio::time::sleep(spec.timeout) => Some(false),
                _ = probe_all => None,
            }
        };

        let output = RawOutput {
            stdout,
            stderr: String::new(),
            exit_code: None,
        };
        match interrupted {
            None => Ok(output),
            Some(false) => Err(ExecError::Timeout {
                program: label,
                timeout: spec.timeout,
                partial: output,
            }),
            Some(true) => Err(ExecError::Cancelled {
                program: label,
                partial: output,
            }),
        }
    }

    async fn probe_all(&self, spec: &ProbeSpec, out: &mut String) {
        for path in &spec.paths {
            let Some(url) = spec.target(path) else {
                let _ = writeln!(out, "[x] {path} (error: not a valid path)");
                continue;
            };

            let response = self
                .client
                .get(url.clone())
                .timeout(spec.request_timeout)
                .send()
                .await;

            let line = match response {
                Ok(resp) if path_exists(resp.status()) => {
                    format!("[+] {path} / {url} ({})", resp.status().as_u16())
                }
                Ok(resp) => format!("[-] {path} ({})", resp.status().as_u16()),
                Err(e) => format!("[x] {path} (error: {e})"),
            };
            debug!(%url, line = %line, "probed");
            out.push_str(&line);
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_keeps_base_path() {
        let spec = ProbeSpec::new(Url::parse("https://example.com/app").unwrap(), vec![]);
        assert_eq!(
            spec.target("/admin").unwrap().as_str(),
            "https://example.com/app/admin"
        );
        assert_eq!(
            spec.target("login.php").unwrap().as_str(),
            "https://example.com/app/login.php"
        );
    }

    #[tokio::test]
    async fn renders_one_marker_line_per_path() {
        let mut server = mockito::Server::new_async().await;
        let _admin = server
            .mock("GET", "/admin")
            .with_status(200)
            .create_async()
            .await;
        let _secret = server
            .mock("GET", "/secret")
            .with_status(403)
            .create_async()
            .await;
        let _backup = server
            .mock("GET", "/backup")
            .with_status(404)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let spec = ProbeSpec::new(
            base.clone(),
            vec!["/admin".into(), "/secret".into(), "/backup".into()],
        );

        let prober = HttpProber::new().unwrap();
        let out = prober.run(&spec, &CancellationToken::new()).await.unwrap();

        let lines: Vec<&str> = out.stdout.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("[+] /admin / {}admin (200)", base));
        assert_eq!(lines[1], format!("[+] /secret / {}secret (403)", base));
        assert_eq!(lines[2], "[-] /backup (404)");
    }

    #[tokio::test]
    async fn cancelled_before_start_reports_cancelled() {
        let prober = HttpProber::new().unwrap();
        let spec = ProbeSpec::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            vec!["/a".into()],
        );
        let token = CancellationToken::new();
        token.cancel();

        let err = prober.run(&spec, &token).await.unwrap_err();
        assert!(matches!(err, ExecError::Cancelled { .. }));
    }
}
