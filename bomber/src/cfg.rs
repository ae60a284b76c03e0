use core::{error::Error, num::NonZero, time::Duration};
use std::{fs::File, net::SocketAddr, path::PathBuf};

use http::Uri;
use serde::Deserialize;

use crate::{catalog::Catalog, cmd::Cmd};

/// Engine config, fully validated at load time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the target service.
    pub base: Uri,
    /// HTTP basic auth credentials, if any.
    pub auth: Option<BasicAuth>,
    /// Number of concurrent workers per run.
    pub workers: NonZero<usize>,
    /// Pause between full catalog passes.
    pub interval: Duration,
    /// The request catalog.
    pub catalog: Catalog,
    /// Metrics API endpoint.
    pub api_addr: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl TryFrom<Cmd> for Config {
    type Error = Box<dyn Error>;

    fn try_from(cmd: Cmd) -> Result<Self, Self::Error> {
        let file = File::open(&cmd.config)
            .map_err(|err| format!("failed to open config file '{}': {err}", cmd.config.display()))?;
        let cfg: FileConfig = serde_yaml::from_reader(file)?;

        let base = parse_base(&cfg.fhir.base)?;

        let catalog = Catalog::from_fs(&cfg.bomber.requests)?;
        if catalog.is_empty() {
            log::warn!("request catalog '{}' is empty", cfg.bomber.requests.display());
        }

        let m = Self {
            base,
            auth: cfg.fhir.auth,
            workers: cfg.bomber.workers,
            interval: Duration::from_millis(cfg.bomber.interval_ms),
            catalog,
            api_addr: cfg.api.addr,
        };

        Ok(m)
    }
}

/// Parses and validates the target base URL.
///
/// The probe speaks plain HTTP/1.1 over TCP, so only "http" URLs with an
/// explicit host are accepted.
fn parse_base(base: &str) -> Result<Uri, Box<dyn Error>> {
    let uri: Uri = base.parse()?;

    if uri.scheme_str() != Some("http") {
        return Err(format!("unsupported base URL '{base}': only plain HTTP targets are supported").into());
    }
    if uri.host().is_none() {
        return Err(format!("base URL '{base}' is missing a host").into());
    }

    Ok(uri)
}

/// On-disk config layout.
#[derive(Debug, Deserialize)]
struct FileConfig {
    bomber: BomberSection,
    fhir: FhirSection,
    #[serde(default)]
    api: ApiSection,
}

#[derive(Debug, Deserialize)]
struct BomberSection {
    /// Number of workers.
    workers: NonZero<usize>,
    /// Pause between runs in milliseconds.
    #[serde(default)]
    interval_ms: u64,
    /// Path to the request catalog file.
    requests: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FhirSection {
    /// Base URL of the target service.
    base: String,
    /// HTTP basic auth credentials.
    #[serde(default)]
    auth: Option<BasicAuth>,
}

#[derive(Debug, Deserialize)]
struct ApiSection {
    /// Metrics API endpoint.
    #[serde(default = "default_api_addr")]
    addr: SocketAddr,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self { addr: default_api_addr() }
    }
}

fn default_api_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8081))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_base() {
        let uri = parse_base("http://localhost:8080/fhir").unwrap();
        assert_eq!(uri.host(), Some("localhost"));
        assert_eq!(uri.port_u16(), Some(8080));
        assert_eq!(uri.path(), "/fhir");
    }

    #[test]
    fn test_parse_base_rejects_https() {
        assert!(parse_base("https://localhost/fhir").is_err());
    }

    #[test]
    fn test_parse_base_rejects_relative() {
        assert!(parse_base("/fhir").is_err());
    }

    #[test]
    fn test_file_config() {
        let raw = r#"
bomber:
  workers: 4
  interval_ms: 10000
  requests: requests.json
fhir:
  base: http://localhost:8080/fhir
  auth:
    user: admin
    password: secret
"#;

        let cfg: FileConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(cfg.bomber.workers.get(), 4);
        assert_eq!(cfg.bomber.interval_ms, 10000);
        assert_eq!(cfg.fhir.auth.unwrap().user, "admin");
        // The api section is optional.
        assert_eq!(cfg.api.addr, default_api_addr());
    }
}
