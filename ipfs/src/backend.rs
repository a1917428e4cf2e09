use std::fmt;

use serde::Serialize;
use url::Url;

use crate::http::dir_url;
use crate::Error;

/// The storage backends content can be pinned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A self-hosted IPFS (Kubo) node, reached through its RPC API.
    Droplet,
    /// The Pinata pinning service.
    Pinata,
    /// In-process storage, for tests and local development.
    Memory,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Droplet => "droplet",
            Backend::Pinata => "pinata",
            Backend::Memory => "memory",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stands in for secrets in `Debug` output.
const REDACTED: &str = "<redacted>";

/// Debug view of an optional secret, telling only whether it's set.
pub fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| REDACTED)
}

/// Connection parameters for the self-hosted node, as configured.
/// Fields are optional, [select_backend] decides whether they're usable.
#[derive(Clone, Default)]
pub struct DropletCredentials {
    pub host: Option<String>,
    pub admin_user: Option<String>,
    pub admin_pass: Option<String>,
    pub api_secret: Option<String>,
}

impl fmt::Debug for DropletCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropletCredentials")
            .field("host", &self.host)
            .field("admin_user", &self.admin_user)
            .field("admin_pass", &redacted(&self.admin_pass))
            .field("api_secret", &redacted(&self.api_secret))
            .finish()
    }
}

/// Pinata credentials, as configured.
#[derive(Clone)]
pub struct PinataCredentials {
    pub jwt: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_base: Url,
}

impl fmt::Debug for PinataCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinataCredentials")
            .field("jwt", &redacted(&self.jwt))
            .field("api_key", &self.api_key)
            .field("api_secret", &redacted(&self.api_secret))
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl Default for PinataCredentials {
    fn default() -> Self {
        Self {
            jwt: None,
            api_key: None,
            api_secret: None,
            api_base: Url::parse(crate::pinata::DEFAULT_API_BASE)
                .expect("default Pinata API base must parse"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    pub droplet: DropletCredentials,
    pub pinata: PinataCredentials,
}

/// A usable Kubo RPC endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct KuboEndpoint {
    pub base_url: Url,
    pub user: String,
    pub pass: String,
    pub api_secret: Option<String>,
}

impl fmt::Debug for KuboEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KuboEndpoint")
            .field("base_url", &self.base_url.as_str())
            .field("user", &self.user)
            .field("pass", &REDACTED)
            .field("api_secret", &redacted(&self.api_secret))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum PinataAuth {
    Jwt(String),
    ApiKey { key: String, secret: String },
}

// Don't leak secrets into logs.
impl fmt::Debug for PinataAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinataAuth::Jwt(_) => write!(f, "Jwt({})", REDACTED),
            PinataAuth::ApiKey { key, .. } => {
                write!(f, "ApiKey {{ key: {:?}, secret: {} }}", key, REDACTED)
            }
        }
    }
}

/// A usable Pinata API endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinataEndpoint {
    pub base_url: Url,
    pub auth: PinataAuth,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectedBackend {
    Droplet(KuboEndpoint),
    Pinata(PinataEndpoint),
}

impl SelectedBackend {
    pub fn backend(&self) -> Backend {
        match self {
            SelectedBackend::Droplet(_) => Backend::Droplet,
            SelectedBackend::Pinata(_) => Backend::Pinata,
        }
    }
}

/// Treats unset and blank values the same.
fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses the configured node host. A scheme is optional, plain
/// `host:port` values are reached over http.
fn parse_host(host: &str) -> Result<Url, Error> {
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::InvalidConfig(format!("invalid IPFS node host {:?}: {}", host, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidConfig(format!(
            "unsupported scheme for IPFS node host: {}",
            url.scheme()
        )));
    }

    // RPC paths are joined relative to this.
    Ok(dir_url(url))
}

/// Decides which backend to use.
///
/// The self-hosted node wins whenever host, admin user and admin password are
/// all present. Otherwise Pinata is used, which needs either a JWT or a
/// key/secret pair. If neither is configured, this fails with
/// [Error::MissingCredentials]. No network I/O happens here.
pub fn select_backend(config: &BackendConfig) -> Result<SelectedBackend, Error> {
    let droplet = &config.droplet;
    if let (Some(host), Some(user), Some(pass)) = (
        present(&droplet.host),
        present(&droplet.admin_user),
        present(&droplet.admin_pass),
    ) {
        return Ok(SelectedBackend::Droplet(KuboEndpoint {
            base_url: parse_host(host)?,
            user: user.to_string(),
            pass: pass.to_string(),
            api_secret: present(&droplet.api_secret).map(str::to_string),
        }));
    }

    let pinata = &config.pinata;
    let auth = match (
        present(&pinata.jwt),
        present(&pinata.api_key),
        present(&pinata.api_secret),
    ) {
        (Some(jwt), _, _) => PinataAuth::Jwt(jwt.to_string()),
        (None, Some(key), Some(secret)) => PinataAuth::ApiKey {
            key: key.to_string(),
            secret: secret.to_string(),
        },
        _ => return Err(Error::MissingCredentials),
    };

    Ok(SelectedBackend::Pinata(PinataEndpoint {
        base_url: dir_url(pinata.api_base.clone()),
        auth,
    }))
}
