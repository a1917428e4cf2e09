//! Service configuration, from flags or the environment.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;
use zine_ipfs::contentservice::{from_config, ContentService, MemoryContentService};
use zine_ipfs::gateway::{GatewayClient, DEFAULT_GATEWAYS};
use zine_ipfs::kubo::KuboClient;
use zine_ipfs::pinata::{PinataClient, DEFAULT_API_BASE};
use zine_ipfs::{
    redacted, select_backend, Backend, BackendConfig, Cid, DropletCredentials, PinataCredentials,
    SelectedBackend,
};
use zine_registry::store::{
    DropletRegistryStore, MemoryRegistryStore, PinataRegistryStore, RegistryStore,
};
use zine_registry::RegistryUpdater;

use crate::Publisher;

pub const DEFAULT_GATEWAY_BASE: &str = "https://gateway.pinata.cloud";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BackendMode {
    /// Use the IPFS node if configured, Pinata otherwise.
    #[default]
    Auto,
    /// Keep everything in memory. For local development.
    Memory,
}

#[derive(clap::Args, Clone)]
pub struct ServiceConfig {
    /// Host of the self-hosted IPFS node's RPC API, e.g. `10.0.0.5:5001`.
    #[arg(long, env = "IPFS_DROPLET_HOST")]
    pub droplet_host: Option<String>,

    #[arg(long, env = "IPFS_DROPLET_ADMIN_USER")]
    pub droplet_admin_user: Option<String>,

    #[arg(long, env = "IPFS_DROPLET_ADMIN_PASS", hide_env_values = true)]
    pub droplet_admin_pass: Option<String>,

    /// Shared secret sent along to the node in the `x-api-secret` header.
    #[arg(long, env = "IPFS_API_SECRET", hide_env_values = true)]
    pub droplet_api_secret: Option<String>,

    /// MFS path of the registry document on the node.
    #[arg(long, env = "IPFS_MFS_MANIFEST_PATH", default_value = "/zine-registry.json")]
    pub mfs_registry_path: String,

    /// IPNS key (name or address) republished after each registry write.
    #[arg(long, env = "IPFS_IPNS_KEY")]
    pub ipns_key: Option<String>,

    /// Registry revision to start from on Pinata, as long as there's no
    /// pinned revision yet.
    #[arg(long, env = "REGISTRY_CID")]
    pub registry_cid: Option<String>,

    /// Pin name registry revisions are stored under on Pinata.
    #[arg(long, env = "REGISTRY_PIN_NAME", default_value = "zine-registry.json")]
    pub registry_pin_name: String,

    #[arg(long, env = "PINATA_JWT", hide_env_values = true)]
    pub pinata_jwt: Option<String>,

    #[arg(long, env = "PINATA_API_KEY")]
    pub pinata_api_key: Option<String>,

    #[arg(long, env = "PINATA_API_SECRET", hide_env_values = true)]
    pub pinata_api_secret: Option<String>,

    #[arg(long, env = "PINATA_API_BASE", default_value = DEFAULT_API_BASE)]
    pub pinata_api_base: Url,

    /// Gateway used for links in responses, and tried first for reads.
    #[arg(long, env = "PINATA_GATEWAY_BASE", default_value = DEFAULT_GATEWAY_BASE)]
    pub gateway_base: Url,

    /// Gateways registry reads fall back to, in order.
    #[arg(long, env = "IPFS_GATEWAYS", value_delimiter = ',', default_values = DEFAULT_GATEWAYS)]
    pub gateways: Vec<Url>,

    /// Seconds a single gateway gets to answer.
    #[arg(long, env = "GATEWAY_TIMEOUT_SECS", default_value_t = 7)]
    pub gateway_timeout_secs: u64,

    #[arg(long = "backend", env = "ZINE_BACKEND", value_enum, default_value_t = BackendMode::Auto)]
    pub backend_mode: BackendMode,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("droplet_host", &self.droplet_host)
            .field("droplet_admin_user", &self.droplet_admin_user)
            .field("droplet_admin_pass", &redacted(&self.droplet_admin_pass))
            .field("droplet_api_secret", &redacted(&self.droplet_api_secret))
            .field("mfs_registry_path", &self.mfs_registry_path)
            .field("ipns_key", &self.ipns_key)
            .field("registry_cid", &self.registry_cid)
            .field("registry_pin_name", &self.registry_pin_name)
            .field("pinata_jwt", &redacted(&self.pinata_jwt))
            .field("pinata_api_key", &self.pinata_api_key)
            .field("pinata_api_secret", &redacted(&self.pinata_api_secret))
            .field("pinata_api_base", &self.pinata_api_base.as_str())
            .field("gateway_base", &self.gateway_base.as_str())
            .field("gateways", &self.gateways)
            .field("gateway_timeout_secs", &self.gateway_timeout_secs)
            .field("backend_mode", &self.backend_mode)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            droplet_host: None,
            droplet_admin_user: None,
            droplet_admin_pass: None,
            droplet_api_secret: None,
            mfs_registry_path: "/zine-registry.json".into(),
            ipns_key: None,
            registry_cid: None,
            registry_pin_name: "zine-registry.json".into(),
            pinata_jwt: None,
            pinata_api_key: None,
            pinata_api_secret: None,
            pinata_api_base: Url::parse(DEFAULT_API_BASE).expect("constant must parse"),
            gateway_base: Url::parse(DEFAULT_GATEWAY_BASE).expect("constant must parse"),
            gateways: DEFAULT_GATEWAYS
                .iter()
                .map(|g| Url::parse(g).expect("constant must parse"))
                .collect(),
            gateway_timeout_secs: 7,
            backend_mode: BackendMode::Auto,
        }
    }
}

/// Everything the HTTP handlers work with.
#[derive(Clone)]
pub struct Services {
    /// None if no backend is configured. Publishing is refused then.
    pub publisher: Option<Publisher>,
    pub gateway: GatewayClient,
    pub backend: Option<Backend>,
}

impl Services {
    pub fn registry(&self) -> Option<&RegistryUpdater> {
        self.publisher.as_ref().and_then(Publisher::registry)
    }
}

/// A masked view of the configuration, safe to hand out.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvReport {
    pub backend: Option<Backend>,
    pub droplet_host: Option<String>,
    pub droplet_admin_user: Option<String>,
    pub droplet_admin_pass: bool,
    pub droplet_api_secret: bool,
    pub mfs_registry_path: String,
    pub ipns_key: Option<String>,
    pub registry_cid: Option<String>,
    pub registry_pin_name: String,
    pub pinata_jwt: Option<String>,
    pub pinata_api_key: Option<String>,
    pub pinata_api_secret: bool,
    pub gateway_base: String,
    pub gateways: Vec<String>,
    pub gateway_timeout_secs: u64,
}

/// Masks a secret, keeping its first and last three characters if it's
/// long enough for that to reveal little.
pub fn mask(v: &str) -> String {
    let chars: Vec<char> = v.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}***{}", head, tail)
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ServiceConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            droplet: DropletCredentials {
                host: self.droplet_host.clone(),
                admin_user: self.droplet_admin_user.clone(),
                admin_pass: self.droplet_admin_pass.clone(),
                api_secret: self.droplet_api_secret.clone(),
            },
            pinata: PinataCredentials {
                jwt: self.pinata_jwt.clone(),
                api_key: self.pinata_api_key.clone(),
                api_secret: self.pinata_api_secret.clone(),
                api_base: self.pinata_api_base.clone(),
            },
        }
    }

    /// Reports which backend would be used and which settings are present,
    /// with secrets masked.
    pub fn env_report(&self) -> EnvReport {
        let backend = match self.backend_mode {
            BackendMode::Memory => Some(Backend::Memory),
            BackendMode::Auto => select_backend(&self.backend_config())
                .ok()
                .map(|s| s.backend()),
        };

        EnvReport {
            backend,
            droplet_host: present(&self.droplet_host).map(str::to_string),
            droplet_admin_user: present(&self.droplet_admin_user).map(mask),
            droplet_admin_pass: present(&self.droplet_admin_pass).is_some(),
            droplet_api_secret: present(&self.droplet_api_secret).is_some(),
            mfs_registry_path: self.mfs_registry_path.clone(),
            ipns_key: present(&self.ipns_key).map(str::to_string),
            registry_cid: present(&self.registry_cid).map(str::to_string),
            registry_pin_name: self.registry_pin_name.clone(),
            pinata_jwt: present(&self.pinata_jwt).map(mask),
            pinata_api_key: present(&self.pinata_api_key).map(mask),
            pinata_api_secret: present(&self.pinata_api_secret).is_some(),
            gateway_base: self.gateway_base.to_string(),
            gateways: self.gateways.iter().map(Url::to_string).collect(),
            gateway_timeout_secs: self.gateway_timeout_secs,
        }
    }

    /// Constructs content service, registry store, gateway client and
    /// publisher from the configuration. This is the only place deciding
    /// between backends.
    ///
    /// Missing credentials are not an error here, the daemon still starts
    /// and refuses publishes.
    pub fn build_services(
        &self,
        http_client: ClientWithMiddleware,
    ) -> Result<Services, zine_ipfs::Error> {
        let gateway = GatewayClient::new(
            http_client.clone(),
            self.gateways.clone(),
            self.gateway_timeout(),
        )
        .with_preferred(self.gateway_base.clone());

        let (content, store): (Arc<dyn ContentService>, Arc<dyn RegistryStore>) =
            match self.backend_mode {
                BackendMode::Memory => (
                    Arc::new(MemoryContentService::default()),
                    Arc::new(MemoryRegistryStore::default()),
                ),
                BackendMode::Auto => match select_backend(&self.backend_config()) {
                    Ok(selected) => {
                        let content = from_config(&selected, http_client.clone());
                        let store = self.registry_store(selected, http_client, gateway.clone())?;
                        (content, store)
                    }
                    Err(zine_ipfs::Error::MissingCredentials) => {
                        warn!("no IPFS node or Pinata credentials configured, publishing is disabled");
                        return Ok(Services {
                            publisher: None,
                            gateway,
                            backend: None,
                        });
                    }
                    Err(e) => return Err(e),
                },
            };

        let backend = content.backend();
        info!(%backend, registry = %store.describe(), "services configured");

        Ok(Services {
            publisher: Some(Publisher::new(
                content,
                Some(RegistryUpdater::new(store)),
                self.gateway_base.clone(),
            )),
            gateway,
            backend: Some(backend),
        })
    }

    fn registry_store(
        &self,
        selected: SelectedBackend,
        http_client: ClientWithMiddleware,
        gateway: GatewayClient,
    ) -> Result<Arc<dyn RegistryStore>, zine_ipfs::Error> {
        Ok(match selected {
            SelectedBackend::Droplet(endpoint) => Arc::new(DropletRegistryStore::new(
                KuboClient::new(endpoint, http_client),
                self.mfs_registry_path.clone(),
                present(&self.ipns_key).map(str::to_string),
            )),
            SelectedBackend::Pinata(endpoint) => Arc::new(PinataRegistryStore::new(
                PinataClient::new(endpoint, http_client),
                gateway,
                self.registry_pin_name.clone(),
                present(&self.registry_cid).map(Cid::new).transpose()?,
            )),
        })
    }
}
