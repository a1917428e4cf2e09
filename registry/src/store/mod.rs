use std::fmt;

use zine_ipfs::Cid;

use crate::{RegistryDocument, StepError};

mod droplet;
mod memory;
mod pinata;

pub use self::droplet::DropletRegistryStore;
pub use self::memory::MemoryRegistryStore;
pub use self::pinata::PinataRegistryStore;

/// Where the current registry document is found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryPointer {
    /// A file in the node's mutable filesystem, optionally republished
    /// under an IPNS key.
    MfsPath {
        path: String,
        ipns_key: Option<String>,
    },
    /// The newest pin carrying this name, falling back to a fixed CID while
    /// there is none.
    PinName {
        name: String,
        fallback: Option<Cid>,
    },
    Memory,
}

impl fmt::Display for RegistryPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryPointer::MfsPath { path, ipns_key } => {
                write!(f, "mfs:{}", path)?;
                if let Some(key) = ipns_key {
                    write!(f, " (ipns key {})", key)?;
                }
                Ok(())
            }
            RegistryPointer::PinName { name, fallback } => {
                write!(f, "pin:{}", name)?;
                if let Some(cid) = fallback {
                    write!(f, " (fallback {})", cid)?;
                }
                Ok(())
            }
            RegistryPointer::Memory => f.write_str("memory"),
        }
    }
}

/// Persistence for the registry document.
#[async_trait::async_trait]
pub trait RegistryStore: Send + Sync {
    /// Reads the current document. A registry that doesn't exist yet reads
    /// as the empty document.
    async fn read(&self) -> Result<RegistryDocument, StepError>;

    /// Stores `doc` as the new current document and returns its CID.
    async fn write(&self, doc: &RegistryDocument) -> Result<Cid, StepError>;

    /// Points the mutable name (if any) at `cid`. Returns the published
    /// name, or None if this store has nothing to republish.
    async fn republish(&self, cid: &Cid) -> Result<Option<String>, StepError>;

    fn describe(&self) -> RegistryPointer;
}

#[async_trait::async_trait]
impl<A> RegistryStore for A
where
    A: AsRef<dyn RegistryStore> + Send + Sync,
{
    async fn read(&self) -> Result<RegistryDocument, StepError> {
        self.as_ref().read().await
    }

    async fn write(&self, doc: &RegistryDocument) -> Result<Cid, StepError> {
        self.as_ref().write(doc).await
    }

    async fn republish(&self, cid: &Cid) -> Result<Option<String>, StepError> {
        self.as_ref().republish(cid).await
    }

    fn describe(&self) -> RegistryPointer {
        self.as_ref().describe()
    }
}
