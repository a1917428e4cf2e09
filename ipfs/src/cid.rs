use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Backend, Error};

/// CIDv1 prefix for a raw-codec, sha2-256 multihash.
const RAW_SHA256_PREFIX: [u8; 4] = [0x01, 0x55, 0x12, 0x20];

/// A content identifier, as returned by a storage backend.
///
/// The string is opaque to us, backends decide about version and encoding.
/// It's guaranteed to be non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s: String = s.into();
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(Error::InvalidCid(s));
        }
        if trimmed.len() == s.len() {
            Ok(Cid(s))
        } else {
            Ok(Cid(trimmed.to_string()))
        }
    }

    /// Computes the CIDv1 (raw codec, sha2-256, base32) of the given bytes,
    /// the same CID `ipfs add --cid-version=1 --raw-leaves` produces for a
    /// single-block file.
    pub fn for_bytes(data: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(RAW_SHA256_PREFIX.len() + 32);
        buf.extend_from_slice(&RAW_SHA256_PREFIX);
        buf.extend_from_slice(&Sha256::digest(data));

        Cid(format!(
            "b{}",
            BASE32_NOPAD.encode(&buf).to_ascii_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::new(s)
    }
}

impl TryFrom<String> for Cid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cid::new(value)
    }
}

impl From<Cid> for String {
    fn from(value: Cid) -> Self {
        value.0
    }
}

/// The result of storing a document: its address and where it lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContentRecord {
    pub cid: Cid,
    pub backend: Backend,
}

impl ContentRecord {
    pub fn new(cid: Cid, backend: Backend) -> Self {
        Self { cid, backend }
    }
}

/// A path below a gateway, either immutable content or a mutable name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IpfsPath {
    Ipfs(String),
    Ipns(String),
}

impl IpfsPath {
    /// Accepts `ipfs/<cid>`, `ipns/<name>`, their `/`-prefixed and
    /// `ipfs:`/`ipns:` forms, bare IPNS keys (`k51…`) and bare CIDs.
    /// Returns None for empty input.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('/');

        let path = if let Some(rest) = s.strip_prefix("ipns/").or(s.strip_prefix("ipns:")) {
            IpfsPath::Ipns(rest.to_string())
        } else if let Some(rest) = s.strip_prefix("ipfs/").or(s.strip_prefix("ipfs:")) {
            IpfsPath::Ipfs(rest.to_string())
        } else if s.starts_with("k51") {
            IpfsPath::Ipns(s.to_string())
        } else {
            IpfsPath::Ipfs(s.to_string())
        };

        match &path {
            IpfsPath::Ipfs(v) | IpfsPath::Ipns(v) if v.is_empty() => None,
            _ => Some(path),
        }
    }
}

impl From<&Cid> for IpfsPath {
    fn from(value: &Cid) -> Self {
        IpfsPath::Ipfs(value.to_string())
    }
}

impl fmt::Display for IpfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpfsPath::Ipfs(cid) => write!(f, "ipfs/{}", cid),
            IpfsPath::Ipns(name) => write!(f, "ipns/{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cid, IpfsPath};
    use test_case::test_case;

    #[test]
    fn for_bytes_matches_ipfs() {
        assert_eq!(
            "bafkreifzjut3te2nhyekklss27nh3k72ysco7y32koao5eei66wof36n5e",
            Cid::for_bytes(b"hello world").as_str()
        );
        assert_eq!(
            "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku",
            Cid::for_bytes(b"").as_str()
        );
    }

    #[test_case("", false; "empty")]
    #[test_case("   ", false; "whitespace only")]
    #[test_case("bafy 1", false; "inner whitespace")]
    #[test_case("bafy1", true; "plain")]
    #[test_case(" QmFoo\n", true; "surrounding whitespace")]
    fn cid_new(s: &str, exp_ok: bool) {
        assert_eq!(exp_ok, Cid::new(s).is_ok());
    }

    #[test]
    fn cid_serde() {
        let cid: Cid = serde_json::from_str("\"bafy1\"").expect("must parse");
        assert_eq!("bafy1", cid.as_str());
        assert_eq!("\"bafy1\"", serde_json::to_string(&cid).unwrap());
        assert!(serde_json::from_str::<Cid>("\"\"").is_err());
    }

    #[test_case("bafy1", Some(IpfsPath::Ipfs("bafy1".into())); "bare cid")]
    #[test_case("ipfs/bafy1", Some(IpfsPath::Ipfs("bafy1".into())); "ipfs path")]
    #[test_case("/ipfs/bafy1", Some(IpfsPath::Ipfs("bafy1".into())); "absolute ipfs path")]
    #[test_case("ipfs:bafy1", Some(IpfsPath::Ipfs("bafy1".into())); "ipfs scheme")]
    #[test_case("ipns/zines.example", Some(IpfsPath::Ipns("zines.example".into())); "ipns path")]
    #[test_case("ipns:zines.example", Some(IpfsPath::Ipns("zines.example".into())); "ipns scheme")]
    #[test_case("k51qzi5uqu5dh", Some(IpfsPath::Ipns("k51qzi5uqu5dh".into())); "bare ipns key")]
    #[test_case("", None; "empty")]
    #[test_case("ipfs/", None; "empty ipfs path")]
    fn parse_path(s: &str, exp: Option<IpfsPath>) {
        assert_eq!(exp, IpfsPath::parse(s));
    }

    #[test]
    fn display_path() {
        assert_eq!("ipfs/bafy1", IpfsPath::Ipfs("bafy1".into()).to_string());
        assert_eq!("ipns/k51x", IpfsPath::Ipns("k51x".into()).to_string());
    }
}
