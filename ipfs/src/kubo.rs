//! Client for the RPC API (`/api/v0/…`) of a self-hosted Kubo node.
//!
//! All RPC calls are POST requests, arguments are passed as query
//! parameters and files as multipart bodies. The node sits behind a reverse
//! proxy doing HTTP Basic auth, and optionally checks a shared secret header.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::http::{check_status, check_upload, read_json, transport};
use crate::{Backend, Cid, Error, KuboEndpoint};

/// Header carrying the shared secret, if one is configured.
pub const API_SECRET_HEADER: &str = "x-api-secret";

const BACKEND: Backend = Backend::Droplet;

#[derive(Deserialize)]
struct HashResponse {
    #[serde(rename = "Hash")]
    hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KuboKey {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Id")]
    pub id: String,
}

#[derive(Deserialize)]
struct KeyListResponse {
    #[serde(rename = "Keys", default)]
    keys: Vec<KuboKey>,
}

/// Result of binding an IPNS name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamePublished {
    /// The IPNS name (key id) that was updated.
    #[serde(rename = "Name")]
    pub name: String,
    /// The path it points to now.
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Clone)]
pub struct KuboClient {
    endpoint: KuboEndpoint,
    http_client: ClientWithMiddleware,
}

impl KuboClient {
    pub fn new(endpoint: KuboEndpoint, http_client: ClientWithMiddleware) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.endpoint.base_url
    }

    /// Prepares an authenticated RPC request for `cmd` (like `files/stat`).
    fn rpc(&self, cmd: &str) -> Result<RequestBuilder, Error> {
        let url = self
            .endpoint
            .base_url
            .join(&format!("api/v0/{}", cmd))
            .map_err(|e| Error::InvalidConfig(format!("unable to join url: {}", e)))?;

        let mut req = self
            .http_client
            .post(url)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.pass));

        if let Some(secret) = &self.endpoint.api_secret {
            req = req.header(API_SECRET_HEADER, secret);
        }

        Ok(req)
    }

    fn file_form(name: &str, content_type: &str, data: Bytes) -> Result<Form, Error> {
        let part = Part::bytes(data.to_vec())
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| transport(BACKEND)(e.into()))?;
        Ok(Form::new().part("file", part))
    }

    /// Adds and pins a single file, using CIDv1.
    #[instrument(skip(self, data), err, fields(data.len = data.len()))]
    pub async fn add(&self, name: &str, content_type: &str, data: Bytes) -> Result<Cid, Error> {
        let resp = self
            .rpc("add")?
            .query(&[("pin", "true"), ("cid-version", "1")])
            .multipart(Self::file_form(name, content_type, data)?)
            .send()
            .await
            .map_err(transport(BACKEND))?;

        let resp = check_upload(resp, BACKEND).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| transport(BACKEND)(e.into()))?;

        // `add` streams one JSON object per line. For a single file there's
        // only one, but pick the last one carrying a hash to be safe.
        let hash = body
            .lines()
            .filter_map(|line| serde_json::from_str::<HashResponse>(line).ok())
            .filter_map(|r| r.hash)
            .filter(|h| !h.trim().is_empty())
            .last()
            .ok_or(Error::MissingCid(BACKEND))?;

        let cid = Cid::new(hash)?;
        debug!(%cid, "added");
        Ok(cid)
    }

    /// Reads a file from MFS. Returns Ok(None) if it doesn't exist.
    #[instrument(skip(self), err)]
    pub async fn files_read(&self, path: &str) -> Result<Option<Bytes>, Error> {
        let resp = self
            .rpc("files/read")?
            .query(&[("arg", path)])
            .send()
            .await
            .map_err(transport(BACKEND))?;

        match check_status(resp, BACKEND, "files/read").await {
            Ok(resp) => Ok(Some(
                resp.bytes()
                    .await
                    .map_err(|e| transport(BACKEND)(e.into()))?,
            )),
            // Kubo answers a 500 with "file does not exist" for missing paths,
            // proxies in front of it might turn that into a 404.
            Err(e)
                if e.status() == Some(404)
                    || e.body().is_some_and(|b| b.contains("does not exist")) =>
            {
                debug!("not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces the file at `path` in MFS with `data`, creating it and its
    /// parents if needed.
    #[instrument(skip(self, data), err, fields(data.len = data.len()))]
    pub async fn files_write(&self, path: &str, data: Bytes) -> Result<(), Error> {
        let resp = self
            .rpc("files/write")?
            .query(&[
                ("arg", path),
                ("create", "true"),
                ("parents", "true"),
                ("truncate", "true"),
            ])
            .multipart(Self::file_form("data", "application/octet-stream", data)?)
            .send()
            .await
            .map_err(transport(BACKEND))?;

        check_status(resp, BACKEND, "files/write").await?;
        Ok(())
    }

    /// Returns the CID the file at `path` in MFS currently has.
    #[instrument(skip(self), err)]
    pub async fn files_stat(&self, path: &str) -> Result<Cid, Error> {
        let resp = self
            .rpc("files/stat")?
            .query(&[("arg", path)])
            .send()
            .await
            .map_err(transport(BACKEND))?;

        let resp = check_status(resp, BACKEND, "files/stat").await?;
        let stat: HashResponse = read_json(resp, BACKEND).await?;

        Cid::new(stat.hash.ok_or(Error::MissingCid(BACKEND))?)
    }

    /// Lists the keys the node can publish IPNS names with.
    #[instrument(skip(self), err)]
    pub async fn key_list(&self) -> Result<Vec<KuboKey>, Error> {
        let resp = self
            .rpc("key/list")?
            .query(&[("l", "true")])
            .send()
            .await
            .map_err(transport(BACKEND))?;

        let resp = check_status(resp, BACKEND, "key/list").await?;
        let list: KeyListResponse = read_json(resp, BACKEND).await?;
        Ok(list.keys)
    }

    /// Points the IPNS name of the key called `key_name` to `cid`.
    /// Allowed to succeed while the node is offline.
    #[instrument(skip_all, err, fields(cid = %cid, key = key_name))]
    pub async fn name_publish(&self, cid: &Cid, key_name: &str) -> Result<NamePublished, Error> {
        let target = format!("/ipfs/{}", cid);
        let resp = self
            .rpc("name/publish")?
            .query(&[
                ("arg", target.as_str()),
                ("key", key_name),
                ("allow-offline", "true"),
            ])
            .send()
            .await
            .map_err(transport(BACKEND))?;

        let resp = check_status(resp, BACKEND, "name/publish").await?;
        read_json(resp, BACKEND).await
    }
}
