//! Client for the Pinata pinning API.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::http::{check_status, check_upload, dir_url, read_json, transport};
use crate::{Backend, Cid, Error, PinataAuth, PinataEndpoint};

pub const DEFAULT_API_BASE: &str = "https://api.pinata.cloud";

/// How many pins to ask for when listing by name. Garbage collection keeps
/// this list short, so one page is enough.
const PIN_LIST_PAGE_LIMIT: &str = "100";

const BACKEND: Backend = Backend::Pinata;

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
    /// Newer API revisions call it `cid`.
    cid: Option<String>,
}

impl PinResponse {
    fn into_cid(self) -> Result<Cid, Error> {
        let hash = [self.ipfs_hash, self.cid]
            .into_iter()
            .flatten()
            .find(|h| !h.trim().is_empty())
            .ok_or(Error::MissingCid(BACKEND))?;
        Cid::new(hash)
    }
}

/// One row of `data/pinList`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PinRow {
    pub ipfs_pin_hash: String,
    #[serde(default)]
    pub date_pinned: Option<String>,
}

#[derive(Deserialize)]
struct PinListResponse {
    #[serde(default)]
    rows: Vec<PinRow>,
}

#[derive(Clone)]
pub struct PinataClient {
    endpoint: PinataEndpoint,
    http_client: ClientWithMiddleware,
}

impl PinataClient {
    pub fn new(mut endpoint: PinataEndpoint, http_client: ClientWithMiddleware) -> Self {
        // API paths are joined relative to this.
        endpoint.base_url = dir_url(endpoint.base_url);
        Self {
            endpoint,
            http_client,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.endpoint.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, Error> {
        let url = self
            .endpoint
            .base_url
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("unable to join url: {}", e)))?;

        let req = self.http_client.request(method, url);
        Ok(match &self.endpoint.auth {
            PinataAuth::Jwt(jwt) => req.bearer_auth(jwt),
            PinataAuth::ApiKey { key, secret } => req
                .header("pinata_api_key", key)
                .header("pinata_secret_api_key", secret),
        })
    }

    /// Pins a JSON document, named `name` in the pin metadata.
    #[instrument(skip(self, doc), err)]
    pub async fn pin_json(&self, name: &str, doc: &serde_json::Value) -> Result<Cid, Error> {
        let body = json!({
            "pinataContent": doc,
            "pinataMetadata": { "name": name },
            "pinataOptions": { "cidVersion": 1 },
        });

        let resp = self
            .request(Method::POST, "pinning/pinJSONToIPFS")?
            .json(&body)
            .send()
            .await
            .map_err(transport(BACKEND))?;

        let resp = check_upload(resp, BACKEND).await?;
        let cid = read_json::<PinResponse>(resp, BACKEND).await?.into_cid()?;
        debug!(%cid, "pinned");
        Ok(cid)
    }

    /// Pins raw bytes as a file called `name`.
    #[instrument(skip(self, data), err, fields(data.len = data.len()))]
    pub async fn pin_file(&self, name: &str, content_type: &str, data: Bytes) -> Result<Cid, Error> {
        let part = Part::bytes(data.to_vec())
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| transport(BACKEND)(e.into()))?;
        let form = Form::new()
            .part("file", part)
            .text("pinataMetadata", json!({ "name": name }).to_string())
            .text("pinataOptions", json!({ "cidVersion": 1 }).to_string());

        let resp = self
            .request(Method::POST, "pinning/pinFileToIPFS")?
            .multipart(form)
            .send()
            .await
            .map_err(transport(BACKEND))?;

        let resp = check_upload(resp, BACKEND).await?;
        let cid = read_json::<PinResponse>(resp, BACKEND).await?.into_cid()?;
        debug!(%cid, "pinned");
        Ok(cid)
    }

    /// Lists currently pinned content whose metadata name is `name`, most
    /// recently pinned first.
    #[instrument(skip(self), err)]
    pub async fn pin_list_by_name(&self, name: &str) -> Result<Vec<PinRow>, Error> {
        let resp = self
            .request(Method::GET, "data/pinList")?
            .query(&[
                ("status", "pinned"),
                ("metadata[name]", name),
                ("pageLimit", PIN_LIST_PAGE_LIMIT),
            ])
            .send()
            .await
            .map_err(transport(BACKEND))?;

        let resp = check_status(resp, BACKEND, "pinList").await?;
        let mut rows = read_json::<PinListResponse>(resp, BACKEND).await?.rows;

        // ISO-8601 timestamps sort lexicographically.
        rows.sort_by(|a, b| b.date_pinned.cmp(&a.date_pinned));
        Ok(rows)
    }

    /// Removes a pin.
    #[instrument(skip_all, err, fields(cid = %cid))]
    pub async fn unpin(&self, cid: &Cid) -> Result<(), Error> {
        let resp = self
            .request(Method::DELETE, &format!("pinning/unpin/{}", cid))?
            .send()
            .await
            .map_err(transport(BACKEND))?;

        check_status(resp, BACKEND, "unpin").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{
        body_json, body_string_contains, header, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::PinataClient;
    use crate::{Cid, Error, PinataAuth, PinataEndpoint};

    fn client(server: &MockServer, auth: PinataAuth) -> PinataClient {
        PinataClient::new(
            PinataEndpoint {
                base_url: server.uri().parse().unwrap(),
                auth,
            },
            crate::http::client(),
        )
    }

    fn jwt() -> PinataAuth {
        PinataAuth::Jwt("eyJ.jwt".into())
    }

    #[tokio::test]
    async fn pin_json_wraps_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinJSONToIPFS"))
            .and(header("authorization", "Bearer eyJ.jwt"))
            .and(body_json(json!({
                "pinataContent": {"name": "Zine A"},
                "pinataMetadata": {"name": "project.json"},
                "pinataOptions": {"cidVersion": 1},
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"IpfsHash": "bafyproject"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cid = client(&server, jwt())
            .pin_json("project.json", &json!({"name": "Zine A"}))
            .await
            .expect("must succeed");
        assert_eq!("bafyproject", cid.as_str());
    }

    #[tokio::test]
    async fn pin_json_accepts_cid_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinJSONToIPFS"))
            .and(header("pinata_api_key", "key"))
            .and(header("pinata_secret_api_key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cid": "bafynew"})))
            .mount(&server)
            .await;

        let cid = client(
            &server,
            PinataAuth::ApiKey {
                key: "key".into(),
                secret: "secret".into(),
            },
        )
        .pin_json("manifest.json", &json!({}))
        .await
        .expect("must succeed");
        assert_eq!("bafynew", cid.as_str());
    }

    #[tokio::test]
    async fn pin_json_missing_cid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinJSONToIPFS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"IpfsHash": ""})))
            .mount(&server)
            .await;

        let err = client(&server, jwt())
            .pin_json("manifest.json", &json!({}))
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::MissingCid(crate::Backend::Pinata)));
    }

    #[tokio::test]
    async fn pin_json_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinJSONToIPFS"))
            .respond_with(ResponseTemplate::new(403).set_body_string("{\"error\":\"quota\"}"))
            .mount(&server)
            .await;

        let err = client(&server, jwt())
            .pin_json("manifest.json", &json!({}))
            .await
            .expect_err("must fail");
        assert_eq!(Some(403), err.status());
        assert!(matches!(err, Error::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn pin_file_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .and(body_string_contains("filename=\"pubkey.asc\""))
            .and(body_string_contains("-----BEGIN PGP PUBLIC KEY BLOCK-----"))
            .and(body_string_contains("\"cidVersion\":1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"IpfsHash": "bafykey"})))
            .expect(1)
            .mount(&server)
            .await;

        let cid = client(&server, jwt())
            .pin_file(
                "pubkey.asc",
                "text/plain",
                Bytes::from_static(b"-----BEGIN PGP PUBLIC KEY BLOCK-----\n..."),
            )
            .await
            .expect("must succeed");
        assert_eq!("bafykey", cid.as_str());
    }

    #[tokio::test]
    async fn pin_list_by_name_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/pinList"))
            .and(query_param("status", "pinned"))
            .and(query_param("metadata[name]", "zine-registry.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 2,
                "rows": [
                    {"ipfs_pin_hash": "bafyold", "date_pinned": "2024-01-01T00:00:00.000Z"},
                    {"ipfs_pin_hash": "bafynew", "date_pinned": "2024-03-01T00:00:00.000Z"},
                ]
            })))
            .mount(&server)
            .await;

        let rows = client(&server, jwt())
            .pin_list_by_name("zine-registry.json")
            .await
            .expect("must succeed");
        assert_eq!(
            vec!["bafynew", "bafyold"],
            rows.iter()
                .map(|r| r.ipfs_pin_hash.as_str())
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn api_base_below_a_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinata/pinning/pinJSONToIPFS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"IpfsHash": "bafyproxied"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = PinataClient::new(
            PinataEndpoint {
                base_url: format!("{}/pinata", server.uri()).parse().unwrap(),
                auth: jwt(),
            },
            crate::http::client(),
        );
        assert!(client.base_url().as_str().ends_with("/pinata/"));

        let cid = client
            .pin_json("manifest.json", &json!({}))
            .await
            .expect("must succeed");
        assert_eq!("bafyproxied", cid.as_str());
    }

    #[tokio::test]
    async fn unpin() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/pinning/unpin/bafyold"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, jwt())
            .unpin(&Cid::new("bafyold").unwrap())
            .await
            .expect("must succeed");
    }
}
