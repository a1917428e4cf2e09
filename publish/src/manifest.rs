//! The manifest: a small published document tying a project (and its
//! optional backup) to title, tags and authorship.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use zine_ipfs::{Backend, Cid};
use zine_registry::coerce_tags;

pub const SCHEMA: &str = "v1";
pub const LANGUAGE: &str = "en";
pub const APP_NAME: &str = "Zine Maker";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest title must not be empty")]
    EmptyTitle,

    #[error("unable to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectLink {
    pub cid: Cid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackupLink {
    pub cid: Cid,
    pub optional: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub language: String,
    pub created_at: String,
    pub project: ProjectLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupLink>,
    /// Passed through as supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    /// A detached signature computed by the client, passed through as
    /// supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Value>,
    pub pinned_via: Vec<Backend>,
    pub app: AppInfo,
}

impl Manifest {
    pub fn to_value(&self) -> Result<Value, ManifestError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Everything a manifest is built from.
#[derive(Clone, Debug)]
pub struct ManifestInput {
    pub title: String,
    pub project_cid: Cid,
    pub backup_cid: Option<Cid>,
    pub description: Option<String>,
    /// `metadata.description` of the project, used if no description was
    /// given.
    pub project_description: Option<String>,
    pub tags: Vec<Value>,
    pub author: Option<Value>,
    pub signature: Option<Value>,
    pub pinned_via: Vec<Backend>,
}

/// Formats a timestamp the way manifests and registry entries carry it,
/// e.g. `2024-05-01T10:00:00.000Z`.
pub fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

/// A signature is only taken over if it carries the armored text.
fn valid_signature(signature: Option<Value>) -> Option<Value> {
    signature.filter(|sig| {
        sig.get("armored")
            .and_then(Value::as_str)
            .is_some_and(|armored| !armored.is_empty())
    })
}

/// Builds the manifest. Pure, the same input and timestamp always produce
/// the same manifest.
pub fn build_manifest(
    input: ManifestInput,
    created_at: DateTime<Utc>,
) -> Result<Manifest, ManifestError> {
    if input.title.is_empty() {
        return Err(ManifestError::EmptyTitle);
    }

    Ok(Manifest {
        schema: SCHEMA.to_string(),
        title: input.title,
        description: non_empty(input.description).or(non_empty(input.project_description)),
        tags: coerce_tags(input.tags),
        language: LANGUAGE.to_string(),
        created_at: timestamp(created_at),
        project: ProjectLink {
            cid: input.project_cid,
        },
        backup: input.backup_cid.map(|cid| BackupLink {
            cid,
            optional: true,
        }),
        author: input.author.filter(|a| !a.is_null()),
        signature: valid_signature(input.signature),
        pinned_via: input.pinned_via,
        app: AppInfo::default(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;
    use zine_ipfs::{Backend, Cid};

    use super::{build_manifest, ManifestError, ManifestInput};

    fn input() -> ManifestInput {
        ManifestInput {
            title: "Zine A".into(),
            project_cid: Cid::new("bafy1").unwrap(),
            backup_cid: None,
            description: None,
            project_description: None,
            tags: vec![json!("a"), json!(""), json!("b"), json!(3)],
            author: None,
            signature: None,
            pinned_via: vec![Backend::Pinata],
        }
    }

    #[test]
    fn minimal() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let manifest = build_manifest(input(), created_at).expect("must build");

        assert_eq!(
            json!({
                "schema": "v1",
                "title": "Zine A",
                "tags": ["a", "b", "3"],
                "language": "en",
                "createdAt": "2024-05-01T10:00:00.000Z",
                "project": {"cid": "bafy1"},
                "pinnedVia": ["pinata"],
                "app": {"name": "Zine Maker", "version": env!("CARGO_PKG_VERSION")},
            }),
            manifest.to_value().unwrap()
        );
    }

    #[test]
    fn deterministic() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(
            build_manifest(input(), created_at).unwrap(),
            build_manifest(input(), created_at).unwrap()
        );
    }

    #[test]
    fn with_backup_author_signature() {
        let mut input = input();
        input.backup_cid = Some(Cid::new("bafyb").unwrap());
        input.author = Some(json!({"name": "Ana"}));
        input.signature = Some(json!({"armored": "-----BEGIN PGP SIGNATURE-----", "keyId": "AB"}));

        let manifest = build_manifest(input, Utc::now())
            .unwrap()
            .to_value()
            .unwrap();
        assert_eq!(json!({"cid": "bafyb", "optional": true}), manifest["backup"]);
        assert_eq!(json!({"name": "Ana"}), manifest["author"]);
        assert_eq!("AB", manifest["signature"]["keyId"]);
    }

    #[test_case(json!({"keyId": "AB"}); "no armored text")]
    #[test_case(json!({"armored": ""}); "empty armored text")]
    #[test_case(json!("sig"); "not an object")]
    fn signature_dropped(signature: serde_json::Value) {
        let mut input = input();
        input.signature = Some(signature);

        let manifest = build_manifest(input, Utc::now()).unwrap();
        assert_eq!(None, manifest.signature);
    }

    #[test_case(Some("mine"), Some("project's"), Some("mine"); "caller wins")]
    #[test_case(Some(""), Some("project's"), Some("project's"); "empty caller falls back")]
    #[test_case(None, Some(""), None; "both empty")]
    fn description(caller: Option<&str>, project: Option<&str>, exp: Option<&str>) {
        let mut input = input();
        input.description = caller.map(str::to_string);
        input.project_description = project.map(str::to_string);

        let manifest = build_manifest(input, Utc::now()).unwrap();
        assert_eq!(exp, manifest.description.as_deref());
    }

    #[test]
    fn empty_title() {
        let mut input = input();
        input.title = String::new();
        assert!(matches!(
            build_manifest(input, Utc::now()),
            Err(ManifestError::EmptyTitle)
        ));
    }
}
