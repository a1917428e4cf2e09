use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use zine_ipfs::Cid;

/// One published zine, as listed in the registry document.
///
/// Entries written by older tools may lack most fields, use other key
/// fields (`cid`, `id`) or carry fields we don't know about. The latter are
/// kept in `extra` and written back unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    #[serde(
        default,
        deserialize_with = "lenient_title",
        skip_serializing_if = "String::is_empty"
    )]
    pub title: String,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub manifest_cid: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,

    /// Display name of the author.
    #[serde(
        default,
        deserialize_with = "lenient_author",
        skip_serializing_if = "Option::is_none"
    )]
    pub author: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_cid: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub cid: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryEntry {
    /// The identity used for deduplication: the first non-empty value of
    /// `manifestCid`, `cid`, `id` and `title`.
    pub fn resolve_key(&self) -> Option<&str> {
        [
            self.manifest_cid.as_deref(),
            self.cid.as_deref(),
            self.id.as_deref(),
            Some(self.title.as_str()),
        ]
        .into_iter()
        .flatten()
        .find(|k| !k.is_empty())
    }

    /// Builds the entry for a freshly stored manifest, from its JSON form.
    pub fn from_manifest(manifest_cid: &Cid, manifest: &Value, created_at: String) -> Self {
        let str_field = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let title = str_field(manifest.get("title")).unwrap_or_default();
        Self {
            manifest_cid: Some(manifest_cid.to_string()),
            description: str_field(manifest.get("description")),
            tags: manifest
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| coerce_tags(tags.iter().cloned()))
                .unwrap_or_default(),
            created_at: Some(created_at),
            author: str_field(manifest.pointer("/author/name")),
            name: Some(title.clone()).filter(|t| !t.is_empty()),
            project_cid: str_field(manifest.pointer("/project/cid")),
            title,
            ..Default::default()
        }
    }
}

/// Turns a JSON value into a string, if it's a scalar.
fn scalar_to_string(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Coerces a list of JSON values to tags. Strings are kept, numbers and
/// booleans become their JSON text, everything else is dropped, as are
/// empty strings.
pub fn coerce_tags(values: impl IntoIterator<Item = Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(scalar_to_string)
        .filter(|t| !t.is_empty())
        .collect()
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_to_string))
}

fn lenient_title<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(values)) => coerce_tags(values),
        Some(v) => coerce_tags([v]),
        None => vec![],
    })
}

fn lenient_author<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(mut o)) => o.remove("name").and_then(scalar_to_string),
        _ => None,
    })
}
