use serde::{Deserialize, Deserializer, de::DeserializeOwned};

/// The only game the metadata service may report for our addons.
pub const TARGET_GAME: &str = "wow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Release,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ReleaseFile {
    #[serde(default, deserialize_with = "lenient")]
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, rename = "url", deserialize_with = "lenient")]
    pub download_url: String,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub release_type: ReleaseType,
    #[serde(default, rename = "version", deserialize_with = "lenient")]
    pub game_version: String,
    /// Raw RFC 3339 string; only parsed when two candidates are compared.
    #[serde(default, deserialize_with = "lenient")]
    pub uploaded_at: String,
}

/// Host serving release archives when URLs are derived from file ids.
pub const FORGECDN_BASE: &str = "https://media.forgecdn.net/files";

/// How the archive URL of a release file is obtained. A deployment picks
/// exactly one of these in its manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DownloadUrl {
    /// The `url` field of the metadata, unchanged.
    #[default]
    Metadata,
    /// The `url` field with a literal appended, e.g. `/file`.
    Suffix(String),
    /// `<cdn>/<first 4 id digits>/<remaining digits without leading zeros>/<name>`.
    ForgeCdn,
}

impl DownloadUrl {
    /// Builds the archive URL for `file`, or explains why it cannot.
    pub fn url_for(&self, file: &ReleaseFile) -> Result<String, String> {
        match self {
            DownloadUrl::Metadata | DownloadUrl::Suffix(_)
                if file.download_url.trim().is_empty() =>
            {
                Err(format!("release file id={} has no download url", file.id))
            }
            DownloadUrl::Metadata => Ok(file.download_url.clone()),
            DownloadUrl::Suffix(suffix) => Ok(format!("{}{}", file.download_url, suffix)),
            DownloadUrl::ForgeCdn => forgecdn_url(file),
        }
    }
}

fn forgecdn_url(file: &ReleaseFile) -> Result<String, String> {
    let id = file.id.to_string();
    if id.len() < 5 {
        return Err(format!(
            "release file id={} is too short to derive a forgecdn url",
            file.id
        ));
    }
    if file.name.trim().is_empty() {
        return Err(format!("release file id={} has no file name", file.id));
    }

    let (head, tail) = id.split_at(4);
    let tail = match tail.trim_start_matches('0') {
        "" => "0",
        rest => rest,
    };
    Ok(format!("{}/{}/{}/{}", FORGECDN_BASE, head, tail, file.name))
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AddonMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub id: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub game: String,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub files: Vec<ReleaseFile>,
}

impl AddonMetadata {
    /// Decodes a metadata document without ever failing: anything that does
    /// not fit is left at its default value.
    pub fn decode(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

/// Deserializes a field, falling back to its default when the JSON value has
/// the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Like `lenient`, but per element: entries that do not decode are dropped
/// and the rest are kept.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
