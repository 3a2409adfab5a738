use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::types::addon::DownloadUrl;

/// Sub-path below a scope folder where the game looks for addons.
const ADDONS_SUBPATH: [&str; 2] = ["Interface", "AddOns"];

/// One group of addons sharing an installation folder and a game version.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonSpec {
    #[serde(default)]
    pub prefix: String,
    #[serde(default, alias = "majorGameVersion")]
    pub game_version: String,
    #[serde(default)]
    pub addons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum AddonList {
    Flat(Vec<String>),
    Scoped(Vec<AddonSpec>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDoc {
    wow_folder: PathBuf,
    addons: AddonList,
    #[serde(default, alias = "majorGameVersion")]
    game_version: String,
    #[serde(default)]
    download_url: Option<DownloadUrlMode>,
    #[serde(default)]
    download_suffix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DownloadUrlMode {
    Metadata,
    Suffix,
    ForgeCdn,
}

/// The parsed `addons.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub wow_folder: PathBuf,
    pub specs: Vec<AddonSpec>,
    pub download_url: DownloadUrl,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read addon manifest '{}'", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("Failed to parse addon manifest '{}'", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let doc: ManifestDoc = serde_json::from_str(text)?;
        let specs = match doc.addons {
            AddonList::Flat(addons) => vec![AddonSpec {
                prefix: String::new(),
                game_version: doc.game_version,
                addons,
            }],
            AddonList::Scoped(specs) => specs,
        };

        let suffix = doc.download_suffix.filter(|s| !s.is_empty());
        let download_url = match (doc.download_url, suffix) {
            (None, None) | (Some(DownloadUrlMode::Metadata), None) => DownloadUrl::Metadata,
            (None, Some(suffix)) | (Some(DownloadUrlMode::Suffix), Some(suffix)) => {
                DownloadUrl::Suffix(suffix)
            }
            (Some(DownloadUrlMode::ForgeCdn), None) => DownloadUrl::ForgeCdn,
            (Some(DownloadUrlMode::Suffix), None) => {
                bail!("downloadUrl \"suffix\" needs a non-empty downloadSuffix")
            }
            (Some(mode), Some(_)) => {
                bail!("downloadSuffix cannot be combined with downloadUrl {:?}", mode)
            }
        };

        Ok(Manifest {
            wow_folder: doc.wow_folder,
            specs,
            download_url,
        })
    }

    /// `<wowFolder>/<prefix>/Interface/AddOns`; an empty prefix is skipped.
    pub fn install_dir(&self, spec: &AddonSpec) -> PathBuf {
        let mut dir = self.wow_folder.clone();
        if !spec.prefix.is_empty() {
            dir.push(&spec.prefix);
        }
        for part in ADDONS_SUBPATH {
            dir.push(part);
        }
        dir
    }
}

/// `addons.json` -> `addons.lock.json`, next to the manifest.
pub fn lockfile_path_for(manifest: &Path) -> PathBuf {
    manifest.with_extension("lock.json")
}
