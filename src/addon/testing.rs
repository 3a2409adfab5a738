//! In-memory addon source and zip fixtures for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::{
    addon::metadata::AddonSource,
    error::{Result, SyncError},
    types::addon::AddonMetadata,
};

pub struct ZipEntry {
    name: String,
    contents: Option<Vec<u8>>,
    mode: u32,
}

impl ZipEntry {
    pub fn file(name: &str, contents: &str) -> Self {
        ZipEntry {
            name: name.to_string(),
            contents: Some(contents.as_bytes().to_vec()),
            mode: 0o644,
        }
    }

    pub fn dir(name: &str) -> Self {
        ZipEntry {
            name: name.to_string(),
            contents: None,
            mode: 0o755,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

pub fn zip_bytes(entries: &[ZipEntry]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(entry.mode);
        match &entry.contents {
            Some(bytes) => {
                zip.start_file(entry.name.as_str(), options).unwrap();
                zip.write_all(bytes).unwrap();
            }
            None => zip.add_directory(entry.name.as_str(), options).unwrap(),
        }
    }
    zip.finish().unwrap().into_inner()
}

enum MetadataReply {
    Found(AddonMetadata),
    Queued,
    Status(u16),
}

/// Serves canned metadata and archives, and remembers what was downloaded.
#[derive(Default)]
pub struct FakeSource {
    metadata: HashMap<String, MetadataReply>,
    archives: HashMap<String, Vec<u8>>,
    downloads: RefCell<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, addon: &str, metadata: AddonMetadata) -> Self {
        self.metadata
            .insert(addon.to_string(), MetadataReply::Found(metadata));
        self
    }

    pub fn with_queued(mut self, addon: &str) -> Self {
        self.metadata.insert(addon.to_string(), MetadataReply::Queued);
        self
    }

    pub fn with_status(mut self, addon: &str, status: u16) -> Self {
        self.metadata
            .insert(addon.to_string(), MetadataReply::Status(status));
        self
    }

    pub fn with_archive(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.archives.insert(url.to_string(), bytes);
        self
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl AddonSource for FakeSource {
    fn fetch_metadata(&self, addon: &str) -> Result<AddonMetadata> {
        match self.metadata.get(addon) {
            Some(MetadataReply::Found(meta)) => Ok(meta.clone()),
            Some(MetadataReply::Queued) => Err(SyncError::MetadataQueued {
                addon: addon.to_string(),
            }),
            Some(MetadataReply::Status(status)) => Err(SyncError::MetadataStatus {
                addon: addon.to_string(),
                status: *status,
            }),
            None => Err(SyncError::MetadataStatus {
                addon: addon.to_string(),
                status: 404,
            }),
        }
    }

    fn download(&self, url: &str, out: &mut dyn Write) -> Result<u64> {
        self.downloads.borrow_mut().push(url.to_string());
        let bytes = self
            .archives
            .get(url)
            .ok_or_else(|| SyncError::DownloadStatus {
                url: url.to_string(),
                status: 404,
                body: Some("not found".to_string()),
            })?;
        out.write_all(bytes)
            .map_err(|e| SyncError::io("couldn't write archive", e))?;
        Ok(bytes.len() as u64)
    }
}
