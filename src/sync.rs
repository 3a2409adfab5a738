//! Drives one sync run: every addon of every scope, in manifest order.
//!
//! Per-addon failures are logged and recorded but never stop the batch. The
//! ledger is only touched after an addon was fully installed.

use std::path::Path;

use crate::{
    addon::{
        install::{InstallReport, install},
        metadata::AddonSource,
        resolve::resolve,
    },
    error::SyncError,
    lockfile::Ledger,
    types::{
        addon::DownloadUrl,
        manifest::{AddonSpec, Manifest},
    },
    utils::{
        logger::{LogLevel, Logger},
        spinner::run_step,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed { release_id: u64, files: usize },
    UpToDate { release_id: u64 },
}

#[derive(Debug)]
pub struct AddonReport {
    pub scope: String,
    pub name: String,
    pub result: Result<Outcome, SyncError>,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub reports: Vec<AddonReport>,
}

impl Summary {
    pub fn installed(&self) -> usize {
        self.count(|r| matches!(r, Ok(Outcome::Installed { .. })))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|r| matches!(r, Ok(Outcome::UpToDate { .. })))
    }

    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }

    #[cfg(test)]
    pub fn get(&self, scope: &str, name: &str) -> Option<&AddonReport> {
        self.reports
            .iter()
            .find(|r| r.scope == scope && r.name == name)
    }

    fn count(&self, pred: impl Fn(&Result<Outcome, SyncError>) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.result)).count()
    }
}

/// Syncs every addon in `manifest` and hands back the updated ledger.
pub fn run(manifest: &Manifest, mut ledger: Ledger, source: &dyn AddonSource) -> (Ledger, Summary) {
    let logger = Logger::new();
    let mut summary = Summary::default();

    for spec in &manifest.specs {
        let install_dir = manifest.install_dir(spec);
        for name in &spec.addons {
            let installed = ledger.get(&spec.prefix, name);
            let result = sync_addon(
                &logger,
                source,
                spec,
                name,
                installed,
                &install_dir,
                &manifest.download_url,
            );

            if let Ok(Outcome::Installed { release_id, .. }) = &result {
                ledger.put(&spec.prefix, name, *release_id);
            }

            summary.reports.push(AddonReport {
                scope: spec.prefix.clone(),
                name: name.clone(),
                result,
            });
        }
    }

    (ledger, summary)
}

fn sync_addon(
    logger: &Logger,
    source: &dyn AddonSource,
    spec: &AddonSpec,
    name: &str,
    installed: u64,
    install_dir: &Path,
    download_url: &DownloadUrl,
) -> Result<Outcome, SyncError> {
    let label = addon_label(&spec.prefix, name);

    let metadata = source.fetch_metadata(name).inspect_err(|e| {
        let level = if e.is_retry_later() {
            LogLevel::Warning
        } else {
            LogLevel::Error
        };
        logger.log_message(level, &e.to_string());
    })?;

    let release = resolve(&metadata, name, &spec.game_version).inspect_err(|e| {
        logger.log_message_with_trace(
            LogLevel::Error,
            &format!("Could not resolve a release for addon {}", label),
            vec![&e.to_string()],
        );
    })?;

    if release.id == installed {
        logger.log_message(
            LogLevel::Info,
            &format!(
                "{} with version {} is already present in lockfile",
                label, release.id
            ),
        );
        return Ok(Outcome::UpToDate {
            release_id: release.id,
        });
    }

    let url = download_url
        .url_for(release)
        .map_err(|reason| SyncError::Validation {
            addon: name.to_string(),
            reason,
        })
        .inspect_err(|e| {
            logger.log_message_with_trace(
                LogLevel::Error,
                &format!("No download location for addon {}", label),
                vec![&e.to_string()],
            );
        })?;

    let report = run_step(
        &format!("Installing {} ({})", label, release.name),
        &format!("Failed to install addon {}", label),
        |report: &InstallReport| {
            format!("Unzipped {} files for addon {}", report.written.len(), label)
        },
        || install(source, release, &url, install_dir),
    )?;

    if let Some(e) = &report.cleanup_error {
        logger.log_message(LogLevel::Warning, &e.to_string());
    }

    Ok(Outcome::Installed {
        release_id: release.id,
        files: report.written.len(),
    })
}

pub fn addon_label(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", scope, name)
    }
}
