use chrono::{DateTime, FixedOffset};

use crate::{
    error::{Result, SyncError},
    types::addon::{AddonMetadata, ReleaseFile, ReleaseType, TARGET_GAME},
};

/// Rejects metadata that does not belong to the game we install for.
pub fn validate(metadata: &AddonMetadata, addon: &str) -> Result<()> {
    if metadata.game != TARGET_GAME {
        return Err(SyncError::Validation {
            addon: addon.to_string(),
            reason: format!(
                "the addon is not associated with WoW (game={:?}, id={}, title={:?})",
                metadata.game, metadata.id, metadata.title
            ),
        });
    }
    Ok(())
}

/// Picks the most recently uploaded `release` file whose game version starts
/// with `game_version`. Equal timestamps keep the file seen first.
pub fn latest_release<'a>(
    metadata: &'a AddonMetadata,
    addon: &str,
    game_version: &str,
) -> Result<&'a ReleaseFile> {
    let mut latest: Option<(&ReleaseFile, Option<DateTime<FixedOffset>>)> = None;

    for file in metadata.files.iter().filter(|f| is_eligible(f, game_version)) {
        latest = match latest {
            None => Some((file, None)),
            Some((current, parsed)) => {
                let current_at = match parsed {
                    Some(at) => at,
                    None => uploaded_at(current)?,
                };
                let candidate_at = uploaded_at(file)?;
                if candidate_at > current_at {
                    Some((file, Some(candidate_at)))
                } else {
                    Some((current, Some(current_at)))
                }
            }
        };
    }

    latest
        .map(|(file, _)| file)
        .ok_or_else(|| SyncError::NoEligibleRelease {
            addon: addon.to_string(),
            game_version: game_version.to_string(),
        })
}

/// Validates the metadata and resolves the latest release.
///
/// Id 0 is what the lockfile reports for addons that were never installed, so
/// a release without an id could never be recorded and is refused here.
pub fn resolve<'a>(
    metadata: &'a AddonMetadata,
    addon: &str,
    game_version: &str,
) -> Result<&'a ReleaseFile> {
    validate(metadata, addon)?;
    let release = latest_release(metadata, addon, game_version)?;
    if release.id == 0 {
        return Err(SyncError::Validation {
            addon: addon.to_string(),
            reason: format!("release file {:?} has no id", release.name),
        });
    }
    Ok(release)
}

fn is_eligible(file: &ReleaseFile, game_version: &str) -> bool {
    file.release_type == ReleaseType::Release && file.game_version.starts_with(game_version)
}

fn uploaded_at(file: &ReleaseFile) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(&file.uploaded_at).map_err(|e| SyncError::Timestamp {
        file_id: file.id,
        file_name: file.name.clone(),
        value: file.uploaded_at.clone(),
        source: e,
    })
}
