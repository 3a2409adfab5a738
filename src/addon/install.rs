use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::{
    addon::metadata::AddonSource,
    error::{Result, SyncError},
    types::addon::ReleaseFile,
};

/// What one installation wrote to disk.
#[derive(Debug)]
pub struct InstallReport {
    /// Every directory and file created by the extraction, in archive order.
    pub written: Vec<PathBuf>,
    /// Set when the temporary archive could not be deleted afterwards. The
    /// extracted files stay in place regardless.
    pub cleanup_error: Option<SyncError>,
}

/// Downloads `release` from `url` into `destination`, unpacks it there and
/// removes the temporary archive.
pub fn install(
    source: &dyn AddonSource,
    release: &ReleaseFile,
    url: &str,
    destination: &Path,
) -> Result<InstallReport> {
    fs::create_dir_all(destination).map_err(|e| {
        SyncError::io(
            format!("couldn't create addon folder {}", destination.display()),
            e,
        )
    })?;

    let archive_path = destination.join(archive_file_name(release));

    if let Err(e) = download_to(source, url, &archive_path) {
        let _ = fs::remove_file(&archive_path);
        return Err(e);
    }

    let written = match extract(&archive_path, destination) {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&archive_path);
            return Err(e);
        }
    };

    let cleanup_error = fs::remove_file(&archive_path)
        .err()
        .map(|source| SyncError::Cleanup {
            path: archive_path.clone(),
            source,
        });

    Ok(InstallReport {
        written,
        cleanup_error,
    })
}

/// Release file name without any directory part, so the temporary archive
/// always lands directly inside the addon folder.
fn archive_file_name(release: &ReleaseFile) -> String {
    Path::new(&release.name.replace('\\', "/"))
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("release-{}.zip", release.id))
}

fn download_to(source: &dyn AddonSource, url: &str, path: &Path) -> Result<u64> {
    let file = File::create(path).map_err(|e| {
        SyncError::io(format!("couldn't create addon zip file {}", path.display()), e)
    })?;
    let mut out = BufWriter::new(file);
    let written = source.download(url, &mut out)?;
    out.flush().map_err(|e| {
        SyncError::io(format!("couldn't write to addon zip file {}", path.display()), e)
    })?;
    Ok(written)
}

/// Unpacks a zip archive into `destination`.
///
/// Every entry is checked before anything is written: if a single entry would
/// land outside `destination` the whole archive is rejected.
pub fn extract(archive_path: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    let root = destination.canonicalize().map_err(|e| {
        SyncError::io(format!("couldn't resolve {}", destination.display()), e)
    })?;

    let file = File::open(archive_path).map_err(|e| {
        SyncError::io(format!("couldn't open archive {}", archive_path.display()), e)
    })?;
    let archive_err = |source| SyncError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };
    let mut archive = zip::ZipArchive::new(file).map_err(archive_err)?;

    let mut plan: Vec<(usize, PathBuf, bool)> = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(archive_err)?;
        let target = safe_join(&root, entry.name())?;
        // Archives packed on Windows may mark folders with a trailing backslash.
        let is_dir = entry.is_dir() || entry.name().ends_with('\\');
        if target != root {
            plan.push((i, target, is_dir));
        }
    }

    let mut written = Vec::with_capacity(plan.len());
    for (i, target, is_dir) in plan {
        if is_dir {
            fs::create_dir_all(&target).map_err(|e| {
                SyncError::io(format!("couldn't create {}", target.display()), e)
            })?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    SyncError::io(format!("couldn't create {}", parent.display()), e)
                })?;
            }

            let mut entry = archive.by_index(i).map_err(archive_err)?;
            let mut out = File::create(&target).map_err(|e| {
                SyncError::io(format!("couldn't create {}", target.display()), e)
            })?;
            io::copy(&mut entry, &mut out).map_err(|e| {
                SyncError::io(format!("couldn't write {}", target.display()), e)
            })?;
            apply_mode(&target, entry.unix_mode())?;
        }
        written.push(target);
    }

    Ok(written)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
            .map_err(|e| SyncError::io(format!("couldn't set mode on {}", path.display()), e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

/// Joins an archive entry name onto `root` and checks the result stays inside
/// it. `root` must already be canonical.
///
/// Backslashes count as separators so `..\..\x` is caught on every platform.
pub fn safe_join(root: &Path, entry: &str) -> Result<PathBuf> {
    let joined = root.join(entry.replace('\\', "/"));
    let cleaned = clean(&joined);
    if cleaned.starts_with(root) {
        Ok(cleaned)
    } else {
        Err(SyncError::PathTraversal {
            entry: entry.to_string(),
            path: cleaned,
        })
    }
}

/// Lexically resolves `.` and `..` without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::testing::{FakeSource, ZipEntry, zip_bytes};
    use tempfile::tempdir;

    fn write_zip(dir: &Path, name: &str, entries: &[ZipEntry]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, zip_bytes(entries)).unwrap();
        path
    }

    #[test]
    fn safe_join_accepts_nested_entries() {
        let root = Path::new("/games/wow/Interface/AddOns");
        assert_eq!(
            safe_join(root, "Details/core/./init.lua").unwrap(),
            root.join("Details").join("core").join("init.lua")
        );
        assert_eq!(
            safe_join(root, "Details/../Bagnon/Bagnon.toc").unwrap(),
            root.join("Bagnon").join("Bagnon.toc")
        );
    }

    #[test]
    fn safe_join_rejects_escapes_with_either_separator() {
        let root = Path::new("/games/wow/Interface/AddOns");
        for entry in [
            "../../evil.txt",
            "..\\..\\evil.txt",
            "Details/../../evil.txt",
            "Details\\..\\..\\evil.txt",
            "/etc/passwd",
        ] {
            assert!(
                matches!(safe_join(root, entry), Err(SyncError::PathTraversal { .. })),
                "{} should be rejected",
                entry
            );
        }
    }

    #[test]
    fn sibling_with_common_prefix_is_outside() {
        // "AddOnsEvil" shares a string prefix with "AddOns" but is not inside it.
        let root = Path::new("/games/wow/Interface/AddOns");
        assert!(safe_join(root, "../AddOnsEvil/x.lua").is_err());
    }

    #[test]
    fn extracts_files_and_directories() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let archive = write_zip(
            scratch.path(),
            "Details.zip",
            &[
                ZipEntry::dir("Details/"),
                ZipEntry::file("Details/Details.toc", "## Title: Details"),
                ZipEntry::file("Details/core/init.lua", "print('hi')"),
            ],
        );

        let written = extract(&archive, dest.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(
            fs::read_to_string(dest.path().join("Details/Details.toc")).unwrap(),
            "## Title: Details"
        );
        assert_eq!(
            fs::read_to_string(dest.path().join("Details/core/init.lua")).unwrap(),
            "print('hi')"
        );
    }

    #[test]
    fn existing_files_are_overwritten() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::create_dir_all(dest.path().join("Details")).unwrap();
        fs::write(dest.path().join("Details/Details.toc"), "old and longer content").unwrap();

        let archive = write_zip(
            scratch.path(),
            "Details.zip",
            &[ZipEntry::file("Details/Details.toc", "new")],
        );
        extract(&archive, dest.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dest.path().join("Details/Details.toc")).unwrap(),
            "new"
        );
    }

    #[test]
    fn one_bad_entry_rejects_whole_archive() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let archive = write_zip(
            scratch.path(),
            "evil.zip",
            &[
                ZipEntry::file("Fine/Fine.toc", "ok"),
                ZipEntry::file("../../evil.txt", "pwned"),
            ],
        );

        let err = extract(&archive, dest.path()).unwrap_err();
        assert!(matches!(err, SyncError::PathTraversal { .. }));
        assert!(!dest.path().join("Fine").exists());
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn backslash_entries_are_rejected_too() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let archive = write_zip(
            scratch.path(),
            "evil.zip",
            &[ZipEntry::file("..\\..\\evil.txt", "pwned")],
        );
        assert!(matches!(
            extract(&archive, dest.path()),
            Err(SyncError::PathTraversal { .. })
        ));
    }

    #[test]
    fn trailing_backslash_entry_is_a_directory() {
        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let archive = write_zip(
            scratch.path(),
            "win.zip",
            &[
                ZipEntry::file("Foo\\", ""),
                ZipEntry::file("Foo\\bar.lua", "-- bar"),
            ],
        );

        let written = extract(&archive, dest.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dest.path().join("Foo").is_dir());
        assert_eq!(
            fs::read_to_string(dest.path().join("Foo").join("bar.lua")).unwrap(),
            "-- bar"
        );
    }

    #[cfg(unix)]
    #[test]
    fn unix_mode_is_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let archive = write_zip(
            scratch.path(),
            "tool.zip",
            &[ZipEntry::file("Tool/run.sh", "#!/bin/sh").with_mode(0o755)],
        );
        extract(&archive, dest.path()).unwrap();
        let mode = fs::metadata(dest.path().join("Tool/run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn install_downloads_extracts_and_removes_archive() {
        let dest = tempdir().unwrap();
        let addons = dest.path().join("Interface").join("AddOns");
        let release = ReleaseFile {
            id: 7,
            name: "Bar.zip".into(),
            download_url: "http://host/7".into(),
            ..Default::default()
        };
        let source = FakeSource::new().with_archive(
            "http://host/7/file",
            zip_bytes(&[
                ZipEntry::file("Bar/Bar.toc", "## Title: Bar"),
                ZipEntry::file("Bar/Bar.lua", "-- bar"),
            ]),
        );

        let report = install(&source, &release, "http://host/7/file", &addons).unwrap();
        assert_eq!(report.written.len(), 2);
        assert!(report.cleanup_error.is_none());
        assert!(addons.join("Bar/Bar.toc").is_file());
        assert!(!addons.join("Bar.zip").exists());
        assert_eq!(source.downloads(), vec!["http://host/7/file".to_string()]);
    }

    #[test]
    fn failed_download_leaves_no_archive_behind() {
        let dest = tempdir().unwrap();
        let release = ReleaseFile {
            id: 9,
            name: "Missing.zip".into(),
            download_url: "http://host/9".into(),
            ..Default::default()
        };
        let err = install(&FakeSource::new(), &release, "http://host/9", dest.path()).unwrap_err();
        assert!(matches!(err, SyncError::DownloadStatus { status: 404, .. }));
        assert!(!dest.path().join("Missing.zip").exists());
    }

    #[test]
    fn release_name_cannot_place_archive_elsewhere() {
        let release = ReleaseFile {
            id: 3,
            name: "../../outside.zip".into(),
            ..Default::default()
        };
        assert_eq!(archive_file_name(&release), "outside.zip");

        let unnamed = ReleaseFile {
            id: 3,
            ..Default::default()
        };
        assert_eq!(archive_file_name(&unnamed), "release-3.zip");
    }
}
