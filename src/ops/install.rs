//! Package installation.
//!
//! An install downloads the package archive into the transient download
//! area, decodes it, strips the wrapping directory common hosting sources
//! add, and materializes the contents under `modules/<name>/`, journaling
//! every file and directory it creates. The sealed journal is what makes
//! the install reversible; it is flushed to disk before success is
//! reported.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::journal::Journal;
use crate::core::manifest;
use crate::io::archive::{ArchiveDriver, Member, MemberKind, Tarball};
use crate::ops::OpError;
use crate::supplier::Supplier;
use crate::types::PackageName;

/// Removes the downloaded archive on every exit path.
struct TempGuard(PathBuf);

impl Drop for TempGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// Fetch, unpack, and journal one package into `<root>/modules/<name>`.
pub fn install(
    root: &Path,
    name: &PackageName,
    constraint: &crate::core::version::Constraint,
    supplier: &dyn Supplier,
) -> Result<(), OpError> {
    let dest = crate::module_dir(root, name);
    if dest.exists() {
        return Err(OpError::AlreadyInstalled(name.clone()));
    }

    let downloads = crate::temp_downloads_dir(root);
    fs::create_dir_all(&downloads)?;
    let temp = downloads.join(format!("{name}.archive"));
    if temp.exists() {
        return Err(OpError::TempOccupied(temp));
    }

    let _guard = TempGuard(temp.clone());
    supplier.store(&temp, name, constraint)?;

    let archive = Tarball::open(&temp).map_err(|source| OpError::ArchiveInvalid {
        name: name.clone(),
        source,
    })?;

    let prefix = find_prefix(archive.members());
    tracing::debug!("installing {name} with archive prefix '{prefix}'");

    fs::create_dir_all(&dest)?;
    let mut journal = Journal::new();
    let result = materialize(&archive, &prefix, &dest, &mut journal);

    // Persist whatever was journaled even on failure, so a later uninstall
    // can consume it to clean up the partial install.
    journal.seal();
    let saved = journal.save(&dest);

    if let Err(err) = result.and(saved.map_err(OpError::from)) {
        return Err(OpError::InstallInterrupted {
            name: name.clone(),
            reason: err.to_string(),
        });
    }
    Ok(())
}

/// The wrapping directory to elide: the parent of the archive's unique
/// `package.json` member, or failing that the deepest common ancestor of
/// all members.
fn find_prefix(members: &[Member]) -> String {
    let mut manifest_parents = members.iter().filter_map(|m| {
        (m.kind == MemberKind::File && basename(&m.path) == manifest::FILE_NAME)
            .then(|| parent(&m.path))
    });
    if let (Some(parent), None) = (manifest_parents.next(), manifest_parents.next()) {
        return parent.to_string();
    }

    let mut common: Option<Vec<&str>> = None;
    for member in members {
        let ancestor = match member.kind {
            MemberKind::File => parent(&member.path),
            MemberKind::Dir => member.path.as_str(),
        };
        let segments: Vec<&str> = if ancestor.is_empty() {
            Vec::new()
        } else {
            ancestor.split('/').collect()
        };
        common = Some(match common {
            None => segments,
            Some(current) => current
                .iter()
                .zip(&segments)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
    }
    common.unwrap_or_default().join("/")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Strip `prefix` at a component boundary; `None` means the member lies
/// outside the prefix and is skipped.
fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    if path == prefix {
        return Some("");
    }
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
}

fn materialize(
    archive: &dyn ArchiveDriver,
    prefix: &str,
    dest: &Path,
    journal: &mut Journal,
) -> Result<(), OpError> {
    for member in archive.members() {
        let Some(rest) = strip_prefix(&member.path, prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        if rest
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            tracing::warn!("skipping archive member with unsafe path '{}'", member.path);
            continue;
        }

        match member.kind {
            MemberKind::Dir => {
                ensure_dir_chain(dest, rest, journal)?;
            }
            MemberKind::File => {
                if let Some(dir) = rest.rfind('/').map(|idx| &rest[..idx]) {
                    ensure_dir_chain(dest, dir, journal)?;
                }
                let bytes = archive
                    .expand(member)
                    .map_err(|e| OpError::Io(std::io::Error::other(e)))?;
                fs::write(dest.join(rest), bytes)?;
                journal.push_file(rest);
            }
        }
    }
    Ok(())
}

/// Create every directory along `rel`, shallowest first, journaling each.
fn ensure_dir_chain(dest: &Path, rel: &str, journal: &mut Journal) -> Result<(), OpError> {
    let mut partial = String::new();
    for segment in rel.split('/') {
        if !partial.is_empty() {
            partial.push('/');
        }
        partial.push_str(segment);
        let dir = dest.join(&partial);
        if !dir.is_dir() {
            fs::create_dir(&dir)?;
        }
        journal.push_dir(&partial);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> Member {
        Member {
            path: path.into(),
            kind: MemberKind::File,
        }
    }

    fn dir(path: &str) -> Member {
        Member {
            path: path.into(),
            kind: MemberKind::Dir,
        }
    }

    #[test]
    fn test_prefix_from_unique_manifest() {
        let members = [
            dir("libA-1.2.0"),
            file("libA-1.2.0/package.json"),
            file("libA-1.2.0/source/lib.c"),
        ];
        assert_eq!(find_prefix(&members), "libA-1.2.0");
    }

    #[test]
    fn test_prefix_manifest_at_top_level() {
        let members = [file("package.json"), file("source/lib.c")];
        assert_eq!(find_prefix(&members), "");
    }

    #[test]
    fn test_prefix_ambiguous_manifests_fall_back() {
        // Two package.json members: fall back to the common ancestor.
        let members = [
            file("wrap/package.json"),
            file("wrap/vendor/package.json"),
            file("wrap/source/lib.c"),
        ];
        assert_eq!(find_prefix(&members), "wrap");
    }

    #[test]
    fn test_prefix_common_ancestor_without_manifest() {
        let members = [
            dir("pkg"),
            dir("pkg/source"),
            file("pkg/source/a.c"),
            file("pkg/README"),
        ];
        assert_eq!(find_prefix(&members), "pkg");
    }

    #[test]
    fn test_prefix_disjoint_members_have_no_prefix() {
        let members = [file("a/x.c"), file("b/y.c")];
        assert_eq!(find_prefix(&members), "");
    }

    #[test]
    fn test_strip_prefix_component_boundary() {
        assert_eq!(strip_prefix("pkg/a.c", "pkg"), Some("a.c"));
        assert_eq!(strip_prefix("pkg", "pkg"), Some(""));
        // "pkgX" does not live under "pkg".
        assert_eq!(strip_prefix("pkgX/a.c", "pkg"), None);
        assert_eq!(strip_prefix("other/a.c", "pkg"), None);
        assert_eq!(strip_prefix("a.c", ""), Some("a.c"));
    }
}
