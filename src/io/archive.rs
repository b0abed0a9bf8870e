//! Archive driver.
//!
//! The installer consumes archives through [`ArchiveDriver`]: a directory
//! of members plus a member-bytes extractor. The shipped implementation,
//! [`Tarball`], handles tar, tar.gz, and tar.zst streams. Supplier
//! downloads land under a fixed `<name>.archive` file name, so the format
//! is sniffed from leading magic bytes rather than the extension.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use thiserror::Error;
use zstd::stream::Decoder as ZstdDecoder;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("no such member: {0}")]
    NoMember(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    File,
    Dir,
}

/// One archive member. Paths use forward slashes and no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub path: String,
    pub kind: MemberKind,
}

/// A decoded archive: enumerable members, extractable bytes.
pub trait ArchiveDriver {
    fn members(&self) -> &[Member];

    fn expand(&self, member: &Member) -> Result<Vec<u8>, ArchiveError>;
}

/// Compression applied to a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarZst,
}

/// Sniff the format from leading magic bytes; plain tar has none, so it is
/// the fallback.
pub fn detect_format(header: &[u8]) -> ArchiveFormat {
    match header {
        [0x1f, 0x8b, ..] => ArchiveFormat::TarGz,
        [0x28, 0xb5, 0x2f, 0xfd, ..] => ArchiveFormat::TarZst,
        _ => ArchiveFormat::Tar,
    }
}

/// A tar archive held fully decoded in memory.
///
/// Tar is a sequential format, so members are read once at open time;
/// `expand` is then a lookup, which suits the installer's enumerate-first,
/// extract-later shape.
pub struct Tarball {
    members: Vec<Member>,
    contents: Vec<Option<Vec<u8>>>,
}

impl Tarball {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        let got = file.read(&mut magic)?;
        let format = detect_format(&magic[..got]);

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        match format {
            ArchiveFormat::TarGz => Self::from_tar(GzDecoder::new(reader)),
            ArchiveFormat::TarZst => Self::from_tar(
                ZstdDecoder::new(reader).map_err(|e| ArchiveError::Archive(e.to_string()))?,
            ),
            ArchiveFormat::Tar => Self::from_tar(reader),
        }
    }

    fn from_tar<R: Read>(reader: R) -> Result<Self, ArchiveError> {
        let mut archive = tar::Archive::new(reader);
        let mut members = Vec::new();
        let mut contents = Vec::new();

        let entries = archive
            .entries()
            .map_err(|e| ArchiveError::Archive(e.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| ArchiveError::Archive(e.to_string()))?;
            let kind = if entry.header().entry_type().is_dir() {
                MemberKind::Dir
            } else if entry.header().entry_type().is_file() {
                MemberKind::File
            } else {
                // Links and specials have no place in a source package.
                continue;
            };

            let raw = entry
                .path()
                .map_err(|e| ArchiveError::Archive(e.to_string()))?;
            let path = normalize_member_path(&raw.to_string_lossy());
            if path.is_empty() || path == "." {
                continue;
            }

            let bytes = match kind {
                MemberKind::File => {
                    let mut buf = Vec::with_capacity(entry.size() as usize);
                    entry
                        .read_to_end(&mut buf)
                        .map_err(|e| ArchiveError::Archive(e.to_string()))?;
                    Some(buf)
                }
                MemberKind::Dir => None,
            };

            members.push(Member { path, kind });
            contents.push(bytes);
        }

        Ok(Self { members, contents })
    }
}

fn normalize_member_path(raw: &str) -> String {
    raw.replace('\\', "/")
        .trim_matches('/')
        .trim_start_matches("./")
        .to_string()
}

impl ArchiveDriver for Tarball {
    fn members(&self) -> &[Member] {
        &self.members
    }

    fn expand(&self, member: &Member) -> Result<Vec<u8>, ArchiveError> {
        let index = self
            .members
            .iter()
            .position(|m| m == member)
            .ok_or_else(|| ArchiveError::NoMember(member.path.clone()))?;
        match &self.contents[index] {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(ArchiveError::Archive(format!(
                "member '{}' is a directory",
                member.path
            ))),
        }
    }
}
