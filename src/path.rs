//! Absolute slash-separated paths
//!
//! Paths are walked from the root directory one segment at a time with the
//! same lookups as the name-based operations.  Empty segments are ignored,
//! so "A//B/" is the same path as "/A/B".
use log::trace;

use crate::directory_table::EntryRef;
use crate::error::{EntryKind, FatError, Result};
use crate::fat::FatDiskView;

/// A path split into its directory segments and final name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPath<'a> {
    /// Every segment before the last one, from the root down
    pub directories: Vec<&'a str>,
    /// The last segment, None for the root directory
    pub name: Option<&'a str>,
}

impl<'a> ParsedPath<'a> {
    /// Every segment, including the final name
    pub fn segments(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.directories.iter().copied().chain(self.name)
    }
}

/// Split a path on '/' into non-empty segments
///
/// # Examples
///
/// ```
/// use fat_disk_view::path::parse_path;
///
/// let path = parse_path("/GAMES/CHESS/README.TXT");
/// assert_eq!(path.directories, vec!["GAMES", "CHESS"]);
/// assert_eq!(path.name, Some("README.TXT"));
///
/// assert_eq!(parse_path("/").name, None);
/// ```
pub fn parse_path(path: &str) -> ParsedPath<'_> {
    let mut directories: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let name = directories.pop();
    ParsedPath { directories, name }
}

impl<B: AsRef<[u8]>> FatDiskView<B> {
    /// Walk `segments` from the root, each one must be a directory
    fn resolve_directories(&self, segments: &[&str]) -> Result<Option<EntryRef>> {
        let mut directory = None;
        for segment in segments {
            trace!("resolving path segment \"{}\"", segment);
            directory = Some(self.get_directory(segment, directory)?);
        }
        Ok(directory)
    }

    /// The directory containing the last segment of `path`, and that segment
    fn resolve_parent<'p>(&self, path: &'p str) -> Result<(Option<EntryRef>, Option<&'p str>)> {
        let parsed = parse_path(path);
        let parent = self.resolve_directories(&parsed.directories)?;
        Ok((parent, parsed.name))
    }

    /// Look up the directory at `path`
    ///
    /// Returns None for the root directory.  Fails with NotFound as soon as
    /// a segment is missing and TypeMismatch if a segment is a file.
    pub fn get_directory_at_path(&self, path: &str) -> Result<Option<EntryRef>> {
        let parsed = parse_path(path);
        let segments: Vec<&str> = parsed.segments().collect();
        self.resolve_directories(&segments)
    }

    /// Look up the file at `path`
    pub fn get_file_at_path(&self, path: &str) -> Result<EntryRef> {
        match self.resolve_parent(path)? {
            (parent, Some(name)) => self.get_file(name, parent),
            (_, None) => Err(FatError::TypeMismatch {
                name: path.to_string(),
                expected: EntryKind::File,
            }),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatDiskView<B> {
    /// Create an empty file at `path`
    /// Every directory leading up to it must already exist
    pub fn create_file_at_path(&mut self, path: &str) -> Result<EntryRef> {
        match self.resolve_parent(path)? {
            (parent, Some(name)) => self.create_file(name, parent),
            (_, None) => Err(FatError::InvalidName {
                name: path.to_string(),
            }),
        }
    }

    /// Create a directory at `path`
    /// Every directory leading up to it must already exist
    pub fn create_directory_at_path(&mut self, path: &str) -> Result<EntryRef> {
        match self.resolve_parent(path)? {
            (parent, Some(name)) => self.create_directory(name, parent),
            (_, None) => Err(FatError::InvalidName {
                name: path.to_string(),
            }),
        }
    }
}
