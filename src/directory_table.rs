/// Walk FAT directory tables
///
/// The root directory is a single fixed-size region after the FATs.
/// Subdirectories are ordinary cluster chains whose clusters are filled
/// with directory entries.  Each region is read 32 bytes at a time until
/// the region ends or an entry starts with a zero byte.
use log::{debug, trace};

use std::vec::IntoIter;

use crate::cluster::FIRST_DATA_CLUSTER;
use crate::directory_entry::{normalize_filename, DirectoryEntry, DIRECTORY_ENTRY_SIZE};
use crate::error::{EntryKind, FatError, Result};
use crate::fat::FatDiskView;

/// The location of a directory entry in the disk image
///
/// A handle, not a copy: reading an entry through its `EntryRef` always
/// sees the current bytes of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryRef {
    offset: usize,
}

impl EntryRef {
    pub(crate) fn new(offset: usize) -> Self {
        EntryRef { offset }
    }

    /// Absolute byte offset of the entry in the backing buffer
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// A single pass over the entries of one directory
///
/// Iteration can't be restarted, ask the disk for a new iterator instead.
pub struct DirectoryIter<'a> {
    data: &'a [u8],
    regions: IntoIter<(usize, usize)>,
    position: usize,
    end: usize,
}

impl<'a> DirectoryIter<'a> {
    fn new(data: &'a [u8], regions: Vec<(usize, usize)>) -> Self {
        DirectoryIter {
            data,
            regions: regions.into_iter(),
            position: 0,
            end: 0,
        }
    }

    /// Return the first entry whose name matches `name`, ignoring case
    pub fn find_by_name(mut self, name: &str) -> Option<EntryRef> {
        let name = normalize_filename(name);
        let data = self.data;
        self.find(|entry| {
            DirectoryEntry::new(&data[entry.offset..]).name() == name
        })
    }
}

impl Iterator for DirectoryIter<'_> {
    type Item = EntryRef;

    fn next(&mut self) -> Option<EntryRef> {
        loop {
            if self.position + DIRECTORY_ENTRY_SIZE <= self.end && self.data[self.position] != 0 {
                let entry = EntryRef::new(self.position);
                self.position += DIRECTORY_ENTRY_SIZE;
                return Some(entry);
            }

            let (start, length) = self.regions.next()?;
            self.position = start;
            self.end = start + length;
        }
    }
}

impl<B: AsRef<[u8]>> FatDiskView<B> {
    /// Check that `directory` is a directory and map it to the root if it
    /// refers to it
    ///
    /// A start cluster below two is the root directory, which is what the
    /// `..` entry of a directory directly under the root holds.
    fn resolve_directory(&self, directory: Option<EntryRef>) -> Result<Option<EntryRef>> {
        let Some(directory) = directory else {
            return Ok(None);
        };

        let entry = self.entry(directory);
        if !entry.is_directory() {
            return Err(FatError::TypeMismatch {
                name: entry.name(),
                expected: EntryKind::Directory,
            });
        }

        if entry.start_cluster() < FIRST_DATA_CLUSTER {
            trace!("directory at 0x{:X} refers to the root", directory.offset());
            Ok(None)
        } else {
            Ok(Some(directory))
        }
    }

    /// The (offset, length) byte regions holding a directory's entries
    fn directory_regions(&self, directory: Option<EntryRef>) -> Result<Vec<(usize, usize)>> {
        let geometry = self.geometry();

        match self.resolve_directory(directory)? {
            None => Ok(vec![(geometry.root_dir_start, geometry.root_dir_size)]),
            Some(directory) => {
                let chain = self.cluster_chain(self.entry(directory).start_cluster())?;
                Ok(chain
                    .into_iter()
                    .map(|cluster| (geometry.cluster_offset(cluster), geometry.cluster_size))
                    .collect())
            }
        }
    }

    /// Iterate over the entries of `directory`, or the root directory if None
    ///
    /// Fails if `directory` isn't a directory or its cluster chain is corrupt.
    pub fn directory_iter(&self, directory: Option<EntryRef>) -> Result<DirectoryIter<'_>> {
        let regions = self.directory_regions(directory)?;
        Ok(DirectoryIter::new(self.as_bytes(), regions))
    }

    /// Collect the entries of `directory`, or the root directory if None
    pub fn get_directory_entries(&self, directory: Option<EntryRef>) -> Result<Vec<EntryRef>> {
        Ok(self.directory_iter(directory)?.collect())
    }

    /// Offset of the first unused slot in a directory, if it has one
    fn free_slot(&self, directory: Option<EntryRef>) -> Result<Option<usize>> {
        let data = self.as_bytes();
        let slot = self
            .directory_regions(directory)?
            .into_iter()
            .flat_map(|(start, length)| (start..start + length).step_by(DIRECTORY_ENTRY_SIZE))
            .find(|&offset| {
                offset + DIRECTORY_ENTRY_SIZE <= data.len() && data[offset] == 0
            });
        Ok(slot)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatDiskView<B> {
    /// Find room for one more entry in `directory`
    ///
    /// A full subdirectory grows by one zeroed cluster.  A full root
    /// directory can't grow and fails with DirectoryFull.
    pub(crate) fn append_slot(&mut self, directory: Option<EntryRef>) -> Result<usize> {
        if let Some(slot) = self.free_slot(directory)? {
            trace!("free directory slot at 0x{:X}", slot);
            return Ok(slot);
        }

        let directory = match self.resolve_directory(directory)? {
            Some(directory) => directory,
            None => {
                return Err(FatError::DirectoryFull {
                    capacity: self.geometry().root_dir_size / DIRECTORY_ENTRY_SIZE,
                })
            }
        };

        let chain = self.cluster_chain(self.entry(directory).start_cluster())?;
        let cluster = self.allocate_cluster()?;
        self.cluster_data_mut(cluster).fill(0);

        self.set_cluster(cluster, self.fat_type().terminator());
        // resolved directories always start at a data cluster
        if let Some(&last) = chain.last() {
            self.set_cluster(last, cluster);
        }

        debug!("grew directory with cluster {}", cluster);

        Ok(self.geometry().cluster_offset(cluster))
    }
}
