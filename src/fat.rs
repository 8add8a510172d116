/// Read and write files on a FAT12 or FAT16 disk image
///
/// A FatDiskView wraps a byte buffer holding the whole volume.  Nothing is
/// cached besides the geometry: FAT lookups, directory walks and file
/// reads go straight to the buffer, and every write lands in the buffer
/// before the call returns.
use log::{debug, info};

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::cluster::{FatTable, FatTableMut, FatType, CLUSTER_EMPTY, FAT, FIRST_DATA_CLUSTER};
use crate::directory_entry::{
    encode_filename, DirectoryEntry, ATTRIBUTE_DIRECTORY, DIRECTORY_ENTRY_SIZE,
};
use crate::directory_table::EntryRef;
use crate::error::{EntryKind, FatError, Result};
use crate::geometry::Geometry;

/// Options for opening a disk image
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FatDiskOptions {
    /// Explicitly specify the FAT encoding
    /// When None, the type is picked from the number of data clusters
    pub format: Option<FatType>,
}

/// A DOS FAT disk
///
/// # Examples
///
/// ```
/// use fat_disk_view::{FatDiskOptions, FatDiskView};
///
/// # fn list(image: Vec<u8>) -> fat_disk_view::Result<()> {
/// let disk = FatDiskView::open(image, &FatDiskOptions::default())?;
/// for entry in disk.directory_iter(None)? {
///     println!("{}", disk.entry(entry));
/// }
/// # Ok(())
/// # }
/// ```
pub struct FatDiskView<B> {
    data: B,
    geometry: Geometry,
    fat_type: FatType,
}

impl<B: AsRef<[u8]>> FatDiskView<B> {
    /// Open a disk image whose boot sector is at the start of `data`
    pub fn open(data: B, options: &FatDiskOptions) -> Result<Self> {
        FatDiskView::open_at(data, 0, options)
    }

    /// Open a disk image whose boot sector is `base_offset` bytes into `data`
    pub fn open_at(data: B, base_offset: usize, options: &FatDiskOptions) -> Result<Self> {
        let geometry = Geometry::parse(data.as_ref(), base_offset)?;

        let fat_type = match options.format {
            Some(fat_type) => fat_type,
            None => FatType::detect(geometry.max_clusters)?,
        };

        info!(
            "opened {} volume: {} clusters of {} bytes",
            fat_type, geometry.max_clusters, geometry.cluster_size
        );

        Ok(FatDiskView {
            data,
            geometry,
            fat_type,
        })
    }

    /// The volume layout
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The FAT encoding used by this view
    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    /// The whole backing buffer, including anything before the base offset
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Give back the backing buffer
    pub fn into_inner(self) -> B {
        self.data
    }

    /// A view of FAT copy `copy`, or None if the volume has fewer copies
    pub fn fat_table(&self, copy: usize) -> Option<FAT<&[u8]>> {
        if copy >= self.geometry.fat_count {
            return None;
        }
        let start = self.geometry.fat_offset(copy);
        let bytes = &self.as_bytes()[start..start + self.geometry.fat_size];
        Some(FAT::new(self.fat_type, bytes))
    }

    /// The first FAT copy, which is treated as the source of truth
    pub(crate) fn primary_fat(&self) -> FAT<&[u8]> {
        let start = self.geometry.fat_start;
        FAT::new(
            self.fat_type,
            &self.as_bytes()[start..start + self.geometry.fat_size],
        )
    }

    /// The highest cluster number a chain or allocation may use
    /// Data clusters run from two up to and including this value
    pub fn last_cluster(&self) -> u16 {
        self.primary_fat().last_cluster(self.geometry.max_clusters)
    }

    /// Follow a cluster chain in the primary FAT
    pub(crate) fn cluster_chain(&self, start: u16) -> Result<Vec<u16>> {
        self.primary_fat()
            .get_cluster_chain(start, self.geometry.max_clusters)
    }

    /// The bytes of data cluster `cluster`
    pub(crate) fn cluster_data(&self, cluster: u16) -> &[u8] {
        let start = self.geometry.cluster_offset(cluster);
        &self.as_bytes()[start..start + self.geometry.cluster_size]
    }

    /// The number of unused clusters
    pub fn free_clusters(&self) -> usize {
        let fat = self.primary_fat();
        (FIRST_DATA_CLUSTER..=self.last_cluster())
            .filter(|&cluster| fat.get_cluster(cluster) == CLUSTER_EMPTY)
            .count()
    }

    /// Returns the available free space on the disk, in bytes
    /// This is always a multiple of the cluster size
    pub fn get_free(&self) -> usize {
        self.free_clusters() * self.geometry.cluster_size
    }

    /// The total number of bytes that can be stored on the volume
    pub fn get_size(&self) -> usize {
        self.geometry.max_clusters * self.geometry.cluster_size
    }

    /// Read-only view of the directory entry at `entry`
    ///
    /// # Panics
    ///
    /// An `EntryRef` is only meaningful for the view that returned it.
    /// Panics if `entry` came from a larger image and lies past the end of
    /// this buffer.
    pub fn entry(&self, entry: EntryRef) -> DirectoryEntry<&[u8]> {
        let start = entry.offset();
        DirectoryEntry::new(&self.as_bytes()[start..start + DIRECTORY_ENTRY_SIZE])
    }

    fn get_entry(&self, name: &str, parent: Option<EntryRef>) -> Result<EntryRef> {
        encode_filename(name)?;
        self.directory_iter(parent)?
            .find_by_name(name)
            .ok_or_else(|| FatError::NotFound {
                name: name.to_string(),
            })
    }

    /// Look up the file `name` in `parent`, or the root directory if None
    ///
    /// Fails with NotFound if there is no such entry and TypeMismatch if
    /// the entry is a directory.
    pub fn get_file(&self, name: &str, parent: Option<EntryRef>) -> Result<EntryRef> {
        let file = self.get_entry(name, parent)?;
        if self.entry(file).is_directory() {
            return Err(FatError::TypeMismatch {
                name: name.to_string(),
                expected: EntryKind::File,
            });
        }
        Ok(file)
    }

    /// Look up the subdirectory `name` in `parent`, or the root directory if None
    ///
    /// Fails with NotFound if there is no such entry and TypeMismatch if
    /// the entry is not a directory.
    pub fn get_directory(&self, name: &str, parent: Option<EntryRef>) -> Result<EntryRef> {
        let directory = self.get_entry(name, parent)?;
        if !self.entry(directory).is_directory() {
            return Err(FatError::TypeMismatch {
                name: name.to_string(),
                expected: EntryKind::Directory,
            });
        }
        Ok(directory)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatDiskView<B> {
    /// Writable view of the directory entry at `entry`
    ///
    /// # Panics
    ///
    /// Panics if `entry` lies past the end of the buffer, see [`entry`](Self::entry).
    pub fn entry_mut(&mut self, entry: EntryRef) -> DirectoryEntry<&mut [u8]> {
        let start = entry.offset();
        DirectoryEntry::new(&mut self.data.as_mut()[start..start + DIRECTORY_ENTRY_SIZE])
    }

    /// A writable view of FAT copy `copy`
    fn fat_table_mut(&mut self, copy: usize) -> FAT<&mut [u8]> {
        let start = self.geometry.fat_offset(copy);
        let size = self.geometry.fat_size;
        FAT::new(self.fat_type, &mut self.data.as_mut()[start..start + size])
    }

    /// Set a cluster in every FAT copy
    pub(crate) fn set_cluster(&mut self, cluster: u16, value: u16) {
        for copy in 0..self.geometry.fat_count {
            self.fat_table_mut(copy).set_cluster(cluster, value);
        }
    }

    /// The bytes of data cluster `cluster`
    pub(crate) fn cluster_data_mut(&mut self, cluster: u16) -> &mut [u8] {
        let start = self.geometry.cluster_offset(cluster);
        let size = self.geometry.cluster_size;
        &mut self.data.as_mut()[start..start + size]
    }

    /// Append a new entry with its own terminated single-cluster chain
    fn create_entry(
        &mut self,
        name: &str,
        attributes: u8,
        parent: Option<EntryRef>,
    ) -> Result<EntryRef> {
        let raw_name = encode_filename(name)?;

        if self.directory_iter(parent)?.find_by_name(name).is_some() {
            return Err(FatError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let cluster = self.allocate_cluster()?;
        let slot = match self.append_slot(parent) {
            Ok(slot) => slot,
            Err(e) => {
                self.deallocate_cluster(cluster);
                return Err(e);
            }
        };

        let entry = EntryRef::new(slot);
        self.entry_mut(entry)
            .initialize(raw_name, attributes, cluster, 0);
        self.set_cluster(cluster, self.fat_type.terminator());

        debug!("created \"{}\" at 0x{:X}, cluster {}", name, slot, cluster);

        Ok(entry)
    }

    /// Create an empty file in `parent`, or the root directory if None
    ///
    /// The new file owns one cluster, so its start cluster is never zero.
    pub fn create_file(&mut self, name: &str, parent: Option<EntryRef>) -> Result<EntryRef> {
        self.create_entry(name, 0, parent)
    }

    /// Create a subdirectory in `parent`, or the root directory if None
    ///
    /// The new directory's cluster holds only the `.` and `..` entries.
    pub fn create_directory(&mut self, name: &str, parent: Option<EntryRef>) -> Result<EntryRef> {
        let directory = self.create_entry(name, ATTRIBUTE_DIRECTORY, parent)?;

        let cluster = self.entry(directory).start_cluster();
        let parent_cluster = parent.map_or(0, |parent| self.entry(parent).start_cluster());

        let data = self.cluster_data_mut(cluster);
        data.fill(0);
        DirectoryEntry::new(&mut data[..DIRECTORY_ENTRY_SIZE]).initialize_waypoint(1, cluster);
        DirectoryEntry::new(&mut data[DIRECTORY_ENTRY_SIZE..]).initialize_waypoint(2, parent_cluster);

        Ok(directory)
    }
}

/// Display a DOS FAT disk
impl<B: AsRef<[u8]>> Display for FatDiskView<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ", self.fat_type)?;
        write!(f, "{}, ", self.geometry)?;
        write!(f, "size: {}, free: {}", self.get_size(), self.get_free())
    }
}
