/// A single 32-byte FAT directory entry
/// This doesn't include any support for VFAT long filenames or timestamps
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::{FatError, Result};

/// Size of one directory entry in bytes
pub const DIRECTORY_ENTRY_SIZE: usize = 32;

/// Attribute bit: the entry can't be written
pub const ATTRIBUTE_READ_ONLY: u8 = 0x01;
/// Attribute bit: the entry is hidden from normal listings
pub const ATTRIBUTE_HIDDEN: u8 = 0x02;
/// Attribute bit: the entry belongs to the operating system
pub const ATTRIBUTE_SYSTEM: u8 = 0x04;
/// Attribute bit: the entry is the volume label
pub const ATTRIBUTE_VOLUME_LABEL: u8 = 0x08;
/// Attribute bit: the entry is a subdirectory
pub const ATTRIBUTE_DIRECTORY: u8 = 0x10;
/// Attribute bit: the entry was changed since the last backup
pub const ATTRIBUTE_ARCHIVE: u8 = 0x20;

/// First byte of the `.` and `..` entries
pub const WAYPOINT_CHAR: u8 = b'.';

/// First byte of an entry that was deleted
pub const DELETED_ENTRY_MARKER: u8 = 0xE5;

const NAME_OFFSET: usize = 0;
const NAME_LENGTH: usize = 8;
const EXTENSION_LENGTH: usize = 3;
const ATTRIBUTES_OFFSET: usize = 11;
const START_CLUSTER_OFFSET: usize = 26;
const SIZE_OFFSET: usize = 28;

/// Punctuation allowed in an 8.3 name besides letters and digits
const FILENAME_PUNCTUATION: &[u8] = b"$%'-_@~`!()^#&";

fn is_filename_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || FILENAME_PUNCTUATION.contains(&c)
}

/// Split a candidate 8.3 name into name and extension
/// Returns None if the name isn't a legal 8.3 name
fn split_filename(filename: &str) -> Option<(&str, &str)> {
    let (name, extension) = match filename.split_once('.') {
        Some((name, extension)) if !extension.is_empty() => (name, extension),
        Some(_) => return None,
        None => (filename, ""),
    };

    let valid = !name.is_empty()
        && name.len() <= NAME_LENGTH
        && extension.len() <= EXTENSION_LENGTH
        && name.bytes().all(is_filename_char)
        && extension.bytes().all(is_filename_char);

    valid.then_some((name, extension))
}

/// Return true if `filename` is a legal 8.3 name
///
/// Letters are accepted in either case.  `.` and `..` are not legal names.
///
/// # Examples
///
/// ```
/// use fat_disk_view::directory_entry::is_valid_filename;
///
/// assert!(is_valid_filename("README.TXT"));
/// assert!(is_valid_filename("autoexec.bat"));
/// assert!(!is_valid_filename("LONGFILENAME.TXT"));
/// assert!(!is_valid_filename(".."));
/// ```
pub fn is_valid_filename(filename: &str) -> bool {
    split_filename(filename).is_some()
}

/// Encode a name as the 11 space-padded, uppercase bytes stored on disk
pub fn encode_filename(filename: &str) -> Result<[u8; 11]> {
    let (name, extension) = split_filename(filename).ok_or_else(|| FatError::InvalidName {
        name: filename.to_string(),
    })?;

    let mut raw = [b' '; NAME_LENGTH + EXTENSION_LENGTH];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    raw[NAME_LENGTH..NAME_LENGTH + extension.len()].copy_from_slice(extension.as_bytes());
    raw.make_ascii_uppercase();

    Ok(raw)
}

/// Normalize a name for comparison with decoded entry names
pub fn normalize_filename(filename: &str) -> String {
    filename.to_ascii_uppercase()
}

/// A view of one directory entry over borrowed or owned bytes
///
/// The view reads and writes the underlying bytes directly, so a change
/// made through a `DirectoryEntry<&mut [u8]>` over a disk image is part of
/// the image as soon as the setter returns.
///
/// # Examples
///
/// ```
/// use fat_disk_view::directory_entry::DirectoryEntry;
///
/// let mut data = [0_u8; 32];
/// let mut entry = DirectoryEntry::new(&mut data[..]);
/// entry.set_name("hello.txt").unwrap();
/// entry.set_size(12);
///
/// assert_eq!(entry.name(), "HELLO.TXT");
/// assert_eq!(&data[0..11], b"HELLO   TXT");
/// ```
#[derive(Debug)]
pub struct DirectoryEntry<B> {
    data: B,
}

impl<B: AsRef<[u8]>> DirectoryEntry<B> {
    /// View the first 32 bytes of `data` as a directory entry
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than a directory entry.
    pub fn new(data: B) -> Self {
        assert!(
            data.as_ref().len() >= DIRECTORY_ENTRY_SIZE,
            "directory entry needs {} bytes",
            DIRECTORY_ENTRY_SIZE
        );
        DirectoryEntry { data }
    }

    fn bytes(&self) -> &[u8] {
        &self.data.as_ref()[..DIRECTORY_ENTRY_SIZE]
    }

    /// The raw 11-byte name and extension
    pub fn raw_name(&self) -> [u8; 11] {
        let mut raw = [0; 11];
        raw.copy_from_slice(&self.bytes()[NAME_OFFSET..NAME_OFFSET + 11]);
        raw
    }

    /// The filename, without padding, joined as `NAME.EXT`
    /// The dot is left out if there is no extension
    pub fn name(&self) -> String {
        let raw = self.raw_name();
        let name = String::from_utf8_lossy(&raw[..NAME_LENGTH]);
        let extension = String::from_utf8_lossy(&raw[NAME_LENGTH..]);
        let name = name.trim_end_matches(' ');
        let extension = extension.trim_end_matches(' ');

        if extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, extension)
        }
    }

    /// The first cluster of the entry's content
    pub fn start_cluster(&self) -> u16 {
        let b = self.bytes();
        u16::from_le_bytes([b[START_CLUSTER_OFFSET], b[START_CLUSTER_OFFSET + 1]])
    }

    /// The attribute byte
    pub fn attributes(&self) -> u8 {
        self.bytes()[ATTRIBUTES_OFFSET]
    }

    /// The size of the content in bytes
    pub fn size(&self) -> u32 {
        let b = self.bytes();
        u32::from_le_bytes([
            b[SIZE_OFFSET],
            b[SIZE_OFFSET + 1],
            b[SIZE_OFFSET + 2],
            b[SIZE_OFFSET + 3],
        ])
    }

    /// True if the directory attribute is set
    pub fn is_directory(&self) -> bool {
        self.attributes() & ATTRIBUTE_DIRECTORY != 0
    }

    /// True if the volume label attribute is set
    pub fn is_volume_label(&self) -> bool {
        self.attributes() & ATTRIBUTE_VOLUME_LABEL != 0
    }

    /// True if the entry has been deleted
    pub fn is_deleted(&self) -> bool {
        self.bytes()[0] == DELETED_ENTRY_MARKER
    }

    /// True if this is the `.` or `..` entry of a subdirectory
    pub fn is_waypoint(&self) -> bool {
        self.bytes()[0] == WAYPOINT_CHAR
    }

    /// True if this slot is unused, which also ends the directory
    pub fn is_end(&self) -> bool {
        self.bytes()[0] == 0
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> DirectoryEntry<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data.as_mut()[..DIRECTORY_ENTRY_SIZE]
    }

    /// Set the filename
    ///
    /// Fails with InvalidName, leaving the entry untouched, if `name` isn't a
    /// legal 8.3 name.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let raw = encode_filename(name)?;
        self.bytes_mut()[NAME_OFFSET..NAME_OFFSET + 11].copy_from_slice(&raw);
        Ok(())
    }

    /// Set the first cluster of the entry's content
    pub fn set_start_cluster(&mut self, cluster: u16) {
        self.bytes_mut()[START_CLUSTER_OFFSET..START_CLUSTER_OFFSET + 2]
            .copy_from_slice(&cluster.to_le_bytes());
    }

    /// Set the attribute byte
    pub fn set_attributes(&mut self, attributes: u8) {
        self.bytes_mut()[ATTRIBUTES_OFFSET] = attributes;
    }

    /// Set the size of the content in bytes
    pub fn set_size(&mut self, size: u32) {
        self.bytes_mut()[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&size.to_le_bytes());
    }

    /// Overwrite the whole entry without validating the name
    ///
    /// This is the only way to write names the 8.3 rules reject, like the
    /// `.` and `..` waypoints.  Every byte not covered by the arguments is
    /// zeroed.
    pub fn initialize(&mut self, raw_name: [u8; 11], attributes: u8, start_cluster: u16, size: u32) {
        let bytes = self.bytes_mut();
        bytes.fill(0);
        bytes[NAME_OFFSET..NAME_OFFSET + 11].copy_from_slice(&raw_name);
        self.set_attributes(attributes);
        self.set_start_cluster(start_cluster);
        self.set_size(size);
    }

    /// Write a `.` (depth one) or `..` (depth two) subdirectory entry
    pub fn initialize_waypoint(&mut self, depth: usize, start_cluster: u16) {
        let mut raw_name = [b' '; 11];
        raw_name[..depth.clamp(1, 2)].fill(WAYPOINT_CHAR);
        self.initialize(raw_name, ATTRIBUTE_DIRECTORY, start_cluster, 0);
    }
}

/// A formatter for displaying FAT directory entries
impl<B: AsRef<[u8]>> Display for DirectoryEntry<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = self.name();
        write!(f, "{:<20}", name)?;
        if self.is_directory() {
            write!(f, "{:>10} ", "<DIR>")?;
        } else {
            write!(f, "{:>10} ", self.size())?;
        }
        write!(f, "start_of_file: 0x{:<4X}", self.start_cluster())
    }
}
