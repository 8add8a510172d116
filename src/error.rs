//! Errors returned by the FAT disk view
use std::fmt::{Display, Formatter};

use thiserror::Error;

/// The kind of entry an operation expected to find
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file
    File,
    /// A subdirectory
    Directory,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// Reasons an image is rejected as malformed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// A boot sector field holds a value that makes the geometry meaningless
    #[error("invalid {field}: {value}")]
    InvalidField {
        /// Name of the BIOS Parameter Block field
        field: &'static str,
        /// The value found on disk
        value: u32,
    },

    /// The buffer ends before the volume described by the boot sector does
    #[error("image truncated: volume needs {required} bytes, buffer has {available}")]
    Truncated {
        /// Bytes the boot sector says the volume occupies
        required: usize,
        /// Bytes actually available after the base offset
        available: usize,
    },

    /// The boot sector could not be parsed at all
    #[error("unparseable boot sector: {0}")]
    Unparseable(String),
}

/// Errors returned by filesystem operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FatError {
    /// Malformed geometry or image
    #[error("malformed image: {0}")]
    Format(#[from] FormatError),

    /// The name is not a legal 8.3 name
    #[error("invalid filename \"{name}\"")]
    InvalidName {
        /// The offending name
        name: String,
    },

    /// A lookup failed
    #[error("entry \"{name}\" not found")]
    NotFound {
        /// The name that was looked up
        name: String,
    },

    /// The entry exists but is the wrong kind
    #[error("\"{name}\" is not a {expected}")]
    TypeMismatch {
        /// The name that was looked up
        name: String,
        /// What the caller asked for
        expected: EntryKind,
    },

    /// An entry with this name already exists in the directory
    #[error("\"{name}\" already exists")]
    AlreadyExists {
        /// The duplicate name
        name: String,
    },

    /// No free cluster was left to satisfy an allocation
    #[error("disk full: {required} clusters required, {available} available")]
    DiskFull {
        /// Clusters the operation needed
        required: usize,
        /// Clusters that were free when the operation started
        available: usize,
    },

    /// The root directory region has no free slot
    #[error("root directory full ({capacity} entries)")]
    DirectoryFull {
        /// Number of entries the root region holds
        capacity: usize,
    },

    /// A cluster chain loops, runs out of range, or links to an unallocated cluster
    #[error("corrupt cluster chain starting at {start}: bad link at cluster {cluster}")]
    CorruptChain {
        /// First cluster of the chain
        start: u16,
        /// The cluster whose link could not be followed
        cluster: u16,
    },
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, FatError>;
