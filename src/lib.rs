#![warn(missing_docs)]
#![warn(unsafe_code)]
//! Read and write files on FAT12 and FAT16 disk images held in memory
//!
//! The whole volume lives in one byte buffer.  The FAT, directory tables
//! and file data are read from and written to that buffer directly.

/// Errors returned by disk operations
pub mod error;

/// BIOS Parameter Block parser and derived volume layout
pub mod geometry;

/// File Allocation Table Cluster functions and data structures
pub mod cluster;

/// FAT directory entries and 8.3 filenames
pub mod directory_entry;

/// FAT Directory Table parser
pub mod directory_table;

/// MS-DOS FAT disk images
pub mod fat;

mod allocator;

/// File-handling functions
/// This module combines the directory table with the FAT cluster
/// to piece together files
pub mod file;

/// Absolute paths
pub mod path;

/// SanityCheck trait
pub mod sanity_check;

#[cfg(test)]
mod testing;

pub use cluster::FatType;
pub use directory_entry::DirectoryEntry;
pub use directory_table::EntryRef;
pub use error::{EntryKind, FatError, FormatError, Result};
pub use fat::{FatDiskOptions, FatDiskView};
pub use sanity_check::SanityCheck;
