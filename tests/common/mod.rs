//! Freshly formatted disk images for the integration tests
#![allow(dead_code)]

#[path = "../../src/testing.rs"]
mod testing;

pub use testing::{blank_image, BlankImage};

/// 720K double-sided floppy: 80 tracks, 2 sides, 9 sectors per track,
/// 1024 byte clusters
pub fn floppy_720k() -> Vec<u8> {
    blank_image(&BlankImage::default())
}

/// Offset of the first FAT on the 720K floppy
pub const FLOPPY_FAT: usize = 0x200;

/// Offset of the second FAT on the 720K floppy
pub const FLOPPY_BACKUP_FAT: usize = 0x200 + 5 * 512;

/// 4M volume with 512 byte clusters, enough of them to need FAT16
pub fn fat16_4m() -> Vec<u8> {
    blank_image(&BlankImage::fat16())
}

/// Offset of the first FAT on the 4M volume
pub const FAT16_FAT: usize = 0x200;
