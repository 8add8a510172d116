//! Checks never fail an operation, they log what they found and report it
use log::debug;

use crate::cluster::{FatType, FIRST_DATA_CLUSTER};
use crate::fat::FatDiskView;
use crate::geometry::Geometry;

/// Define a trait that performs sanity checks on an image structure
pub trait SanityCheck {
    /// Perform a set of data-dependent sanity checks on a structure
    /// Returns true if the object passes the checks
    /// Return false if the object fails the tests
    fn check(&self) -> bool;
}

impl SanityCheck for Geometry {
    fn check(&self) -> bool {
        let mut result = true;

        if self.root_dir_size % self.bytes_per_sector != 0 {
            debug!(
                "root directory should fill whole sectors: {} bytes",
                self.root_dir_size
            );
            result = false;
        }

        let entries = match FatType::detect(self.max_clusters) {
            Ok(FatType::Fat12) => self.fat_size * 2 / 3,
            Ok(FatType::Fat16) => self.fat_size / 2,
            Err(_) => 0,
        };
        let required = self.max_clusters + FIRST_DATA_CLUSTER as usize;
        if entries < required {
            debug!(
                "FAT should have room for {} entries, has {}",
                required, entries
            );
            result = false;
        }

        result
    }
}

impl<B: AsRef<[u8]>> SanityCheck for FatDiskView<B> {
    fn check(&self) -> bool {
        let mut result = self.geometry().check();

        let fat_size = self.geometry().fat_size;
        let primary = self.geometry().fat_offset(0);
        let primary = &self.as_bytes()[primary..primary + fat_size];

        for copy in 1..self.geometry().fat_count {
            let start = self.geometry().fat_offset(copy);
            if self.as_bytes()[start..start + fat_size] != *primary {
                debug!("FAT should equal backup FAT {}", copy);
                result = false;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::SanityCheck;
    use crate::fat::{FatDiskOptions, FatDiskView};
    use crate::geometry::Geometry;
    use crate::testing::{blank_image, BlankImage};

    #[test]
    fn blank_images_pass() {
        for layout in [BlankImage::default(), BlankImage::fat16()] {
            let image = blank_image(&layout);
            let disk = FatDiskView::open(&image[..], &FatDiskOptions::default())
                .expect("Image should open");
            assert!(disk.check());
        }
    }

    #[test]
    fn mismatched_backup_fat_fails() {
        let mut image = blank_image(&BlankImage::default());
        // cluster 2 of the backup FAT
        image[0x200 + 5 * 512 + 3] = 0xFF;
        let disk = FatDiskView::open(&image[..], &FatDiskOptions::default())
            .expect("Image should open");

        assert!(!disk.check());
    }

    #[test]
    fn undersized_fat_fails() {
        let image = blank_image(&BlankImage {
            fat_size: 1,
            ..BlankImage::default()
        });
        let geometry = Geometry::parse(&image, 0).expect("Geometry should parse");

        // 341 entries can't cover 717 clusters
        assert!(!geometry.check());
    }
}
