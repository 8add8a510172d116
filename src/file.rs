//! File-handling functions
//! This module combines the directory entries with the FAT cluster chains
//! to piece together files
use log::{debug, error};

use crate::directory_table::EntryRef;
use crate::error::{EntryKind, FatError, Result};
use crate::fat::FatDiskView;

impl<B: AsRef<[u8]>> FatDiskView<B> {
    /// Get the data for a file
    ///
    /// The clusters of the entry's chain are joined in chain order and
    /// truncated to the size stored in the entry.
    pub fn get_file_contents(&self, file: EntryRef) -> Result<Vec<u8>> {
        let entry = self.entry(file);
        let size = entry.size() as usize;
        let clusters = self.cluster_chain(entry.start_cluster())?;

        let mut data = Vec::with_capacity(clusters.len() * self.geometry().cluster_size);
        for cluster in clusters {
            if data.len() >= size {
                break;
            }
            data.extend_from_slice(self.cluster_data(cluster));
        }
        data.truncate(size);

        Ok(data)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatDiskView<B> {
    /// Replace the contents of a file
    ///
    /// The existing chain is reused from the front, extended with newly
    /// allocated clusters or cut short as needed, and the size in the entry
    /// is updated.  If the disk runs out of clusters, every cluster
    /// allocated by this call is freed again and the error is returned with
    /// the FAT, the entry and the file data exactly as they were.
    ///
    /// Writing no data frees the whole chain and sets the start cluster to
    /// zero.
    pub fn set_file_contents(&mut self, file: EntryRef, contents: &[u8]) -> Result<()> {
        let entry = self.entry(file);
        if entry.is_directory() {
            return Err(FatError::TypeMismatch {
                name: entry.name(),
                expected: EntryKind::File,
            });
        }

        let cluster_size = self.geometry().cluster_size;
        let required = contents.len().div_ceil(cluster_size);
        let size = u32::try_from(contents.len()).map_err(|_| FatError::DiskFull {
            required,
            available: self.free_clusters(),
        })?;

        let current = self.cluster_chain(entry.start_cluster())?;
        let keep = current.len().min(required);
        let mut clusters = current[..keep].to_vec();
        let dropped = &current[keep..];

        let mut allocated = Vec::new();
        while clusters.len() < required {
            match self.allocate_cluster() {
                Ok(cluster) => {
                    allocated.push(cluster);
                    clusters.push(cluster);
                }
                Err(_) => {
                    error!(
                        "Disk full after allocating {} of {} clusters, rolling back",
                        allocated.len(),
                        required - keep
                    );
                    for &cluster in &allocated {
                        self.deallocate_cluster(cluster);
                    }
                    return Err(FatError::DiskFull {
                        required: required - keep,
                        available: allocated.len(),
                    });
                }
            }
        }

        let terminator = self.fat_type().terminator();
        for (i, &cluster) in clusters.iter().enumerate() {
            let start = i * cluster_size;
            let chunk = &contents[start..contents.len().min(start + cluster_size)];

            let data = self.cluster_data_mut(cluster);
            data[..chunk.len()].copy_from_slice(chunk);
            data[chunk.len()..].fill(0);

            let next = clusters.get(i + 1).copied().unwrap_or(terminator);
            self.set_cluster(cluster, next);
        }

        let mut entry = self.entry_mut(file);
        entry.set_size(size);
        entry.set_start_cluster(clusters.first().copied().unwrap_or(0));

        for &cluster in dropped {
            self.deallocate_cluster(cluster);
        }

        debug!(
            "wrote {} bytes in {} clusters, freed {}",
            size,
            clusters.len(),
            dropped.len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::{EntryKind, FatError};
    use crate::fat::{FatDiskOptions, FatDiskView};
    use crate::sanity_check::SanityCheck;
    use crate::testing::{blank_image, BlankImage};

    fn small_disk() -> Vec<u8> {
        blank_image(&BlankImage {
            tracks: 10,
            sectors_per_track: 10,
            ..BlankImage::default()
        })
    }

    /// Test that writing and reading back a file smaller than a cluster works
    #[test]
    fn small_file_round_trip_works() {
        let mut image = small_disk();
        let mut disk = FatDiskView::open(&mut image[..], &FatDiskOptions::default())
            .expect("Image should open");
        let file = disk.create_file("TEST.DAT", None).expect("Should create");

        disk.set_file_contents(file, b"Hello World!")
            .expect("Should write");

        assert_eq!(disk.entry(file).size(), 12);
        assert_eq!(
            disk.get_file_contents(file).expect("Should read"),
            b"Hello World!".to_vec()
        );
        drop(disk);

        assert_eq!(&image[0x203..0x205], &[0xFF, 0x0F]);
    }

    #[test]
    fn growing_and_shrinking_relinks_the_chain() {
        let mut image = small_disk();
        let mut disk = FatDiskView::open(&mut image[..], &FatDiskOptions::default())
            .expect("Image should open");
        let file = disk.create_file("TEST.DAT", None).expect("Should create");

        disk.set_file_contents(file, &[127; 5000])
            .expect("Should write");
        assert_eq!(disk.entry(file).size(), 5000);
        assert_eq!(
            &disk.as_bytes()[0x203..0x20B],
            &[0x03, 0x40, 0x00, 0x05, 0x60, 0x00, 0xFF, 0x0F]
        );

        disk.set_file_contents(file, &[255; 1500])
            .expect("Should write");
        assert_eq!(disk.entry(file).size(), 1500);
        assert_eq!(
            &disk.as_bytes()[0x203..0x20B],
            &[0x03, 0xF0, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            disk.get_file_contents(file).expect("Should read"),
            vec![255; 1500]
        );
        assert!(disk.check());
    }

    #[test]
    fn disk_full_leaves_everything_untouched() {
        let mut image = small_disk();
        let mut disk = FatDiskView::open(&mut image[..], &FatDiskOptions::default())
            .expect("Image should open");
        let file = disk.create_file("TEST.DAT", None).expect("Should create");
        disk.set_file_contents(file, &[255; 1500])
            .expect("Should write");
        let before = disk.as_bytes().to_vec();

        let result = disk.set_file_contents(file, &[1; 100000]);

        // 98 clusters needed, 2 in use, 89 free
        assert_eq!(
            result,
            Err(FatError::DiskFull {
                required: 96,
                available: 89
            })
        );
        assert!(disk.as_bytes() == &before[..]);
        assert_eq!(disk.entry(file).size(), 1500);
    }

    #[test]
    fn exact_cluster_multiples_work() {
        let mut image = small_disk();
        let mut disk = FatDiskView::open(&mut image[..], &FatDiskOptions::default())
            .expect("Image should open");
        let file = disk.create_file("EXACT", None).expect("Should create");

        let mut data = vec![0_u8; 3072];
        data[0] = 1;
        data[1023] = 2;
        data[1024] = 3;
        data[3071] = 4;
        disk.set_file_contents(file, &data).expect("Should write");

        let chain = disk
            .cluster_chain(disk.entry(file).start_cluster())
            .expect("Chain should be valid");
        assert_eq!(chain, vec![2, 3, 4]);
        assert_eq!(disk.get_file_contents(file).expect("Should read"), data);
    }

    #[test]
    fn empty_contents_free_the_chain() {
        let mut image = small_disk();
        let mut disk = FatDiskView::open(&mut image[..], &FatDiskOptions::default())
            .expect("Image should open");
        let file = disk.create_file("EMPTY", None).expect("Should create");
        disk.set_file_contents(file, &[9; 2000]).expect("Should write");

        disk.set_file_contents(file, &[]).expect("Should write");

        assert_eq!(disk.entry(file).start_cluster(), 0);
        assert_eq!(disk.entry(file).size(), 0);
        assert_eq!(disk.get_free(), disk.get_size());
        assert_eq!(disk.get_file_contents(file), Ok(vec![]));

        disk.set_file_contents(file, b"again").expect("Should write");
        assert_eq!(disk.entry(file).start_cluster(), 2);
        assert_eq!(disk.get_file_contents(file), Ok(b"again".to_vec()));
    }

    #[test]
    fn interleaved_files_keep_their_data() {
        let mut image = small_disk();
        let mut disk = FatDiskView::open(&mut image[..], &FatDiskOptions::default())
            .expect("Image should open");
        let first = disk.create_file("FIRST", None).expect("Should create");
        let second = disk.create_file("SECOND", None).expect("Should create");

        disk.set_file_contents(first, &[1; 2500]).expect("Should write");
        disk.set_file_contents(second, &[2; 2500]).expect("Should write");
        disk.set_file_contents(first, &[3; 4000]).expect("Should write");

        assert_eq!(disk.get_file_contents(first), Ok(vec![3; 4000]));
        assert_eq!(disk.get_file_contents(second), Ok(vec![2; 2500]));
        assert!(disk.check());
    }

    #[test]
    fn writing_to_a_directory_fails() {
        let mut image = small_disk();
        let mut disk = FatDiskView::open(&mut image[..], &FatDiskOptions::default())
            .expect("Image should open");
        let dir = disk.create_directory("DIR", None).expect("Should create");

        assert_eq!(
            disk.set_file_contents(dir, b"nope"),
            Err(FatError::TypeMismatch {
                name: String::from("DIR"),
                expected: EntryKind::File
            })
        );
    }
}
