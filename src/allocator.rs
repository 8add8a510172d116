//! Cluster allocation across all mirrored FAT copies
use log::{debug, error};

use crate::cluster::{FatTable, CLUSTER_EMPTY, CLUSTER_RESERVED, FIRST_DATA_CLUSTER};
use crate::error::{FatError, Result};
use crate::fat::FatDiskView;

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatDiskView<B> {
    /// Find the lowest free cluster and reserve it
    ///
    /// The first FAT copy decides which clusters are free.  The cluster is
    /// marked reserved in every copy, so it won't be returned again until it
    /// is deallocated.  Callers must link or terminate it.
    pub fn allocate_cluster(&mut self) -> Result<u16> {
        let fat = self.primary_fat();
        let free = (FIRST_DATA_CLUSTER..=self.last_cluster())
            .find(|&cluster| fat.get_cluster(cluster) == CLUSTER_EMPTY);

        match free {
            Some(cluster) => {
                self.set_cluster(cluster, CLUSTER_RESERVED);
                debug!("allocated cluster {}", cluster);
                Ok(cluster)
            }
            None => {
                error!("Disk full");
                Err(FatError::DiskFull {
                    required: 1,
                    available: 0,
                })
            }
        }
    }

    /// Mark `cluster` free in every FAT copy
    /// The cluster isn't checked, freeing a cluster still in a chain corrupts it
    pub fn deallocate_cluster(&mut self, cluster: u16) {
        self.set_cluster(cluster, CLUSTER_EMPTY);
        debug!("deallocated cluster {}", cluster);
    }
}
