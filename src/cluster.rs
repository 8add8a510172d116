use log::trace;

use std::fmt::{Display, Formatter, Result as FmtResult, UpperHex};

use crate::error::{FatError, FormatError, Result};

/// The first cluster number that refers to the data region
/// Entries zero and one hold the media descriptor and a reserved value
pub const FIRST_DATA_CLUSTER: u16 = 2;

/// FAT entry value of a free cluster
pub const CLUSTER_EMPTY: u16 = 0x000;

/// FAT entry value of a cluster that is being allocated
/// Only ever present between allocating a cluster and linking it into a chain
pub const CLUSTER_RESERVED: u16 = 0x001;

/// Volumes with fewer data clusters than this are FAT12
const FAT12_MAX_CLUSTERS: usize = 4085;

/// Volumes with this many data clusters or more need FAT32
const FAT16_MAX_CLUSTERS: usize = 65525;

/// FATType defines the different FAT types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatType {
    /// FAT12, 12-bit FAT entries packed into 1.5 bytes
    Fat12,
    /// FAT16, 16-bit little-endian FAT entries
    Fat16,
}

impl FatType {
    /// Pick the FAT type from the number of data clusters on the volume
    pub fn detect(max_clusters: usize) -> std::result::Result<FatType, FormatError> {
        if max_clusters < FAT12_MAX_CLUSTERS {
            Ok(FatType::Fat12)
        } else if max_clusters < FAT16_MAX_CLUSTERS {
            Ok(FatType::Fat16)
        } else {
            Err(FormatError::InvalidField {
                field: "cluster_count",
                value: max_clusters as u32,
            })
        }
    }

    /// Entry values greater than or equal to this end a chain
    pub fn end_of_chain(self) -> u16 {
        match self {
            FatType::Fat12 => 0xFF8,
            FatType::Fat16 => 0xFFF8,
        }
    }

    /// The end of chain marker written by this crate
    pub fn terminator(self) -> u16 {
        match self {
            FatType::Fat12 => 0xFFF,
            FatType::Fat16 => 0xFFFF,
        }
    }

    /// Bad sector in cluster marker
    pub fn bad_cluster(self) -> u16 {
        match self {
            FatType::Fat12 => 0xFF7,
            FatType::Fat16 => 0xFFF7,
        }
    }

    /// Classify a raw FAT entry value
    pub fn parse_value(self, value: u16) -> ClusterEntry {
        match value {
            CLUSTER_EMPTY => ClusterEntry::FreeCluster,
            CLUSTER_RESERVED => ClusterEntry::Reserved,
            v if v >= self.end_of_chain() => ClusterEntry::EndOfChainMarker(v),
            v if v == self.bad_cluster() => ClusterEntry::BadCluster,
            // 0xFF0 - 0xFF6 on FAT12, 0xFFF0 - 0xFFF6 on FAT16
            v if v >= self.bad_cluster() - 7 => ClusterEntry::ReservedValue(v),
            v => ClusterEntry::DataCluster(v),
        }
    }
}

impl Display for FatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FatType::Fat12 => write!(f, "FAT12"),
            FatType::Fat16 => write!(f, "FAT16"),
        }
    }
}

/// The meaning of entries in the FAT cluster map
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterEntry {
    /// A free cluster
    /// Valid values: 0x000
    FreeCluster,

    /// Reserved cluster
    /// Used temporarily during file allocation
    /// Valid values: 0x001
    Reserved,

    /// The next cluster in the chain
    /// Valid values: 0x002 - 0xFEF (FAT12), 0x0002 - 0xFFEF (FAT16)
    DataCluster(u16),

    /// Reserved values that never appear in a valid chain
    /// Valid values: 0xFF0 - 0xFF6 (FAT12), 0xFFF0 - 0xFFF6 (FAT16)
    ReservedValue(u16),

    /// Bad Sector in Cluster Marker
    /// Valid values: 0xFF7 (FAT12), 0xFFF7 (FAT16)
    BadCluster,

    /// End of Chain Marker
    /// Valid values: 0xFF8 - 0xFFF (FAT12), 0xFFF8 - 0xFFFF (FAT16)
    EndOfChainMarker(u16),
}

/// Print cluster entries as raw hex values
impl UpperHex for ClusterEntry {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            ClusterEntry::FreeCluster => write!(f, "000"),
            ClusterEntry::Reserved => write!(f, "001"),
            ClusterEntry::DataCluster(value) => write!(f, "{:03X}", value),
            ClusterEntry::ReservedValue(value) => write!(f, "{:03X}", value),
            ClusterEntry::BadCluster => write!(f, "BAD"),
            ClusterEntry::EndOfChainMarker(value) => write!(f, "{:03X}", value),
        }
    }
}

/// Read access to one copy of a File Allocation Table
pub trait FatTable {
    /// The encoding of this table
    fn fat_type(&self) -> FatType;

    /// Number of entries the table has room for
    fn entry_count(&self) -> usize;

    /// Read the entry for `cluster`
    /// `cluster` must be less than `entry_count()`
    fn get_cluster(&self, cluster: u16) -> u16;

    /// The highest cluster number a chain may refer to on a volume with
    /// `max_clusters` data clusters
    fn last_cluster(&self, max_clusters: usize) -> u16 {
        let last = (max_clusters + 1)
            .min(self.entry_count().saturating_sub(1))
            .min(self.fat_type().bad_cluster() as usize - 8);
        last as u16
    }

    /// Follow the chain that starts at `start`, returning every cluster in
    /// link order
    ///
    /// A start cluster below two is an empty chain.  Fails with
    /// CorruptChain if a link points outside the volume, at a cluster that
    /// isn't part of a chain, or if the chain is longer than the volume has
    /// clusters (a loop).
    fn get_cluster_chain(&self, start: u16, max_clusters: usize) -> Result<Vec<u16>> {
        let mut chain = Vec::new();
        if start < FIRST_DATA_CLUSTER {
            return Ok(chain);
        }

        let last = self.last_cluster(max_clusters);
        if start > last {
            return Err(FatError::CorruptChain {
                start,
                cluster: start,
            });
        }

        let mut cluster = start;
        loop {
            if chain.len() >= max_clusters {
                return Err(FatError::CorruptChain { start, cluster });
            }
            chain.push(cluster);

            match self.fat_type().parse_value(self.get_cluster(cluster)) {
                ClusterEntry::EndOfChainMarker(_) => break,
                ClusterEntry::DataCluster(next) if next <= last => cluster = next,
                _ => return Err(FatError::CorruptChain { start, cluster }),
            }
        }

        trace!("chain from {}: {:?}", start, chain);

        Ok(chain)
    }
}

/// Write access to one copy of a File Allocation Table
pub trait FatTableMut: FatTable {
    /// Write the entry for `cluster`
    /// `cluster` must be less than `entry_count()`
    fn set_cluster(&mut self, cluster: u16, value: u16);
}

/// A 12-bit File Allocation Table over borrowed or owned bytes
///
/// Each pair of entries shares three bytes, so 0x12 0x34 0x56 holds 0x412
/// and 0x563.
#[derive(Debug)]
pub struct Fat12Table<B> {
    data: B,
}

impl<B> Fat12Table<B> {
    /// View `data` as a 12-bit table
    pub fn new(data: B) -> Self {
        Fat12Table { data }
    }
}

impl<B: AsRef<[u8]>> FatTable for Fat12Table<B> {
    fn fat_type(&self) -> FatType {
        FatType::Fat12
    }

    fn entry_count(&self) -> usize {
        self.data.as_ref().len() * 2 / 3
    }

    fn get_cluster(&self, cluster: u16) -> u16 {
        let data = self.data.as_ref();
        let offset = cluster as usize + (cluster as usize / 2);
        let low = data[offset] as u16;
        let high = data[offset + 1] as u16;

        if cluster & 1 == 1 {
            (high << 4) | (low >> 4)
        } else {
            ((high & 0x0F) << 8) | low
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatTableMut for Fat12Table<B> {
    fn set_cluster(&mut self, cluster: u16, value: u16) {
        let data = self.data.as_mut();
        let offset = cluster as usize + (cluster as usize / 2);
        let value = value & 0x0FFF;

        // The other half of the shared byte belongs to the neighbouring entry
        if cluster & 1 == 1 {
            data[offset] = (data[offset] & 0x0F) | (((value & 0x0F) as u8) << 4);
            data[offset + 1] = (value >> 4) as u8;
        } else {
            data[offset] = (value & 0xFF) as u8;
            data[offset + 1] = (data[offset + 1] & 0xF0) | ((value >> 8) as u8 & 0x0F);
        }
    }
}

/// A 16-bit File Allocation Table over borrowed or owned bytes
/// Each two-byte entry in FAT16 is little-endian
#[derive(Debug)]
pub struct Fat16Table<B> {
    data: B,
}

impl<B> Fat16Table<B> {
    /// View `data` as a 16-bit table
    pub fn new(data: B) -> Self {
        Fat16Table { data }
    }
}

impl<B: AsRef<[u8]>> FatTable for Fat16Table<B> {
    fn fat_type(&self) -> FatType {
        FatType::Fat16
    }

    fn entry_count(&self) -> usize {
        self.data.as_ref().len() / 2
    }

    fn get_cluster(&self, cluster: u16) -> u16 {
        let offset = cluster as usize * 2;
        let data = self.data.as_ref();
        u16::from_le_bytes([data[offset], data[offset + 1]])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatTableMut for Fat16Table<B> {
    fn set_cluster(&mut self, cluster: u16, value: u16) {
        let offset = cluster as usize * 2;
        self.data.as_mut()[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
}

/// The actual File Allocation Table in the FAT filesystem
/// This project only supports older filesystems
#[derive(Debug)]
pub enum FAT<B> {
    /// FAT12 File Allocation Table
    FAT12(Fat12Table<B>),
    /// FAT16 File Allocation Table
    FAT16(Fat16Table<B>),
}

impl<B> FAT<B> {
    /// View `data` as a table of the given type
    pub fn new(fat_type: FatType, data: B) -> Self {
        match fat_type {
            FatType::Fat12 => FAT::FAT12(Fat12Table::new(data)),
            FatType::Fat16 => FAT::FAT16(Fat16Table::new(data)),
        }
    }
}

impl<B: AsRef<[u8]>> FatTable for FAT<B> {
    fn fat_type(&self) -> FatType {
        match self {
            FAT::FAT12(_) => FatType::Fat12,
            FAT::FAT16(_) => FatType::Fat16,
        }
    }

    fn entry_count(&self) -> usize {
        match self {
            FAT::FAT12(fat) => fat.entry_count(),
            FAT::FAT16(fat) => fat.entry_count(),
        }
    }

    fn get_cluster(&self, cluster: u16) -> u16 {
        match self {
            FAT::FAT12(fat) => fat.get_cluster(cluster),
            FAT::FAT16(fat) => fat.get_cluster(cluster),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FatTableMut for FAT<B> {
    fn set_cluster(&mut self, cluster: u16, value: u16) {
        match self {
            FAT::FAT12(fat) => fat.set_cluster(cluster, value),
            FAT::FAT16(fat) => fat.set_cluster(cluster, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        ClusterEntry, Fat12Table, Fat16Table, FatTable, FatTableMut, FatType, CLUSTER_EMPTY, FAT,
    };
    use crate::error::FatError;

    /// Test reading packed 12-bit values
    #[test]
    fn fat12_get_cluster_works() {
        // [0x12, 0x34, 0x56] should parse as [0x0412, 0x0563]
        let data: [u8; 3] = [0x12, 0x34, 0x56];
        let table = Fat12Table::new(&data[..]);

        assert_eq!(table.get_cluster(0), 0x0412);
        assert_eq!(table.get_cluster(1), 0x0563);
    }

    #[test]
    fn fat12_set_cluster_keeps_neighbours() {
        let mut data = [0xA5_u8; 64];

        for cluster in [2_u16, 3, 10, 11] {
            let mut table = Fat12Table::new(&mut data[..]);
            let before = table.get_cluster(cluster - 1);
            let after = table.get_cluster(cluster + 1);

            for value in 0..=0xFFF_u16 {
                table.set_cluster(cluster, value);
                assert_eq!(table.get_cluster(cluster), value);
                assert_eq!(table.get_cluster(cluster - 1), before);
                assert_eq!(table.get_cluster(cluster + 1), after);
            }
        }
    }

    #[test]
    fn fat12_set_cluster_masks_to_twelve_bits() {
        let mut data = [0_u8; 6];
        let mut table = Fat12Table::new(&mut data[..]);

        table.set_cluster(2, 0xFFFF);
        table.set_cluster(3, 0x1234);

        assert_eq!(table.get_cluster(2), 0xFFF);
        assert_eq!(table.get_cluster(3), 0x234);
        assert_eq!(data, [0, 0, 0, 0xFF, 0x4F, 0x23]);
    }

    #[test]
    fn fat16_set_cluster_is_little_endian() {
        let mut data = [0_u8; 8];
        let mut table = Fat16Table::new(&mut data[..]);

        table.set_cluster(2, 0xFFF8);
        table.set_cluster(3, 0x0102);

        assert_eq!(table.get_cluster(2), 0xFFF8);
        assert_eq!(data, [0, 0, 0, 0, 0xF8, 0xFF, 0x02, 0x01]);
    }

    fn linked(fat_type: FatType, links: &[(u16, u16)]) -> Vec<u8> {
        let mut data = vec![0_u8; 64];
        let mut table = FAT::new(fat_type, &mut data[..]);
        for &(cluster, value) in links {
            table.set_cluster(cluster, value);
        }
        data
    }

    #[test]
    fn cluster_chain_follows_links() {
        for fat_type in [FatType::Fat12, FatType::Fat16] {
            let data = linked(
                fat_type,
                &[(2, 5), (5, 3), (3, 7), (7, fat_type.terminator())],
            );
            let table = FAT::new(fat_type, &data[..]);

            assert_eq!(table.get_cluster_chain(2, 20), Ok(vec![2, 5, 3, 7]));
            assert_eq!(table.get_cluster_chain(7, 20), Ok(vec![7]));
        }
    }

    #[test]
    fn empty_start_cluster_is_empty_chain() {
        let data = [0_u8; 12];
        let table = Fat12Table::new(&data[..]);

        assert_eq!(table.get_cluster_chain(0, 4), Ok(vec![]));
    }

    #[test]
    fn looping_chain_fails() {
        let data = linked(FatType::Fat12, &[(2, 3), (3, 4), (4, 2)]);
        let table = Fat12Table::new(&data[..]);

        assert!(matches!(
            table.get_cluster_chain(2, 20),
            Err(FatError::CorruptChain { start: 2, .. })
        ));
    }

    #[test]
    fn chain_into_free_cluster_fails() {
        let data = linked(FatType::Fat16, &[(2, 3), (3, CLUSTER_EMPTY)]);
        let table = Fat16Table::new(&data[..]);

        assert_eq!(
            table.get_cluster_chain(2, 20),
            Err(FatError::CorruptChain {
                start: 2,
                cluster: 3
            })
        );
    }

    #[test]
    fn chain_past_last_cluster_fails() {
        let data = linked(FatType::Fat12, &[(2, 9), (9, 0xFFF)]);
        let table = Fat12Table::new(&data[..]);

        // Five data clusters: 2 - 6
        assert_eq!(
            table.get_cluster_chain(2, 5),
            Err(FatError::CorruptChain {
                start: 2,
                cluster: 2
            })
        );
    }

    /// 0xFF8 ends a FAT12 chain but is an ordinary link in FAT16
    #[test]
    fn end_of_chain_threshold_is_per_type() {
        assert_eq!(
            FatType::Fat12.parse_value(0xFF8),
            ClusterEntry::EndOfChainMarker(0xFF8)
        );
        assert_eq!(
            FatType::Fat16.parse_value(0xFF8),
            ClusterEntry::DataCluster(0xFF8)
        );
        assert_eq!(
            FatType::Fat16.parse_value(0xFFF8),
            ClusterEntry::EndOfChainMarker(0xFFF8)
        );
        assert_eq!(FatType::Fat16.parse_value(0xFFF7), ClusterEntry::BadCluster);
        assert_eq!(
            FatType::Fat12.parse_value(0xFF0),
            ClusterEntry::ReservedValue(0xFF0)
        );
    }

    #[test]
    fn detect_fat_type_works() {
        assert_eq!(FatType::detect(711), Ok(FatType::Fat12));
        assert_eq!(FatType::detect(4084), Ok(FatType::Fat12));
        assert_eq!(FatType::detect(4085), Ok(FatType::Fat16));
        assert!(FatType::detect(70000).is_err());
    }
}
