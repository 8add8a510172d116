/// Parse the boot sector of a FAT12 or FAT16 volume
///
/// FAT uses little-endian for all entries in the BIOS Parameter Block.
/// The first eleven bytes are a jump instruction and OEM name, which
/// aren't needed to locate anything on the volume, so they are skipped.
/// Every byte offset used by the rest of the crate is derived here, once.
use log::debug;
use nom::bytes::complete::take;
use nom::combinator::verify;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::IResult;

use std::fmt::{Display, Formatter, Result};

use crate::directory_entry::DIRECTORY_ENTRY_SIZE;
use crate::error::FormatError;

/// Smallest sector size FAT allows
const MIN_BYTES_PER_SECTOR: usize = 128;

/// The BIOS Parameter Block fields this crate consumes
/// Starts at offset 0x0B of the boot sector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BIOSParameterBlock {
    /// Number of bytes per logical sector, usually 512
    pub bytes_per_logical_sector: u16,
    /// Logical sectors per cluster, valid values are one and powers of two up to and
    /// including 128
    pub logical_sectors_per_cluster: u8,
    /// Count of reserved logical sectors, the number of logical sectors before the first
    /// FAT in the filesystem
    pub count_of_reserved_logical_sectors: u16,
    /// Number of File Allocation Tables, usually two
    pub number_of_fats: u8,
    /// Maximum number of FAT12 or FAT16 root directory entries
    pub maximum_number_of_root_directory_entries: u16,
    /// Total logical sectors, zero if the count needs more than 16 bits
    pub total_logical_sectors: u16,
    /// Media Descriptor
    pub media_descriptor: u8,
    /// Logical sectors per File Allocation Table
    pub logical_sectors_per_fat: u16,
    /// Physical sectors per track
    pub sectors_per_track: u16,
    /// Number of heads (sides)
    pub number_of_heads: u16,
    /// Total logical sectors when `total_logical_sectors` is zero
    pub large_total_logical_sectors: u32,
}

impl Display for BIOSParameterBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "bytes_per_logical_sector: {}, ",
            self.bytes_per_logical_sector
        )?;
        write!(
            f,
            "logical_sectors_per_cluster: {}, ",
            self.logical_sectors_per_cluster
        )?;
        write!(
            f,
            "count_of_reserved_logical_sectors: {}, ",
            self.count_of_reserved_logical_sectors
        )?;
        write!(f, "number_of_fats: {}, ", self.number_of_fats)?;
        write!(
            f,
            "maximum_number_of_root_directory_entries: {}, ",
            self.maximum_number_of_root_directory_entries
        )?;
        write!(f, "total_logical_sectors: {}, ", self.total_logical_sectors)?;
        write!(f, "media_descriptor: 0x{:X}, ", self.media_descriptor)?;
        write!(
            f,
            "logical_sectors_per_fat: {}, ",
            self.logical_sectors_per_fat
        )?;
        write!(f, "sectors_per_track: {}, ", self.sectors_per_track)?;
        write!(f, "number_of_heads: {}", self.number_of_heads)
    }
}

/// Return true if the value is a valid media descriptor
pub fn verify_media_descriptor(value: &u8) -> bool {
    matches!(
        value,
        0x00 |                  // Seen in some bootable Atari ST images
        0xE5 | 0xED
            | 0xEE
            | 0xEF
            | 0xF0
            | 0xF4
            | 0xF5
            | 0xF8
            | 0xF9
            | 0xFA
            | 0xFB
            | 0xFC
            | 0xFD
            | 0xFE
            | 0xFF
    )
}

/// Parse the BIOS Parameter Block out of a boot sector
/// The input must start at the first byte of the boot sector
pub fn bios_parameter_block_parser(i: &[u8]) -> IResult<&[u8], BIOSParameterBlock> {
    // jump instruction and OEM name
    let (i, _) = take(11_usize)(i)?;
    let (i, bytes_per_logical_sector) = le_u16(i)?;
    let (i, logical_sectors_per_cluster) = le_u8(i)?;
    let (i, count_of_reserved_logical_sectors) = le_u16(i)?;
    let (i, number_of_fats) = le_u8(i)?;
    let (i, maximum_number_of_root_directory_entries) = le_u16(i)?;
    let (i, total_logical_sectors) = le_u16(i)?;
    let (i, media_descriptor) = verify(le_u8, verify_media_descriptor)(i)?;
    let (i, logical_sectors_per_fat) = le_u16(i)?;
    let (i, sectors_per_track) = le_u16(i)?;
    let (i, number_of_heads) = le_u16(i)?;
    // hidden sectors
    let (i, _) = le_u32(i)?;
    let (i, large_total_logical_sectors) = le_u32(i)?;

    Ok((
        i,
        BIOSParameterBlock {
            bytes_per_logical_sector,
            logical_sectors_per_cluster,
            count_of_reserved_logical_sectors,
            number_of_fats,
            maximum_number_of_root_directory_entries,
            total_logical_sectors,
            media_descriptor,
            logical_sectors_per_fat,
            sectors_per_track,
            number_of_heads,
            large_total_logical_sectors,
        },
    ))
}

/// Volume layout derived from the BIOS Parameter Block
///
/// All offsets are absolute byte offsets into the backing buffer, so they
/// already include the base offset the boot sector was found at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// The parsed BIOS Parameter Block
    pub bios_parameter_block: BIOSParameterBlock,
    /// Offset of the boot sector in the buffer
    pub base_offset: usize,
    /// Bytes per logical sector
    pub bytes_per_sector: usize,
    /// Logical sectors per cluster
    pub sectors_per_cluster: usize,
    /// Reserved sectors, never zero
    pub reserved_sectors: usize,
    /// Number of mirrored FAT copies
    pub fat_count: usize,
    /// Size of one FAT copy in bytes
    pub fat_size: usize,
    /// Total logical sectors on the volume
    pub total_sectors: usize,
    /// Tracks per side
    pub tracks: usize,
    /// Offset of the first FAT copy
    pub fat_start: usize,
    /// Offset of the root directory region
    pub root_dir_start: usize,
    /// Size of the root directory region in bytes
    pub root_dir_size: usize,
    /// Offset of cluster 2
    pub data_start: usize,
    /// Cluster size in bytes
    pub cluster_size: usize,
    /// Number of data clusters on the volume
    pub max_clusters: usize,
}

impl Geometry {
    /// Parse the boot sector at `base_offset` and derive the volume layout
    ///
    /// Fails with a FormatError if a field would make the layout
    /// meaningless, or if `data` is too short to hold the volume.
    pub fn parse(data: &[u8], base_offset: usize) -> std::result::Result<Geometry, FormatError> {
        let boot_sector = data.get(base_offset..).ok_or(FormatError::Truncated {
            required: base_offset,
            available: data.len(),
        })?;

        let (_, bpb) = bios_parameter_block_parser(boot_sector)
            .map_err(|e| FormatError::Unparseable(e.to_string()))?;

        debug!("bios_parameter_block: {}", bpb);

        let geometry = Geometry::from_bios_parameter_block(bpb, base_offset)?;

        let required = geometry.volume_size();
        if boot_sector.len() < required {
            return Err(FormatError::Truncated {
                required,
                available: boot_sector.len(),
            });
        }

        debug!("geometry: {}", geometry);

        Ok(geometry)
    }

    /// Derive the volume layout from an already parsed BIOS Parameter Block
    pub fn from_bios_parameter_block(
        bpb: BIOSParameterBlock,
        base_offset: usize,
    ) -> std::result::Result<Geometry, FormatError> {
        let bytes_per_sector = bpb.bytes_per_logical_sector as usize;
        if bytes_per_sector < MIN_BYTES_PER_SECTOR || !bytes_per_sector.is_power_of_two() {
            return Err(FormatError::InvalidField {
                field: "bytes_per_sector",
                value: bytes_per_sector as u32,
            });
        }
        let sectors_per_cluster = nonzero(
            "sectors_per_cluster",
            bpb.logical_sectors_per_cluster.into(),
        )?;
        let fat_count = nonzero("fat_count", bpb.number_of_fats.into())?;
        let fat_sectors = nonzero("fat_size", bpb.logical_sectors_per_fat.into())?;
        let sectors_per_track = nonzero("sectors_per_track", bpb.sectors_per_track.into())?;
        let heads = nonzero("heads", bpb.number_of_heads.into())?;

        // Some formatters leave this at zero
        let reserved_sectors = match bpb.count_of_reserved_logical_sectors {
            0 => 1,
            n => n as usize,
        };

        let total_sectors = match bpb.total_logical_sectors {
            0 => bpb.large_total_logical_sectors as usize,
            n => n as usize,
        };
        let total_sectors = nonzero("total_sectors", total_sectors)?;

        let fat_size = fat_sectors * bytes_per_sector;
        let root_dir_size =
            bpb.maximum_number_of_root_directory_entries as usize * DIRECTORY_ENTRY_SIZE;
        let root_dir_sectors = root_dir_size.div_ceil(bytes_per_sector);

        let data_sectors = total_sectors
            .checked_sub(reserved_sectors + fat_count * fat_sectors + root_dir_sectors)
            .ok_or(FormatError::InvalidField {
                field: "total_sectors",
                value: total_sectors as u32,
            })?;

        let fat_start = base_offset + reserved_sectors * bytes_per_sector;
        let root_dir_start = fat_start + fat_count * fat_size;

        Ok(Geometry {
            bios_parameter_block: bpb,
            base_offset,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            fat_size,
            total_sectors,
            tracks: total_sectors / (sectors_per_track * heads),
            fat_start,
            root_dir_start,
            root_dir_size,
            data_start: root_dir_start + root_dir_size,
            cluster_size: sectors_per_cluster * bytes_per_sector,
            max_clusters: data_sectors / sectors_per_cluster,
        })
    }

    /// Bytes from the boot sector to the end of the last data cluster
    pub fn volume_size(&self) -> usize {
        self.data_start - self.base_offset + self.max_clusters * self.cluster_size
    }

    /// Absolute offset of FAT copy `copy`
    pub fn fat_offset(&self, copy: usize) -> usize {
        self.fat_start + copy * self.fat_size
    }

    /// Absolute offset of the first byte of a data cluster
    /// Data clusters are numbered from two
    pub fn cluster_offset(&self, cluster: u16) -> usize {
        self.data_start + (cluster as usize - 2) * self.cluster_size
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "fat_start: 0x{:X}, ", self.fat_start)?;
        write!(f, "fat_count: {}, ", self.fat_count)?;
        write!(f, "fat_size: {}, ", self.fat_size)?;
        write!(f, "root_dir_start: 0x{:X}, ", self.root_dir_start)?;
        write!(f, "root_dir_size: {}, ", self.root_dir_size)?;
        write!(f, "data_start: 0x{:X}, ", self.data_start)?;
        write!(f, "cluster_size: {}, ", self.cluster_size)?;
        write!(f, "max_clusters: {}, ", self.max_clusters)?;
        write!(f, "tracks: {}", self.tracks)
    }
}

fn nonzero(field: &'static str, value: usize) -> std::result::Result<usize, FormatError> {
    if value == 0 {
        Err(FormatError::InvalidField { field, value: 0 })
    } else {
        Ok(value)
    }
}
