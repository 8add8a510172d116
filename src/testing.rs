//! Blank disk images for unit tests

/// Layout of a freshly formatted test image
#[derive(Clone, Debug)]
pub struct BlankImage {
    pub sides: u16,
    pub tracks: u16,
    pub sectors_per_track: u16,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved: u16,
    pub fat_size: u16,
    pub fat_count: u8,
    pub root_entries: u16,
    /// Write 16-bit reserved FAT entries instead of 12-bit ones
    pub fat16: bool,
}

impl Default for BlankImage {
    /// A 720K double-sided floppy with 1K clusters
    fn default() -> Self {
        BlankImage {
            sides: 2,
            tracks: 80,
            sectors_per_track: 9,
            bytes_per_sector: 512,
            sectors_per_cluster: 2,
            reserved: 1,
            fat_size: 5,
            fat_count: 2,
            root_entries: 112,
            fat16: false,
        }
    }
}

impl BlankImage {
    /// A 4M hard disk with 512 byte clusters, enough clusters for FAT16
    pub fn fat16() -> Self {
        BlankImage {
            sides: 4,
            tracks: 64,
            sectors_per_track: 32,
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved: 1,
            fat_size: 32,
            fat_count: 2,
            root_entries: 512,
            fat16: true,
        }
    }
}

/// Build an empty volume with a volume label as the first root entry
pub fn blank_image(layout: &BlankImage) -> Vec<u8> {
    let total_sectors = layout.tracks as usize * layout.sides as usize * layout.sectors_per_track as usize;
    let bytes_per_sector = layout.bytes_per_sector as usize;
    let mut image = vec![0_u8; total_sectors * bytes_per_sector];

    image[0..11].copy_from_slice(&[
        0xE9, 0x00, 0x4E, 0x4E, 0x4E, 0x4E, 0x4E, 0x4E, 0x58, 0x74, 0x40,
    ]);
    image[0x0B..0x0D].copy_from_slice(&layout.bytes_per_sector.to_le_bytes());
    image[0x0D] = layout.sectors_per_cluster;
    image[0x0E..0x10].copy_from_slice(&layout.reserved.to_le_bytes());
    image[0x10] = layout.fat_count;
    image[0x11..0x13].copy_from_slice(&layout.root_entries.to_le_bytes());
    image[0x13..0x15].copy_from_slice(&(total_sectors as u16).to_le_bytes());
    image[0x15] = 0xF9;
    image[0x16..0x18].copy_from_slice(&layout.fat_size.to_le_bytes());
    image[0x18..0x1A].copy_from_slice(&layout.sectors_per_track.to_le_bytes());
    image[0x1A..0x1C].copy_from_slice(&layout.sides.to_le_bytes());

    let reserved = layout.reserved.max(1) as usize;
    let fat_bytes = layout.fat_size as usize * bytes_per_sector;
    for copy in 0..layout.fat_count as usize {
        let start = reserved * bytes_per_sector + copy * fat_bytes;
        let media: &[u8] = if layout.fat16 {
            &[0xF9, 0xFF, 0xFF, 0xFF]
        } else {
            &[0xF9, 0xFF, 0xFF]
        };
        image[start..start + media.len()].copy_from_slice(media);
    }

    let root_start = (reserved + layout.fat_count as usize * layout.fat_size as usize) * bytes_per_sector;
    image[root_start..root_start + 11].copy_from_slice(b"           ");
    // volume label attribute
    image[root_start + 11] = 0x08;

    image
}
