//! Disk Image Model & Codec.
//!
//! Track/sector modelling with interleave patterns, ID Address Mark
//! records with CRCs, and format-specific catalog semantics (TRD/SCL).

pub mod crc;
pub mod scl;
pub mod trd;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskFormat {
    Trd,
    Scl,
}

impl DiskFormat {
    /// Chosen by extension, mirroring `snapshot::SnapshotFormat::from_extension`
    /// — neither disk format carries a magic number distinguishing it from a
    /// raw CHS dump without also knowing the intended geometry.
    pub fn from_extension(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".trd") {
            Some(DiskFormat::Trd)
        } else if lower.ends_with(".scl") {
            Some(DiskFormat::Scl)
        } else {
            None
        }
    }
}

/// Ingests a disk image file by extension-dispatched format.
pub fn ingest_from_path(path: &str, interleave: InterleavePattern) -> CoreResult<DiskImage> {
    let format = DiskFormat::from_extension(path)
        .ok_or_else(|| CoreError::InvalidArgument(format!("unrecognised disk image extension: {}", path)))?;
    let bytes = std::fs::read(path)
        .map_err(|e| CoreError::NotFound(format!("disk image file {}: {}", path, e)))?;
    match format {
        DiskFormat::Trd => trd::ingest(&bytes, interleave),
        DiskFormat::Scl => scl::ingest(&bytes),
    }
}

pub const SECTORS_PER_TRACK: usize = 16;
pub const SECTOR_SIZE: usize = 256;
pub const TRACK_SIZE: usize = SECTORS_PER_TRACK * SECTOR_SIZE; // 4096
pub const FULL_CYLINDER_SIZE: usize = TRACK_SIZE * 2; // 8192, both sides
pub const MAX_CYLINDERS: u8 = 83;
pub const MAX_SIDES: u8 = 2;

/// The three fixed 16-entry permutations ported from the original's
/// `loader_trd.cpp::INTERLEAVE_PATTERNS`: TR-DOS 5.03 sequential, TR-DOS
/// 5.04T "turbo" (default), and an intermediate pattern.
pub const INTERLEAVE_PATTERNS: [[u8; 16]; 3] = [
    [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
    [1, 9, 2, 10, 3, 11, 4, 12, 5, 13, 6, 14, 7, 15, 8, 16],
    [1, 12, 7, 2, 13, 8, 3, 14, 9, 4, 15, 10, 5, 16, 11, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterleavePattern {
    Sequential,
    Turbo,
    Intermediate,
}

impl InterleavePattern {
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => InterleavePattern::Sequential,
            2 => InterleavePattern::Intermediate,
            _ => InterleavePattern::Turbo,
        }
    }

    fn table(&self) -> &'static [u8; 16] {
        match self {
            InterleavePattern::Sequential => &INTERLEAVE_PATTERNS[0],
            InterleavePattern::Turbo => &INTERLEAVE_PATTERNS[1],
            InterleavePattern::Intermediate => &INTERLEAVE_PATTERNS[2],
        }
    }
}

impl Default for InterleavePattern {
    fn default() -> Self {
        InterleavePattern::Turbo
    }
}

#[derive(Debug, Clone)]
pub struct AddressMarkRecord {
    pub cylinder: u8,
    pub head: u8,
    pub sector: u8,
    pub length_code: u8,
    pub crc: u16,
}

impl AddressMarkRecord {
    pub fn recalculate_crc(&mut self) {
        let bytes = [self.cylinder, self.head, self.sector, self.length_code];
        self.crc = crc::crc16_ccitt(&bytes);
    }
}

impl Default for AddressMarkRecord {
    fn default() -> Self {
        Self {
            cylinder: 0,
            head: 0,
            sector: 1,
            length_code: 0x01,
            crc: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawSectorBytes {
    pub bytes: Vec<u8>,
    pub crc: u16,
}

impl RawSectorBytes {
    fn new() -> Self {
        let bytes = vec![0u8; SECTOR_SIZE];
        let crc = crc::crc16_ccitt(&bytes);
        Self { bytes, crc }
    }

    pub fn recalculate_crc(&mut self) {
        self.crc = crc::crc16_ccitt(&self.bytes);
    }
}

#[derive(Debug, Clone)]
pub struct Sector {
    pub id: AddressMarkRecord,
    pub data: RawSectorBytes,
}

#[derive(Debug, Clone, Default)]
pub struct Track {
    pub sectors: Vec<Sector>,
}

impl Track {
    /// Re-initialises to default object state, matching `track =
    /// DiskImage::Track()` in the original `format()`.
    fn reset(&mut self) {
        self.sectors.clear();
        for _ in 0..SECTORS_PER_TRACK {
            self.sectors.push(Sector {
                id: AddressMarkRecord::default(),
                data: RawSectorBytes::new(),
            });
        }
    }

    /// Returns the sector whose ID record carries logical sector number
    /// `sector_number` (1-based, as written by `format`), in physical
    /// (interleaved) order.
    pub fn sector_mut_by_number(&mut self, sector_number: u8) -> Option<&mut Sector> {
        self.sectors.iter_mut().find(|s| s.id.sector == sector_number)
    }

    pub fn sector_by_number(&self, sector_number: u8) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.id.sector == sector_number)
    }
}

#[derive(Debug, Clone)]
pub struct DiskImage {
    pub cylinders: u8,
    pub sides: u8,
    pub tracks: Vec<Track>,
}

impl DiskImage {
    pub fn new(cylinders: u8, sides: u8) -> Self {
        let track_count = cylinders as usize * sides as usize;
        let tracks = (0..track_count).map(|_| Track::default()).collect();
        Self {
            cylinders,
            sides,
            tracks,
        }
    }

    fn track_index(&self, cylinder: u8, side: u8) -> usize {
        cylinder as usize * self.sides as usize + side as usize
    }

    pub fn track(&self, cylinder: u8, side: u8) -> &Track {
        &self.tracks[self.track_index(cylinder, side)]
    }

    pub fn track_mut(&mut self, cylinder: u8, side: u8) -> &mut Track {
        let idx = self.track_index(cylinder, side);
        &mut self.tracks[idx]
    }

    /// Low-level formats every track: re-initialises its default object
    /// state, applies the configured interleave pattern, and populates
    /// each sector's ID record with a recomputed CRC.
    pub fn format(&mut self, interleave: InterleavePattern) {
        let table = *interleave.table();
        let cylinders = self.cylinders;
        let sides = self.sides;
        for cylinder in 0..cylinders {
            for side in 0..sides {
                let track = self.track_mut(cylinder, side);
                track.reset();
                for (logical_pos, sector) in track.sectors.iter_mut().enumerate() {
                    let sector_number = table[logical_pos];
                    sector.id.cylinder = cylinder;
                    sector.id.head = 0;
                    sector.id.sector = sector_number;
                    sector.id.length_code = 0x01;
                    sector.id.recalculate_crc();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_format_from_extension_is_case_insensitive() {
        assert_eq!(DiskFormat::from_extension("DISK.TRD"), Some(DiskFormat::Trd));
        assert_eq!(DiskFormat::from_extension("disk.scl"), Some(DiskFormat::Scl));
        assert_eq!(DiskFormat::from_extension("disk.img"), None);
    }

    #[test]
    fn format_applies_turbo_interleave_by_default() {
        let mut image = DiskImage::new(2, 1);
        image.format(InterleavePattern::Turbo);
        let track = image.track(0, 0);
        let numbers: Vec<u8> = track.sectors.iter().map(|s| s.id.sector).collect();
        assert_eq!(numbers, INTERLEAVE_PATTERNS[1].to_vec());
    }

    #[test]
    fn length_code_one_means_256_bytes() {
        let mut image = DiskImage::new(1, 1);
        image.format(InterleavePattern::Sequential);
        let sector = image.track(0, 0).sector_by_number(1).unwrap();
        assert_eq!(sector.id.length_code, 0x01);
        assert_eq!(sector.data.bytes.len(), SECTOR_SIZE);
    }

    #[test]
    fn formatting_recomputes_id_crc() {
        let mut image = DiskImage::new(1, 1);
        image.format(InterleavePattern::Turbo);
        let sector = image.track_mut(0, 0).sector_mut_by_number(1).unwrap();
        let recorded = sector.id.crc;
        sector.id.recalculate_crc();
        assert_eq!(recorded, sector.id.crc);
    }
}
