//! SCL ingest.
//!
//! `SINCLAIR` signature, 1-byte file count, that many 14-byte reduced
//! catalog entries (name/type/start/length/size-in-sectors — no
//! start-sector/start-track, unlike the full on-disk TR-DOS entry), the
//! concatenated file payloads, and a 4-byte trailer checksum over
//! everything before it. Track 0 is reserved for the TR-DOS catalog; file
//! payloads are appended sequentially starting at sector 16 (track 1).
//!
//! Grounded on `LoaderSCL::loadImage`/`loadSCL` (catalog walk, track-0
//! reservation, 80×2×16-16 sector budget); the source's own
//! `checkSCLFileCRC` is an unimplemented stub, so the checksum algorithm
//! here (a 32-bit additive sum, matching the historical SCL trailer) is a
//! supplement recorded in DESIGN.md.

use super::{DiskImage, InterleavePattern, SECTORS_PER_TRACK, SECTOR_SIZE};
use crate::error::{CoreError, CoreResult};

const SIGNATURE: &[u8; 8] = b"SINCLAIR";
const CATALOG_ENTRY_SIZE: usize = 14;
const CYLINDERS: u8 = 80;
const SIDES: u8 = 2;
const RESERVED_CATALOG_SECTORS: usize = SECTORS_PER_TRACK; // track 0

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: [u8; 8],
    file_type: u8,
    start: u16,
    length_bytes: u16,
    size_sectors: u8,
}

fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}

pub fn ingest(bytes: &[u8]) -> CoreResult<DiskImage> {
    if bytes.len() < 9 {
        return Err(CoreError::InvalidFormat("SCL file too short for header".into()));
    }
    if &bytes[0..8] != SIGNATURE {
        return Err(CoreError::InvalidFormat("missing SINCLAIR signature".into()));
    }

    let file_count = bytes[8] as usize;
    let catalog_start = 9;
    let catalog_end = catalog_start + file_count * CATALOG_ENTRY_SIZE;
    if bytes.len() < catalog_end + 4 {
        return Err(CoreError::InvalidFormat("SCL catalog/trailer truncated".into()));
    }

    let mut entries = Vec::with_capacity(file_count);
    let mut total_sectors: usize = 0;
    for i in 0..file_count {
        let base = catalog_start + i * CATALOG_ENTRY_SIZE;
        let mut name = [0u8; 8];
        name.copy_from_slice(&bytes[base..base + 8]);
        let file_type = bytes[base + 8];
        let start = u16::from_le_bytes([bytes[base + 9], bytes[base + 10]]);
        let length_bytes = u16::from_le_bytes([bytes[base + 11], bytes[base + 12]]);
        let size_sectors = bytes[base + 13];
        total_sectors += size_sectors as usize;
        entries.push(CatalogEntry {
            name,
            file_type,
            start,
            length_bytes,
            size_sectors,
        });
    }

    let capacity = CYLINDERS as usize * SIDES as usize * SECTORS_PER_TRACK - RESERVED_CATALOG_SECTORS;
    if total_sectors > capacity {
        return Err(CoreError::InvalidFormat(format!(
            "SCL catalog requires {} sectors, exceeds capacity {}",
            total_sectors, capacity
        )));
    }

    let payload_start = catalog_end;
    let payload_len = total_sectors * SECTOR_SIZE;
    let trailer_offset = payload_start + payload_len;
    if bytes.len() < trailer_offset + 4 {
        return Err(CoreError::InvalidFormat("SCL payload/trailer truncated".into()));
    }

    let expected = checksum(&bytes[..trailer_offset]);
    let stored = u32::from_le_bytes([
        bytes[trailer_offset],
        bytes[trailer_offset + 1],
        bytes[trailer_offset + 2],
        bytes[trailer_offset + 3],
    ]);
    if expected != stored {
        return Err(CoreError::InvalidFormat("SCL trailer checksum mismatch".into()));
    }

    let mut image = DiskImage::new(CYLINDERS, SIDES);
    image.format(InterleavePattern::Turbo);

    // Sequentially append each file's payload starting at sector 16
    // (first sector of track 1).
    let mut cursor = RESERVED_CATALOG_SECTORS;
    let mut offset = payload_start;
    let mut catalog_records = Vec::with_capacity(entries.len());
    for entry in &entries {
        let start_sector = cursor % SECTORS_PER_TRACK;
        let start_track = (cursor / SECTORS_PER_TRACK) as u8;
        catalog_records.push((entry, start_sector as u8, start_track));

        for _ in 0..entry.size_sectors {
            let track_no = cursor / SECTORS_PER_TRACK;
            let sector_pos = cursor % SECTORS_PER_TRACK;
            let cylinder = (track_no / SIDES as usize) as u8;
            let side = (track_no % SIDES as usize) as u8;

            let track = image.track_mut(cylinder, side);
            let sector = &mut track.sectors[sector_pos];
            let end = (offset + SECTOR_SIZE).min(bytes.len());
            let n = end - offset;
            sector.data.bytes[..n].copy_from_slice(&bytes[offset..end]);
            if n < SECTOR_SIZE {
                sector.data.bytes[n..].iter_mut().for_each(|b| *b = 0);
            }
            sector.data.recalculate_crc();

            cursor += 1;
            offset += SECTOR_SIZE;
        }
    }

    write_catalog(&mut image, &catalog_records);
    Ok(image)
}

/// Writes the 16-byte TR-DOS directory entries onto track 0 (cylinder 0,
/// side 0), 16 entries per 256-byte sector — the classic TR-DOS catalog
/// layout the original SCL loader reconstructs on ingest so the image can
/// be mounted like any native TRD. Each entry: 8-byte name, 1-byte type,
/// 2-byte start address, 2-byte length in bytes, 1-byte length in sectors,
/// 1-byte start sector, 1-byte start track.
fn write_catalog(image: &mut DiskImage, records: &[(&CatalogEntry, u8, u8)]) {
    const ENTRY_SIZE: usize = 16;
    const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / ENTRY_SIZE;

    let track0 = image.track_mut(0, 0);
    for (index, (entry, start_sector, start_track)) in records.iter().enumerate() {
        let sector_no = index / ENTRIES_PER_SECTOR;
        let entry_offset = (index % ENTRIES_PER_SECTOR) * ENTRY_SIZE;
        let sector = &mut track0.sectors[sector_no];

        sector.data.bytes[entry_offset..entry_offset + 8].copy_from_slice(&entry.name);
        sector.data.bytes[entry_offset + 8] = entry.file_type;
        sector.data.bytes[entry_offset + 9..entry_offset + 11]
            .copy_from_slice(&entry.start.to_le_bytes());
        sector.data.bytes[entry_offset + 11..entry_offset + 13]
            .copy_from_slice(&entry.length_bytes.to_le_bytes());
        sector.data.bytes[entry_offset + 13] = entry.size_sectors;
        sector.data.bytes[entry_offset + 14] = *start_sector;
        sector.data.bytes[entry_offset + 15] = *start_track;
    }

    let touched_sectors = (records.len() + ENTRIES_PER_SECTOR - 1) / ENTRIES_PER_SECTOR;
    for sector in track0.sectors[..touched_sectors.max(1).min(SECTORS_PER_TRACK)].iter_mut() {
        sector.data.recalculate_crc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_scl(files: &[(&str, u8, u16, u16, u8, u8)]) -> Vec<u8> {
        // (name, type, start, length_bytes, size_sectors, fill_byte)
        let mut buf = Vec::new();
        buf.extend_from_slice(SIGNATURE);
        buf.push(files.len() as u8);
        for (name, file_type, start, length_bytes, size_sectors, _fill) in files {
            let mut name_bytes = [b' '; 8];
            let bytes = name.as_bytes();
            name_bytes[..bytes.len()].copy_from_slice(bytes);
            buf.extend_from_slice(&name_bytes);
            buf.push(*file_type);
            buf.extend_from_slice(&start.to_le_bytes());
            buf.extend_from_slice(&length_bytes.to_le_bytes());
            buf.push(*size_sectors);
        }
        for (_, _, _, _, size_sectors, fill) in files {
            buf.extend(std::iter::repeat(*fill).take(*size_sectors as usize * SECTOR_SIZE));
        }
        let sum = checksum(&buf);
        buf.extend_from_slice(&sum.to_le_bytes());
        buf
    }

    #[test]
    fn valid_scl_ingests() {
        let bytes = build_scl(&[("GAME", 0x42, 0x8000, 512, 2, 0xCC)]);
        let image = ingest(&bytes).unwrap();
        assert_eq!(image.cylinders, CYLINDERS);
        let track1 = image.track(0, 1);
        assert_eq!(track1.sectors[0].data.bytes[0], 0xCC);
    }

    #[test]
    fn catalog_entry_is_reconstructed_on_track_zero() {
        let bytes = build_scl(&[("GAME", 0x42, 0x8000, 512, 2, 0xCC)]);
        let image = ingest(&bytes).unwrap();
        let catalog_sector = &image.track(0, 0).sectors[0];

        assert_eq!(&catalog_sector.data.bytes[0..8], b"GAME    ");
        assert_eq!(catalog_sector.data.bytes[8], 0x42);
        assert_eq!(
            u16::from_le_bytes([catalog_sector.data.bytes[9], catalog_sector.data.bytes[10]]),
            0x8000
        );
        assert_eq!(
            u16::from_le_bytes([catalog_sector.data.bytes[11], catalog_sector.data.bytes[12]]),
            512
        );
        assert_eq!(catalog_sector.data.bytes[13], 2);
        assert_eq!(catalog_sector.data.bytes[14], 0);
        assert_eq!(catalog_sector.data.bytes[15], 0);
    }

    #[test]
    fn bad_signature_rejected() {
        let mut bytes = build_scl(&[("A", 0, 0, 0, 1, 0)]);
        bytes[0] = b'X';
        assert!(matches!(ingest(&bytes), Err(CoreError::InvalidFormat(_))));
    }

    #[test]
    fn trailer_checksum_mismatch_rejected() {
        let mut bytes = build_scl(&[("A", 0, 0, 0, 1, 0)]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(ingest(&bytes), Err(CoreError::InvalidFormat(_))));
    }
}
