//! TRD ingest/emit.
//!
//! A TRD file is a raw CHS dump, 256 B/sector, 16 sectors/track, up to
//! 160 tracks. Short files (tail-truncated) are permitted on ingest; the
//! emitted image is always full-sized, grounded on
//! `LoaderTRD::{loadImage, format, transferSectorData}`.

use super::{DiskImage, InterleavePattern, FULL_CYLINDER_SIZE, MAX_CYLINDERS, SECTORS_PER_TRACK, SECTOR_SIZE, TRACK_SIZE};
use crate::error::{CoreError, CoreResult};

const SIDES: u8 = 2;

fn cylinders_from_len(len: usize) -> u8 {
    let full = len / FULL_CYLINDER_SIZE;
    let remainder = len % FULL_CYLINDER_SIZE;
    let extra = if remainder > 0 { 1 } else { 0 };
    (full + extra) as u8
}

/// Ingests a `.trd` byte buffer into a `DiskImage`. Accepts any length that
/// divides into whole or partial cylinders up to `MAX_CYLINDERS`.
pub fn ingest(bytes: &[u8], interleave: InterleavePattern) -> CoreResult<DiskImage> {
    if bytes.is_empty() {
        return Err(CoreError::InvalidFormat("empty TRD file".into()));
    }

    let cylinders = cylinders_from_len(bytes.len());
    if cylinders == 0 || cylinders > MAX_CYLINDERS {
        return Err(CoreError::InvalidFormat(format!(
            "TRD image spans {} cylinders, exceeds MAX_CYLINDERS={}",
            cylinders, MAX_CYLINDERS
        )));
    }

    let mut image = DiskImage::new(cylinders, SIDES);
    image.format(interleave);

    let tracks = cylinders as usize * SIDES as usize;
    for track_no in 0..tracks {
        let cylinder = (track_no / SIDES as usize) as u8;
        let side = (track_no % SIDES as usize) as u8;
        let track = image.track_mut(cylinder, side);

        for sector_no in 0..SECTORS_PER_TRACK {
            let offset = track_no * TRACK_SIZE + sector_no * SECTOR_SIZE;
            if offset >= bytes.len() {
                break;
            }
            let end = (offset + SECTOR_SIZE).min(bytes.len());
            // Logical order: TRD stores sectors 0..15 in file order, not
            // interleaved order, so index by position rather than by the
            // ID record's (interleaved) sector number.
            let sector = &mut track.sectors[sector_no];
            sector.data.bytes[..end - offset].copy_from_slice(&bytes[offset..end]);
            if end - offset < SECTOR_SIZE {
                sector.data.bytes[end - offset..].iter_mut().for_each(|b| *b = 0);
            }
            sector.data.recalculate_crc();
        }
    }

    Ok(image)
}

/// Emits a full-sized `.trd` image: every cylinder/side pair present in
/// the image, sectors written back in track-file order.
pub fn emit(image: &DiskImage) -> Vec<u8> {
    let tracks = image.cylinders as usize * image.sides as usize;
    let mut out = vec![0u8; tracks * TRACK_SIZE];

    for track_no in 0..tracks {
        let cylinder = (track_no / image.sides as usize) as u8;
        let side = (track_no % image.sides as usize) as u8;
        let track = image.track(cylinder, side);
        for (sector_no, sector) in track.sectors.iter().enumerate() {
            let offset = track_no * TRACK_SIZE + sector_no * SECTOR_SIZE;
            out[offset..offset + SECTOR_SIZE].copy_from_slice(&sector.data.bytes);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_file_ingests_as_partial_cylinder() {
        let bytes = vec![0xAAu8; SECTOR_SIZE * 3]; // far short of a full track
        let image = ingest(&bytes, InterleavePattern::Turbo).unwrap();
        assert_eq!(image.cylinders, 1);
        let sector0 = &image.track(0, 0).sectors[0];
        assert_eq!(sector0.data.bytes[0], 0xAA);
    }

    #[test]
    fn oversized_file_is_rejected() {
        let bytes = vec![0u8; FULL_CYLINDER_SIZE * (MAX_CYLINDERS as usize + 1)];
        let err = ingest(&bytes, InterleavePattern::Turbo).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat(_)));
    }

    #[test]
    fn emit_produces_full_sized_image() {
        let bytes = vec![0x11u8; SECTOR_SIZE * 5];
        let image = ingest(&bytes, InterleavePattern::Turbo).unwrap();
        let out = emit(&image);
        assert_eq!(out.len(), image.cylinders as usize * SIDES as usize * TRACK_SIZE);
    }
}
