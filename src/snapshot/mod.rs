//! Snapshot Codecs: SNA and Z80 load/save.
//!
//! Two on-disk formats (SNA, Z80) sharing the same two-phase contract:
//! parse into a staging value that never touches a live `Instance`, then
//! `apply` only after every byte has been validated.

pub mod rle;
pub mod sna;
pub mod z80;

use crate::error::{CoreError, CoreResult};
use crate::instance::Instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Sna,
    Z80,
}

impl SnapshotFormat {
    /// Chosen by extension first, falling back to a byte-shape probe —
    /// neither format carries a magic number of its own at the front, so
    /// content sniffing alone can't distinguish them reliably.
    pub fn from_extension(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".sna") {
            Some(SnapshotFormat::Sna)
        } else if lower.ends_with(".z80") {
            Some(SnapshotFormat::Z80)
        } else {
            None
        }
    }
}

/// Loads a snapshot file into a live instance, dispatching to the codec
/// implied by `format`. Parsing is pure; `apply` only runs once parsing
/// has fully succeeded, preserving the validate-stage-apply contract even
/// across formats.
pub fn load(format: SnapshotFormat, bytes: &[u8], instance: &mut Instance) -> CoreResult<()> {
    match format {
        SnapshotFormat::Sna => {
            let staging = sna::parse(bytes)?;
            sna::apply(&staging, instance)
        }
        SnapshotFormat::Z80 => {
            let staging = z80::parse(bytes)?;
            z80::apply(&staging, instance)
        }
    }
}

pub fn save(format: SnapshotFormat, instance: &Instance) -> CoreResult<Vec<u8>> {
    match format {
        SnapshotFormat::Sna => Ok(sna::save(instance)),
        SnapshotFormat::Z80 => Ok(z80::save(instance)),
    }
}

pub fn save_to_path(path: &str, instance: &Instance) -> CoreResult<()> {
    let format = SnapshotFormat::from_extension(path)
        .ok_or_else(|| CoreError::InvalidArgument(format!("unrecognised snapshot extension: {}", path)))?;
    let bytes = save(format, instance)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn load_from_path(path: &str, instance: &mut Instance) -> CoreResult<()> {
    let format = SnapshotFormat::from_extension(path)
        .ok_or_else(|| CoreError::InvalidArgument(format!("unrecognised snapshot extension: {}", path)))?;
    let bytes = std::fs::read(path)
        .map_err(|e| CoreError::NotFound(format!("snapshot file {}: {}", path, e)))?;
    load(format, &bytes, instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(SnapshotFormat::from_extension("game.SNA"), Some(SnapshotFormat::Sna));
        assert_eq!(SnapshotFormat::from_extension("game.z80"), Some(SnapshotFormat::Z80));
        assert_eq!(SnapshotFormat::from_extension("game.bin"), None);
    }
}
