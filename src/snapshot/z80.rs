//! Snapshot Codec — Z80.
//!
//! Version detection by probing the header's PC field and, failing that,
//! an extended-header-length discriminator; memory decoded block-by-block
//! through `rle`; peripheral state replayed through `PortDecoder` exactly
//! as a live I/O write would be, so loads are idempotent regardless of the
//! prior paging-lock state — grounded on `LoaderZ80::{parseHeader,
//! parseMemoryBlocks, commitFromStage}`.

use crate::config::Model;
use crate::error::{CoreError, CoreResult};
use crate::instance::Instance;
use crate::memory::port_decoder::PORT_7FFD;
use crate::memory::{new_page, Page, PageKind, PageRef, PAGE_SIZE};

use super::rle;

const HEADER_V1_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Z80Version {
    V1,
    V2,
    V3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Spectrum48,
    Spectrum128,
}

impl MemoryMode {
    fn from_model(model: Model) -> Self {
        match model {
            Model::Spectrum48 => MemoryMode::Spectrum48,
            Model::Spectrum128 => MemoryMode::Spectrum128,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Z80HeaderV1 {
    pub a: u8,
    pub f: u8,
    pub bc: u16,
    pub hl: u16,
    pub pc: u16,
    pub sp: u16,
    pub i: u8,
    pub r: u8,
    pub flags1: u8,
    pub de: u16,
    pub bc_alt: u16,
    pub de_alt: u16,
    pub hl_alt: u16,
    pub a_alt: u8,
    pub f_alt: u8,
    pub iy: u16,
    pub ix: u16,
    pub iff1: u8,
    pub iff2: u8,
    pub flags2: u8,
}

impl Z80HeaderV1 {
    fn parse(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_V1_SIZE {
            return Err(CoreError::InvalidFormat("Z80 v1 header truncated".into()));
        }
        let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
        Ok(Z80HeaderV1 {
            a: bytes[0],
            f: bytes[1],
            bc: u16_at(2),
            hl: u16_at(4),
            pc: u16_at(6),
            sp: u16_at(8),
            i: bytes[10],
            r: bytes[11],
            flags1: bytes[12],
            de: u16_at(13),
            bc_alt: u16_at(15),
            de_alt: u16_at(17),
            hl_alt: u16_at(19),
            a_alt: bytes[21],
            f_alt: bytes[22],
            iy: u16_at(23),
            ix: u16_at(25),
            iff1: bytes[27],
            iff2: bytes[28],
            flags2: bytes[29],
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Z80HeaderV2Ext {
    pub new_pc: u16,
    pub hardware_mode: u8,
    pub p_7ffd: u8,
    /// Last value written to port 0xFFFD — the AY register-select latch,
    /// not register data. Replayed through `SoundManager::select_register`.
    pub p_fffd: u8,
    pub trdos_active: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryBlockDescriptor {
    pub compressed_size: u16,
    pub page_id: u8,
}

/// Maps a Z80 `page-id` to an emulator page.
pub fn resolve_snapshot_page(page_id: u8, mode: MemoryMode) -> Option<PageRef> {
    match mode {
        MemoryMode::Spectrum48 => match page_id {
            0 | 1 => Some(PageRef::rom(0)),
            4 => Some(PageRef::ram(2)),
            5 => Some(PageRef::ram(0)),
            8 => Some(PageRef::ram(5)),
            _ => None,
        },
        MemoryMode::Spectrum128 => match page_id {
            0..=2 => Some(PageRef::rom(page_id as usize)),
            3..=10 => Some(PageRef::ram((page_id - 3) as usize)),
            _ => None,
        },
    }
}

pub struct Z80Staging {
    pub version: Z80Version,
    pub header: Z80HeaderV1,
    pub ext: Option<Z80HeaderV2Ext>,
    pub mode: MemoryMode,
    pub pages: Vec<(PageRef, Box<Page>)>,
}

fn detect_version(bytes: &[u8]) -> CoreResult<(Z80Version, usize)> {
    let header = Z80HeaderV1::parse(bytes)?;
    if header.pc != 0 {
        return Ok((Z80Version::V1, HEADER_V1_SIZE));
    }

    if bytes.len() < HEADER_V1_SIZE + 2 {
        return Err(CoreError::InvalidFormat("Z80 extended header length truncated".into()));
    }
    let ext_len = u16::from_le_bytes([bytes[HEADER_V1_SIZE], bytes[HEADER_V1_SIZE + 1]]);
    match ext_len {
        23 => Ok((Z80Version::V2, HEADER_V1_SIZE + 2 + 23)),
        54 | 55 => Ok((Z80Version::V3, HEADER_V1_SIZE + 2 + ext_len as usize)),
        other => Err(CoreError::InvalidFormat(format!(
            "unrecognised Z80 extended header length {}",
            other
        ))),
    }
}

fn parse_ext(bytes: &[u8], ext_start: usize) -> Z80HeaderV2Ext {
    let new_pc = u16::from_le_bytes([bytes[ext_start], bytes[ext_start + 1]]);
    let hardware_mode = bytes[ext_start + 2];
    let p_7ffd = bytes[ext_start + 3];
    let p_fffd = bytes.get(ext_start + 6).copied().unwrap_or(0);
    // TR-DOS active flag location varies by producer; treated as absent
    // (false) unless a later field explicitly flags it — the retrieved
    // source does not define a stable offset for it in the v2/v3 header.
    Z80HeaderV2Ext {
        new_pc,
        hardware_mode,
        p_7ffd,
        p_fffd,
        trdos_active: false,
    }
}

fn infer_mode(version: Z80Version, ext: Option<&Z80HeaderV2Ext>) -> MemoryMode {
    if version == Z80Version::V1 {
        return MemoryMode::Spectrum48;
    }
    match ext {
        Some(e) if e.hardware_mode >= 3 => MemoryMode::Spectrum128,
        _ => MemoryMode::Spectrum48,
    }
}

pub fn parse(bytes: &[u8]) -> CoreResult<Z80Staging> {
    let (version, body_start) = detect_version(bytes)?;
    let header = Z80HeaderV1::parse(bytes)?;

    let ext = if version == Z80Version::V1 {
        None
    } else {
        let ext_start = HEADER_V1_SIZE + 2;
        Some(parse_ext(bytes, ext_start))
    };

    let mode = infer_mode(version, ext.as_ref());

    let mut pages = Vec::new();
    if version == Z80Version::V1 {
        // v1 bodies are a single (possibly compressed) 48K memory image
        // covering pages 4/5/8 (RAM 2/0/5) back-to-back, uncompressed
        // unless flags1 bit 5 indicates compression, terminated by the
        // `00 ED ED 00` end marker when compressed.
        let compressed = header.flags1 & 0b0010_0000 != 0;
        let body = &bytes[body_start..];
        let flat = if compressed {
            decompress_v1_body(body)?
        } else {
            body.to_vec()
        };
        if flat.len() < 3 * PAGE_SIZE {
            return Err(CoreError::InvalidFormat("Z80 v1 memory image too short".into()));
        }
        for (slot, page_id) in [(0usize, 8u8), (1, 4), (2, 5)] {
            let page_ref = resolve_snapshot_page(page_id, mode)
                .ok_or_else(|| CoreError::InvalidFormat("unknown Z80 v1 page id".into()))?;
            let start = slot * PAGE_SIZE;
            let mut page = new_page();
            page.copy_from_slice(&flat[start..start + PAGE_SIZE]);
            pages.push((page_ref, page));
        }
    } else {
        let mut cursor = body_start;
        while cursor + 3 <= bytes.len() {
            let compressed_size = u16::from_le_bytes([bytes[cursor], bytes[cursor + 1]]);
            let page_id = bytes[cursor + 2];
            cursor += 3;

            let page_ref = resolve_snapshot_page(page_id, mode)
                .ok_or_else(|| CoreError::InvalidFormat(format!("unknown Z80 page id {}", page_id)))?;

            let mut page = new_page();
            if compressed_size == 0xFFFF {
                if cursor + PAGE_SIZE > bytes.len() {
                    return Err(CoreError::InvalidFormat("Z80 uncompressed block truncated".into()));
                }
                page.copy_from_slice(&bytes[cursor..cursor + PAGE_SIZE]);
                cursor += PAGE_SIZE;
            } else {
                let end = cursor + compressed_size as usize;
                if end > bytes.len() {
                    return Err(CoreError::InvalidFormat("Z80 compressed block truncated".into()));
                }
                rle::decompress(&bytes[cursor..end], &mut page)?;
                cursor = end;
            }
            pages.push((page_ref, page));
        }
    }

    Ok(Z80Staging {
        version,
        header,
        ext,
        mode,
        pages,
    })
}

/// v1's block-compression scheme uses the same escape sequence as the
/// per-page RLE, applied to the whole body and terminated by `00 ED ED 00`.
fn decompress_v1_body(body: &[u8]) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(3 * PAGE_SIZE);
    let mut i = 0;
    while i < body.len() {
        if i + 4 <= body.len() && body[i] == 0x00 && body[i + 1] == 0xED && body[i + 2] == 0xED && body[i + 3] == 0x00 {
            break;
        }
        if i + 4 <= body.len() && body[i] == 0xED && body[i + 1] == 0xED {
            let count = body[i + 2];
            if count == 0 {
                return Err(CoreError::InvalidFormat("Z80 v1 RLE run count of 0 is illegal".into()));
            }
            let value = body[i + 3];
            for _ in 0..count {
                out.push(value);
            }
            i += 4;
        } else {
            out.push(body[i]);
            i += 1;
        }
    }
    Ok(out)
}

pub fn apply(staging: &Z80Staging, instance: &mut Instance) -> CoreResult<()> {
    instance.cpu.reset();
    instance.memory.reset_default_banking();
    instance.port_decoder.reset();

    for (page_ref, data) in &staging.pages {
        if page_ref.kind == PageKind::Ram {
            instance.memory.load_ram_page(page_ref.index, data);
        } else {
            *instance.memory.rom_page_mut(page_ref.index) = **data;
        }
    }

    let h = &staging.header;
    let mut regs = crate::cpu::CpuRegisters {
        af: u16::from_be_bytes([h.a, h.f]),
        bc: h.bc,
        de: h.de,
        hl: h.hl,
        af_alt: u16::from_be_bytes([h.a_alt, h.f_alt]),
        bc_alt: h.bc_alt,
        de_alt: h.de_alt,
        hl_alt: h.hl_alt,
        ix: h.ix,
        iy: h.iy,
        pc: h.pc,
        sp: h.sp,
        i: h.i,
        iff1: h.iff1 != 0,
        iff2: h.iff2 != 0,
        im: h.flags2 & 0x03,
        ..Default::default()
    };
    regs.set_r((h.r & 0x7F) | ((h.flags1 & 0x01) << 7));

    instance.screen.fill_border_with_color((h.flags1 >> 1) & 0x07);

    if let Some(ext) = staging.ext {
        regs.pc = ext.new_pc;

        instance
            .port_decoder
            .port_out(&mut instance.memory, PORT_7FFD, ext.p_7ffd);
        instance.sound.select_register(ext.p_fffd);

        if ext.trdos_active {
            instance.memory.activate_trdos_rom();
        }
    } else {
        // 48K v1 load: no extended header to decode, so the port-7FFD
        // side effects are synthesised directly — bank0 | screen-normal |
        // rom1 | lock — and replayed through the
        // same decoder every other apply path uses, guaranteeing
        // identical behaviour regardless of load route.
        let synthesized: u8 = 0b0001_0000; // rom select bit; bank/screen bits already 0
        instance
            .port_decoder
            .port_out(&mut instance.memory, PORT_7FFD, synthesized);
        instance.port_decoder.lock_paging();
    }

    instance.cpu.set_registers(regs);
    Ok(())
}

/// Symmetric with `apply`: compresses each live page and falls back to
/// the `0xFFFF` sentinel + raw page when compression doesn't shrink it.
pub fn save(instance: &Instance) -> Vec<u8> {
    let regs = instance.cpu.registers();
    let mut out = Vec::new();

    let af = regs.af.to_be_bytes();
    out.push(af[0]); // A
    out.push(af[1]); // F
    out.extend_from_slice(&regs.bc.to_le_bytes());
    out.extend_from_slice(&regs.hl.to_le_bytes());
    out.extend_from_slice(&[0, 0]); // PC == 0 signals "extended header follows"
    out.extend_from_slice(&regs.sp.to_le_bytes());
    out.push(regs.i);
    out.push(regs.r() & 0x7F);

    let flags1 = ((regs.r() & 0x80) >> 7) | ((instance.screen.border & 0x07) << 1);
    out.push(flags1);

    out.extend_from_slice(&regs.de.to_le_bytes());
    out.extend_from_slice(&regs.bc_alt.to_le_bytes());
    out.extend_from_slice(&regs.de_alt.to_le_bytes());
    out.extend_from_slice(&regs.hl_alt.to_le_bytes());

    let af_alt = regs.af_alt.to_be_bytes();
    out.push(af_alt[0]);
    out.push(af_alt[1]);

    out.extend_from_slice(&regs.iy.to_le_bytes());
    out.extend_from_slice(&regs.ix.to_le_bytes());
    out.push(if regs.iff1 { 1 } else { 0 });
    out.push(if regs.iff2 { 1 } else { 0 });
    out.push(regs.im & 0x03);

    debug_assert_eq!(out.len(), HEADER_V1_SIZE);

    // Extended header (v3, 54 bytes): new_PC, hardware mode, p7FFD, pFFFD,
    // padded to the fixed length.
    let mut ext = vec![0u8; 54];
    out.extend_from_slice(&(54u16).to_le_bytes());
    ext[0..2].copy_from_slice(&regs.pc.to_le_bytes());
    ext[2] = if instance.memory.config().model == Model::Spectrum128 { 4 } else { 0 };
    ext[3] = instance.port_decoder.is_locked() as u8 * 0b0010_0000
        | if instance.port_decoder.screen_page() == 7 { 0b0000_1000 } else { 0 }
        | (instance.memory.bank_mapping(3).index as u8 & 0x07);
    ext[6] = instance.sound.selected_register();
    out.extend_from_slice(&ext);

    let mode = MemoryMode::from_model(instance.memory.config().model);
    let ram_pages = match mode {
        MemoryMode::Spectrum48 => vec![(8u8, 5usize), (4, 2), (5, 0)],
        MemoryMode::Spectrum128 => (0..instance.memory.ram_page_count())
            .map(|idx| (3 + idx as u8, idx))
            .collect(),
    };

    for (page_id, ram_index) in ram_pages {
        let page = instance.memory.ram_page(ram_index);
        let compressed = rle::compress(page);
        if compressed.len() < PAGE_SIZE {
            out.extend_from_slice(&(compressed.len() as u16).to_le_bytes());
            out.push(page_id);
            out.extend_from_slice(&compressed);
        } else {
            out.extend_from_slice(&0xFFFFu16.to_le_bytes());
            out.push(page_id);
            out.extend_from_slice(page);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Model;
    use crate::events::EventBus;
    use crate::instance::{Instance, InstanceConfig};

    fn fresh_instance(model: Model) -> Instance {
        Instance::new(None, InstanceConfig::new(model), EventBus::new())
    }

    fn build_v1_header(pc: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_V1_SIZE];
        bytes[6..8].copy_from_slice(&pc.to_le_bytes());
        bytes
    }

    #[test]
    fn nonzero_pc_selects_v1() {
        let mut bytes = build_v1_header(0x8000);
        bytes.extend(vec![0u8; 3 * PAGE_SIZE]);
        let staging = parse(&bytes).unwrap();
        assert_eq!(staging.version, Z80Version::V1);
    }

    #[test]
    fn zero_pc_with_ext_len_23_selects_v2() {
        let mut bytes = build_v1_header(0);
        bytes.extend_from_slice(&23u16.to_le_bytes());
        bytes.extend(vec![0u8; 23]);
        let staging = parse(&bytes).unwrap();
        assert_eq!(staging.version, Z80Version::V2);
    }

    #[test]
    fn unrecognised_ext_length_is_rejected() {
        let mut bytes = build_v1_header(0);
        bytes.extend_from_slice(&99u16.to_le_bytes());
        bytes.extend(vec![0u8; 99]);
        let err = parse(&bytes).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat(_)));
    }

    #[test]
    fn resolve_snapshot_page_follows_the_model_table() {
        assert_eq!(resolve_snapshot_page(8, MemoryMode::Spectrum48), Some(PageRef::ram(5)));
        assert_eq!(resolve_snapshot_page(3, MemoryMode::Spectrum128), Some(PageRef::ram(0)));
        assert_eq!(resolve_snapshot_page(11, MemoryMode::Spectrum128), None);
    }

    #[test]
    fn v1_apply_synthesises_locked_port_7ffd() {
        let mut instance = fresh_instance(Model::Spectrum48);
        let mut bytes = build_v1_header(0x8000);
        bytes.extend(vec![0u8; 3 * PAGE_SIZE]);
        let staging = parse(&bytes).unwrap();
        apply(&staging, &mut instance).unwrap();
        assert!(instance.port_decoder.is_locked());
        assert_eq!(instance.cpu.registers().pc, 0x8000);
    }

    #[test]
    fn v2_ext_parses_p_fffd_at_offset_six() {
        let mut bytes = build_v1_header(0);
        bytes.extend_from_slice(&23u16.to_le_bytes());
        let mut ext = vec![0u8; 23];
        ext[6] = 0x0D;
        bytes.extend_from_slice(&ext);
        let staging = parse(&bytes).unwrap();
        assert_eq!(staging.ext.unwrap().p_fffd, 0x0D);
    }

    #[test]
    fn apply_replays_p_fffd_as_ay_register_select() {
        let mut instance = fresh_instance(Model::Spectrum48);
        let mut bytes = build_v1_header(0);
        bytes.extend_from_slice(&23u16.to_le_bytes());
        let mut ext = vec![0u8; 23];
        ext[6] = 0x0D;
        bytes.extend_from_slice(&ext);
        let staging = parse(&bytes).unwrap();
        apply(&staging, &mut instance).unwrap();
        assert_eq!(instance.sound.selected_register(), 0x0D);
    }

    #[test]
    fn save_and_reload_round_trips_ay_register_select() {
        let mut instance = fresh_instance(Model::Spectrum48);
        instance.sound.select_register(0x0A);
        let bytes = save(&instance);

        let staging = parse(&bytes).unwrap();
        let mut reloaded = fresh_instance(Model::Spectrum48);
        apply(&staging, &mut reloaded).unwrap();
        assert_eq!(reloaded.sound.selected_register(), 0x0A);
    }
}
