//! Snapshot Codec — SNA.
//!
//! Validate -> stage -> apply. Staging never touches an `Instance`;
//! `apply` only mutates live state after every page and header field has
//! parsed successfully, so a corrupt file leaves the machine untouched —
//! grounded on `LoaderSNA::{validate, load48kToStaging, load128kToStaging,
//! applySnapshotFromStaging}`.

use std::collections::HashMap;

use crate::cpu::CpuRegisters;
use crate::error::{CoreError, CoreResult};
use crate::instance::Instance;
use crate::memory::{new_page, Page, PageRef, PAGE_SIZE};

const SNA_HEADER_SIZE: usize = 27;
const SNA128_EXT_HEADER_SIZE: usize = 4; // PC(2) + port_7FFD(1) + is_trdos(1)
const SNA48_TOTAL_SIZE: usize = SNA_HEADER_SIZE + 3 * PAGE_SIZE;
const SNA128_TOTAL_SIZE: usize = SNA_HEADER_SIZE + 3 * PAGE_SIZE + SNA128_EXT_HEADER_SIZE + 5 * PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnaMode {
    Sna48,
    Sna128,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SnaHeader {
    pub i: u8,
    pub hl_alt: u16,
    pub de_alt: u16,
    pub bc_alt: u16,
    pub af_alt: u16,
    pub hl: u16,
    pub de: u16,
    pub bc: u16,
    pub iy: u16,
    pub ix: u16,
    pub iff2_byte: u8, // bit 2 = IFF2
    pub r: u8,
    pub af: u16,
    pub sp: u16,
    pub interrupt_mode: u8,
    pub border: u8,
}

impl SnaHeader {
    fn parse(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < SNA_HEADER_SIZE {
            return Err(CoreError::InvalidFormat("SNA header truncated".into()));
        }
        let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
        Ok(SnaHeader {
            i: bytes[0],
            hl_alt: u16_at(1),
            de_alt: u16_at(3),
            bc_alt: u16_at(5),
            af_alt: u16_at(7),
            hl: u16_at(9),
            de: u16_at(11),
            bc: u16_at(13),
            iy: u16_at(15),
            ix: u16_at(17),
            iff2_byte: bytes[19],
            r: bytes[20],
            af: u16_at(21),
            sp: u16_at(23),
            interrupt_mode: bytes[25],
            border: bytes[26] & 0x07,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.i);
        out.extend_from_slice(&self.hl_alt.to_le_bytes());
        out.extend_from_slice(&self.de_alt.to_le_bytes());
        out.extend_from_slice(&self.bc_alt.to_le_bytes());
        out.extend_from_slice(&self.af_alt.to_le_bytes());
        out.extend_from_slice(&self.hl.to_le_bytes());
        out.extend_from_slice(&self.de.to_le_bytes());
        out.extend_from_slice(&self.bc.to_le_bytes());
        out.extend_from_slice(&self.iy.to_le_bytes());
        out.extend_from_slice(&self.ix.to_le_bytes());
        out.push(self.iff2_byte);
        out.push(self.r);
        out.extend_from_slice(&self.af.to_le_bytes());
        out.extend_from_slice(&self.sp.to_le_bytes());
        out.push(self.interrupt_mode);
        out.push(self.border);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sna128Extension {
    pub pc: u16,
    pub port_7ffd: u8,
    pub trdos_active: bool,
}

pub struct SnaStaging {
    pub mode: SnaMode,
    pub header: SnaHeader,
    pub extension: Option<Sna128Extension>,
    pub pages: HashMap<usize, Box<Page>>,
}

/// Classifies a file purely from its length.
pub fn classify(file_len: u64) -> CoreResult<SnaMode> {
    let len = file_len as usize;
    if len < SNA_HEADER_SIZE {
        return Err(CoreError::InvalidFormat("file too small to be SNA".into()));
    }
    let remainder = (len - SNA_HEADER_SIZE) % PAGE_SIZE;
    if remainder != 0 {
        // Possibly a 128K extended header (31 bytes) instead
        if len >= SNA_HEADER_SIZE + SNA128_EXT_HEADER_SIZE
            && (len - SNA_HEADER_SIZE - SNA128_EXT_HEADER_SIZE) % PAGE_SIZE == 0
        {
            let total_pages = (len - SNA_HEADER_SIZE - SNA128_EXT_HEADER_SIZE) / PAGE_SIZE;
            if total_pages >= 3 {
                let remaining = total_pages - 3;
                if remaining <= 5 {
                    return Ok(SnaMode::Sna128);
                }
            }
        }
        return Err(CoreError::InvalidFormat(format!(
            "SNA file size {} does not satisfy the size equation",
            len
        )));
    }

    if len == SNA48_TOTAL_SIZE {
        return Ok(SnaMode::Sna48);
    }

    // header-size-only match (27 bytes + N pages) with N != 3 is not a
    // valid 48K snapshot (fixed 3 pages) nor does it look like a 128K
    // shape (requires the extended header); reject it.
    Err(CoreError::InvalidFormat(format!(
        "SNA file size {} does not satisfy the size equation",
        len
    )))
}

pub fn parse(bytes: &[u8]) -> CoreResult<SnaStaging> {
    let mode = classify(bytes.len() as u64)?;
    let header = SnaHeader::parse(bytes)?;

    match mode {
        SnaMode::Sna48 => {
            let mut pages = HashMap::new();
            let page_data_start = SNA_HEADER_SIZE;
            for (slot, page_index) in [(0usize, 5usize), (1, 2), (2, 0)] {
                let start = page_data_start + slot * PAGE_SIZE;
                let mut page = new_page();
                page.copy_from_slice(&bytes[start..start + PAGE_SIZE]);
                pages.insert(page_index, page);
            }
            Ok(SnaStaging {
                mode,
                header,
                extension: None,
                pages,
            })
        }
        SnaMode::Sna128 => {
            let mut cursor = SNA_HEADER_SIZE;
            let mut page5 = new_page();
            page5.copy_from_slice(&bytes[cursor..cursor + PAGE_SIZE]);
            cursor += PAGE_SIZE;
            let mut page2 = new_page();
            page2.copy_from_slice(&bytes[cursor..cursor + PAGE_SIZE]);
            cursor += PAGE_SIZE;
            // Third initial page: staged at index 0, moved to its final
            // index once the extended header tells us which bank-3 page
            // it actually is.
            let mut page_initial = new_page();
            page_initial.copy_from_slice(&bytes[cursor..cursor + PAGE_SIZE]);
            cursor += PAGE_SIZE;

            if bytes.len() < cursor + SNA128_EXT_HEADER_SIZE {
                return Err(CoreError::InvalidFormat("SNA128 extended header truncated".into()));
            }
            let pc = u16::from_le_bytes([bytes[cursor], bytes[cursor + 1]]);
            let port_7ffd = bytes[cursor + 2];
            let trdos_active = bytes[cursor + 3] != 0;
            cursor += SNA128_EXT_HEADER_SIZE;

            let mut pages = HashMap::new();
            pages.insert(5, page5);
            pages.insert(2, page2);

            let current_top_page = (port_7ffd & 0x07) as usize;
            pages.insert(current_top_page, page_initial);

            let mut remaining = Vec::new();
            let mut rest_cursor = cursor;
            while rest_cursor + PAGE_SIZE <= bytes.len() {
                remaining.push(rest_cursor);
                rest_cursor += PAGE_SIZE;
            }

            let mut page_num = 0usize;
            for start in remaining {
                while pages.contains_key(&page_num) {
                    page_num += 1;
                }
                if page_num >= 8 {
                    break;
                }
                let mut page = new_page();
                page.copy_from_slice(&bytes[start..start + PAGE_SIZE]);
                pages.insert(page_num, page);
                page_num += 1;
            }

            Ok(SnaStaging {
                mode,
                header,
                extension: Some(Sna128Extension {
                    pc,
                    port_7ffd,
                    trdos_active,
                }),
                pages,
            })
        }
    }
}

/// Commits a fully staged snapshot to a live instance. Only called after
/// `parse` succeeded end to end, keeping the validate-stage-apply contract.
pub fn apply(staging: &SnaStaging, instance: &mut Instance) -> CoreResult<()> {
    instance.cpu.reset();
    instance.memory.reset_default_banking();
    instance.port_decoder.reset();

    for (&page_index, data) in &staging.pages {
        instance.memory.load_ram_page(page_index, data);
    }

    let h = &staging.header;
    let mut regs = CpuRegisters {
        af: h.af,
        bc: h.bc,
        de: h.de,
        hl: h.hl,
        af_alt: h.af_alt,
        bc_alt: h.bc_alt,
        de_alt: h.de_alt,
        hl_alt: h.hl_alt,
        ix: h.ix,
        iy: h.iy,
        pc: 0,
        sp: h.sp,
        i: h.i,
        iff1: h.iff2_byte & 0b0000_0100 != 0,
        iff2: true,
        im: h.interrupt_mode & 0x03,
        ..Default::default()
    };
    regs.set_r(h.r);

    instance.screen.fill_border_with_color(h.border);

    match staging.mode {
        SnaMode::Sna48 => {
            instance.memory.map_bank(1, PageRef::ram(5));
            instance.memory.map_bank(2, PageRef::ram(2));
            instance.memory.map_bank(3, PageRef::ram(0));

            // 48K SNA stores PC on the stack: pop it (SP post-increment).
            let sp = regs.sp;
            let lo = instance.memory.read_byte(sp);
            let hi = instance.memory.read_byte(sp.wrapping_add(1));
            regs.pc = u16::from_le_bytes([lo, hi]);
            regs.sp = sp.wrapping_add(2);
        }
        SnaMode::Sna128 => {
            let ext = staging
                .extension
                .ok_or_else(|| CoreError::Internal("SNA128 staging missing extension header".into()))?;

            instance.memory.map_bank(1, PageRef::ram(5));
            instance.memory.map_bank(2, PageRef::ram(2));
            regs.pc = ext.pc;

            instance
                .port_decoder
                .port_out(&mut instance.memory, crate::memory::port_decoder::PORT_7FFD, ext.port_7ffd);

            if ext.trdos_active {
                instance.memory.activate_trdos_rom();
            }
        }
    }

    instance.cpu.set_registers(regs);
    Ok(())
}

/// Chooses SNA48 vs SNA128 from the live lock-bit state.
pub fn save(instance: &Instance) -> Vec<u8> {
    let regs = instance.cpu.registers();
    let header = SnaHeader {
        i: regs.i,
        hl_alt: regs.hl_alt,
        de_alt: regs.de_alt,
        bc_alt: regs.bc_alt,
        af_alt: regs.af_alt,
        hl: regs.hl,
        de: regs.de,
        bc: regs.bc,
        iy: regs.iy,
        ix: regs.ix,
        iff2_byte: if regs.iff2 { 0b0000_0100 } else { 0 },
        r: regs.r(),
        af: regs.af,
        sp: regs.sp,
        interrupt_mode: regs.im,
        border: instance.screen.border & 0x07,
    };

    if instance.port_decoder.is_locked() {
        save_48k(instance, header, regs.pc, regs.sp)
    } else {
        save_128k(instance, header)
    }
}

fn save_48k(instance: &Instance, mut header: SnaHeader, pc: u16, sp: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(SNA48_TOTAL_SIZE);

    // Push PC onto the stack before writing SP, per the SNA48 save layout.
    let new_sp = sp.wrapping_sub(2);
    header.sp = new_sp;
    header.write(&mut out);

    let page_hi = (pc >> 8) as u8;
    let page_lo = (pc & 0xFF) as u8;

    for page_index in [5usize, 2, 0] {
        let mut data = *instance.memory.ram_page(page_index.min(instance.memory.ram_page_count() - 1));
        if page_index == 0 {
            let offset = new_sp as usize % PAGE_SIZE;
            if offset + 1 < PAGE_SIZE {
                data[offset] = page_lo;
                data[offset + 1] = page_hi;
            }
        }
        out.extend_from_slice(&data);
    }

    debug_assert_eq!(out.len(), SNA48_TOTAL_SIZE);
    out
}

fn save_128k(instance: &Instance, header: SnaHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(SNA128_TOTAL_SIZE);
    header.write(&mut out);

    out.extend_from_slice(instance.memory.ram_page(5));
    out.extend_from_slice(instance.memory.ram_page(2));
    let bank3 = instance.memory.bank_mapping(3);
    out.extend_from_slice(instance.memory.ram_page(bank3.index));

    let regs = instance.cpu.registers();
    out.extend_from_slice(&regs.pc.to_le_bytes());
    let bank0 = instance.memory.bank_mapping(0);
    let port_7ffd = (bank3.index as u8 & 0x07)
        | if instance.port_decoder.screen_page() == 7 { 0b0000_1000 } else { 0 }
        | if bank0.kind == crate::memory::PageKind::Rom && bank0.index != 0 { 0b0001_0000 } else { 0 }
        | if instance.port_decoder.is_locked() { 0b0010_0000 } else { 0 };
    out.push(port_7ffd);
    out.push(0); // TR-DOS ROM not active on save path for a live-running instance

    for page_index in 0..instance.memory.ram_page_count() {
        if page_index == 5 || page_index == 2 || page_index == bank3.index {
            continue;
        }
        out.extend_from_slice(instance.memory.ram_page(page_index));
    }

    debug_assert_eq!(out.len(), SNA128_TOTAL_SIZE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Model;
    use crate::instance::{Instance, InstanceConfig};
    use crate::events::EventBus;

    fn fresh_instance() -> Instance {
        Instance::new(
            None,
            InstanceConfig {
                model: Model::Spectrum128,
                ram_kb: 128,
                features: Default::default(),
            },
            EventBus::new(),
        )
    }

    #[test]
    fn classify_rejects_bad_size() {
        assert!(classify(10).is_err());
    }

    #[test]
    fn classify_recognises_sna48() {
        assert_eq!(classify(SNA48_TOTAL_SIZE as u64).unwrap(), SnaMode::Sna48);
    }

    #[test]
    fn classify_recognises_sna128() {
        assert_eq!(classify(SNA128_TOTAL_SIZE as u64).unwrap(), SnaMode::Sna128);
    }

    fn build_sna48(a: u8, bc: u16, de: u16, hl: u16, sp_value_on_stack: u16, sp: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; SNA48_TOTAL_SIZE];
        let af = (a as u16) << 8;
        bytes[21..23].copy_from_slice(&af.to_le_bytes());
        bytes[13..15].copy_from_slice(&bc.to_le_bytes());
        bytes[11..13].copy_from_slice(&de.to_le_bytes());
        bytes[9..11].copy_from_slice(&hl.to_le_bytes());
        bytes[23..25].copy_from_slice(&sp.to_le_bytes());

        // stack contains the PC value at [bank3 page0, offset sp%PAGE_SIZE]
        let page0_start = SNA_HEADER_SIZE + 2 * PAGE_SIZE;
        let offset = sp as usize % PAGE_SIZE;
        bytes[page0_start + offset..page0_start + offset + 2]
            .copy_from_slice(&sp_value_on_stack.to_le_bytes());
        bytes
    }

    #[test]
    fn sna48_roundtrip_restores_pc_from_stack() {
        let bytes = build_sna48(0xAB, 0x1234, 0x5678, 0x9ABC, 0x8000, 0xFFF0);
        let staging = parse(&bytes).unwrap();
        let mut instance = fresh_instance();
        apply(&staging, &mut instance).unwrap();

        let regs = instance.cpu.registers();
        assert_eq!(regs.pc, 0x8000);
        assert_eq!(regs.bc, 0x1234);
        assert_eq!(regs.de, 0x5678);
        assert_eq!(regs.hl, 0x9ABC);
        assert_eq!(regs.af >> 8, 0xAB);
    }

    #[test]
    fn sna128_apply_reprograms_even_a_prelocked_port() {
        let mut instance = fresh_instance();
        instance.port_decoder.lock_paging();
        assert!(instance.port_decoder.is_locked());

        let mut bytes = vec![0u8; SNA128_TOTAL_SIZE];
        let ext_port_7ffd = 0b0000_0011u8; // bank3 <- RAM 3
        let ext_start = SNA_HEADER_SIZE + 3 * PAGE_SIZE;
        bytes[ext_start + 2] = ext_port_7ffd;

        let staging = parse(&bytes).unwrap();
        apply(&staging, &mut instance).unwrap();

        assert_eq!(
            instance.memory.bank_mapping(3),
            crate::memory::PageRef::ram(3)
        );
    }

    #[test]
    fn apply_failure_never_runs_because_parse_is_pure() {
        // parse() never touches an Instance; a bad file simply errors.
        let err = parse(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat(_)));
    }
}
