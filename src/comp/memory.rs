//! Memory primitives over a shared [`AddressSpace`](crate::mem::AddressSpace).
//!
//! The write port is the clocked half: its save phase records the bytes a
//! write is about to clobber (or a sentinel when `wr_en` is low) so that a
//! reverse can restore exactly those cells. Asynchronous read ports are pure
//! value functions over the shared store; a synchronous read port is a latch
//! sampled during the save phase, like a register's output.
//!
//! `BYTE_INDEXED` selects byte addressing; a word-indexed memory shifts the
//! incoming address left by two.

use std::collections::VecDeque;

use crate::bits::{ceil_log2, mask};
use crate::design::Design;
use crate::graph::{ComponentKey, GraphicsType, PortKey};
use crate::mem::SharedAddressSpace;
use crate::state::{MemorySync, SyncState};

/// Bytes needed to carry a value of `data_width` bits.
fn data_bytes(data_width: u32) -> u32 {
    data_width.div_ceil(8)
}

/// Width of the `wr_width` port: it counts written bytes, 0..=data bytes.
fn wr_width_bits(data_width: u32) -> u32 {
    ceil_log2(u64::from(data_bytes(data_width)) + 1)
}

struct WritePorts {
    addr: PortKey,
    data_in: PortKey,
    wr_width: PortKey,
    wr_en: PortKey,
}

fn write_ports(d: &mut Design, comp: ComponentKey, addr_width: u32, data_width: u32) -> WritePorts {
    WritePorts {
        addr: d.add_input(comp, "addr", addr_width),
        data_in: d.add_input(comp, "data_in", data_width),
        wr_width: d.add_input(comp, "wr_width", wr_width_bits(data_width)),
        wr_en: d.add_input(comp, "wr_en", 1),
    }
}

/// A clocked memory write port. Has no outputs; its effect is the write
/// applied to the shared address space on each enabled clock edge.
#[derive(Debug, Clone, Copy)]
pub struct WrMemory<const BYTE_INDEXED: bool = true> {
    pub comp: ComponentKey,
    pub addr: PortKey,
    pub data_in: PortKey,
    pub wr_width: PortKey,
    pub wr_en: PortKey,
}

impl<const BYTE_INDEXED: bool> WrMemory<BYTE_INDEXED> {
    pub fn new(
        d: &mut Design,
        parent: ComponentKey,
        name: &str,
        addr_width: u32,
        data_width: u32,
        space: &SharedAddressSpace,
    ) -> Self {
        let comp = d.add_component_with_type(parent, name, GraphicsType::ClockedComponent);
        let ports = write_ports(d, comp, addr_width, data_width);
        d.register_synchronous(
            comp,
            MemorySync {
                addr: ports.addr,
                data_in: ports.data_in,
                wr_width: ports.wr_width,
                wr_en: ports.wr_en,
                rd_en: None,
                read_bits: 0,
                byte_indexed: BYTE_INDEXED,
                space: space.clone(),
            }
            .into(),
            SyncState::Memory { saved: 0, stack: VecDeque::new() },
        );
        Self {
            comp,
            addr: ports.addr,
            data_in: ports.data_in,
            wr_width: ports.wr_width,
            wr_en: ports.wr_en,
        }
    }
}

/// A combinational (asynchronous) memory read port: `data_out` follows
/// `addr` within the cycle while `rd_en` is high, and holds its previous
/// value otherwise. Drawn with the clocked glyph.
#[derive(Debug, Clone, Copy)]
pub struct RdMemory<const BYTE_INDEXED: bool = true> {
    pub comp: ComponentKey,
    pub addr: PortKey,
    pub rd_en: PortKey,
    pub data_out: PortKey,
}

impl<const BYTE_INDEXED: bool> RdMemory<BYTE_INDEXED> {
    pub fn new(
        d: &mut Design,
        parent: ComponentKey,
        name: &str,
        addr_width: u32,
        data_width: u32,
        space: &SharedAddressSpace,
    ) -> Self {
        let comp = d.add_component_with_type(parent, name, GraphicsType::ClockedComponent);
        let addr = d.add_input(comp, "addr", addr_width);
        let rd_en = d.add_input(comp, "rd_en", 1);
        let data_out = d.add_output(comp, "data_out", data_width);
        let space = space.clone();
        d.set_value_fn(data_out, move |s| {
            if s.uvalue(rd_en) & 1 != 0 {
                let addr = if BYTE_INDEXED { s.uvalue(addr) } else { s.uvalue(addr) << 2 };
                let word = space
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .read_value(addr, data_bytes(data_width));
                Ok(word & mask(data_width))
            } else {
                Ok(s.uvalue(data_out))
            }
        });
        Self { comp, addr, rd_en, data_out }
    }
}

/// A read-only memory: a read port over a pre-loaded address space.
pub type Rom<const BYTE_INDEXED: bool = true> = RdMemory<BYTE_INDEXED>;

/// A clocked memory with a synchronous read port: the write port of
/// [`WrMemory`] plus a `data_out` latched at the clock edge, so reads become
/// visible one cycle after the address is presented. The latch is sampled
/// during the save phase (after this port's own write) from the pre-edge
/// address and `rd_en`, so the result is independent of propagation order.
#[derive(Debug, Clone, Copy)]
pub struct MemorySyncRd<const BYTE_INDEXED: bool = true> {
    pub comp: ComponentKey,
    pub addr: PortKey,
    pub data_in: PortKey,
    pub wr_width: PortKey,
    pub wr_en: PortKey,
    pub rd_en: PortKey,
    pub data_out: PortKey,
}

impl<const BYTE_INDEXED: bool> MemorySyncRd<BYTE_INDEXED> {
    pub fn new(
        d: &mut Design,
        parent: ComponentKey,
        name: &str,
        addr_width: u32,
        data_width: u32,
        space: &SharedAddressSpace,
    ) -> Self {
        let comp = d.add_component_with_type(parent, name, GraphicsType::ClockedComponent);
        let ports = write_ports(d, comp, addr_width, data_width);
        let rd_en = d.add_input(comp, "rd_en", 1);
        let data_out = d.add_output_with(comp, "data_out", data_width, move |s| Ok(s.saved(comp)));
        d.register_synchronous(
            comp,
            MemorySync {
                addr: ports.addr,
                data_in: ports.data_in,
                wr_width: ports.wr_width,
                wr_en: ports.wr_en,
                rd_en: Some(rd_en),
                read_bits: data_width,
                byte_indexed: BYTE_INDEXED,
                space: space.clone(),
            }
            .into(),
            SyncState::Memory { saved: 0, stack: VecDeque::new() },
        );
        Self {
            comp,
            addr: ports.addr,
            data_in: ports.data_in,
            wr_width: ports.wr_width,
            wr_en: ports.wr_en,
            rd_en,
            data_out,
        }
    }
}

/// A write port and an asynchronous read port sharing one address space,
/// wired through a compound component.
#[derive(Debug, Clone, Copy)]
pub struct MemoryAsyncRd<const BYTE_INDEXED: bool = true> {
    pub comp: ComponentKey,
    pub addr: PortKey,
    pub data_in: PortKey,
    pub wr_width: PortKey,
    pub wr_en: PortKey,
    pub rd_en: PortKey,
    pub data_out: PortKey,
    pub wr_mem: WrMemory<BYTE_INDEXED>,
    pub rd_mem: RdMemory<BYTE_INDEXED>,
}

impl<const BYTE_INDEXED: bool> MemoryAsyncRd<BYTE_INDEXED> {
    pub fn new(
        d: &mut Design,
        parent: ComponentKey,
        name: &str,
        addr_width: u32,
        data_width: u32,
        space: &SharedAddressSpace,
    ) -> Self {
        let comp = d.add_component_with_type(parent, name, GraphicsType::ClockedComponent);
        let addr = d.add_input(comp, "addr", addr_width);
        let data_in = d.add_input(comp, "data_in", data_width);
        let wr_width = d.add_input(comp, "wr_width", wr_width_bits(data_width));
        let wr_en = d.add_input(comp, "wr_en", 1);
        let rd_en = d.add_input(comp, "rd_en", 1);
        let data_out = d.add_output(comp, "data_out", data_width);

        let wr_mem = WrMemory::new(d, comp, "wr_mem", addr_width, data_width, space);
        let rd_mem = RdMemory::new(d, comp, "rd_mem", addr_width, data_width, space);

        for (from, to) in [
            (addr, wr_mem.addr),
            (data_in, wr_mem.data_in),
            (wr_width, wr_mem.wr_width),
            (wr_en, wr_mem.wr_en),
            (addr, rd_mem.addr),
            (rd_en, rd_mem.rd_en),
            (rd_mem.data_out, data_out),
        ] {
            d.connect(from, to).expect("freshly created ports cannot collide");
        }

        Self { comp, addr, data_in, wr_width, wr_en, rd_en, data_out, wr_mem, rd_mem }
    }
}
