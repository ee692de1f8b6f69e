//! Four-channel DMA controller.
//!
//! A channel is idle until its control word is written with CE set; the
//! whole transfer then runs inside that DCR write (see `Ppc403::write_dcr`).
//! This module owns the channel registers, decodes the control word and
//! performs the memory side of each transfer. Routing a buffered transfer to
//! the serial port or a board endpoint is left to the caller.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::constants::dcr::*;
use crate::constants::dma::*;
use crate::constants::{dmasr_complete_bit, DMA_CHANNELS};
use crate::dcr::RegisterBlock;
use crate::error::{fatal, Ppc403Error, Result};

/// Bytes moved per iteration, from control word bits 27:26
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferWidth {
    Byte,
    Halfword,
    Word,
    Line, // Four consecutive words
}

impl TransferWidth {
    pub fn bytes(self) -> u32 {
        match self {
            TransferWidth::Byte => 1,
            TransferWidth::Halfword => 2,
            TransferWidth::Word => 4,
            TransferWidth::Line => 16,
        }
    }

    /// Address alignment the bus needs for this width
    fn alignment(self) -> u32 {
        match self {
            TransferWidth::Byte => 1,
            TransferWidth::Halfword => 2,
            TransferWidth::Word | TransferWidth::Line => 4,
        }
    }
}

/// Transfer mode, from control word bits 22:21
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Buffered,
    FlyBy,
    SoftwareMemToMem,
    HardwareMemToMem,
}

/// Read-only view of a channel control register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWord(pub u32);

impl ControlWord {
    pub fn enabled(self) -> bool {
        self.0 & DMA_CE != 0
    }

    pub fn interrupt_enabled(self) -> bool {
        self.0 & DMA_CIE != 0
    }

    pub fn peripheral_to_memory(self) -> bool {
        self.0 & DMA_TD != 0
    }

    pub fn dest_increment(self) -> bool {
        self.0 & DMA_DAI != 0
    }

    pub fn source_increment(self) -> bool {
        self.0 & DMA_SAI != 0
    }

    pub fn terminal_count_enabled(self) -> bool {
        self.0 & DMA_TCE != 0
    }

    pub fn chained(self) -> bool {
        self.0 & DMA_CH != 0
    }

    pub fn width(self) -> TransferWidth {
        match (self.0 >> DMA_PW_SHIFT) & 0x3 {
            0 => TransferWidth::Byte,
            1 => TransferWidth::Halfword,
            2 => TransferWidth::Word,
            _ => TransferWidth::Line,
        }
    }

    pub fn mode(self) -> TransferMode {
        match (self.0 >> DMA_TM_SHIFT) & 0x3 {
            0 => TransferMode::Buffered,
            1 => TransferMode::FlyBy,
            2 => TransferMode::SoftwareMemToMem,
            _ => TransferMode::HardwareMemToMem,
        }
    }
}

/// Register set of one channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaChannel {
    pub sa: u32, // Source address, advanced in place
    pub da: u32, // Destination address, advanced in place
    pub ct: u32, // Transfer count (16 bits)
    pub cr: u32, // Control word
}

/// Transfers this core can carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    MemoryToPeripheral, // Buffered, TD clear
    PeripheralToMemory, // Buffered, TD set
    MemoryToMemory,     // Software initiated
}

/// A validated transfer, decoded from the control word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub kind: TransferKind,
    pub width: TransferWidth,
    pub source_stride: u32,
    pub dest_stride: u32,
    pub count: u32,
    pub interrupt: bool, // Pulse the channel interrupt on completion
}

impl DmaChannel {
    pub fn control(&self) -> ControlWord {
        ControlWord(self.cr)
    }

    /// Decode the control word. `Ok(None)` means the channel is disabled;
    /// every configuration this core does not model is an error.
    pub fn plan(&self, channel: usize) -> Result<Option<TransferPlan>> {
        let cr = self.control();
        if !cr.enabled() {
            return Ok(None);
        }

        if !cr.terminal_count_enabled() {
            return fatal(Ppc403Error::TerminalCountDisabled { channel });
        }
        if cr.chained() {
            return fatal(Ppc403Error::ChainingRequested { channel });
        }

        let kind = match cr.mode() {
            TransferMode::Buffered if cr.peripheral_to_memory() => {
                TransferKind::PeripheralToMemory
            }
            TransferMode::Buffered => TransferKind::MemoryToPeripheral,
            TransferMode::SoftwareMemToMem => TransferKind::MemoryToMemory,
            TransferMode::FlyBy => return fatal(Ppc403Error::FlyByDma { channel }),
            TransferMode::HardwareMemToMem => {
                return fatal(Ppc403Error::HardwareMemToMem { channel })
            }
        };

        if self.ct == 0 {
            return fatal(Ppc403Error::ZeroTransferCount { channel });
        }

        let width = cr.width();
        if kind == TransferKind::MemoryToMemory {
            for address in [self.sa, self.da] {
                if address % width.alignment() != 0 {
                    return fatal(Ppc403Error::UnalignedTransfer {
                        channel,
                        address,
                        width: width.bytes(),
                    });
                }
            }
        }

        let stride = |increment: bool| if increment { width.bytes() } else { 0 };
        Ok(Some(TransferPlan {
            kind,
            width,
            source_stride: stride(cr.source_increment()),
            dest_stride: stride(cr.dest_increment()),
            count: self.ct,
            interrupt: cr.interrupt_enabled(),
        }))
    }

    /// Software-initiated memory-to-memory copy
    pub fn copy_memory(&mut self, plan: &TransferPlan, bus: &mut dyn Bus) {
        for _ in 0..plan.count {
            match plan.width {
                TransferWidth::Byte => {
                    let b = bus.read8(self.sa);
                    bus.write8(self.da, b);
                }
                TransferWidth::Halfword => {
                    let h = bus.read16(self.sa);
                    bus.write16(self.da, h);
                }
                TransferWidth::Word => {
                    let w = bus.read32(self.sa);
                    bus.write32(self.da, w);
                }
                TransferWidth::Line => {
                    let mut words = [0u32; 4];
                    for (i, word) in words.iter_mut().enumerate() {
                        *word = bus.read32(self.sa.wrapping_add(4 * i as u32));
                    }
                    for (i, word) in words.iter().enumerate() {
                        bus.write32(self.da.wrapping_add(4 * i as u32), *word);
                    }
                }
            }
            self.sa = self.sa.wrapping_add(plan.source_stride);
            self.da = self.da.wrapping_add(plan.dest_stride);
        }
    }

    /// Memory side of a buffered memory-to-peripheral transfer: `count`
    /// bytes starting at `sa`, advancing by the source stride
    pub fn read_block(&mut self, plan: &TransferPlan, bus: &mut dyn Bus) -> Vec<u8> {
        let mut block = Vec::with_capacity(plan.count as usize);
        for _ in 0..plan.count {
            block.push(bus.read8(self.sa));
            self.sa = self.sa.wrapping_add(plan.source_stride);
        }
        block
    }

    /// Store a received block at `da`, one byte per address
    pub fn write_block(&mut self, data: &[u8], bus: &mut dyn Bus) {
        for byte in data {
            bus.write8(self.da, *byte);
            self.da = self.da.wrapping_add(1);
        }
    }
}

/// The four channels plus the shared status register
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaController {
    pub channels: [DmaChannel; DMA_CHANNELS],
    pub dmasr: u32,
}

impl DmaController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel's completion bit in DMASR
    pub fn mark_complete(&mut self, channel: usize) {
        self.dmasr |= dmasr_complete_bit(channel);
        debug!("DMA {} complete (DMASR = 0x{:08X})", channel, self.dmasr);
    }

    /// DMA control register index of a channel
    pub fn control_register(channel: usize) -> u32 {
        DCR_DMACR0 + channel as u32 * DCR_DMA_STRIDE
    }

    fn decode(dcr: u32) -> (usize, u32) {
        let offset = dcr - DCR_DMA_BASE;
        ((offset / DCR_DMA_STRIDE) as usize, offset % DCR_DMA_STRIDE)
    }

    /// Whether `dcr` is a register of this controller
    pub fn owns(dcr: u32) -> bool {
        if dcr == DCR_DMASR {
            return true;
        }
        (DCR_DMA_BASE..=DCR_DMA_LAST).contains(&dcr) && Self::decode(dcr).1 <= DMA_SA
    }
}

impl RegisterBlock for DmaController {
    fn read(&self, dcr: u32) -> u32 {
        if dcr == DCR_DMASR {
            return self.dmasr;
        }
        let (ch, reg) = Self::decode(dcr);
        let channel = &self.channels[ch];
        match reg {
            DMA_CR => channel.cr,
            DMA_CT => channel.ct,
            DMA_DA => channel.da,
            _ => channel.sa,
        }
    }

    fn write(&mut self, dcr: u32, value: u32) {
        if dcr == DCR_DMASR {
            // Status bits are cleared by writing 1
            self.dmasr &= !value;
            return;
        }
        let (ch, reg) = Self::decode(dcr);
        let channel = &mut self.channels[ch];
        match reg {
            DMA_CR => channel.cr = value,
            DMA_CT => channel.ct = value & 0xFFFF,
            DMA_DA => channel.da = value,
            _ => channel.sa = value,
        }
    }
}
