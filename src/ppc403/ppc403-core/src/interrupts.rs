use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::dcr::{DCR_EXIER, DCR_EXISR};
use crate::constants::exi::*;
use crate::constants::pending::PENDING_EXTERNAL;
use crate::constants::DMA_CHANNELS;
use crate::dcr::RegisterBlock;
use crate::error::{fatal, Ppc403Error, Result};

/// Interrupt inputs of the 403 external interrupt controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    External(u8), // IRQ0-IRQ4, level sensitive
    SpuReceive,
    SpuTransmit,
    Critical,
}

impl IrqLine {
    /// EXISR/EXIER bit owned by this line
    pub fn mask(self) -> u32 {
        match self {
            IrqLine::External(n) if n < EXTERNAL_IRQ_LINES => EXI_IRQ0 >> n,
            IrqLine::External(_) => 0,
            IrqLine::SpuReceive => EXI_SPU_RX,
            IrqLine::SpuTransmit => EXI_SPU_TX,
            IrqLine::Critical => EXI_CRITICAL,
        }
    }
}

/// Board-level line numbering: 0-4 external IRQs, 5 SPU RX, 6 SPU TX, 7 critical
impl TryFrom<u32> for IrqLine {
    type Error = Ppc403Error;

    fn try_from(id: u32) -> Result<Self> {
        match id {
            0..=4 => Ok(IrqLine::External(id as u8)),
            5 => Ok(IrqLine::SpuReceive),
            6 => Ok(IrqLine::SpuTransmit),
            7 => Ok(IrqLine::Critical),
            _ => fatal(Ppc403Error::UnknownIrqLine(id)),
        }
    }
}

/// EXISR bit for a DMA channel's completion interrupt
pub fn dma_irq_mask(channel: usize) -> u32 {
    EXI_DMA0 >> channel
}

/// External interrupt status and enable registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalInterrupts {
    pub exisr: u32, // Status: set by sources, cleared by acknowledgement
    pub exier: u32, // Enable
}

impl ExternalInterrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch `mask` if enabled and flag the external class pending.
    /// Returns whether the request was accepted.
    pub fn request(&mut self, mask: u32, pending: &mut u8) -> bool {
        if self.exier & mask == 0 {
            return false;
        }
        self.exisr |= mask;
        *pending |= PENDING_EXTERNAL;
        true
    }

    /// Drive a line. Generic lines clear their status bit on de-assertion;
    /// the SPU lines only ever latch. The critical line is routed by the
    /// caller and never reaches here.
    pub fn set_line(&mut self, line: IrqLine, asserted: bool, pending: &mut u8) {
        let mask = line.mask();
        if asserted {
            if self.request(mask, pending) {
                debug!("IRQ {:?} latched (EXISR = 0x{:08X})", line, self.exisr);
            }
        } else if let IrqLine::External(_) = line {
            self.exisr &= !mask;
        }
    }

    /// Momentary DMA completion request. De-assertion has no effect.
    pub fn pulse_dma(&mut self, channel: usize, asserted: bool, pending: &mut u8) -> Result<()> {
        if channel >= DMA_CHANNELS {
            return fatal(Ppc403Error::InvalidDmaChannel(channel));
        }
        if asserted {
            self.request(dma_irq_mask(channel), pending);
        }
        Ok(())
    }
}

impl RegisterBlock for ExternalInterrupts {
    fn read(&self, dcr: u32) -> u32 {
        match dcr {
            DCR_EXISR => self.exisr,
            DCR_EXIER => self.exier,
            _ => 0,
        }
    }

    fn write(&mut self, dcr: u32, value: u32) {
        match dcr {
            // Acknowledge: every 1 bit clears the matching status bit
            DCR_EXISR => self.exisr &= !value,
            DCR_EXIER => self.exier = value,
            _ => {}
        }
    }
}
