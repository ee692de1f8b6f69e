mod debug;

pub use self::debug::{Breakpoints, BusErrorRegisters};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::constants::dcr::*;
use crate::dma::DmaController;
use crate::error::{fatal, Ppc403Error, Result};
use crate::interrupts::ExternalInterrupts;

/// Register access shared by every block mapped into DCR space.
/// Blocks only see indices the DCR file has already routed to them.
pub trait RegisterBlock {
    fn read(&self, dcr: u32) -> u32;
    fn write(&mut self, dcr: u32, value: u32);
}

/// What a DCR write did beyond storing the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcrWrite {
    Stored,
    DmaControl(usize), // Control register of this channel was written
}

/// Device control register space of the 403GA
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcrFile {
    pub bus_error: BusErrorRegisters,
    pub breakpoints: Breakpoints,
    pub interrupts: ExternalInterrupts,
    pub iocr: u32,
    pub dma: DmaController,
}

impl DcrFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a DCR index to the block that implements it
    fn block(&self, dcr: u32) -> Option<&dyn RegisterBlock> {
        match dcr {
            DCR_EXISR | DCR_EXIER => Some(&self.interrupts),
            DCR_BR0..=DCR_BR7 => Some(&self.breakpoints),
            DCR_BEAR | DCR_BESR => Some(&self.bus_error),
            _ if DmaController::owns(dcr) => Some(&self.dma),
            _ => None,
        }
    }

    fn block_mut(&mut self, dcr: u32) -> Option<&mut dyn RegisterBlock> {
        match dcr {
            DCR_EXISR | DCR_EXIER => Some(&mut self.interrupts),
            DCR_BR0..=DCR_BR7 => Some(&mut self.breakpoints),
            DCR_BEAR | DCR_BESR => Some(&mut self.bus_error),
            _ if DmaController::owns(dcr) => Some(&mut self.dma),
            _ => None,
        }
    }

    pub fn read(&self, dcr: u32) -> Result<u32> {
        if dcr == DCR_IOCR {
            return Ok(self.iocr);
        }
        match self.block(dcr) {
            Some(block) => Ok(block.read(dcr)),
            None => fatal(Ppc403Error::UnknownDcr(dcr)),
        }
    }

    /// Store `value`. Triggering a DMA channel is the caller's job; the
    /// returned `DcrWrite` says when one is due.
    pub fn write(&mut self, dcr: u32, value: u32) -> Result<DcrWrite> {
        trace!("DCR 0x{:03X} <- 0x{:08X}", dcr, value);
        if dcr == DCR_IOCR {
            self.iocr = value;
            return Ok(DcrWrite::Stored);
        }
        match self.block_mut(dcr) {
            Some(block) => block.write(dcr, value),
            None => return fatal(Ppc403Error::UnknownDcr(dcr)),
        }

        if DmaController::owns(dcr) && dcr != DCR_DMASR && (dcr - DCR_DMA_BASE) % DCR_DMA_STRIDE == DMA_CR {
            return Ok(DcrWrite::DmaControl(((dcr - DCR_DMA_BASE) / DCR_DMA_STRIDE) as usize));
        }
        Ok(DcrWrite::Stored)
    }
}

#[cfg(test)]
mod dcr_tests {
    use super::*;

    #[test]
    fn every_mapped_index_round_trips() {
        let mut dcr = DcrFile::new();
        let plain = [DCR_EXIER, DCR_BR0, DCR_BR7, DCR_BEAR, DCR_BESR, DCR_IOCR, DCR_DMASA0, DCR_DMADA0];
        for (i, index) in plain.iter().enumerate() {
            dcr.write(*index, 0x100 + i as u32).unwrap();
            assert_eq!(dcr.read(*index), Ok(0x100 + i as u32));
        }
    }

    #[test]
    fn unknown_index_is_fatal() {
        let mut dcr = DcrFile::new();
        assert_eq!(dcr.read(0x041), Err(Ppc403Error::UnknownDcr(0x041)));
        assert_eq!(dcr.write(0x0C4, 0), Err(Ppc403Error::UnknownDcr(0x0C4)));
        assert_eq!(dcr.write(0x0E1, 0), Err(Ppc403Error::UnknownDcr(0x0E1)));
    }

    #[test]
    fn control_register_write_requests_channel_execution() {
        let mut dcr = DcrFile::new();
        assert_eq!(dcr.write(DCR_DMACR2, 0), Ok(DcrWrite::DmaControl(2)));
        assert_eq!(dcr.write(DCR_DMACT0, 4), Ok(DcrWrite::Stored));
        assert_eq!(dcr.write(DCR_DMASR, 0), Ok(DcrWrite::Stored));
    }
}
