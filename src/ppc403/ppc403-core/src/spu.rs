use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Ppc403Config;
use crate::constants::spu::*;
use crate::error::{fatal, Ppc403Error, Result};

/// Where a serial direction sends its events, from SPRC/SPTC bits 6:5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialRouting {
    None,
    Interrupt,
    Dma(usize), // Channel 2 or 3
}

impl SerialRouting {
    fn decode(command: u8) -> Self {
        match (command >> SPXC_MODE_SHIFT) & SPXC_MODE_MASK {
            0 => SerialRouting::None,
            1 => SerialRouting::Interrupt,
            2 => SerialRouting::Dma(2),
            _ => SerialRouting::Dma(3),
        }
    }
}

/// Side effect the caller has to carry out after a register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpuWrite {
    Stored,
    ReceiveDma(usize), // Receiver enabled with DMA on this channel
    Transmit(u8),      // Byte written to the transmit buffer
}

/// Serial port unit registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPort {
    pub spls: u8,  // Line status
    pub sphs: u8,  // Handshake status
    pub brd: u16,  // Baud rate divisor (12 bits)
    pub spctl: u8, // Control
    pub sprc: u8,  // Receive command
    pub sptc: u8,  // Transmit command
    pub sprb: u8,  // Receive buffer
    pub sptb: u8,  // Transmit buffer
}

impl SerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive_routing(&self) -> SerialRouting {
        SerialRouting::decode(self.sprc)
    }

    pub fn transmit_routing(&self) -> SerialRouting {
        SerialRouting::decode(self.sptc)
    }

    pub fn receive_enabled(&self) -> bool {
        self.sprc & SPXC_ENABLE != 0
    }

    pub fn transmit_enabled(&self) -> bool {
        self.sptc & SPXC_ENABLE != 0
    }

    /// Whether the transmitter is bound to `channel` for buffered DMA
    pub fn transmits_via_dma(&self, channel: usize) -> bool {
        self.transmit_routing() == SerialRouting::Dma(channel)
    }

    /// Whether a byte written to SPTB should raise the transmit line
    pub fn transmit_interrupt(&self) -> bool {
        self.transmit_enabled() && self.transmit_routing() == SerialRouting::Interrupt
    }

    /// Effective line rate for the current divisor and clock selection
    pub fn baud_rate(&self, iocr: u32, config: &Ppc403Config) -> u32 {
        let clock = if iocr & IOCR_SPC != 0 {
            config.serial_clock_hz
        } else {
            config.system_clock_hz
        };
        (clock / (self.brd as u32 + 1)) / 16
    }

    /// Latch a byte from the line. Returns whether the receive interrupt
    /// line should be raised.
    pub fn receive_byte(&mut self, data: u8) -> bool {
        self.sprb = data;
        self.spls |= SPLS_RBR;
        self.receive_enabled() && self.receive_routing() == SerialRouting::Interrupt
    }

    pub fn read(&self, offset: u32) -> Result<u8> {
        match offset & SPU_WINDOW_MASK {
            // Transmit completes instantly, so the buffer always reads empty
            SPU_SPLS => Ok(self.spls | SPLS_TBR | SPLS_TSR),
            SPU_SPHS => Ok(self.sphs),
            SPU_BRDH => Ok(((self.brd >> 8) & 0xF) as u8),
            SPU_BRDL => Ok(self.brd as u8),
            SPU_SPCTL => Ok(self.spctl),
            SPU_SPRC => Ok(self.sprc),
            SPU_SPTC => Ok(self.sptc),
            SPU_SPRB => Ok(self.sprb),
            other => fatal(Ppc403Error::UnknownSpuRegister(other)),
        }
    }

    pub fn write(
        &mut self,
        offset: u32,
        data: u8,
        iocr: u32,
        config: &Ppc403Config,
    ) -> Result<SpuWrite> {
        match offset & SPU_WINDOW_MASK {
            SPU_SPLS => {
                // Only RBR, FE, OE, PE and LB are clearable; a 1 clears, a 0 keeps
                let clearable = SPLS_RBR | SPLS_FE | SPLS_OE | SPLS_PE | SPLS_LB;
                self.spls &= !(data & clearable);
            }
            SPU_SPHS => self.sphs = data,
            SPU_BRDH => self.brd = (self.brd & 0x00FF) | (((data & 0xF) as u16) << 8),
            SPU_BRDL => {
                self.brd = (self.brd & 0xFF00) | data as u16;
                info!("SPU baud rate: {}", self.baud_rate(iocr, config));
            }
            SPU_SPCTL => self.spctl = data,
            SPU_SPRC => {
                self.sprc = data;
                if let (true, SerialRouting::Dma(channel)) =
                    (self.receive_enabled(), self.receive_routing())
                {
                    return Ok(SpuWrite::ReceiveDma(channel));
                }
            }
            SPU_SPTC => self.sptc = data,
            SPU_SPRB => {
                self.sptb = data;
                debug!("SPU transmit 0x{:02X}", data);
                return Ok(SpuWrite::Transmit(data));
            }
            other => return fatal(Ppc403Error::UnknownSpuRegister(other)),
        }
        Ok(SpuWrite::Stored)
    }
}

#[cfg(test)]
mod spu_tests {
    use super::*;

    fn write(spu: &mut SerialPort, offset: u32, data: u8) -> SpuWrite {
        spu.write(offset, data, 0, &Ppc403Config::default()).unwrap()
    }

    #[test]
    fn line_status_clears_only_written_ones() {
        let mut spu = SerialPort::new();
        spu.spls = SPLS_RBR | SPLS_FE | SPLS_LB;
        write(&mut spu, SPU_SPLS, SPLS_FE);
        assert_eq!(spu.spls, SPLS_RBR | SPLS_LB);
        write(&mut spu, SPU_SPLS, 0);
        assert_eq!(spu.spls, SPLS_RBR | SPLS_LB);
        write(&mut spu, SPU_SPLS, 0xFF);
        assert_eq!(spu.spls, 0);
    }

    #[test]
    fn transmitter_always_reads_empty() {
        let spu = SerialPort::new();
        assert_eq!(spu.read(SPU_SPLS), Ok(SPLS_TBR | SPLS_TSR));
    }

    #[test]
    fn divisor_spans_two_registers() {
        let mut spu = SerialPort::new();
        write(&mut spu, SPU_BRDH, 0x01);
        write(&mut spu, SPU_BRDL, 0x0F);
        assert_eq!(spu.brd, 0x010F);
        assert_eq!(spu.read(SPU_BRDH), Ok(0x01));
        assert_eq!(spu.read(SPU_BRDL), Ok(0x0F));
    }

    #[test]
    fn baud_rate_follows_clock_select() {
        let mut spu = SerialPort::new();
        spu.brd = 1;
        let config = Ppc403Config::default();
        assert_eq!(spu.baud_rate(IOCR_SPC, &config), 3_686_400 / 2 / 16);
        assert_eq!(spu.baud_rate(0, &config), 33_333_333 / 2 / 16);
    }

    #[test]
    fn receive_command_reports_dma_channel() {
        let mut spu = SerialPort::new();
        assert_eq!(write(&mut spu, SPU_SPRC, 0x80 | (3 << 5)), SpuWrite::ReceiveDma(3));
        assert_eq!(write(&mut spu, SPU_SPRC, 0x80 | (1 << 5)), SpuWrite::Stored);
        assert_eq!(write(&mut spu, SPU_SPRC, 2 << 5), SpuWrite::Stored);
    }

    #[test]
    fn received_byte_interrupts_only_in_interrupt_mode() {
        let mut spu = SerialPort::new();
        spu.sprc = 0x80 | (1 << 5);
        assert!(spu.receive_byte(0x41));
        assert_eq!(spu.read(SPU_SPRB), Ok(0x41));
        assert_ne!(spu.spls & SPLS_RBR, 0);

        spu.sprc = 0x80 | (2 << 5);
        assert!(!spu.receive_byte(0x42));
        spu.sprc = 1 << 5;
        assert!(!spu.receive_byte(0x43));
    }

    #[test]
    fn transmit_buffer_write_hands_back_the_byte() {
        let mut spu = SerialPort::new();
        assert_eq!(write(&mut spu, SPU_SPRB, 0x5A), SpuWrite::Transmit(0x5A));
        assert_eq!(spu.sptb, 0x5A);
    }

    #[test]
    fn unpopulated_offsets_are_fatal() {
        let mut spu = SerialPort::new();
        assert_eq!(spu.read(0x1), Err(Ppc403Error::UnknownSpuRegister(0x1)));
        assert_eq!(
            spu.write(0xA, 0, 0, &Ppc403Config::default()),
            Err(Ppc403Error::UnknownSpuRegister(0xA))
        );
    }
}
