use log::error;
use thiserror::Error;

/// Fatal conditions: emulated hardware configurations this core does not model
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Ppc403Error {
    #[error("unimplemented DCR 0x{0:03X}")]
    UnknownDcr(u32),

    #[error("unimplemented 403 SPR 0x{0:03X}")]
    UnknownSpr(u32),

    #[error("unimplemented serial port register +0x{0:X}")]
    UnknownSpuRegister(u32),

    #[error("unhandled exception vector 0x{0:04X}")]
    UnknownException(u32),

    #[error("no interrupt line with id {0}")]
    UnknownIrqLine(u32),

    #[error("no DMA channel {0}")]
    InvalidDmaChannel(usize),

    #[error("DMA channel {channel}: fly-by DMA not implemented")]
    FlyByDma { channel: usize },

    #[error("DMA channel {channel}: hardware-initiated mem-to-mem DMA not implemented")]
    HardwareMemToMem { channel: usize },

    #[error("DMA channel {channel}: terminal count disabled (TCE == 0) not implemented")]
    TerminalCountDisabled { channel: usize },

    #[error("DMA channel {channel}: chaining not implemented")]
    ChainingRequested { channel: usize },

    #[error("DMA channel {channel}: transfer count is zero")]
    ZeroTransferCount { channel: usize },

    #[error("DMA channel {channel}: address 0x{address:08X} unaligned for {width}-byte transfer")]
    UnalignedTransfer {
        channel: usize,
        address: u32,
        width: u32,
    },
}

pub type Result<T> = core::result::Result<T, Ppc403Error>;

/// Log a fatal condition and hand it back as an `Err`
pub(crate) fn fatal<T>(err: Ppc403Error) -> Result<T> {
    error!("ppc403: {}", err);
    Err(err)
}
