// Number of DMA channels on the 403GA
pub const DMA_CHANNELS: usize = 4;

// Number of general breakpoint registers
pub const BREAKPOINT_REGISTERS: usize = 8;

pub mod dcr {
    // External interrupt controller
    pub const DCR_EXISR: u32 = 0x040;
    pub const DCR_EXIER: u32 = 0x042;

    // Breakpoint registers BR0-BR7
    pub const DCR_BR0: u32 = 0x080;
    pub const DCR_BR7: u32 = 0x087;

    // Bus error address/syndrome
    pub const DCR_BEAR: u32 = 0x090;
    pub const DCR_BESR: u32 = 0x091;

    // I/O configuration
    pub const DCR_IOCR: u32 = 0x0A0;

    // DMA channel blocks: channel n lives at DCR_DMA_BASE + n * DCR_DMA_STRIDE
    pub const DCR_DMA_BASE: u32 = 0x0C0;
    pub const DCR_DMA_STRIDE: u32 = 0x8;
    pub const DCR_DMA_LAST: u32 = DCR_DMA_BASE + 3 * DCR_DMA_STRIDE + DMA_SA;

    // Offsets within a channel block
    pub const DMA_CR: u32 = 0x0;
    pub const DMA_CT: u32 = 0x1;
    pub const DMA_DA: u32 = 0x2;
    pub const DMA_SA: u32 = 0x3;

    pub const DCR_DMACR0: u32 = DCR_DMA_BASE + DMA_CR;
    pub const DCR_DMACT0: u32 = DCR_DMA_BASE + DMA_CT;
    pub const DCR_DMADA0: u32 = DCR_DMA_BASE + DMA_DA;
    pub const DCR_DMASA0: u32 = DCR_DMA_BASE + DMA_SA;
    pub const DCR_DMACR1: u32 = DCR_DMACR0 + DCR_DMA_STRIDE;
    pub const DCR_DMACR2: u32 = DCR_DMACR0 + 2 * DCR_DMA_STRIDE;
    pub const DCR_DMACR3: u32 = DCR_DMACR0 + 3 * DCR_DMA_STRIDE;

    // DMA status
    pub const DCR_DMASR: u32 = 0x0E0;
}

pub mod spr {
    // 403-specific special purpose registers handled by this core
    pub const SPR_EVPR: u32 = 0x3D6;
    pub const SPR_TSR: u32 = 0x3D8;
    pub const SPR_TCR: u32 = 0x3DA;
    pub const SPR_PIT: u32 = 0x3DB;
    pub const SPR_TBHI: u32 = 0x3DC;
    pub const SPR_TBLO: u32 = 0x3DD;
    pub const SPR_SRR2: u32 = 0x3DE;
    pub const SPR_SRR3: u32 = 0x3DF;
}

pub mod msr {
    pub const MSR_WE: u32 = 0x0004_0000; // Wait state enable
    pub const MSR_CE: u32 = 0x0002_0000; // Critical interrupt enable
    pub const MSR_ILE: u32 = 0x0001_0000; // Interrupt little-endian
    pub const MSR_EE: u32 = 0x0000_8000; // External interrupt enable
    pub const MSR_PR: u32 = 0x0000_4000; // Problem state
    pub const MSR_ME: u32 = 0x0000_1000; // Machine check enable
    pub const MSR_DE: u32 = 0x0000_0200; // Debug exception enable
    pub const MSR_IP: u32 = 0x0000_0040; // Interrupt prefix
    pub const MSR_IR: u32 = 0x0000_0020; // Instruction relocate
    pub const MSR_DR: u32 = 0x0000_0010; // Data relocate
    pub const MSR_PE: u32 = 0x0000_0008; // Protection enable
    pub const MSR_PX: u32 = 0x0000_0004; // Protection exclusive
    pub const MSR_LE: u32 = 0x0000_0001; // Little-endian
}

pub mod exceptions {
    // Vector offsets ORed with EVPR
    pub const VECTOR_CRITICAL: u32 = 0x0100;
    pub const VECTOR_EXTERNAL: u32 = 0x0500;
    pub const VECTOR_PROGRAM: u32 = 0x0700;
    pub const VECTOR_SYSTEM_CALL: u32 = 0x0C00;
    pub const VECTOR_PIT: u32 = 0x1000;
    pub const VECTOR_FIT: u32 = 0x1010;
    pub const VECTOR_WATCHDOG: u32 = 0x1020;

    // Vector base used by trap/system call while MSR[IP] is set
    pub const HIGH_VECTOR_BASE: u32 = 0xFFF0_0000;
}

pub mod pending {
    // Bits of MachineState::interrupt_pending
    pub const PENDING_EXTERNAL: u8 = 0x1;
    pub const PENDING_PIT: u8 = 0x2;
    pub const PENDING_FIT: u8 = 0x4;
}

pub mod exi {
    // EXISR / EXIER bit assignments
    pub const EXI_CRITICAL: u32 = 0x8000_0000;
    pub const EXI_SPU_RX: u32 = 0x0800_0000;
    pub const EXI_SPU_TX: u32 = 0x0400_0000;
    pub const EXI_DMA0: u32 = 0x0080_0000; // DMA n = EXI_DMA0 >> n
    pub const EXI_IRQ0: u32 = 0x0000_0010; // IRQ n = EXI_IRQ0 >> n

    pub const EXTERNAL_IRQ_LINES: u8 = 5;
}

pub mod dma {
    // Channel control word fields
    pub const DMA_CE: u32 = 0x8000_0000; // Channel enable
    pub const DMA_CIE: u32 = 0x4000_0000; // Channel interrupt enable
    pub const DMA_TD: u32 = 0x2000_0000; // Transfer direction (1 = peripheral to memory)
    pub const DMA_PW_SHIFT: u32 = 26; // Peripheral width (2 bits)
    pub const DMA_DAI: u32 = 0x0200_0000; // Destination address increment
    pub const DMA_SAI: u32 = 0x0100_0000; // Source address increment
    pub const DMA_TM_SHIFT: u32 = 21; // Transfer mode (2 bits)
    pub const DMA_TCE: u32 = 0x0000_0100; // Terminal count enable
    pub const DMA_CH: u32 = 0x0000_0080; // Chaining enable

    // DMASR completion bit for channel n is 1 << (DMASR_TS_BIT - n)
    pub const DMASR_TS_BIT: u32 = 27;
}

pub mod timers {
    // TCR fields
    pub const TCR_WP_SHIFT: u32 = 30; // Watchdog period (2 bits)
    pub const TCR_WIE: u32 = 0x0800_0000; // Watchdog interrupt enable
    pub const TCR_PIE: u32 = 0x0400_0000; // PIT interrupt enable
    pub const TCR_FP_SHIFT: u32 = 24; // FIT period (2 bits)
    pub const TCR_FIE: u32 = 0x0080_0000; // FIT interrupt enable
    pub const TCR_ARE: u32 = 0x0040_0000; // PIT auto-reload enable

    // TSR status bits
    pub const TSR_PIS: u32 = 0x0800_0000; // PIT interrupt status
    pub const TSR_FIS: u32 = 0x0400_0000; // FIT interrupt status

    // Time-base bits selected by TCR[FP] and TCR[WP]
    pub const FIT_BITS: [u32; 4] = [1 << 8, 1 << 12, 1 << 16, 1 << 20];
    pub const WDT_BITS: [u32; 4] = [1 << 16, 1 << 20, 1 << 24, 1 << 28];
}

pub mod spu {
    // Byte register offsets in the serial port window
    pub const SPU_SPLS: u32 = 0x0;
    pub const SPU_SPHS: u32 = 0x2;
    pub const SPU_BRDH: u32 = 0x4;
    pub const SPU_BRDL: u32 = 0x5;
    pub const SPU_SPCTL: u32 = 0x6;
    pub const SPU_SPRC: u32 = 0x7;
    pub const SPU_SPTC: u32 = 0x8;
    pub const SPU_SPRB: u32 = 0x9; // SPTB on write
    pub const SPU_WINDOW_MASK: u32 = 0xF;

    // Line status bits
    pub const SPLS_RBR: u8 = 0x80; // Receive buffer ready
    pub const SPLS_FE: u8 = 0x40; // Framing error
    pub const SPLS_OE: u8 = 0x20; // Overrun error
    pub const SPLS_PE: u8 = 0x10; // Parity error
    pub const SPLS_LB: u8 = 0x08; // Line break
    pub const SPLS_TBR: u8 = 0x04; // Transmit buffer ready
    pub const SPLS_TSR: u8 = 0x02; // Transmit shift register empty

    // Receive/transmit command fields
    pub const SPXC_ENABLE: u8 = 0x80;
    pub const SPXC_MODE_SHIFT: u8 = 5;
    pub const SPXC_MODE_MASK: u8 = 0x3;

    // IOCR bit selecting the external serial clock
    pub const IOCR_SPC: u32 = 0x2;
}

pub mod clocks {
    pub const SYSTEM_CLOCK_HZ: u32 = 33_333_333;
    pub const SERIAL_CLOCK_HZ: u32 = 3_686_400;
}

use self::dma::DMASR_TS_BIT;

/// DMASR completion bit for a DMA channel
pub const fn dmasr_complete_bit(channel: usize) -> u32 {
    1 << (DMASR_TS_BIT - channel as u32)
}
