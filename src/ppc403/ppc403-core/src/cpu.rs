//! The 403 on-chip peripheral core.
//!
//! `Ppc403` owns every on-chip register (DCR file, timers, serial port) and
//! is driven by an outer interpreter at instruction boundaries. The
//! interpreter keeps the `MachineState` and lends it to each call, so
//! exception entry can rewrite the program counter and MSR in place.
//!
//! A run looks like:
//!
//! ```text
//! begin_run(state, budget)
//! loop while state.icount > 0:
//!     execute one instruction (may call read_dcr/write_dcr/read_spr/...)
//!     state.icount -= 1
//!     tick_timers(state)
//!     dispatch_pending(state)
//! end_run(state)
//! ```
//!
//! `execute` is that loop, driving an `Executor`.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::config::Ppc403Config;
use crate::constants::exi::EXI_CRITICAL;
use crate::constants::pending::*;
use crate::constants::spr::*;
use crate::constants::spu::SPLS_RBR;
use crate::constants::timers::{TSR_FIS, TSR_PIS};
use crate::constants::DMA_CHANNELS;
use crate::dcr::{DcrFile, DcrWrite};
use crate::dma::{TransferKind, TransferPlan};
use crate::error::{fatal, Ppc403Error, Result};
use crate::exceptions::{self, ExceptionKind};
use crate::interrupts::IrqLine;
use crate::periph::{DmaEndpoint, DmaSource, Peripherals, SerialRx, SerialTx};
use crate::spu::{SerialPort, SpuWrite};
use crate::state::MachineState;
use crate::timers::Timers;

/// Outcome of one instruction, as reported by an `Executor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Retired,
    Exception(ExceptionKind), // Trap or system call raised by the instruction
}

/// The instruction interpreter sitting on top of the core.
///
/// Before `step` is called, `state.pc` holds the instruction to execute and
/// `state.npc` is preset to `pc + 4`. Branches overwrite `npc`.
pub trait Executor {
    fn step(
        &mut self,
        core: &mut Ppc403,
        state: &mut MachineState,
        bus: &mut dyn Bus,
    ) -> Result<Step>;
}

#[derive(Default, Serialize, Deserialize)]
pub struct Ppc403 {
    pub config: Ppc403Config,
    pub dcr: DcrFile,
    pub timers: Timers,
    pub spu: SerialPort,

    #[serde(skip)]
    periph: Peripherals,
}

impl Ppc403 {
    pub fn new(config: Ppc403Config) -> Self {
        Self {
            config,
            dcr: DcrFile::new(),
            timers: Timers::new(),
            spu: SerialPort::new(),
            periph: Peripherals::default(),
        }
    }

    pub fn set_serial_tx(&mut self, tx: Box<dyn SerialTx>) {
        self.periph.serial_tx = Some(tx);
    }

    pub fn set_serial_rx(&mut self, rx: Box<dyn SerialRx>) {
        self.periph.serial_rx = Some(rx);
    }

    /// Endpoint for buffered memory-to-peripheral transfers on `channel`
    /// that are not bound to the serial port
    pub fn set_dma_endpoint(&mut self, channel: usize, endpoint: Box<dyn DmaEndpoint>) -> Result<()> {
        match self.periph.dma_endpoints.get_mut(channel) {
            Some(slot) => {
                *slot = Some(endpoint);
                Ok(())
            }
            None => fatal(Ppc403Error::InvalidDmaChannel(channel)),
        }
    }

    /// Source for serial receive DMA on `channel`. Takes precedence over the
    /// serial receive hook when SPRC routes to that channel.
    pub fn set_dma_source(&mut self, channel: usize, source: Box<dyn DmaSource>) -> Result<()> {
        match self.periph.dma_sources.get_mut(channel) {
            Some(slot) => {
                *slot = Some(source);
                Ok(())
            }
            None => fatal(Ppc403Error::InvalidDmaChannel(channel)),
        }
    }

    // ----------------------------------------------------------------------
    // DCR space

    pub fn read_dcr(&self, index: u32) -> Result<u32> {
        self.dcr.read(index)
    }

    /// Store a DCR. Writing a channel control register runs the whole
    /// transfer before returning.
    pub fn write_dcr(
        &mut self,
        state: &mut MachineState,
        bus: &mut dyn Bus,
        index: u32,
        value: u32,
    ) -> Result<()> {
        match self.dcr.write(index, value)? {
            DcrWrite::Stored => Ok(()),
            DcrWrite::DmaControl(channel) => self.attempt_channel_execution(state, bus, channel),
        }
    }

    /// Run `channel` to completion if its control word enables it
    pub fn attempt_channel_execution(
        &mut self,
        state: &mut MachineState,
        bus: &mut dyn Bus,
        channel: usize,
    ) -> Result<()> {
        if channel >= DMA_CHANNELS {
            return fatal(Ppc403Error::InvalidDmaChannel(channel));
        }
        let plan = match self.dcr.dma.channels[channel].plan(channel)? {
            Some(plan) => plan,
            None => return Ok(()),
        };

        let ch = &self.dcr.dma.channels[channel];
        debug!(
            "DMA {}: {:?} x{} of {} bytes, 0x{:08X} -> 0x{:08X}",
            channel,
            plan.kind,
            plan.count,
            plan.width.bytes(),
            ch.sa,
            ch.da
        );

        match plan.kind {
            TransferKind::MemoryToMemory => {
                self.dcr.dma.channels[channel].copy_memory(&plan, bus);
            }
            TransferKind::MemoryToPeripheral => {
                self.buffered_transmit(state, bus, channel, &plan);
            }
            TransferKind::PeripheralToMemory => {
                // Serial receive DMA is started from SPRC, not from here
                debug!("DMA {}: no peripheral source, nothing transferred", channel);
            }
        }

        self.complete_channel(state, channel, plan.interrupt)
    }

    fn buffered_transmit(
        &mut self,
        state: &mut MachineState,
        bus: &mut dyn Bus,
        channel: usize,
        plan: &TransferPlan,
    ) {
        let block = self.dcr.dma.channels[channel].read_block(plan, bus);

        if self.spu.transmits_via_dma(channel) {
            if let Some(tx) = self.periph.serial_tx.as_mut() {
                tx.transmit_block(&block);
            }
            self.set_irq_line(state, IrqLine::SpuTransmit, true);
        } else if let Some(endpoint) = self.periph.dma_endpoints[channel].as_mut() {
            endpoint.write_block(&block);
        } else {
            debug!("DMA {}: no endpoint, {} bytes dropped", channel, block.len());
        }
    }

    /// Completion bit is always set; the interrupt only when enabled
    fn complete_channel(&mut self, state: &mut MachineState, channel: usize, interrupt: bool) -> Result<()> {
        self.dcr.dma.mark_complete(channel);
        if interrupt {
            self.signal_dma_irq(state, channel, true)?;
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Interrupt inputs

    pub fn set_irq_line(&mut self, state: &mut MachineState, line: IrqLine, asserted: bool) {
        match line {
            IrqLine::Critical => {
                if asserted && self.dcr.interrupts.exier & EXI_CRITICAL != 0 {
                    self.take_exception(state, ExceptionKind::Critical);
                }
            }
            _ => self
                .dcr
                .interrupts
                .set_line(line, asserted, &mut state.interrupt_pending),
        }
    }

    pub fn signal_dma_irq(&mut self, state: &mut MachineState, channel: usize, asserted: bool) -> Result<()> {
        self.dcr
            .interrupts
            .pulse_dma(channel, asserted, &mut state.interrupt_pending)
    }

    // ----------------------------------------------------------------------
    // Serial port

    pub fn spu_read(&self, offset: u32) -> Result<u8> {
        self.spu.read(offset)
    }

    pub fn spu_write(
        &mut self,
        state: &mut MachineState,
        bus: &mut dyn Bus,
        offset: u32,
        data: u8,
    ) -> Result<()> {
        match self.spu.write(offset, data, self.dcr.iocr, &self.config)? {
            SpuWrite::Stored => Ok(()),
            SpuWrite::ReceiveDma(channel) => self.receive_dma(state, bus, channel),
            SpuWrite::Transmit(byte) => {
                if let Some(tx) = self.periph.serial_tx.as_mut() {
                    tx.transmit(byte);
                }
                if self.spu.transmit_interrupt() {
                    self.set_irq_line(state, IrqLine::SpuTransmit, true);
                }
                Ok(())
            }
        }
    }

    /// Pull a whole block from the receive source into memory at the
    /// channel's destination address
    fn receive_dma(&mut self, state: &mut MachineState, bus: &mut dyn Bus, channel: usize) -> Result<()> {
        let ch = &self.dcr.dma.channels[channel];
        let control = ch.control();
        if !control.enabled() {
            return Ok(());
        }

        let mut block = vec![0u8; ch.ct as usize];
        if let Some(source) = self.periph.dma_sources[channel].as_mut() {
            source.read_block(&mut block);
        } else if let Some(rx) = self.periph.serial_rx.as_mut() {
            rx.receive_block(&mut block);
        } else {
            warn!("SPU receive DMA on channel {} with no receive source", channel);
            return Ok(());
        }
        debug!("SPU receive DMA: {} bytes -> 0x{:08X}", block.len(), ch.da);
        self.dcr.dma.channels[channel].write_block(&block, bus);
        self.complete_channel(state, channel, control.interrupt_enabled())?;

        self.spu.spls |= SPLS_RBR;
        self.set_irq_line(state, IrqLine::SpuReceive, true);
        Ok(())
    }

    /// A byte arriving on the serial line
    pub fn spu_receive_byte(&mut self, state: &mut MachineState, data: u8) {
        if self.spu.receive_byte(data) {
            self.set_irq_line(state, IrqLine::SpuReceive, true);
        }
    }

    // ----------------------------------------------------------------------
    // 403 special purpose registers

    pub fn read_spr(&self, state: &MachineState, spr: u32) -> Result<u32> {
        match spr {
            SPR_EVPR => Ok(state.evpr),
            SPR_TSR => Ok(self.timers.tsr),
            SPR_TCR => Ok(self.timers.tcr),
            SPR_PIT => Ok(self.timers.pit_counter),
            SPR_TBHI => Ok((self.time_base(state) >> 32) as u32),
            SPR_TBLO => Ok(self.time_base(state) as u32),
            SPR_SRR2 => Ok(state.srr2),
            SPR_SRR3 => Ok(state.srr3),
            _ => fatal(Ppc403Error::UnknownSpr(spr)),
        }
    }

    pub fn write_spr(&mut self, state: &mut MachineState, spr: u32, value: u32) -> Result<()> {
        trace!("SPR 0x{:03X} <- 0x{:08X}", spr, value);
        match spr {
            SPR_EVPR => state.evpr = value,
            SPR_TSR => self.timers.write_tsr(value),
            SPR_TCR => {
                self.timers.write_tcr(value);
                let tb = self.time_base(state);
                self.timers.schedule_fit(tb, state.icount);
            }
            SPR_PIT => self.timers.write_pit(value),
            SPR_TBHI => {
                let tb = (self.time_base(state) & 0xFFFF_FFFF) | ((value as u64) << 32);
                self.set_time_base(state, tb);
            }
            SPR_TBLO => {
                let tb = (self.time_base(state) & !0xFFFF_FFFF) | value as u64;
                self.set_time_base(state, tb);
            }
            SPR_SRR2 => state.srr2 = value,
            SPR_SRR3 => state.srr3 = value,
            _ => return fatal(Ppc403Error::UnknownSpr(spr)),
        }
        Ok(())
    }

    /// Live time base: the stored value plus what the current run retired
    fn time_base(&self, state: &MachineState) -> u64 {
        state
            .tb
            .wrapping_add(self.timers.retired(state) as i64 as u64)
    }

    fn set_time_base(&self, state: &mut MachineState, tb: u64) {
        state.tb = tb.wrapping_sub(self.timers.retired(state) as i64 as u64);
    }

    // ----------------------------------------------------------------------
    // Instruction boundary hooks

    /// Start a run of `budget` instructions
    pub fn begin_run(&mut self, state: &mut MachineState, budget: i32) {
        state.icount = budget;
        self.timers.begin_run(state.tb, budget);
    }

    /// Advance the timers by one retired instruction
    pub fn tick_timers(&mut self, state: &mut MachineState) {
        self.timers.tick(state);
    }

    /// Service the highest-priority pending class, if MSR[EE] allows.
    /// At most one exception is taken per call.
    pub fn dispatch_pending(&mut self, state: &mut MachineState) -> Option<ExceptionKind> {
        if !state.external_interrupts_enabled() {
            return None;
        }
        let pending = state.interrupt_pending;
        let kind = if pending & PENDING_EXTERNAL != 0 {
            ExceptionKind::External
        } else if pending & PENDING_PIT != 0 {
            ExceptionKind::ProgrammableIntervalTimer
        } else if pending & PENDING_FIT != 0 {
            ExceptionKind::FixedIntervalTimer
        } else {
            return None;
        };
        self.take_exception(state, kind);
        Some(kind)
    }

    /// Close the run and fold the retired instructions into the time base.
    /// Returns the number retired.
    pub fn end_run(&mut self, state: &mut MachineState) -> i32 {
        let retired = self.timers.end_run(state);
        state.tb = state.tb.wrapping_add(retired as i64 as u64);
        retired
    }

    /// Enter an exception, including the status side effects of its class
    pub fn take_exception(&mut self, state: &mut MachineState, kind: ExceptionKind) {
        match kind {
            ExceptionKind::Critical => self.dcr.interrupts.exisr |= EXI_CRITICAL,
            ExceptionKind::ProgrammableIntervalTimer => self.timers.tsr |= TSR_PIS,
            ExceptionKind::FixedIntervalTimer => self.timers.tsr |= TSR_FIS,
            _ => {}
        }
        exceptions::enter(state, kind);
    }

    /// Drive `executor` for `budget` instructions, ticking timers and
    /// dispatching interrupts at every boundary. Returns the number of
    /// instructions retired. A fatal error ends the run early.
    pub fn execute(
        &mut self,
        state: &mut MachineState,
        bus: &mut dyn Bus,
        executor: &mut dyn Executor,
        budget: i32,
    ) -> Result<i32> {
        self.begin_run(state, budget);
        while state.icount > 0 {
            state.pc = state.npc;
            state.npc = state.pc.wrapping_add(4);

            match executor.step(self, state, bus) {
                Ok(Step::Retired) => {}
                Ok(Step::Exception(kind)) => self.take_exception(state, kind),
                Err(err) => {
                    self.end_run(state);
                    return Err(err);
                }
            }

            state.icount -= 1;
            self.tick_timers(state);
            if let Some(kind) = self.dispatch_pending(state) {
                trace!("Dispatched {:?} after 0x{:08X}", kind, state.pc);
            }
        }
        Ok(self.end_run(state))
    }
}
