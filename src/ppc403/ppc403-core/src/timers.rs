use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::pending::{PENDING_FIT, PENDING_PIT};
use crate::constants::timers::*;
use crate::state::MachineState;

/// Time-base ticks from `tb` until the next 0 -> 1 transition of `fit_bit`.
/// The time base wraps at 2^64.
pub fn ticks_to_fit_edge(tb: u64, fit_bit: u32) -> u64 {
    let fit_bit = fit_bit as u64;
    let mut tb = tb;
    let mut ticks = 0;

    // Bit already high: wait for it to drop first
    if tb & fit_bit != 0 {
        ticks += fit_bit;
        tb = tb.wrapping_add(fit_bit);
    }
    ticks + fit_bit - (tb & (fit_bit - 1))
}

/// PIT, FIT and watchdog state, driven once per retired instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timers {
    pub tcr: u32, // Timer control
    pub tsr: u32, // Timer status

    pub pit: u32,         // PIT reload value
    pub pit_counter: u32, // Live PIT count
    pub pit_int_enable: bool,

    pub fit_bit: u32, // Time-base bit whose rising edge fires FIT
    pub fit_int_enable: bool,

    pub wdt_bit: u32, // Latched from TCR[WP]; watchdog is not modelled
    pub wdt_int_enable: bool,

    run_budget: i32,          // Instruction budget of the current run
    fit_trigger: Option<i64>, // Remaining-count value at which FIT fires next
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    pub fn new() -> Self {
        Self {
            tcr: 0,
            tsr: 0,
            pit: 0,
            pit_counter: 0,
            pit_int_enable: false,
            fit_bit: FIT_BITS[0],
            fit_int_enable: false,
            wdt_bit: WDT_BITS[0],
            wdt_int_enable: false,
            run_budget: 0,
            fit_trigger: None,
        }
    }

    /// Timer control register: periods, interrupt enables, auto-reload
    pub fn write_tcr(&mut self, value: u32) {
        self.tcr = value;
        self.fit_bit = FIT_BITS[((value >> TCR_FP_SHIFT) & 0x3) as usize];
        self.wdt_bit = WDT_BITS[((value >> TCR_WP_SHIFT) & 0x3) as usize];
        self.fit_int_enable = value & TCR_FIE != 0;
        self.pit_int_enable = value & TCR_PIE != 0;
        self.wdt_int_enable = value & TCR_WIE != 0;
        if !self.fit_int_enable {
            self.fit_trigger = None;
        }
        debug!(
            "TCR = 0x{:08X} (FIT bit 0x{:X}, PIT irq {}, auto-reload {})",
            value,
            self.fit_bit,
            self.pit_int_enable,
            self.auto_reload()
        );
    }

    /// Timer status: writing 1 clears a bit
    pub fn write_tsr(&mut self, value: u32) {
        self.tsr &= !value;
    }

    /// Loading the PIT sets both the reload value and the live counter
    pub fn write_pit(&mut self, value: u32) {
        self.pit = value;
        self.pit_counter = value;
    }

    pub fn auto_reload(&self) -> bool {
        self.tcr & TCR_ARE != 0
    }

    /// Schedule the first FIT edge of a run of `budget` instructions
    pub fn begin_run(&mut self, tb: u64, budget: i32) {
        self.run_budget = budget;
        self.schedule_fit(tb, budget);
    }

    /// Point the FIT at the next edge after `tb`, the live time base when
    /// `icount` instructions remain in the run
    pub fn schedule_fit(&mut self, tb: u64, icount: i32) {
        self.fit_trigger = if self.fit_int_enable {
            let ticks = ticks_to_fit_edge(tb, self.fit_bit);
            Some(icount as i64 - ticks as i64)
        } else {
            None
        };
    }

    /// Instructions retired so far in the current run
    pub fn retired(&self, state: &MachineState) -> i32 {
        self.run_budget - state.icount
    }

    /// Close the current run and return how many instructions it retired.
    /// Until the next `begin_run`, `retired` reports zero.
    pub fn end_run(&mut self, state: &MachineState) -> i32 {
        let retired = self.retired(state);
        self.run_budget = state.icount;
        self.fit_trigger = None;
        retired
    }

    /// Advance all timers by one instruction. `state.icount` must already
    /// count the instruction as retired.
    pub fn tick(&mut self, state: &mut MachineState) {
        self.tick_pit(state);
        self.tick_fit(state);
        self.tick_watchdog();
    }

    fn tick_pit(&mut self, state: &mut MachineState) {
        if self.pit_counter == 0 {
            return;
        }
        self.pit_counter -= 1;
        if self.pit_counter == 0 {
            if self.pit_int_enable {
                state.interrupt_pending |= PENDING_PIT;
            }
            if self.auto_reload() {
                self.pit_counter = self.pit;
            }
        }
    }

    fn tick_fit(&mut self, state: &mut MachineState) {
        let trigger = match self.fit_trigger {
            Some(trigger) => trigger,
            None => return,
        };
        if (state.icount as i64) <= trigger && self.fit_int_enable {
            state.interrupt_pending |= PENDING_FIT;
            self.fit_trigger = Some(trigger - self.fit_bit as i64);
        }
    }

    /// Watchdog expiry is not modelled: TCR[WP] and TCR[WIE] are latched and
    /// nothing else happens.
    fn tick_watchdog(&mut self) {}
}

#[cfg(test)]
mod timer_tests {
    use super::*;

    fn run_ticks(timers: &mut Timers, state: &mut MachineState, n: u32) {
        for _ in 0..n {
            state.icount -= 1;
            timers.tick(state);
        }
    }

    #[test]
    fn pit_fires_once_and_reloads() {
        let mut timers = Timers::new();
        timers.write_tcr(TCR_PIE | TCR_ARE);
        timers.write_pit(5);
        let mut state = MachineState::new();
        state.icount = 100;
        timers.begin_run(0, 100);

        run_ticks(&mut timers, &mut state, 4);
        assert_eq!(state.interrupt_pending & PENDING_PIT, 0);

        run_ticks(&mut timers, &mut state, 1);
        assert_eq!(state.interrupt_pending & PENDING_PIT, PENDING_PIT);
        assert_eq!(timers.pit_counter, 5);

        // Acknowledge, then one more full period
        state.interrupt_pending = 0;
        run_ticks(&mut timers, &mut state, 4);
        assert_eq!(state.interrupt_pending, 0);
        run_ticks(&mut timers, &mut state, 1);
        assert_eq!(state.interrupt_pending, PENDING_PIT);
        assert_eq!(timers.pit_counter, 5);
    }

    #[test]
    fn pit_without_reload_stops_at_zero() {
        let mut timers = Timers::new();
        timers.write_tcr(TCR_PIE);
        timers.write_pit(3);
        let mut state = MachineState::new();
        state.icount = 10;

        run_ticks(&mut timers, &mut state, 3);
        assert_eq!(state.interrupt_pending, PENDING_PIT);
        assert_eq!(timers.pit_counter, 0);

        state.interrupt_pending = 0;
        run_ticks(&mut timers, &mut state, 5);
        assert_eq!(state.interrupt_pending, 0);
    }

    #[test]
    fn pit_reloads_even_when_interrupt_disabled() {
        let mut timers = Timers::new();
        timers.write_tcr(TCR_ARE);
        timers.write_pit(2);
        let mut state = MachineState::new();
        state.icount = 10;
        run_ticks(&mut timers, &mut state, 2);
        assert_eq!(state.interrupt_pending, 0);
        assert_eq!(timers.pit_counter, 2);
    }

    #[test]
    fn fit_edge_distance() {
        assert_eq!(ticks_to_fit_edge(0, 8), 8);
        assert_eq!(ticks_to_fit_edge(5, 8), 3);
        assert_eq!(ticks_to_fit_edge(9, 8), 15);
        assert_eq!(ticks_to_fit_edge(15, 8), 9);
        assert_eq!(ticks_to_fit_edge(0x1FF, 0x100), 0x101);
    }

    #[test]
    fn fit_edge_across_time_base_wrap() {
        // Bit 8 high at 0x..FF80: it drops at the wrap and rises at 0x100
        assert_eq!(ticks_to_fit_edge(0xFFFF_FFFF_FFFF_FF80, 0x100), 0x180);
        assert_eq!(ticks_to_fit_edge(u64::MAX, 1 << 20), 1 + (1 << 20));

        let mut timers = Timers::new();
        timers.write_tcr(TCR_FIE);
        let mut state = MachineState::new();
        state.icount = 0x200;
        timers.begin_run(0xFFFF_FFFF_FFFF_FF80, 0x200);
        run_ticks(&mut timers, &mut state, 0x17F);
        assert_eq!(state.interrupt_pending, 0);
        run_ticks(&mut timers, &mut state, 1);
        assert_eq!(state.interrupt_pending, PENDING_FIT);
    }

    #[test]
    fn clearing_fie_drops_the_scheduled_edge() {
        let mut timers = Timers::new();
        timers.write_tcr(TCR_FIE);
        let mut state = MachineState::new();
        state.icount = 1000;
        timers.begin_run(0, 1000);

        timers.write_tcr(0);
        run_ticks(&mut timers, &mut state, 0x100);
        // Re-enabled without a new schedule: nothing pending to fire late
        timers.write_tcr(TCR_FIE);
        run_ticks(&mut timers, &mut state, 1);
        assert_eq!(state.interrupt_pending, 0);
    }

    #[test]
    fn first_fit_fires_on_the_next_bit_edge() {
        let mut timers = Timers::new();
        timers.write_tcr(TCR_FIE); // FIT bit 8
        let mut state = MachineState::new();
        state.tb = 0xF0; // 16 ticks before bit 8 rises
        state.icount = 1000;
        timers.begin_run(state.tb, 1000);

        run_ticks(&mut timers, &mut state, 15);
        assert_eq!(state.interrupt_pending, 0);
        run_ticks(&mut timers, &mut state, 1);
        assert_eq!(state.interrupt_pending, PENDING_FIT);

        // Rescheduled a full fit_bit later
        state.interrupt_pending = 0;
        run_ticks(&mut timers, &mut state, 0xFF);
        assert_eq!(state.interrupt_pending, 0);
        run_ticks(&mut timers, &mut state, 1);
        assert_eq!(state.interrupt_pending, PENDING_FIT);
    }

    #[test]
    fn fit_disabled_never_fires() {
        let mut timers = Timers::new();
        let mut state = MachineState::new();
        state.icount = 2000;
        timers.begin_run(0, 2000);
        run_ticks(&mut timers, &mut state, 2000);
        assert_eq!(state.interrupt_pending, 0);
    }

    #[test]
    fn tcr_selects_periods() {
        let mut timers = Timers::new();
        timers.write_tcr((3 << TCR_FP_SHIFT) | (2 << TCR_WP_SHIFT) | TCR_WIE);
        assert_eq!(timers.fit_bit, 1 << 20);
        assert_eq!(timers.wdt_bit, 1 << 24);
        assert!(timers.wdt_int_enable);
        assert!(!timers.fit_int_enable);
    }

    #[test]
    fn tsr_is_write_one_to_clear() {
        let mut timers = Timers::new();
        timers.tsr = TSR_PIS | TSR_FIS;
        timers.write_tsr(TSR_PIS);
        assert_eq!(timers.tsr, TSR_FIS);
    }
}
