use serde::{Deserialize, Serialize};

use crate::constants::msr::MSR_EE;

/// Processor state owned by the outer CPU and lent to the core at every call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub pc: u32,  // Address of the instruction being executed
    pub npc: u32, // Address of the next instruction
    pub msr: u32, // Machine state register

    // Non-critical save/restore pair
    pub srr0: u32,
    pub srr1: u32,
    // Critical save/restore pair
    pub srr2: u32,
    pub srr3: u32,

    pub evpr: u32, // Exception vector prefix
    pub tb: u64,   // Free-running time base

    pub interrupt_pending: u8, // See constants::pending
    pub icount: i32,           // Instructions left in the current run
}

impl MachineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn external_interrupts_enabled(&self) -> bool {
        self.msr & MSR_EE != 0
    }
}
