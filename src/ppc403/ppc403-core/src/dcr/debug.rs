use serde::{Deserialize, Serialize};

use crate::constants::dcr::*;
use crate::constants::BREAKPOINT_REGISTERS;
use crate::dcr::RegisterBlock;

/// Bus error address and syndrome registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusErrorRegisters {
    pub bear: u32, // Address of the failing access
    pub besr: u32, // Error syndrome
}

impl RegisterBlock for BusErrorRegisters {
    fn read(&self, dcr: u32) -> u32 {
        match dcr {
            DCR_BEAR => self.bear,
            DCR_BESR => self.besr,
            _ => 0,
        }
    }

    fn write(&mut self, dcr: u32, value: u32) {
        match dcr {
            DCR_BEAR => self.bear = value,
            DCR_BESR => self.besr = value,
            _ => {}
        }
    }
}

/// General breakpoint registers BR0-BR7 (bank configuration, stored only)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoints {
    pub br: [u32; BREAKPOINT_REGISTERS],
}

impl RegisterBlock for Breakpoints {
    fn read(&self, dcr: u32) -> u32 {
        self.br[(dcr - DCR_BR0) as usize]
    }

    fn write(&mut self, dcr: u32, value: u32) {
        self.br[(dcr - DCR_BR0) as usize] = value;
    }
}
