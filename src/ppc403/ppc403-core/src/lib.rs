pub mod bus;
pub mod config;
pub mod constants;
pub mod cpu;
pub mod dcr;
pub mod dma;
pub mod error;
pub mod exceptions;
pub mod interrupts;
pub mod periph;
pub mod spu;
pub mod state;
pub mod timers;

pub use bus::{Bus, FlatMemory};
pub use config::Ppc403Config;
pub use cpu::{Executor, Ppc403, Step};
pub use error::{Ppc403Error, Result};
pub use exceptions::ExceptionKind;
pub use interrupts::IrqLine;
pub use periph::{DmaEndpoint, DmaSource, SerialRx, SerialTx};
pub use state::MachineState;
