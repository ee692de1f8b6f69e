//! Exception entry for the 403 core.
//!
//! Every class saves state into exactly one register pair, picked by
//! `SaveTarget`; the non-critical classes share SRR0/SRR1 and the critical
//! and watchdog classes share SRR2/SRR3. Entry rewrites MSR per class and
//! points `npc` at the vector.

use log::debug;

use crate::constants::exceptions::*;
use crate::constants::msr::*;
use crate::constants::pending::*;
use crate::error::{fatal, Ppc403Error, Result};
use crate::state::MachineState;

/// Exception classes this core dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Critical,
    External,
    Program,
    SystemCall,
    ProgrammableIntervalTimer,
    FixedIntervalTimer,
    Watchdog,
}

/// Save/restore register pair an exception class uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    NonCritical, // SRR0/SRR1
    Critical,    // SRR2/SRR3
}

impl SaveTarget {
    fn save(self, state: &mut MachineState, return_pc: u32, msr: u32) {
        match self {
            SaveTarget::NonCritical => {
                state.srr0 = return_pc;
                state.srr1 = msr;
            }
            SaveTarget::Critical => {
                state.srr2 = return_pc;
                state.srr3 = msr;
            }
        }
    }

    /// MSR bits cleared on entry
    fn msr_clear_mask(self) -> u32 {
        match self {
            SaveTarget::NonCritical => MSR_WE | MSR_PR | MSR_EE | MSR_PE,
            SaveTarget::Critical => {
                MSR_WE | MSR_PR | MSR_CE | MSR_EE | MSR_DE | MSR_PE | MSR_DR | MSR_IR
            }
        }
    }
}

/// How the endian mode bits are rewritten on entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndianRule {
    IleFromLe,         // ILE takes the current LE
    LeFromIle,         // LE takes ILE
    IleFromInvertedLe, // ILE takes the complement of LE
}

impl EndianRule {
    fn apply(self, msr: u32) -> u32 {
        let (source_set, target) = match self {
            EndianRule::IleFromLe => (msr & MSR_LE != 0, MSR_ILE),
            EndianRule::LeFromIle => (msr & MSR_ILE != 0, MSR_LE),
            EndianRule::IleFromInvertedLe => (msr & MSR_LE == 0, MSR_ILE),
        };
        if source_set {
            msr | target
        } else {
            msr & !target
        }
    }
}

impl ExceptionKind {
    pub fn vector_offset(self) -> u32 {
        match self {
            ExceptionKind::Critical => VECTOR_CRITICAL,
            ExceptionKind::External => VECTOR_EXTERNAL,
            ExceptionKind::Program => VECTOR_PROGRAM,
            ExceptionKind::SystemCall => VECTOR_SYSTEM_CALL,
            ExceptionKind::ProgrammableIntervalTimer => VECTOR_PIT,
            ExceptionKind::FixedIntervalTimer => VECTOR_FIT,
            ExceptionKind::Watchdog => VECTOR_WATCHDOG,
        }
    }

    pub fn save_target(self) -> SaveTarget {
        match self {
            ExceptionKind::Critical | ExceptionKind::Watchdog => SaveTarget::Critical,
            _ => SaveTarget::NonCritical,
        }
    }

    fn endian_rule(self) -> EndianRule {
        match self {
            ExceptionKind::Program | ExceptionKind::SystemCall => EndianRule::LeFromIle,
            ExceptionKind::Critical | ExceptionKind::Watchdog => EndianRule::IleFromInvertedLe,
            _ => EndianRule::IleFromLe,
        }
    }

    /// Bit of `interrupt_pending` this class services
    pub fn pending_bit(self) -> u8 {
        match self {
            ExceptionKind::External => PENDING_EXTERNAL,
            ExceptionKind::ProgrammableIntervalTimer => PENDING_PIT,
            ExceptionKind::FixedIntervalTimer => PENDING_FIT,
            _ => 0,
        }
    }

    fn target(self, msr: u32, evpr: u32) -> u32 {
        match self {
            ExceptionKind::Program | ExceptionKind::SystemCall if msr & MSR_IP != 0 => {
                HIGH_VECTOR_BASE | self.vector_offset()
            }
            _ => evpr | self.vector_offset(),
        }
    }
}

/// Classes are identified by their vector offset
impl TryFrom<u32> for ExceptionKind {
    type Error = Ppc403Error;

    fn try_from(vector: u32) -> Result<Self> {
        match vector {
            VECTOR_CRITICAL => Ok(ExceptionKind::Critical),
            VECTOR_EXTERNAL => Ok(ExceptionKind::External),
            VECTOR_PROGRAM => Ok(ExceptionKind::Program),
            VECTOR_SYSTEM_CALL => Ok(ExceptionKind::SystemCall),
            VECTOR_PIT => Ok(ExceptionKind::ProgrammableIntervalTimer),
            VECTOR_FIT => Ok(ExceptionKind::FixedIntervalTimer),
            VECTOR_WATCHDOG => Ok(ExceptionKind::Watchdog),
            _ => fatal(Ppc403Error::UnknownException(vector)),
        }
    }
}

/// Save state, rewrite MSR and redirect `npc` to the vector of `kind`.
/// The serviced `interrupt_pending` bit is cleared; other bits are kept.
pub fn enter(state: &mut MachineState, kind: ExceptionKind) {
    let msr = state.msr;
    // A program exception returns to the faulting instruction itself
    let return_pc = match kind {
        ExceptionKind::Program => state.pc,
        _ => state.npc,
    };

    let target = kind.save_target();
    target.save(state, return_pc, msr);

    let new_msr = kind.endian_rule().apply(msr & !target.msr_clear_mask());
    state.msr = new_msr;
    state.npc = kind.target(new_msr, state.evpr);
    state.interrupt_pending &= !kind.pending_bit();

    debug!(
        "Exception {:?}: return 0x{:08X}, vector 0x{:08X}, MSR 0x{:08X} -> 0x{:08X}",
        kind, return_pc, state.npc, msr, new_msr
    );
}

#[cfg(test)]
mod exception_tests {
    use super::*;

    const ALL: [ExceptionKind; 7] = [
        ExceptionKind::Critical,
        ExceptionKind::External,
        ExceptionKind::Program,
        ExceptionKind::SystemCall,
        ExceptionKind::ProgrammableIntervalTimer,
        ExceptionKind::FixedIntervalTimer,
        ExceptionKind::Watchdog,
    ];

    fn state() -> MachineState {
        MachineState {
            pc: 0x1000,
            npc: 0x1004,
            msr: MSR_EE | MSR_PR | MSR_CE | MSR_WE | MSR_ME,
            evpr: 0x8000_0000,
            srr0: 0xAAAA_AAAA,
            srr1: 0xAAAA_AAAA,
            srr2: 0xBBBB_BBBB,
            srr3: 0xBBBB_BBBB,
            ..Default::default()
        }
    }

    #[test]
    fn every_class_saves_into_its_own_pair() {
        for kind in ALL.iter().copied() {
            let mut s = state();
            let msr = s.msr;
            enter(&mut s, kind);
            match kind {
                ExceptionKind::Critical | ExceptionKind::Watchdog => {
                    assert_eq!((s.srr2, s.srr3), (0x1004, msr), "{:?}", kind);
                    assert_eq!((s.srr0, s.srr1), (0xAAAA_AAAA, 0xAAAA_AAAA), "{:?}", kind);
                }
                ExceptionKind::Program => {
                    assert_eq!((s.srr0, s.srr1), (0x1000, msr));
                    assert_eq!((s.srr2, s.srr3), (0xBBBB_BBBB, 0xBBBB_BBBB));
                }
                _ => {
                    assert_eq!((s.srr0, s.srr1), (0x1004, msr), "{:?}", kind);
                    assert_eq!((s.srr2, s.srr3), (0xBBBB_BBBB, 0xBBBB_BBBB), "{:?}", kind);
                }
            }
        }
    }

    #[test]
    fn vectors_are_prefixed_by_evpr() {
        let expected = [0x0100, 0x0500, 0x0700, 0x0C00, 0x1000, 0x1010, 0x1020];
        for (kind, offset) in ALL.iter().copied().zip(expected.iter()) {
            let mut s = state();
            enter(&mut s, kind);
            assert_eq!(s.npc, 0x8000_0000 | offset, "{:?}", kind);
        }
    }

    #[test]
    fn trap_and_syscall_use_high_vectors_under_ip() {
        for kind in [ExceptionKind::Program, ExceptionKind::SystemCall] {
            let mut s = state();
            s.msr |= MSR_IP;
            enter(&mut s, kind);
            assert_eq!(s.npc, 0xFFF0_0000 | kind.vector_offset());
        }
        let mut s = state();
        s.msr |= MSR_IP;
        enter(&mut s, ExceptionKind::External);
        assert_eq!(s.npc, 0x8000_0500);
    }

    #[test]
    fn non_critical_entry_keeps_critical_enable() {
        let mut s = state();
        enter(&mut s, ExceptionKind::ProgrammableIntervalTimer);
        assert_eq!(s.msr & (MSR_EE | MSR_PR | MSR_WE), 0);
        assert_ne!(s.msr & MSR_CE, 0);
        assert_ne!(s.msr & MSR_ME, 0);
    }

    #[test]
    fn critical_entry_masks_critical_enable() {
        let mut s = state();
        s.msr |= MSR_DE | MSR_IR | MSR_DR;
        enter(&mut s, ExceptionKind::Critical);
        assert_eq!(s.msr & (MSR_CE | MSR_DE | MSR_IR | MSR_DR | MSR_EE), 0);
        assert_ne!(s.msr & MSR_ME, 0);
    }

    #[test]
    fn endian_rules_per_class() {
        // External: ILE copies LE
        let mut s = state();
        s.msr |= MSR_LE;
        enter(&mut s, ExceptionKind::External);
        assert_ne!(s.msr & MSR_ILE, 0);

        // System call: LE copies ILE
        let mut s = state();
        s.msr |= MSR_ILE;
        enter(&mut s, ExceptionKind::SystemCall);
        assert_ne!(s.msr & MSR_LE, 0);
        let mut s = state();
        s.msr |= MSR_LE;
        enter(&mut s, ExceptionKind::SystemCall);
        assert_eq!(s.msr & MSR_LE, 0);

        // Critical: ILE is the complement of LE
        let mut s = state();
        s.msr |= MSR_LE | MSR_ILE;
        enter(&mut s, ExceptionKind::Critical);
        assert_eq!(s.msr & MSR_ILE, 0);
        let mut s = state();
        enter(&mut s, ExceptionKind::Watchdog);
        assert_ne!(s.msr & MSR_ILE, 0);
    }

    #[test]
    fn entry_clears_only_the_serviced_pending_bit() {
        let mut s = state();
        s.interrupt_pending = PENDING_EXTERNAL | PENDING_PIT | PENDING_FIT;
        enter(&mut s, ExceptionKind::External);
        assert_eq!(s.interrupt_pending, PENDING_PIT | PENDING_FIT);
        enter(&mut s, ExceptionKind::Critical);
        assert_eq!(s.interrupt_pending, PENDING_PIT | PENDING_FIT);
    }

    #[test]
    fn vector_offsets_name_classes() {
        for kind in ALL.iter().copied() {
            assert_eq!(ExceptionKind::try_from(kind.vector_offset()), Ok(kind));
        }
        assert_eq!(
            ExceptionKind::try_from(0x0900u32),
            Err(Ppc403Error::UnknownException(0x0900))
        );
    }
}
