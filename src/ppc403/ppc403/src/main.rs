extern crate clap;
use crossbeam_channel::bounded; // Inter-thread communication
use log::{debug, error, info};

use ppc403_core::constants::dcr::{DCR_EXIER, DCR_EXISR};
use ppc403_core::constants::exi::{EXI_IRQ0, EXI_SPU_RX};
use ppc403_core::constants::msr::MSR_EE;
use ppc403_core::constants::spr::*;
use ppc403_core::constants::spu::*;
use ppc403_core::constants::timers::*;
use ppc403_core::exceptions::SaveTarget;
use ppc403_core::{
    Bus, ExceptionKind, Executor, FlatMemory, MachineState, Ppc403, Ppc403Config, Step,
};
use ppc403_peripherals::host::{SampleBuffer, SerialBridge};
use ppc403_peripherals::utils::parse_number;

/// Configures command-line interface using clap
fn get_cli_config<'a>() -> clap::ArgMatches<'a> {
    let description = "PowerPC 403GA on-chip peripheral bench";
    clap::App::new("ppc403 bench")
        .version("0.1")
        .about(description)
        .arg(
            clap::Arg::with_name("image")
                .help("Flat binary loaded into RAM before the run")
                .index(1),
        )
        .arg(
            clap::Arg::with_name("load")
                .long("load")
                .takes_value(true)
                .default_value("0x0")
                .help("Load address of the image"),
        )
        .arg(
            clap::Arg::with_name("entry")
                .long("entry")
                .takes_value(true)
                .help("Initial program counter (defaults to the load address)"),
        )
        .arg(
            clap::Arg::with_name("memory")
                .long("memory")
                .takes_value(true)
                .default_value("0x100000")
                .help("RAM size in bytes, mapped at address 0"),
        )
        .arg(
            clap::Arg::with_name("evpr")
                .long("evpr")
                .takes_value(true)
                .default_value("0x0")
                .help("Exception vector prefix"),
        )
        .arg(
            clap::Arg::with_name("pit")
                .long("pit")
                .takes_value(true)
                .help("PIT reload value; enables the auto-reloading PIT interrupt"),
        )
        .arg(
            clap::Arg::with_name("fit")
                .long("fit")
                .takes_value(true)
                .possible_values(&["0", "1", "2", "3"])
                .help("FIT period selector (time-base bit 8/12/16/20)"),
        )
        .arg(
            clap::Arg::with_name("rate")
                .long("rate")
                .takes_value(true)
                .default_value("33333")
                .help("Instructions per millisecond of host time"),
        )
        .arg(
            clap::Arg::with_name("serial")
                .long("serial")
                .takes_value(true)
                .default_value("127.0.0.1:4030")
                .help("TCP address the serial port is bridged to"),
        )
        .get_matches()
}

fn number_arg(matches: &clap::ArgMatches, name: &str) -> Option<u32> {
    let text = matches.value_of(name)?;
    let value = parse_number(text);
    if value.is_none() {
        error!("Invalid value for --{}: {}", name, text);
    }
    value
}

/// Stand-in for the instruction interpreter. Spins on the current address and
/// treats each exception vector as a handler that acknowledges its source
/// and returns, echoing received serial bytes back out.
struct BenchExecutor {
    evpr: u32,
}

impl BenchExecutor {
    fn vector(&self, pc: u32) -> Option<ExceptionKind> {
        if pc & 0xFFFF_0000 != self.evpr {
            return None;
        }
        ExceptionKind::try_from(pc & 0xFFFF).ok()
    }
}

impl Executor for BenchExecutor {
    fn step(
        &mut self,
        core: &mut Ppc403,
        state: &mut MachineState,
        bus: &mut dyn Bus,
    ) -> ppc403_core::Result<Step> {
        let kind = match self.vector(state.pc) {
            Some(kind) => kind,
            None => {
                // Branch to self
                state.npc = state.pc;
                return Ok(Step::Retired);
            }
        };

        info!("{:?} handler at 0x{:08X}, tb {}", kind, state.pc, state.tb);
        match kind {
            ExceptionKind::ProgrammableIntervalTimer => core.write_spr(state, SPR_TSR, TSR_PIS)?,
            ExceptionKind::FixedIntervalTimer => core.write_spr(state, SPR_TSR, TSR_FIS)?,
            ExceptionKind::External => {
                if core.spu_read(SPU_SPLS)? & SPLS_RBR != 0 {
                    let byte = core.spu_read(SPU_SPRB)?;
                    core.spu_write(state, bus, SPU_SPLS, SPLS_RBR)?;
                    core.spu_write(state, bus, SPU_SPRB, byte)?;
                }
                let pending = core.read_dcr(DCR_EXISR)?;
                core.write_dcr(state, bus, DCR_EXISR, pending)?;
            }
            _ => {}
        }

        // rfi / rfci
        match kind.save_target() {
            SaveTarget::NonCritical => {
                state.npc = state.srr0;
                state.msr = state.srr1;
            }
            SaveTarget::Critical => {
                state.npc = state.srr2;
                state.msr = state.srr3;
            }
        }
        Ok(Step::Retired)
    }
}

/// Program timers, interrupt enables and the serial receiver the way boot
/// code would
fn configure(
    core: &mut Ppc403,
    state: &mut MachineState,
    memory: &mut FlatMemory,
    matches: &clap::ArgMatches,
) -> ppc403_core::Result<()> {
    let mut tcr = 0;
    if let Some(pit) = number_arg(matches, "pit") {
        tcr |= TCR_PIE | TCR_ARE;
        core.write_spr(state, SPR_PIT, pit)?;
    }
    if let Some(fit) = number_arg(matches, "fit") {
        tcr |= TCR_FIE | (fit << TCR_FP_SHIFT);
    }
    core.write_spr(state, SPR_TCR, tcr)?;
    core.write_dcr(state, memory, DCR_EXIER, EXI_SPU_RX | EXI_IRQ0)?;
    core.spu_write(state, memory, SPU_SPRC, SPXC_ENABLE | (1 << SPXC_MODE_SHIFT))
}

/// Main entry point for the bench
fn main() {
    env_logger::init();

    // Set up Ctrl-C handler with channel communication
    let (signal_sender, signal_receiver) = bounded(1);
    let handler_result = ctrlc::set_handler(move || {
        if signal_sender.is_full() {
            std::process::exit(-1); // Emergency exit if channel blocked
        }
        let _send_result = signal_sender.send(()); // Send shutdown signal
    });

    if let Err(e) = handler_result {
        error!("Signal handler failed: {:?}", e);
        return;
    }

    let cli_matches = get_cli_config();
    let (load, memory_size, evpr, rate) = match (
        number_arg(&cli_matches, "load"),
        number_arg(&cli_matches, "memory"),
        number_arg(&cli_matches, "evpr"),
        number_arg(&cli_matches, "rate"),
    ) {
        (Some(load), Some(size), Some(evpr), Some(rate)) => (load, size, evpr, rate),
        _ => return,
    };
    let entry = match cli_matches.value_of("entry") {
        Some(_) => match number_arg(&cli_matches, "entry") {
            Some(entry) => entry,
            None => return,
        },
        None => load,
    };

    let mut memory = FlatMemory::new(0, memory_size as usize);
    if let Some(path) = cli_matches.value_of("image") {
        match std::fs::read(path) {
            Ok(image) => {
                info!("Loaded {} bytes at 0x{:08X}", image.len(), load);
                memory.load(load, &image);
            }
            Err(e) => {
                error!("Unable to read {}: {}", path, e);
                return;
            }
        }
    }

    // Serial port bridged to TCP, sample DMA on channel 1
    let bridge = match SerialBridge::bind(cli_matches.value_of("serial").unwrap_or("127.0.0.1:4030")) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("Unable to start serial bridge: {}", e);
            return;
        }
    };
    let (serial_tx, serial_rx) = bridge.split();
    let (samples, sample_rx) = SampleBuffer::new(16);

    let mut core = Ppc403::new(Ppc403Config::default());
    core.set_serial_tx(Box::new(serial_tx));
    if let Err(e) = core.set_dma_endpoint(1, Box::new(samples)) {
        error!("{}", e);
        return;
    }

    let mut state = MachineState::new();
    state.npc = entry;
    state.evpr = evpr;
    state.msr = MSR_EE;

    if let Err(e) = configure(&mut core, &mut state, &mut memory, &cli_matches) {
        error!("Setup failed: {}", e);
        return;
    }

    let mut executor = BenchExecutor { evpr };

    // Main emulation loop
    let mut frame_timer = std::time::Instant::now();
    loop {
        if !signal_receiver.is_empty() {
            break;
        }

        let elapsed_time = frame_timer.elapsed();
        if elapsed_time.as_millis() == 0 {
            // Prevent busy-waiting at high speeds
            std::thread::sleep(std::time::Duration::from_micros(1000));
            continue;
        }
        frame_timer = std::time::Instant::now();

        // Bytes that arrived over TCP since the last frame
        while let Some(byte) = serial_rx.try_recv() {
            core.spu_receive_byte(&mut state, byte);
        }

        let budget = (elapsed_time.as_millis() as u64 * rate as u64).min(i32::MAX as u64) as i32;
        if let Err(e) = core.execute(&mut state, &mut memory, &mut executor, budget) {
            error!("Emulation stopped: {}", e);
            break;
        }

        for block in sample_rx.try_iter() {
            debug!("Sample block of {} bytes", block.len());
        }
    }

    info!("Stopped at 0x{:08X}, time base {}", state.npc, state.tb);
}
