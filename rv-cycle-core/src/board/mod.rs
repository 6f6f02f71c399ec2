//! Provides a board wiring a single core to RAM and a memory-mapped I/O page.

mod system_bus;

use crate::bus::Memory;
use crate::core::{self, ControlInputs, Core, State, TickReport};
use crate::csr::ControlStatus;
use crate::registers::RegisterFile;
use crate::resources::io::Io;
use crate::resources::ram::{self, LoadError, Ram};
use crate::simulator::Simulatable;
use log::debug;
use system_bus::SystemBus;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// RAM size in bytes. The RAM is mapped from address `0`.
    pub ram_size: usize,
    /// Wait states of every RAM access.
    pub wait_states: u32,
    /// Base address of the I/O page. Everything at or above it is I/O.
    pub io_base: u32,
    /// Number of ticks reset is held after power-on or [`Board::reset`].
    pub reset_ticks: u32,
    pub core: core::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ram_size: ram::DEFAULT_SIZE,
            wait_states: 0,
            io_base: 0x4000_0000,
            reset_ticks: 1,
            core: core::Config::default(),
        }
    }
}

/// A single-core board: the core, its RAM and I/O page, and the reset and interrupt lines.
///
/// > A RISC-V hardware platform can contain one or more RISC-V-compatible processing cores together
/// > with other non-RISC-V-compatible cores, fixed-function accelerators, various physical memory
/// > structures, I/O devices, and an interconnect structure to allow the components to communicate.
#[derive(Debug)]
pub struct Board<C: ControlStatus> {
    core: Core<C>,
    system_bus: SystemBus,
    reset_ticks: u32,
    /// Ticks left before reset is released.
    reset_remaining: u32,
    interrupt: bool,
    last_report: TickReport,
}

impl<C: ControlStatus> Board<C> {
    /// Creates a board with empty RAM, holding the core in reset for the configured number of
    /// ticks.
    pub fn new(config: Config, csr: C) -> Self {
        let system_bus = SystemBus::new(
            Ram::new(config.ram_size, config.wait_states),
            Io::new(),
            config.io_base,
        );
        Self {
            core: Core::new(config.core, csr),
            system_bus,
            reset_ticks: config.reset_ticks,
            reset_remaining: config.reset_ticks,
            interrupt: false,
            last_report: TickReport::default(),
        }
    }

    pub fn core(&self) -> &Core<C> {
        &self.core
    }

    pub fn ram(&self) -> &Ram {
        &self.system_bus.ram
    }

    pub fn io(&self) -> &Io {
        &self.system_bus.io
    }

    pub fn io_mut(&mut self) -> &mut Io {
        &mut self.system_bus.io
    }

    pub fn registers(&self) -> &RegisterFile {
        self.core.registers()
    }

    pub fn pc(&self) -> u32 {
        self.core.pc()
    }

    pub fn state(&self) -> State {
        self.core.state()
    }

    /// Returns `true` while the reset line is asserted.
    pub fn in_reset(&self) -> bool {
        self.reset_remaining > 0
    }

    /// Returns the report of the most recent tick.
    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    /// Drives the level of the external interrupt request line.
    pub fn set_interrupt(&mut self, level: bool) {
        if level != self.interrupt {
            debug!("interrupt line {}", if level { "raised" } else { "lowered" });
        }
        self.interrupt = level;
    }

    /// Asserts reset for the configured number of ticks.
    ///
    /// The core is only reset once the next tick is simulated. Memory contents are kept.
    pub fn reset(&mut self) {
        self.reset_remaining = self.reset_ticks.max(1);
        self.system_bus.reset();
    }

    /// Write a byte buffer into RAM.
    ///
    /// Fails without writing anything if the buffer doesn't fit in RAM.
    pub fn load_physical(&mut self, base_address: u32, buf: &[u8]) -> Result<(), LoadError> {
        debug!(
            "loading {} bytes into memory at {base_address:#010x}",
            buf.len()
        );
        self.system_bus.ram.load(base_address, buf)
    }

    /// Returns the RAM word containing `address`, or `None` if it is outside of RAM.
    pub fn read_word(&self, address: u32) -> Option<u32> {
        self.system_bus.ram.read_word(address)
    }

    fn control_inputs(&self) -> ControlInputs {
        ControlInputs {
            reset: self.in_reset(),
            interrupt: self.interrupt,
        }
    }
}

impl<C: ControlStatus> Simulatable for Board<C> {
    fn tick(&mut self) {
        let control = self.control_inputs();
        let request = self.core.bus_request(&control);
        let response = self.system_bus.cycle(&request);
        self.last_report = self.core.tick(&control, &response);
        self.reset_remaining = self.reset_remaining.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::csr::{CsRegisters, CycleCounter, MEPC, MTVEC};
    use crate::instruction::Extensions;
    use crate::registers::Specifier;
    use crate::resources::io;
    use crate::simulator::{RunOutcome, Simulator};

    fn x(index: u8) -> Specifier {
        Specifier::new(index).unwrap()
    }

    fn simulator<C: ControlStatus>(
        config: Config,
        csr: C,
        program: &[u32],
    ) -> Simulator<Board<C>> {
        let mut board = Board::new(config, csr);
        board.load_physical(0, &asm::to_bytes(program)).unwrap();
        Simulator::new(board)
    }

    fn run_to_self_loop<C: ControlStatus>(simulator: &mut Simulator<Board<C>>) -> u64 {
        match simulator.run_until(10_000, |board| {
            board
                .last_report()
                .retired
                .is_some_and(|retired| retired.is_self_loop())
        }) {
            RunOutcome::Stopped(ticks) => ticks,
            RunOutcome::LimitReached => panic!("program didn't halt"),
        }
    }

    #[test]
    fn test_arithmetic_program() {
        let program = [
            asm::addi(1, 0, 5),
            asm::addi(2, 0, 3),
            asm::add(3, 1, 2),
            asm::jal(0, 0),
        ];
        let mut simulator = simulator(Config::default(), CsRegisters::new(), &program);
        // One reset tick, then 3 ticks per instruction.
        assert_eq!(1 + 4 * 3, run_to_self_loop(&mut simulator));
        let board = simulator.inspect();
        assert_eq!(5, board.registers().read(x(1)));
        assert_eq!(3, board.registers().read(x(2)));
        assert_eq!(8, board.registers().read(x(3)));
        assert_eq!(12, board.pc());
    }

    #[test]
    fn test_register_shift_is_multi_cycle() {
        let program = [
            asm::addi(1, 0, 12),
            asm::addi(2, 0, 2),
            asm::sll(3, 1, 2),
            asm::jal(0, 0),
        ];
        let mut simulator = simulator(Config::default(), CsRegisters::new(), &program);
        // Reset and the two addi
        simulator.step_n(7);
        let mut busy_ticks = 0;
        loop {
            simulator.step();
            let board = simulator.inspect();
            if board.last_report().retired.is_some() {
                break;
            }
            if board.state() == State::WaitBusy {
                busy_ticks += 1;
            }
        }
        assert_eq!(2, busy_ticks);
        assert_eq!(48, simulator.inspect().registers().read(x(3)));
    }

    #[test]
    fn test_store_then_load() {
        let program = [
            asm::lui(1, 0x12345),
            asm::addi(1, 1, 0x678),
            asm::sw(1, 0, 0x100),
            asm::lw(2, 0, 0x100),
            asm::jal(0, 0),
        ];
        for wait_states in [0, 3] {
            let config = Config {
                wait_states,
                ..Config::default()
            };
            let mut simulator = simulator(config, CsRegisters::new(), &program);
            run_to_self_loop(&mut simulator);
            let board = simulator.inspect();
            assert_eq!(0x1234_5678, board.registers().read(x(2)));
            assert_eq!(Some(0x1234_5678), board.read_word(0x100));
        }
    }

    #[test]
    fn test_wait_states_stretch_execution() {
        let program = [asm::addi(1, 0, 1), asm::jal(0, 0)];
        let fast = Config::default();
        let fast = run_to_self_loop(&mut simulator(fast, CycleCounter::new(), &program));
        let config = Config {
            wait_states: 2,
            ..Config::default()
        };
        let slow = run_to_self_loop(&mut simulator(config, CycleCounter::new(), &program));
        assert_eq!(fast + 2 * 2, slow);
    }

    #[test]
    fn test_interrupt_and_mret() {
        let handler = 0x40;
        let mut program = vec![
            asm::addi(1, 0, handler),
            asm::csrrw(0, MTVEC, 1),
            asm::csrrsi(0, 0x300, 0b1000),
            asm::addi(5, 0, 0),
            // 0x10: counting loop
            asm::addi(5, 5, 1),
            asm::jal(0, -4),
        ];
        program.resize(handler as usize / 4, 0);
        program.extend([asm::addi(6, 6, 1), asm::mret()]);

        let mut simulator = simulator(Config::default(), CsRegisters::new(), &program);
        simulator.step_n(40);
        simulator.inspect_mut().set_interrupt(true);
        let outcome = simulator.run_until(100, |board| board.last_report().trap.is_some());
        assert!(matches!(outcome, RunOutcome::Stopped(_)));

        let board = simulator.inspect();
        let trap = board.last_report().trap.unwrap();
        assert_eq!(handler as u32, board.pc());
        assert_eq!(trap.return_address, board.core().csr().read(MEPC));
        assert!([0x10, 0x14].contains(&trap.return_address));

        simulator.inspect_mut().set_interrupt(false);
        let outcome = simulator.run_until(100, |board| {
            board
                .last_report()
                .retired
                .is_some_and(|retired| retired.instruction.raw == asm::mret())
        });
        assert!(matches!(outcome, RunOutcome::Stopped(_)));
        let board = simulator.inspect();
        assert_eq!(trap.return_address, board.pc());
        assert_eq!(1, board.registers().read(x(6)));
    }

    #[test]
    fn test_reset_mid_program() {
        let config = Config {
            reset_ticks: 3,
            core: core::Config {
                reset_address: 0x20,
                ..core::Config::default()
            },
            ..Config::default()
        };
        let mut program = vec![0; 8];
        program.extend([
            asm::addi(1, 0, 7),
            asm::addi(2, 0, 100),
            asm::div(3, 2, 1),
            asm::jal(0, 0),
        ]);
        let mut simulator = simulator(config, CsRegisters::new(), &program);
        simulator.step_n(3);
        assert!(!simulator.inspect().in_reset());
        // Stop somewhere in the division.
        simulator.step_n(6 + 10);
        assert_eq!(State::WaitBusy, simulator.inspect().state());

        simulator.inspect_mut().reset();
        simulator.step();
        let board = simulator.inspect();
        assert!(board.in_reset());
        assert_eq!(0x20, board.pc());
        assert_eq!(State::Fetch, board.state());
        assert!(board.registers().iter().all(|(_, value)| value == 0));

        run_to_self_loop(&mut simulator);
        assert_eq!(14, simulator.inspect().registers().read(x(3)));
    }

    #[test]
    fn test_compressed_program() {
        // c.li a0, 5 ; c.addi a0, 3 ; c.mv a1, a0 ; c.j .
        let parcels: [u16; 4] = [0x4515, 0x050D, 0x85AA, 0xA001];
        let bytes: Vec<u8> = parcels.iter().flat_map(|p| p.to_le_bytes()).collect();
        let mut board = Board::new(Config::default(), CsRegisters::new());
        board.load_physical(0, &bytes).unwrap();
        let mut simulator = Simulator::new(board);
        run_to_self_loop(&mut simulator);
        let board = simulator.inspect();
        assert_eq!(8, board.registers().read(x(10)));
        assert_eq!(8, board.registers().read(x(11)));
        assert_eq!(6, board.pc());
    }

    #[test]
    fn test_compressed_disabled_traps() {
        let config = Config {
            core: core::Config {
                extensions: Extensions {
                    compressed: false,
                    ..Extensions::default()
                },
                ..core::Config::default()
            },
            ..Config::default()
        };
        let bytes = [0x15, 0x45, 0x01, 0xA0];
        let mut board = Board::new(config, CsRegisters::new());
        board.load_physical(0, &bytes).unwrap();
        let mut simulator = Simulator::new(board);
        let outcome =
            simulator.run_until(100, |board| board.last_report().illegal_instruction.is_some());
        assert!(matches!(outcome, RunOutcome::Stopped(_)));
    }

    #[test]
    fn test_reduced_csr_ignores_interrupts() {
        let program = [
            asm::csrrsi(0, 0x300, 0b1000),
            asm::addi(1, 1, 1),
            asm::jal(0, -4),
        ];
        let mut simulator = simulator(Config::default(), CycleCounter::new(), &program);
        simulator.inspect_mut().set_interrupt(true);
        for _ in 0..100 {
            simulator.step();
            assert_eq!(None, simulator.inspect().last_report().trap);
        }
        assert!(simulator.inspect().registers().read(x(1)) > 0);
    }

    #[test]
    fn test_io_page() {
        let config = Config::default();
        let program = [
            asm::lui(1, config.io_base >> 12),
            asm::addi(2, 0, 0x3A),
            asm::sw(2, 1, io::LEDS as i32),
            asm::sb(2, 1, io::UART_DATA as i32),
            asm::lw(3, 1, io::UART_STATUS as i32),
            asm::lw(4, 1, io::BUTTONS as i32),
            asm::jal(0, 0),
        ];
        let mut simulator = simulator(config, CsRegisters::new(), &program);
        simulator.inspect_mut().io_mut().set_buttons(0b01);
        run_to_self_loop(&mut simulator);
        let board = simulator.inspect();
        assert_eq!(0xA, board.io().leds());
        assert_eq!(b":", board.io().uart_output());
        assert_eq!(1, board.registers().read(x(3)));
        assert_eq!(1, board.registers().read(x(4)));
    }

    #[test]
    fn test_load_out_of_range() {
        let config = Config {
            ram_size: 16,
            ..Config::default()
        };
        let mut board = Board::new(config, CycleCounter::new());
        assert!(board.load_physical(8, &[0; 16]).is_err());
        assert_eq!(Some(0), board.read_word(8));
    }
}
