//! Provides a cycle-accurate RV32I core with optional M and C extensions.

mod execute;

use crate::alu::Alu;
use crate::bus::{BusRequest, BusResponse};
use crate::csr::{ControlStatus, CsRegisters, TrapCause};
use crate::instruction::{is_compressed, DecodeError, DecodedInstruction, Extensions};
use crate::load_store;
use crate::registers::RegisterFile;
use execute::{Outcome, Pending};
use log::{debug, trace, warn};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// Address to which the core's PC register is reset.
    pub reset_address: u32,
    /// Number of implemented address bits, `1..=32`. The PC and all data addresses are truncated
    /// to this many bits.
    pub address_width: u32,
    pub extensions: Extensions,
    /// If `true`, shifts advance by 4 bits per tick while at least 4 remain, instead of by 1.
    pub two_level_shifter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reset_address: 0,
            address_width: 32,
            extensions: Extensions::default(),
            two_level_shifter: false,
        }
    }
}

impl Config {
    /// Returns the mask selecting the implemented address bits.
    pub fn address_mask(&self) -> u32 {
        match self.address_width {
            0 | 32.. => u32::MAX,
            width => (1 << width) - 1,
        }
    }
}

/// External control signals, sampled once per tick.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ControlInputs {
    /// Synchronous reset, active high.
    pub reset: bool,
    /// Level-sensitive external interrupt request.
    pub interrupt: bool,
}

/// The four states of the execution engine.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum State {
    /// Drive the instruction read strobe.
    #[default]
    Fetch,
    /// Wait for the instruction word to arrive.
    WaitInstruction,
    /// Decode, read operands and issue to the units. Commits directly if nothing is busy.
    Execute,
    /// Wait for the ALU or the data memory access to finish.
    WaitBusy,
}

/// What happened during a single tick, for observers of the core.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TickReport {
    pub retired: Option<Retired>,
    pub illegal_instruction: Option<IllegalInstruction>,
    pub trap: Option<TrapEntry>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Retired {
    pub pc: u32,
    pub instruction: DecodedInstruction,
    pub next_pc: u32,
}

impl Retired {
    /// Returns `true` if the instruction jumped to itself, the usual way for bare-metal programs
    /// to halt.
    pub fn is_self_loop(&self) -> bool {
        self.next_pc == self.pc
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IllegalInstruction {
    pub pc: u32,
    pub error: DecodeError,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TrapEntry {
    pub cause: TrapCause,
    /// The address saved in `mepc`.
    pub return_address: u32,
    pub vector: u32,
}

/// The instruction held between fetch and commit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Latched {
    Word(u32),
    Parcel(u16),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct InFlight {
    instruction: DecodedInstruction,
    pending: Pending,
}

/// RISC-V core with a single hart, advanced one clock tick at a time.
///
/// > A component is termed a core if it contains an independent instruction fetch unit.
///
/// Every tick goes through two phases: the core first drives its memory request for the tick
/// ([`bus_request`](Self::bus_request)), then samples the memory response and control inputs at
/// the clock edge ([`tick`](Self::tick)). A device answering without wait states lets an
/// instruction commit in the same tick it was executed, so that most instructions take 3 ticks.
///
/// `C` selects the CSR composition: [`CsRegisters`] adds interrupts and traps, while
/// [`CycleCounter`](crate::csr::CycleCounter) is the reduced variant with only the cycle counter.
#[derive(Debug)]
pub struct Core<C: ControlStatus = CsRegisters> {
    config: Config,
    address_mask: u32,
    state: State,
    pc: u32,
    registers: RegisterFile,
    csr: C,
    alu: Alu,
    latched: Latched,
    /// Low parcel of a 32-bit instruction starting in the upper half of a word, waiting for the
    /// next word to complete it.
    low_parcel: Option<u16>,
    in_flight: Option<InFlight>,
}

impl<C: ControlStatus> Core<C> {
    /// Creates a core in its reset state.
    pub fn new(config: Config, csr: C) -> Self {
        let mut core = Self {
            address_mask: config.address_mask(),
            state: State::Fetch,
            pc: 0,
            registers: RegisterFile::new(),
            csr,
            alu: Alu::new(config.two_level_shifter),
            latched: Latched::Word(0),
            low_parcel: None,
            in_flight: None,
            config,
        };
        core.reset();
        core
    }

    /// Force this core to its reset state.
    pub fn reset(&mut self) {
        self.state = State::Fetch;
        self.pc = self.config.reset_address & self.address_mask;
        self.registers.reset();
        self.csr.reset();
        self.alu.reset();
        self.latched = Latched::Word(0);
        self.low_parcel = None;
        self.in_flight = None;
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Address of the instruction currently being fetched or executed.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn csr(&self) -> &C {
        &self.csr
    }

    /// Returns the memory request the core drives during the current tick.
    ///
    /// This only depends on the state at the start of the tick, so it may be called any number
    /// of times before [`tick`](Self::tick).
    pub fn bus_request(&self, control: &ControlInputs) -> BusRequest {
        if control.reset {
            return BusRequest::idle();
        }
        match self.state {
            State::Fetch => BusRequest::read(self.fetch_address()),
            State::Execute => self
                .decode()
                .ok()
                .and_then(|instruction| self.data_request(&instruction))
                .unwrap_or_default(),
            State::WaitInstruction | State::WaitBusy => BusRequest::idle(),
        }
    }

    /// Advances the core by one clock tick, given the control inputs and the memory response for
    /// this tick.
    pub fn tick(&mut self, control: &ControlInputs, response: &BusResponse) -> TickReport {
        let mut report = TickReport::default();
        if control.reset {
            self.reset();
            return report;
        }

        trace!("tick in state {:?}, pc {:#010x}", self.state, self.pc);
        match self.state {
            State::Fetch => self.state = State::WaitInstruction,
            State::WaitInstruction => {
                if !response.read_busy {
                    self.latch(response.read_data);
                }
            }
            State::Execute => self.execute(control, response, &mut report),
            State::WaitBusy => {
                self.alu.tick();
                if let Some(in_flight) = self.in_flight {
                    if !self.is_busy(&in_flight.pending, response) {
                        self.complete(in_flight, control, response, &mut report);
                    }
                }
            }
        }
        self.csr.tick();
        report
    }

    /// Word-aligned address of the next instruction word to fetch.
    fn fetch_address(&self) -> u32 {
        let address = match self.low_parcel {
            Some(_) => self.pc.wrapping_add(2),
            None => self.pc,
        };
        address & self.address_mask & !0b11
    }

    /// Stores the fetched word, selecting the right parcel if compressed instructions are enabled.
    fn latch(&mut self, word: u32) {
        if !self.config.extensions.compressed {
            self.latched = Latched::Word(word);
            self.state = State::Execute;
            return;
        }

        let upper_half = self.pc & 0b10 != 0;
        if let Some(low) = self.low_parcel.take() {
            self.latched = Latched::Word(low as u32 | word << 16);
        } else {
            let parcel = if upper_half { (word >> 16) as u16 } else { word as u16 };
            if is_compressed(parcel) {
                self.latched = Latched::Parcel(parcel);
            } else if upper_half {
                // The instruction straddles two words, fetch the second one.
                self.low_parcel = Some(parcel);
                self.state = State::Fetch;
                return;
            } else {
                self.latched = Latched::Word(word);
            }
        }
        self.state = State::Execute;
    }

    fn decode(&self) -> Result<DecodedInstruction, DecodeError> {
        match self.latched {
            Latched::Word(word) => DecodedInstruction::decode(word, self.config.extensions),
            Latched::Parcel(parcel) => {
                DecodedInstruction::decode_compressed(parcel, self.config.extensions)
            }
        }
    }

    fn execute(
        &mut self,
        control: &ControlInputs,
        response: &BusResponse,
        report: &mut TickReport,
    ) {
        let instruction = match self.decode() {
            Ok(instruction) => instruction,
            Err(error) => {
                warn!("illegal instruction at {:#010x}: {error}", self.pc);
                report.illegal_instruction = Some(IllegalInstruction {
                    pc: self.pc,
                    error,
                });
                let length = match self.latched {
                    Latched::Word(_) => 4,
                    Latched::Parcel(_) => 2,
                };
                let vector = self.take_trap(TrapCause::IllegalInstruction, report);
                let (next_pc, trapped) = match vector {
                    Some(vector) => (vector, true),
                    None => (self.pc.wrapping_add(length), false),
                };
                self.finish(next_pc, control, report, trapped);
                return;
            }
        };

        let in_flight = InFlight {
            pending: self.issue(&instruction),
            instruction,
        };
        if self.is_busy(&in_flight.pending, response) {
            self.in_flight = Some(in_flight);
            self.state = State::WaitBusy;
        } else {
            self.complete(in_flight, control, response, report);
        }
    }

    fn is_busy(&self, pending: &Pending, response: &BusResponse) -> bool {
        match pending {
            Pending::Ready(_) => false,
            Pending::Alu => self.alu.busy(),
            Pending::Load { .. } => response.read_busy,
            Pending::Store => response.write_busy,
        }
    }

    /// Applies the effect of the instruction in flight once all the units it waits for are done.
    fn complete(
        &mut self,
        in_flight: InFlight,
        control: &ControlInputs,
        response: &BusResponse,
        report: &mut TickReport,
    ) {
        let InFlight {
            instruction,
            pending,
        } = in_flight;
        let sequential = self.pc.wrapping_add(instruction.length);
        let outcome = match pending {
            Pending::Ready(outcome) => outcome,
            Pending::Alu => Outcome::Retire {
                rd_value: Some(self.alu.result()),
                next_pc: sequential,
                csr_write: None,
            },
            Pending::Load { width, address } => Outcome::Retire {
                rd_value: Some(load_store::load_value(width, address, response.read_data)),
                next_pc: sequential,
                csr_write: None,
            },
            Pending::Store => Outcome::Retire {
                rd_value: None,
                next_pc: sequential,
                csr_write: None,
            },
        };

        let (next_pc, trapped) = match outcome {
            Outcome::Retire {
                rd_value,
                next_pc,
                csr_write,
            } => {
                if let Some(value) = rd_value {
                    self.registers.write(instruction.rd, value);
                }
                if let Some((specifier, value)) = csr_write {
                    self.csr.write(specifier, value);
                }
                (next_pc, false)
            }
            Outcome::Trap(cause) => match self.take_trap(cause, report) {
                Some(vector) => (vector, true),
                None => (sequential, false),
            },
            Outcome::TrapReturn => (self.csr.trap_return().unwrap_or(sequential), false),
        };

        if !trapped {
            let next_pc = next_pc & self.address_mask;
            debug!("retired {:?} at {:#010x}, next pc {next_pc:#010x}", instruction.op, self.pc);
            report.retired = Some(Retired {
                pc: self.pc,
                instruction,
                next_pc,
            });
        }
        self.finish(next_pc, control, report, trapped);
    }

    /// Records a trap taken by the instruction at the current PC.
    fn take_trap(&mut self, cause: TrapCause, report: &mut TickReport) -> Option<u32> {
        let vector = self.csr.enter_trap(cause, self.pc)?;
        report.trap = Some(TrapEntry {
            cause,
            return_address: self.pc,
            vector,
        });
        Some(vector)
    }

    /// Moves on to `next_pc`, unless an interrupt is pending, and starts fetching again.
    ///
    /// An instruction that trapped itself is never followed directly by an interrupt.
    fn finish(
        &mut self,
        next_pc: u32,
        control: &ControlInputs,
        report: &mut TickReport,
        trapped: bool,
    ) {
        self.pc = next_pc & self.address_mask;
        if !trapped && self.csr.interrupt_pending(control.interrupt) {
            if let Some(vector) = self.csr.enter_trap(TrapCause::Interrupt, self.pc) {
                report.trap = Some(TrapEntry {
                    cause: TrapCause::Interrupt,
                    return_address: self.pc,
                    vector,
                });
                self.pc = vector & self.address_mask;
            }
        }
        self.in_flight = None;
        self.state = State::Fetch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::bus::Memory;
    use crate::csr::{CycleCounter, CYCLE, MCAUSE, MEPC, MSTATUS, MTVEC};
    use crate::registers::Specifier;
    use crate::resources::ram::Ram;

    fn x(index: u8) -> Specifier {
        Specifier::new(index).unwrap()
    }

    /// Minimal harness: a core directly wired to a RAM.
    struct Harness<C: ControlStatus> {
        core: Core<C>,
        ram: Ram,
        control: ControlInputs,
    }

    impl<C: ControlStatus> Harness<C> {
        fn new(csr: C, config: Config, wait_states: u32, program: &[u32]) -> Self {
            let mut ram = Ram::new(0x1000, wait_states);
            ram.load(0, &asm::to_bytes(program)).unwrap();
            Self {
                core: Core::new(config, csr),
                ram,
                control: ControlInputs::default(),
            }
        }

        fn tick(&mut self) -> TickReport {
            let request = self.core.bus_request(&self.control);
            let response = self.ram.cycle(&request);
            self.core.tick(&self.control, &response)
        }

        /// Ticks until an instruction retires or traps, returning the number of ticks taken.
        fn run_instruction(&mut self) -> (u32, TickReport) {
            for ticks in 1..=1000 {
                let report = self.tick();
                if report.retired.is_some()
                    || report.trap.is_some()
                    || report.illegal_instruction.is_some()
                {
                    return (ticks, report);
                }
            }
            panic!("instruction never completed");
        }
    }

    fn harness(program: &[u32]) -> Harness<CsRegisters> {
        Harness::new(CsRegisters::new(), Config::default(), 0, program)
    }

    #[test]
    fn test_simple_instruction_takes_three_ticks() {
        let mut h = harness(&[asm::addi(1, 0, 5), asm::addi(2, 1, 7)]);
        assert_eq!(State::Fetch, h.core.state());
        h.tick();
        assert_eq!(State::WaitInstruction, h.core.state());
        h.tick();
        assert_eq!(State::Execute, h.core.state());
        let report = h.tick();
        assert_eq!(State::Fetch, h.core.state());
        let retired = report.retired.unwrap();
        assert_eq!(0, retired.pc);
        assert_eq!(4, retired.next_pc);
        assert_eq!(5, h.core.registers().read(x(1)));

        assert_eq!(3, h.run_instruction().0);
        assert_eq!(12, h.core.registers().read(x(2)));
        assert_eq!(8, h.core.pc());
    }

    #[test]
    fn test_shift_takes_one_tick_per_bit() {
        let mut h = harness(&[asm::addi(1, 0, 1), asm::slli(2, 1, 2), asm::slli(3, 1, 0)]);
        h.run_instruction();
        // Execute issues, then 2 shift ticks in WAIT_BUSY.
        assert_eq!(5, h.run_instruction().0);
        assert_eq!(4, h.core.registers().read(x(2)));
        assert_eq!(3, h.run_instruction().0);
        assert_eq!(1, h.core.registers().read(x(3)));
    }

    #[test]
    fn test_two_level_shifter() {
        let config = Config {
            two_level_shifter: true,
            ..Config::default()
        };
        let program = [asm::addi(1, 0, 1), asm::slli(2, 1, 9)];
        let mut h = Harness::new(CsRegisters::new(), config, 0, &program);
        h.run_instruction();
        // 9 = 4 + 4 + 1
        assert_eq!(6, h.run_instruction().0);
        assert_eq!(1 << 9, h.core.registers().read(x(2)));
    }

    #[test]
    fn test_division_takes_32_ticks() {
        let program = [asm::addi(1, 0, 100), asm::addi(2, 0, 7), asm::divu(3, 1, 2)];
        let mut h = harness(&program);
        h.run_instruction();
        h.run_instruction();
        assert_eq!(3 + 32, h.run_instruction().0);
        assert_eq!(14, h.core.registers().read(x(3)));
    }

    #[test]
    fn test_multiply_is_single_tick() {
        let program = [asm::addi(1, 0, -3), asm::addi(2, 0, 7), asm::mul(3, 1, 2)];
        let mut h = harness(&program);
        h.run_instruction();
        h.run_instruction();
        assert_eq!(3, h.run_instruction().0);
        assert_eq!(-21i32 as u32, h.core.registers().read(x(3)));
    }

    #[test]
    fn test_load_and_store_with_wait_states() {
        let program = [
            asm::addi(1, 0, 0x7AB),
            asm::sw(1, 0, 0x100),
            asm::lb(2, 0, 0x100),
            asm::lhu(3, 0, 0x100),
        ];
        let mut h = Harness::new(CsRegisters::new(), Config::default(), 2, &program);
        // Fetch waits 2 ticks.
        assert_eq!(5, h.run_instruction().0);
        // The data access is busy for its strobe tick and the 2 wait states.
        assert_eq!(8, h.run_instruction().0);
        assert_eq!(Some(0x7AB), h.ram.read_word(0x100));
        assert_eq!(8, h.run_instruction().0);
        assert_eq!(-85i32 as u32, h.core.registers().read(x(2)));
        h.run_instruction();
        assert_eq!(0x7AB, h.core.registers().read(x(3)));
    }

    #[test]
    fn test_jumps_and_branches() {
        let program = [
            asm::jal(1, 8),
            asm::addi(5, 0, 1),
            asm::beq(0, 0, -4),
        ];
        let mut h = harness(&program);
        let (_, report) = h.run_instruction();
        assert_eq!(8, report.retired.unwrap().next_pc);
        assert_eq!(4, h.core.registers().read(Specifier::RA));
        let (_, report) = h.run_instruction();
        assert_eq!(4, report.retired.unwrap().next_pc);
        h.run_instruction();
        assert_eq!(1, h.core.registers().read(x(5)));
    }

    #[test]
    fn test_compressed_and_straddling_instructions() {
        // c.li a0, 5 ; addi a1, a0, 1 (at offset 2, straddling) ; c.j .
        let addi = asm::addi(11, 10, 1);
        let words = [0x4515 | (addi & 0xFFFF) << 16, addi >> 16 | 0xA001 << 16];
        let mut h = harness(&words);

        let (ticks, report) = h.run_instruction();
        assert_eq!(3, ticks);
        assert_eq!(2, report.retired.unwrap().next_pc);
        assert_eq!(5, h.core.registers().read(x(10)));

        // Two fetches for the straddling instruction.
        let (ticks, report) = h.run_instruction();
        assert_eq!(5, ticks);
        assert_eq!(6, report.retired.unwrap().next_pc);
        assert_eq!(6, h.core.registers().read(x(11)));

        let (_, report) = h.run_instruction();
        assert_eq!(6, report.retired.unwrap().next_pc);
    }

    #[test]
    fn test_illegal_instruction_traps() {
        let program = [asm::csrrwi(0, 0x305, 0x10), 0xFFFF_FFFF, 0, 0, asm::addi(1, 0, 1)];
        let mut h = harness(&program);
        h.run_instruction();
        let (_, report) = h.run_instruction();
        assert_eq!(4, report.illegal_instruction.unwrap().pc);
        assert_eq!(
            Some(TrapEntry {
                cause: TrapCause::IllegalInstruction,
                return_address: 4,
                vector: 0x10
            }),
            report.trap
        );
        assert_eq!(None, report.retired);
        assert_eq!(0x10, h.core.pc());
        assert_eq!(Some(TrapCause::IllegalInstruction), h.core.csr().exception());
        assert_eq!(0, h.core.csr().read(MCAUSE));
        assert_eq!(4, h.core.csr().read(MEPC));
    }

    #[test]
    fn test_reduced_csr_skips_illegal_instruction() {
        let program = [0xFFFF_FFFF, asm::addi(1, 0, 1)];
        let mut h = Harness::new(CycleCounter::new(), Config::default(), 0, &program);
        let (_, report) = h.run_instruction();
        assert!(report.illegal_instruction.is_some());
        assert_eq!(4, h.core.pc());
        h.run_instruction();
        assert_eq!(1, h.core.registers().read(x(1)));
    }

    #[test]
    fn test_interrupt_taken_at_commit() {
        let program = [
            asm::csrrwi(0, 0x305, 0x14),
            asm::csrrsi(0, 0x300, 0b1000),
            asm::addi(1, 0, 1),
            asm::addi(1, 0, 2),
            asm::jal(0, 0),
            // Handler
            asm::addi(2, 0, 7),
            asm::mret(),
        ];
        let mut h = harness(&program);
        h.control.interrupt = true;
        h.run_instruction();
        // Enabling interrupts lets the request in right after the CSR write commits.
        let (_, report) = h.run_instruction();
        assert_eq!(8, report.retired.unwrap().next_pc);
        assert_eq!(TrapCause::Interrupt, report.trap.unwrap().cause);
        assert_eq!(0x14, h.core.pc());
        assert_eq!(8, h.core.csr().mepc());
        assert!(h.core.csr().in_interrupt());

        // Held off while in the handler.
        let (_, report) = h.run_instruction();
        assert_eq!(None, report.trap);
        assert_eq!(0x18, h.core.pc());
        h.control.interrupt = false;
        let (_, report) = h.run_instruction();
        assert_eq!(8, report.retired.unwrap().next_pc);
        assert!(!h.core.csr().in_interrupt());
        assert_eq!(7, h.core.registers().read(x(2)));
        assert_eq!(0, h.core.registers().read(x(1)));
    }

    #[test]
    fn test_environment_call_and_breakpoint() {
        let program = [
            asm::addi(1, 0, 0x20),
            asm::csrrw(0, MTVEC, 1),
            asm::addi(5, 0, 1),
            asm::ecall(),
            asm::ebreak(),
            asm::jal(0, 0),
            0,
            0,
            // Handler: skip the trapping instruction and return.
            asm::csrrs(6, MEPC, 0),
            asm::addi(6, 6, 4),
            asm::csrrw(0, MEPC, 6),
            asm::mret(),
        ];
        let mut h = harness(&program);
        for _ in 0..3 {
            h.run_instruction();
        }

        for (cause, pc) in [(TrapCause::EnvironmentCall, 0x0C), (TrapCause::Breakpoint, 0x10)] {
            let (_, report) = h.run_instruction();
            assert_eq!(None, report.retired);
            assert_eq!(
                Some(TrapEntry {
                    cause,
                    return_address: pc,
                    vector: 0x20
                }),
                report.trap
            );
            assert_eq!(0x20, h.core.pc());
            assert_eq!(pc, h.core.csr().read(MEPC));
            assert_eq!(Some(cause), h.core.csr().exception());
            assert_eq!(0, h.core.csr().read(MCAUSE));

            for _ in 0..3 {
                h.run_instruction();
            }
            let (_, report) = h.run_instruction();
            assert_eq!(pc + 4, report.retired.unwrap().next_pc);
            assert_eq!(None, h.core.csr().exception());
        }
        assert_eq!(11, TrapCause::EnvironmentCall.code());
        assert_eq!(3, TrapCause::Breakpoint.code());
        assert_eq!(0x14, h.core.pc());
        // Nothing written back by the trapping instructions.
        assert_eq!(1, h.core.registers().read(x(5)));
    }

    #[test]
    fn test_interrupt_held_off_in_exception_handler() {
        let mut program = vec![
            asm::addi(1, 0, 0x40),
            asm::csrrw(0, MTVEC, 1),
            asm::csrrsi(0, MSTATUS, 0b1000),
            asm::ecall(),
            asm::addi(7, 0, 1),
            asm::jal(0, 0),
        ];
        program.resize(0x40 / 4, 0);
        // Handler: skip the ECALL and return.
        program.extend([
            asm::csrrs(5, MEPC, 0),
            asm::addi(5, 5, 4),
            asm::csrrw(0, MEPC, 5),
            asm::mret(),
        ]);
        let mut h = harness(&program);
        for _ in 0..3 {
            h.run_instruction();
        }
        let (_, report) = h.run_instruction();
        assert_eq!(TrapCause::EnvironmentCall, report.trap.unwrap().cause);
        assert_eq!(0x40, h.core.pc());

        h.control.interrupt = true;
        for _ in 0..3 {
            let (_, report) = h.run_instruction();
            assert_eq!(None, report.trap);
        }
        assert_eq!(0x10, h.core.csr().read(MEPC));

        h.control.interrupt = false;
        let (_, report) = h.run_instruction();
        assert_eq!(0x10, report.retired.unwrap().next_pc);
        assert_eq!(0x10, h.core.pc());
        h.run_instruction();
        assert_eq!(1, h.core.registers().read(x(7)));
    }

    #[test]
    fn test_interrupt_taken_after_exception_returns() {
        let mut program = vec![
            asm::addi(1, 0, 0x40),
            asm::csrrw(0, MTVEC, 1),
            asm::csrrsi(0, MSTATUS, 0b1000),
            asm::ecall(),
            asm::jal(0, 0),
        ];
        program.resize(0x40 / 4, 0);
        program.extend([
            asm::csrrs(5, MEPC, 0),
            asm::addi(5, 5, 4),
            asm::csrrw(0, MEPC, 5),
            asm::mret(),
        ]);
        let mut h = harness(&program);
        for _ in 0..4 {
            h.run_instruction();
        }
        h.control.interrupt = true;
        for _ in 0..3 {
            h.run_instruction();
        }
        // The request is only let in once MRET has left the exception handler.
        let (_, report) = h.run_instruction();
        assert_eq!(0x10, report.retired.unwrap().next_pc);
        assert_eq!(
            Some(TrapEntry {
                cause: TrapCause::Interrupt,
                return_address: 0x10,
                vector: 0x40
            }),
            report.trap
        );
        assert_eq!(0x8000_0000, h.core.csr().read(MCAUSE));
        assert_eq!(None, h.core.csr().exception());
    }

    #[test]
    fn test_csr_set_and_clear_without_source_do_not_write() {
        let program = [
            asm::addi(1, 0, 0x5C),
            asm::csrrw(2, MTVEC, 1),
            asm::csrrs(3, MTVEC, 0),
            asm::csrrc(4, MTVEC, 0),
            asm::csrrsi(5, MTVEC, 0),
            asm::csrrci(6, MTVEC, 0),
            asm::csrrsi(7, MTVEC, 0b11),
            asm::csrrci(8, MTVEC, 0b1100),
            asm::csrrc(9, MTVEC, 1),
            asm::csrrwi(10, MTVEC, 0),
        ];
        let mut h = harness(&program);
        for _ in 0..2 {
            h.run_instruction();
        }
        assert_eq!(0, h.core.registers().read(x(2)));
        assert_eq!(0x5C, h.core.csr().read(MTVEC));

        // A zero source leaves the CSR alone, but still reads it.
        for _ in 0..4 {
            let (_, report) = h.run_instruction();
            assert!(report.retired.is_some());
            assert_eq!(0x5C, h.core.csr().read(MTVEC));
        }
        for rd in 3..=6 {
            assert_eq!(0x5C, h.core.registers().read(x(rd)));
        }

        h.run_instruction();
        assert_eq!(0x5C, h.core.registers().read(x(7)));
        assert_eq!(0x5F, h.core.csr().read(MTVEC));
        h.run_instruction();
        assert_eq!(0x5F, h.core.registers().read(x(8)));
        assert_eq!(0x53, h.core.csr().read(MTVEC));
        h.run_instruction();
        assert_eq!(0x53, h.core.registers().read(x(9)));
        assert_eq!(0x03, h.core.csr().read(MTVEC));
        h.run_instruction();
        assert_eq!(0x03, h.core.registers().read(x(10)));
        assert_eq!(0, h.core.csr().read(MTVEC));
    }

    #[test]
    fn test_jalr_and_auipc() {
        let program = [
            asm::auipc(1, 0x1),
            asm::addi(2, 0, 0x15),
            // Bit 0 of the target is cleared.
            asm::jalr(3, 2, -1),
            asm::addi(4, 0, 1),
            asm::addi(5, 0, 1),
            asm::auipc(6, 0xFFFFF),
        ];
        let mut h = harness(&program);
        h.run_instruction();
        assert_eq!(0x1000, h.core.registers().read(x(1)));
        h.run_instruction();
        let (_, report) = h.run_instruction();
        assert_eq!(0x14, report.retired.unwrap().next_pc);
        assert_eq!(0x0C, h.core.registers().read(x(3)));
        let (_, report) = h.run_instruction();
        assert_eq!(0x14, report.retired.unwrap().pc);
        assert_eq!(0x14u32.wrapping_sub(0x1000), h.core.registers().read(x(6)));
        assert_eq!(0, h.core.registers().read(x(4)));
        assert_eq!(0, h.core.registers().read(x(5)));
    }

    #[test]
    fn test_fence_and_wfi_are_no_ops() {
        let program = [asm::fence(), asm::wfi(), asm::addi(1, 0, 3)];
        let mut h = harness(&program);
        h.control.interrupt = true;
        for pc in [0, 4] {
            let (ticks, report) = h.run_instruction();
            assert_eq!(3, ticks);
            let retired = report.retired.unwrap();
            assert_eq!(pc, retired.pc);
            assert_eq!(pc + 4, retired.next_pc);
            assert_eq!(None, report.trap);
        }
        h.run_instruction();
        assert_eq!(3, h.core.registers().read(x(1)));
        for rd in 0..32 {
            if rd != 1 {
                assert_eq!(0, h.core.registers().read(x(rd)));
            }
        }
    }

    #[test]
    fn test_cycle_counter_readable() {
        let mut h = harness(&[asm::csrrs(5, CYCLE, 0)]);
        h.run_instruction();
        // Read during the third tick out of reset, before that tick is counted.
        assert_eq!(2, h.core.registers().read(x(5)));
        assert_eq!(3, h.core.csr().cycles());
    }

    #[test]
    fn test_reset_has_priority() {
        let config = Config {
            reset_address: 8,
            ..Config::default()
        };
        let program = [0, 0, asm::addi(1, 0, 1), asm::jal(0, 0)];
        let mut h = Harness::new(CsRegisters::new(), config, 0, &program);
        h.run_instruction();
        h.tick();
        h.control.reset = true;
        assert!(h.core.bus_request(&h.control).is_idle());
        let report = h.tick();
        assert_eq!(TickReport::default(), report);
        assert_eq!(8, h.core.pc());
        assert_eq!(State::Fetch, h.core.state());
        assert_eq!(0, h.core.registers().read(x(1)));
        assert_eq!(0, h.core.csr().cycles());
    }

    #[test]
    fn test_address_width_wraps_pc() {
        let config = Config {
            reset_address: 0xFFFF_F000,
            address_width: 12,
            ..Config::default()
        };
        let mut h = Harness::new(CsRegisters::new(), config, 0, &[asm::jal(0, -4)]);
        assert_eq!(0, h.core.pc());
        let (_, report) = h.run_instruction();
        assert_eq!(0xFFC, report.retired.unwrap().next_pc);
        assert_eq!(0xFFC, h.core.pc());
    }
}
