use super::Core;
use crate::branch;
use crate::bus::BusRequest;
use crate::csr::{ControlStatus, CsrSpecifier, TrapCause};
use crate::instruction::{CsrOp, CsrSource, DecodedInstruction, LoadWidth, Operation, SystemOp};
use crate::load_store;
use crate::registers::Specifier;

/// What an instruction in flight is still waiting for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) enum Pending {
    /// Nothing, the outcome is already known.
    Ready(Outcome),
    /// The ALU, whose result is written to `rd`.
    Alu,
    /// Read data for a load from `address`.
    Load { width: LoadWidth, address: u32 },
    /// Completion of a store.
    Store,
}

/// The architectural effect of an instruction, applied when it commits.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) enum Outcome {
    Retire {
        rd_value: Option<u32>,
        next_pc: u32,
        csr_write: Option<(CsrSpecifier, u32)>,
    },
    Trap(TrapCause),
    TrapReturn,
}

impl Outcome {
    fn retire(rd_value: Option<u32>, next_pc: u32) -> Self {
        Self::Retire {
            rd_value,
            next_pc,
            csr_write: None,
        }
    }
}

impl<C: ControlStatus> Core<C> {
    /// Returns the data memory request of `instruction`, or `None` if it doesn't access memory.
    pub(super) fn data_request(&self, instruction: &DecodedInstruction) -> Option<BusRequest> {
        let base = self.registers.read(instruction.rs1);
        let address =
            load_store::effective_address(base, instruction.immediate, self.address_mask);
        match instruction.op {
            Operation::Load(_) => Some(BusRequest::read(address)),
            Operation::Store(width) => Some(BusRequest::write(
                address,
                load_store::store_data(self.registers.read(instruction.rs2), address),
                load_store::write_mask(width, address),
            )),
            _ => None,
        }
    }

    /// Reads the operands of `instruction` and engages the units it needs.
    ///
    /// Memory accesses are not started here: they are driven onto the bus by
    /// [`bus_request`](Core::bus_request) during the same tick.
    pub(super) fn issue(&mut self, instruction: &DecodedInstruction) -> Pending {
        let rs1 = self.registers.read(instruction.rs1);
        let rs2 = self.registers.read(instruction.rs2);
        let pc = self.pc;
        let imm = instruction.immediate;
        let sequential = pc.wrapping_add(instruction.length);

        let outcome = match instruction.op {
            Operation::AluReg(op) => {
                self.alu.issue(op, rs1, rs2);
                return Pending::Alu;
            }
            Operation::AluImm(op) => {
                self.alu.issue(op, rs1, imm as u32);
                return Pending::Alu;
            }
            Operation::Load(width) => {
                let address = load_store::effective_address(rs1, imm, self.address_mask);
                return Pending::Load { width, address };
            }
            Operation::Store(_) => return Pending::Store,
            Operation::Lui => Outcome::retire(Some(imm as u32), sequential),
            Operation::Auipc => Outcome::retire(Some(branch::auipc(pc, imm)), sequential),
            Operation::Jal => Outcome::retire(Some(sequential), branch::jal_target(pc, imm)),
            Operation::Jalr => Outcome::retire(Some(sequential), branch::jalr_target(rs1, imm)),
            Operation::Branch(condition) => {
                let taken = branch::taken(condition, rs1, rs2);
                Outcome::retire(None, branch::branch_target(pc, imm, taken, instruction.length))
            }
            Operation::Fence => Outcome::retire(None, sequential),
            Operation::System(op) => match op {
                SystemOp::Ecall => Outcome::Trap(TrapCause::EnvironmentCall),
                SystemOp::Ebreak => Outcome::Trap(TrapCause::Breakpoint),
                SystemOp::Mret => Outcome::TrapReturn,
                SystemOp::Wfi => Outcome::retire(None, sequential),
                SystemOp::Csr { op, source, csr } => self.csr_access(op, source, csr, sequential),
            },
        };
        Pending::Ready(outcome)
    }

    /// Reads the old value of `csr` and computes the value to write back, if any.
    ///
    /// > If rd=x0, then CSRRW shall not read the CSR and shall not cause any of the side effects
    /// > that might occur on a CSR read. [...] For both CSRRS and CSRRC, if rs1=x0, then the
    /// > instruction will not write to the CSR at all.
    ///
    /// None of the implemented CSRs have read side effects, so the CSR is always read.
    fn csr_access(
        &self,
        op: CsrOp,
        source: CsrSource,
        csr: CsrSpecifier,
        next_pc: u32,
    ) -> Outcome {
        let old = self.csr.read(csr);
        let (operand, source_is_zero) = match source {
            CsrSource::Register(specifier) => {
                (self.registers.read(specifier), specifier == Specifier::X0)
            }
            CsrSource::Immediate(value) => (value, value == 0),
        };
        let new = match op {
            CsrOp::ReadWrite => Some(operand),
            CsrOp::ReadSet => (!source_is_zero).then_some(old | operand),
            CsrOp::ReadClear => (!source_is_zero).then_some(old & !operand),
        };
        Outcome::Retire {
            rd_value: Some(old),
            next_pc,
            csr_write: new.map(|value| (csr, value)),
        }
    }
}
