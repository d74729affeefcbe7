use std::io::Write;

use crate::input::InputDevice;
use crate::ops::{Instr, Opcode};
use crate::state::{Registers, VmState};
use crate::RunError;

mod trap;

pub use self::trap::TrapVector;

/// Execution status of the machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Running,
    /// Reached a `HALT` trap.
    Halted,
    /// Tried to execute an illegal opcode. The machine cannot continue.
    Aborted,
}

/// Machine state together with the devices it talks to.
///
/// Owns everything the program can touch; nothing else mutates it while running.
pub struct RunEnvironment<I, W> {
    state: VmState,
    input: I,
    output: W,
    status: Status,
}

impl<I, W> RunEnvironment<I, W>
where
    I: InputDevice,
    W: Write,
{
    pub fn new(state: VmState, input: I, output: W) -> Self {
        Self {
            state,
            input,
            output,
            status: Status::Running,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn state(&self) -> &VmState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut VmState {
        &mut self.state
    }

    pub fn registers(&self) -> &Registers {
        &self.state.reg
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run until the program halts.
    pub fn run(&mut self) -> Result<(), RunError> {
        while self.step()? == Status::Running {}
        Ok(())
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// Does nothing once the machine has stopped.
    pub fn step(&mut self) -> Result<Status, RunError> {
        if self.status != Status::Running {
            return Ok(self.status);
        }

        let pc = self.state.reg.pc;
        let instr = Instr(self.read(pc)?);
        // PC incremented before instruction is performed
        self.state.reg.pc = pc.wrapping_add(1);

        let opcode = instr.opcode();
        log::trace!("{pc:#06x}: {:#06x} {opcode:?}", instr.0);

        match opcode {
            Opcode::BR => self.br(instr),
            Opcode::ADD => self.add(instr),
            Opcode::LD => self.ld(instr)?,
            Opcode::ST => self.st(instr),
            Opcode::JSR => self.jsr(instr),
            Opcode::AND => self.and(instr),
            Opcode::LDR => self.ldr(instr)?,
            Opcode::STR => self.str(instr),
            Opcode::NOT => self.not(instr),
            Opcode::LDI => self.ldi(instr)?,
            Opcode::STI => self.sti(instr)?,
            Opcode::JMP => self.jmp(instr),
            Opcode::LEA => self.lea(instr),
            Opcode::TRAP => self.trap(instr)?,
            Opcode::RTI | Opcode::RES => {
                self.status = Status::Aborted;
                return Err(RunError::IllegalOpcode {
                    opcode: opcode as u16,
                    instr: instr.0,
                    pc,
                });
            }
        }
        Ok(self.status)
    }

    /// Read memory through the bus, so mapped registers see the access.
    #[inline]
    fn read(&mut self, addr: u16) -> Result<u16, RunError> {
        self.state.mem.read(addr, &mut self.input)
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u16) {
        self.state.mem.write(addr, val)
    }

    #[inline]
    fn pc_relative(&self, offset: u16) -> u16 {
        self.state.reg.pc.wrapping_add(offset)
    }

    fn add(&mut self, instr: Instr) {
        let val1 = self.state.reg.get(instr.sr1());
        // Check if imm
        let val2 = if instr.is_imm() {
            instr.imm5()
        } else {
            self.state.reg.get(instr.sr2())
        };
        self.state
            .reg
            .set_with_flags(instr.dr(), val1.wrapping_add(val2));
    }

    fn and(&mut self, instr: Instr) {
        let val1 = self.state.reg.get(instr.sr1());
        let val2 = if instr.is_imm() {
            instr.imm5()
        } else {
            self.state.reg.get(instr.sr2())
        };
        self.state.reg.set_with_flags(instr.dr(), val1 & val2);
    }

    fn not(&mut self, instr: Instr) {
        let val = !self.state.reg.get(instr.sr1());
        self.state.reg.set_with_flags(instr.dr(), val);
    }

    fn br(&mut self, instr: Instr) {
        if self.state.reg.flag as u16 & instr.cond_mask() != 0 {
            self.state.reg.pc = self.pc_relative(instr.pc_offset9());
        }
    }

    fn jmp(&mut self, instr: Instr) {
        self.state.reg.pc = self.state.reg.get(instr.sr1());
    }

    fn jsr(&mut self, instr: Instr) {
        let ret = self.state.reg.pc;
        self.state.reg.set(7, ret);
        self.state.reg.pc = if instr.is_long() {
            ret.wrapping_add(instr.pc_offset11())
        } else {
            // Read after R7 is saved, so `JSRR R7` falls through
            self.state.reg.get(instr.sr1())
        };
    }

    fn ld(&mut self, instr: Instr) -> Result<(), RunError> {
        let val = self.read(self.pc_relative(instr.pc_offset9()))?;
        self.state.reg.set_with_flags(instr.dr(), val);
        Ok(())
    }

    fn ldi(&mut self, instr: Instr) -> Result<(), RunError> {
        let ptr = self.read(self.pc_relative(instr.pc_offset9()))?;
        let val = self.read(ptr)?;
        self.state.reg.set_with_flags(instr.dr(), val);
        Ok(())
    }

    fn ldr(&mut self, instr: Instr) -> Result<(), RunError> {
        let base = self.state.reg.get(instr.sr1());
        let val = self.read(base.wrapping_add(instr.offset6()))?;
        self.state.reg.set_with_flags(instr.dr(), val);
        Ok(())
    }

    fn lea(&mut self, instr: Instr) {
        let val = self.pc_relative(instr.pc_offset9());
        self.state.reg.set_with_flags(instr.dr(), val);
    }

    fn st(&mut self, instr: Instr) {
        let val = self.state.reg.get(instr.dr());
        self.write(self.pc_relative(instr.pc_offset9()), val);
    }

    fn sti(&mut self, instr: Instr) -> Result<(), RunError> {
        let val = self.state.reg.get(instr.dr());
        let ptr = self.read(self.pc_relative(instr.pc_offset9()))?;
        self.write(ptr, val);
        Ok(())
    }

    fn str(&mut self, instr: Instr) {
        let val = self.state.reg.get(instr.dr());
        let base = self.state.reg.get(instr.sr1());
        self.write(base.wrapping_add(instr.offset6()), val);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::input::ByteInput;
    use crate::state::{CondFlag, KBDR, KBSR, PC_START};
    use proptest::prelude::*;

    pub type TestEnv = RunEnvironment<ByteInput, Vec<u8>>;

    /// Machine with `program` placed at the start address.
    pub fn machine(program: &[u16], input: &'static [u8]) -> TestEnv {
        let mut state = VmState::new();
        for (addr, word) in (PC_START..).zip(program) {
            state.mem.write(addr, *word);
        }
        RunEnvironment::new(state, ByteInput::new(input), Vec::new())
    }

    fn reg(env: &TestEnv, reg: u16) -> u16 {
        env.registers().get(reg)
    }

    #[test]
    fn add_immediate() {
        // ADD R0, R1, #-2
        let mut env = machine(&[0x107E], b"");
        env.state_mut().reg.set(1, 3);
        env.step().unwrap();
        assert_eq!(reg(&env, 0), 1);
        assert_eq!(env.registers().flag, CondFlag::P);

        // ADD R0, R1, #0
        let mut env = machine(&[0x1060], b"");
        env.state_mut().reg.flag = CondFlag::P;
        env.step().unwrap();
        assert_eq!(reg(&env, 0), 0);
        assert_eq!(env.registers().flag, CondFlag::Z);
    }

    #[test]
    fn add_register_wraps() {
        // ADD R2, R0, R1
        let mut env = machine(&[0x1401], b"");
        env.state_mut().reg.set(0, 0x7FFF);
        env.state_mut().reg.set(1, 1);
        env.step().unwrap();
        assert_eq!(reg(&env, 2), 0x8000);
        assert_eq!(env.registers().flag, CondFlag::N);
    }

    #[test]
    fn and_not() {
        // AND R0, R0, #0
        // NOT R1, R0
        let mut env = machine(&[0x5020, 0x923F], b"");
        env.state_mut().reg.set(0, 0x1234);
        env.step().unwrap();
        assert_eq!(reg(&env, 0), 0);
        assert_eq!(env.registers().flag, CondFlag::Z);
        env.step().unwrap();
        assert_eq!(reg(&env, 1), 0xFFFF);
        assert_eq!(env.registers().flag, CondFlag::N);
    }

    #[test]
    fn branch_follows_flags() {
        // AND R0, R0, #0
        // BRz #1
        // ADD R0, R0, #1
        // BRp #1
        // ADD R0, R0, #2
        // HALT
        let mut env = machine(&[0x5020, 0x0401, 0x1021, 0x0201, 0x1022, 0xF025], b"");
        env.run().unwrap();
        assert_eq!(reg(&env, 0), 2);
        assert_eq!(env.status(), Status::Halted);
    }

    #[test]
    fn branch_without_mask_never_taken() {
        // BR(none) #5
        let mut env = machine(&[0x0005], b"");
        for flag in [CondFlag::N, CondFlag::Z, CondFlag::P] {
            env.state_mut().reg.pc = PC_START;
            env.state_mut().reg.flag = flag;
            env.step().unwrap();
            assert_eq!(env.registers().pc, PC_START + 1);
        }
    }

    #[test]
    fn jumps_and_subroutines() {
        // JMP R2
        let mut env = machine(&[0xC080], b"");
        env.state_mut().reg.set(2, 0x4000);
        env.step().unwrap();
        assert_eq!(env.registers().pc, 0x4000);

        // JSR #2
        let mut env = machine(&[0x4802], b"");
        env.step().unwrap();
        assert_eq!(reg(&env, 7), 0x3001);
        assert_eq!(env.registers().pc, 0x3003);

        // JSRR R3
        let mut env = machine(&[0x40C0], b"");
        env.state_mut().reg.set(3, 0x5000);
        env.step().unwrap();
        assert_eq!(reg(&env, 7), 0x3001);
        assert_eq!(env.registers().pc, 0x5000);

        // JSRR R7
        let mut env = machine(&[0x41C0], b"");
        env.state_mut().reg.set(7, 0x5000);
        env.step().unwrap();
        assert_eq!(env.registers().pc, 0x3001);
    }

    #[test]
    fn control_transfers_keep_flags() {
        // JSR #0
        let mut env = machine(&[0x4800], b"");
        env.state_mut().reg.flag = CondFlag::N;
        env.step().unwrap();
        assert_eq!(env.registers().flag, CondFlag::N);
    }

    #[test]
    fn load_indirect() {
        let mut env = machine(&[], b"");
        // LDI R3, #15 placed so that the pointer is read from 0x3000
        env.state_mut().mem.write(0x2FF0, 0xA60F);
        env.state_mut().mem.write(0x3000, 0x3002);
        env.state_mut().mem.write(0x3002, 0x1234);
        env.state_mut().reg.pc = 0x2FF0;
        env.step().unwrap();
        assert_eq!(reg(&env, 3), 0x1234);
        assert_eq!(env.registers().flag, CondFlag::P);
    }

    #[test]
    fn load_effective_address() {
        // LEA R4, #-1
        let mut env = machine(&[0xE9FF], b"");
        env.step().unwrap();
        assert_eq!(reg(&env, 4), 0x3000);
        assert_eq!(env.registers().flag, CondFlag::P);
    }

    #[test]
    fn store_then_load() {
        // ST R1, #2
        // LD R2, #1
        let mut env = machine(&[0x3202, 0x2401], b"");
        env.state_mut().reg.set(1, 0xCAFE);
        env.state_mut().reg.flag = CondFlag::Z;
        env.step().unwrap();
        // Plain stores leave flags alone
        assert_eq!(env.registers().flag, CondFlag::Z);
        env.step().unwrap();
        assert_eq!(env.state().mem.peek(0x3003), 0xCAFE);
        assert_eq!(reg(&env, 2), 0xCAFE);
        assert_eq!(env.registers().flag, CondFlag::N);
    }

    #[test]
    fn store_indirect() {
        // STI R1, #1
        let mut env = machine(&[0xB201, 0x0000, 0x4000], b"");
        env.state_mut().reg.set(1, 0x0042);
        env.step().unwrap();
        assert_eq!(env.state().mem.peek(0x4000), 0x0042);
    }

    #[test]
    fn negative_base_offset() {
        // STR R1, R0, #-1
        // LDR R2, R0, #-1
        let mut env = machine(&[0x723F, 0x643F], b"");
        env.state_mut().reg.set(0, 0x0000);
        env.state_mut().reg.set(1, 7);
        env.step().unwrap();
        env.step().unwrap();
        assert_eq!(env.state().mem.peek(0xFFFF), 7);
        assert_eq!(reg(&env, 2), 7);
    }

    #[test]
    fn pc_wraps_at_top_of_memory() {
        let mut env = machine(&[], b"");
        // ADD R0, R0, #1
        env.state_mut().mem.write(0xFFFF, 0x1021);
        // HALT
        env.state_mut().mem.write(0x0000, 0xF025);
        env.state_mut().reg.pc = 0xFFFF;
        env.run().unwrap();
        assert_eq!(reg(&env, 0), 1);
        assert_eq!(env.registers().pc, 0x0001);
    }

    #[test]
    fn illegal_opcodes_abort() {
        for word in [0x8000, 0xD123] {
            let mut env = machine(&[0x1021, word], b"");
            let err = env.run().unwrap_err();
            match err {
                RunError::IllegalOpcode { opcode, instr, pc } => {
                    assert_eq!(opcode, word >> 12);
                    assert_eq!(instr, word);
                    assert_eq!(pc, 0x3001);
                }
                other => panic!("unexpected error {other:?}"),
            }
            assert_eq!(env.status(), Status::Aborted);
            // Stopped for good
            assert_eq!(env.step().unwrap(), Status::Aborted);
        }
    }

    #[test]
    fn halt_stops_before_remaining_program() {
        // HALT
        // ADD R0, R0, #1
        // RES
        let mut env = machine(&[0xF025, 0x1021, 0xD000], b"");
        env.run().unwrap();
        assert_eq!(env.status(), Status::Halted);
        assert_eq!(reg(&env, 0), 0);
        assert_eq!(env.step().unwrap(), Status::Halted);
        assert_eq!(env.registers().pc, 0x3001);
    }

    #[test]
    fn polls_keyboard_registers() {
        // LDI R0, #3   ; KBSR
        // BRzp #-2
        // LDI R0, #2   ; KBDR
        // HALT
        // .FILL xFE00
        // .FILL xFE02
        let program = [0xA003, 0x07FE, 0xA002, 0xF025, KBSR, KBDR];
        let mut env = machine(&program, b"q");
        env.run().unwrap();
        assert_eq!(reg(&env, 0), b'q' as u16);
        assert_eq!(env.state().mem.peek(KBSR), 0x8000);
    }

    proptest! {
        #[test]
        fn store_register_then_load_register(addr: u16, val: u16) {
            // Skip the program itself and the mapped status register
            prop_assume!(addr != KBSR && addr != PC_START + 1);
            // STR R1, R0, #0
            // LDR R2, R0, #0
            let mut env = machine(&[0x7200, 0x6400], b"");
            env.state_mut().reg.set(0, addr);
            env.state_mut().reg.set(1, val);
            env.step().unwrap();
            env.step().unwrap();
            prop_assert_eq!(reg(&env, 2), val);
            prop_assert_eq!(env.registers().flag, CondFlag::of(val));
        }
    }
}
