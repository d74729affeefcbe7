use std::cmp::Ordering;
use std::fmt;

use crate::input::InputDevice;
use crate::RunError;

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register. Bit 15 is set when a character is ready in [`KBDR`].
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register.
pub const KBDR: u16 = 0xFE02;

/// Address of the first instruction executed.
pub const PC_START: u16 = 0x3000;

/// Represents complete machine state during runtime.
pub struct VmState {
    pub mem: Memory,
    pub reg: Registers,
}

impl VmState {
    pub fn new() -> Self {
        Self {
            mem: Memory::new(),
            reg: Registers::new(),
        }
    }
}

impl Default for VmState {
    fn default() -> Self {
        Self::new()
    }
}

/// System memory, with the keyboard registers mapped into it.
pub struct Memory {
    /// 128KB in size, so kept off the stack.
    words: Box<[u16; MEMORY_MAX]>,
}

impl Memory {
    pub fn new() -> Self {
        // Allocate through a `Vec` so the array is never built on the stack first
        let words: Box<[u16; MEMORY_MAX]> = vec![0; MEMORY_MAX]
            .into_boxed_slice()
            .try_into()
            .unwrap_or_else(|_| unreachable!("vector has exactly `MEMORY_MAX` words"));
        Self { words }
    }

    /// Read a word as the CPU sees it.
    ///
    /// Reading [`KBSR`] polls `input` once, and refreshes both keyboard registers before the
    /// value is returned. Every other address is plain storage.
    pub fn read<I>(&mut self, addr: u16, input: &mut I) -> Result<u16, RunError>
    where
        I: InputDevice + ?Sized,
    {
        if addr == KBSR {
            if input.poll() {
                let byte = input.read_blocking().map_err(RunError::Input)?;
                self.write(KBSR, 1 << 15);
                self.write(KBDR, byte as u16);
            } else {
                self.write(KBSR, 0);
            }
        }
        Ok(self.peek(addr))
    }

    /// Read a word without any device side effects.
    #[inline]
    pub fn peek(&self, addr: u16) -> u16 {
        self.words[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, val: u16) {
        self.words[addr as usize] = val;
    }

    /// Words from `addr` to the top of memory.
    pub fn tail_mut(&mut self, addr: u16) -> &mut [u16] {
        &mut self.words[addr as usize..]
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Condition code, set using the result of the previous flag-affecting instruction.
///
/// Discriminants line up with the `nzp` mask of a branch instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondFlag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

impl CondFlag {
    pub fn of(val: u16) -> Self {
        match (val as i16).cmp(&0) {
            Ordering::Less => CondFlag::N,
            Ordering::Equal => CondFlag::Z,
            Ordering::Greater => CondFlag::P,
        }
    }
}

/// Register file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registers {
    /// 8x 16-bit registers
    gp: [u16; 8],
    /// Program counter
    pub pc: u16,
    /// Condition code
    pub flag: CondFlag,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            gp: [0; 8],
            pc: PC_START,
            flag: CondFlag::Z,
        }
    }

    #[inline]
    pub fn get(&self, reg: u16) -> u16 {
        self.gp[(reg & 0b111) as usize]
    }

    #[inline]
    pub fn set(&mut self, reg: u16, val: u16) {
        self.gp[(reg & 0b111) as usize] = val;
    }

    /// Classify the current value of `reg` into the condition code.
    #[inline]
    pub fn update_flags(&mut self, reg: u16) {
        self.flag = CondFlag::of(self.get(reg));
    }

    /// Write `reg` and set the condition code from it.
    #[inline]
    pub fn set_with_flags(&mut self, reg: u16, val: u16) {
        self.set(reg, val);
        self.update_flags(reg);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CondFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CondFlag::N => "n",
            CondFlag::Z => "z",
            CondFlag::P => "p",
        };
        write!(f, "{name}")
    }
}
