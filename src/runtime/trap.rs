use std::io::Write;

use super::{RunEnvironment, Status};
use crate::input::InputDevice;
use crate::ops::Instr;
use crate::RunError;

/// Built-in service routines, selected by the low byte of a `TRAP` instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapVector {
    /// Read a character without echo.
    Getc = 0x20,
    /// Write the character in `R0`.
    Out = 0x21,
    /// Write the string at `R0`, one character per word.
    Puts = 0x22,
    /// Prompt for, read and echo a character.
    In = 0x23,
    /// Write the string at `R0`, two characters per word.
    Putsp = 0x24,
    Halt = 0x25,
}

impl TryFrom<u8> for TrapVector {
    type Error = ();
    fn try_from(vect: u8) -> Result<Self, Self::Error> {
        let vect = match vect {
            0x20 => Self::Getc,
            0x21 => Self::Out,
            0x22 => Self::Puts,
            0x23 => Self::In,
            0x24 => Self::Putsp,
            0x25 => Self::Halt,
            _ => return Err(()),
        };
        Ok(vect)
    }
}

const IN_PROMPT: &[u8] = b"Enter a character: ";

impl<I, W> RunEnvironment<I, W>
where
    I: InputDevice,
    W: Write,
{
    pub(super) fn trap(&mut self, instr: Instr) -> Result<(), RunError> {
        self.state.reg.set(7, self.state.reg.pc);

        let Ok(vect) = TrapVector::try_from(instr.trap_vect()) else {
            log::debug!("ignoring unknown trap vector {:#04x}", instr.trap_vect());
            return Ok(());
        };

        match vect {
            TrapVector::Getc => {
                let ch = self.input.read_blocking().map_err(RunError::Input)?;
                self.state.reg.set_with_flags(0, ch as u16);
            }
            TrapVector::Out => {
                let ch = (self.state.reg.get(0) & 0xFF) as u8;
                self.put(&[ch])?;
            }
            TrapVector::Puts => {
                let start = self.state.reg.get(0);
                for chr_raw in self.string_words(start) {
                    self.put(&[(chr_raw & 0xFF) as u8])?;
                }
            }
            TrapVector::In => {
                self.put(IN_PROMPT)?;
                let ch = self.input.read_blocking().map_err(RunError::Input)?;
                self.put(&[ch])?;
                self.state.reg.set_with_flags(0, ch as u16);
            }
            TrapVector::Putsp => {
                let start = self.state.reg.get(0);
                for chr_raw in self.string_words(start) {
                    let [high, low] = chr_raw.to_be_bytes();
                    self.put(&[low])?;
                    if high != 0 {
                        self.put(&[high])?;
                    }
                }
            }
            TrapVector::Halt => {
                self.put(b"HALT\n")?;
                self.status = Status::Halted;
            }
        }
        Ok(())
    }

    /// Words of a zero-terminated string, read without touching mapped registers.
    fn string_words(&self, start: u16) -> Vec<u16> {
        let mem = &self.state.mem;
        (0..=u16::MAX)
            .map(|i| mem.peek(start.wrapping_add(i)))
            .take_while(|&word| word != 0)
            .collect()
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), RunError> {
        self.output
            .write_all(bytes)
            .and_then(|()| self.output.flush())
            .map_err(RunError::Output)
    }
}
