use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEvent},
    terminal,
};

use crate::input::InputDevice;

/// Exit status after the user interrupts a running program.
pub const INTERRUPT_EXIT_CODE: i32 = -2;

/// Holds the terminal in raw mode (no line buffering, no echo) until dropped.
///
/// Must only be acquired if terminal is NOT already in raw mode.
pub struct RawTerminal {
    _private: (),
}

impl RawTerminal {
    pub fn acquire() -> io::Result<Self> {
        debug_assert!(
            !terminal::is_raw_mode_enabled().is_ok_and(|is| is),
            "terminal should not be in raw mode to enable raw mode",
        );
        terminal::enable_raw_mode()?;
        log::debug!("entered raw terminal mode");
        Ok(Self { _private: () })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("failed to restore terminal: {e}");
        } else {
            log::debug!("left raw terminal mode");
        }
    }
}

/// Only the key information which can reach the machine.
#[derive(Debug, PartialEq, Eq)]
enum Key {
    /// Interrupt the whole program.
    CtrlC,
    Enter,
    Tab,
    Backspace,
    Escape,
    /// Control code for `Ctrl` + letter.
    Control(u8),
    Char(char),
}

/// Keyboard of an interactive terminal.
///
/// Caller must ensure terminal is in raw mode for as long as this is used, see
/// [`RawTerminal`].
#[derive(Default)]
pub struct TerminalInput {
    /// Bytes of characters already read, but not yet consumed.
    ///
    /// Multi-byte characters are encoded as UTF-8 and handed out one byte at a time.
    pending: VecDeque<u8>,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_key(&mut self, key: Key) {
        match key {
            Key::CtrlC => interrupt(),
            Key::Enter => self.pending.push_back(b'\n'),
            Key::Tab => self.pending.push_back(b'\t'),
            Key::Backspace => self.pending.push_back(0x7F),
            Key::Escape => self.pending.push_back(0x1B),
            Key::Control(code) => self.pending.push_back(code),
            Key::Char(ch) => {
                let mut bytes = [0u8; 4];
                self.pending
                    .extend(ch.encode_utf8(&mut bytes).as_bytes().iter().copied());
            }
        }
    }
}

impl InputDevice for TerminalInput {
    fn poll(&mut self) -> bool {
        while self.pending.is_empty() {
            match event::poll(Duration::ZERO) {
                Ok(true) => match event::read() {
                    Ok(event) => {
                        if let Ok(key) = Key::try_from(event) {
                            self.push_key(key);
                        }
                    }
                    Err(e) => {
                        log::warn!("failed to read terminal event: {e}");
                        return false;
                    }
                },
                Ok(false) => return false,
                Err(e) => {
                    log::warn!("failed to poll terminal: {e}");
                    return false;
                }
            }
        }
        true
    }

    fn read_blocking(&mut self) -> io::Result<u8> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            if let Ok(key) = Key::try_from(event::read()?) {
                self.push_key(key);
            }
        }
    }
}

/// Return the terminal to normal state and exit.
///
/// `process::exit` skips destructors, so raw mode is released here rather than by the guard.
fn interrupt() -> ! {
    let _ = terminal::disable_raw_mode(); // Generic cleanup
    println!();
    std::process::exit(INTERRUPT_EXIT_CODE);
}

/// Program output while the terminal is in raw mode.
///
/// Raw mode also disables output processing, so line feeds written to the terminal must carry
/// their own carriage return. Output redirected elsewhere is passed through untouched.
pub struct TerminalOutput<W> {
    inner: W,
    expand_newlines: bool,
}

impl<W: Write> TerminalOutput<W> {
    /// `to_terminal` must be whether `inner` writes to the raw terminal.
    pub fn new(inner: W, to_terminal: bool) -> Self {
        Self {
            inner,
            expand_newlines: to_terminal,
        }
    }
}

impl<W: Write> Write for TerminalOutput<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.expand_newlines {
            return self.inner.write(buf);
        }
        for line in buf.split_inclusive(|&byte| byte == b'\n') {
            match line.split_last() {
                Some((b'\n', rest)) => {
                    self.inner.write_all(rest)?;
                    self.inner.write_all(b"\r\n")?;
                }
                _ => self.inner.write_all(line)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl TryFrom<Event> for Key {
    type Error = ();
    fn try_from(event: Event) -> Result<Self, Self::Error> {
        if let Event::Key(event) = event {
            if let Ok(key) = event.try_into() {
                return Ok(key);
            }
        }
        Err(())
    }
}

impl TryFrom<KeyEvent> for Key {
    type Error = ();
    fn try_from(event: KeyEvent) -> Result<Self, Self::Error> {
        use event::{KeyCode, KeyEventKind, KeyModifiers as Mod};

        if matches!(event.kind, KeyEventKind::Release) {
            return Err(());
        }

        let key = match (event.modifiers, event.code) {
            // Ctrl+C
            (Mod::CONTROL, KeyCode::Char('c')) => Key::CtrlC,

            // Ctrl + letter
            (Mod::CONTROL, KeyCode::Char(ch)) if ch.is_ascii_alphabetic() => {
                Key::Control(ch.to_ascii_lowercase() as u8 - b'a' + 1)
            }

            (_, KeyCode::Enter) | (_, KeyCode::Char('\n')) => Key::Enter,
            (_, KeyCode::Tab) => Key::Tab,
            (_, KeyCode::Backspace) => Key::Backspace,
            (_, KeyCode::Esc) => Key::Escape,

            // Normal character
            (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) => Key::Char(ch),

            _ => return Err(()),
        };

        Ok(key)
    }
}
