use std::io::{self, ErrorKind, Read};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

/// Source of keyboard characters for the machine.
///
/// Consumed by the keyboard status register (which only ever polls) and by the `GETC` and
/// `IN` traps (which block).
pub trait InputDevice {
    /// Whether a character can be read right now, without waiting.
    fn poll(&mut self) -> bool;

    /// Wait for, and consume, the next character.
    fn read_blocking(&mut self) -> io::Result<u8>;
}

impl<T: InputDevice + ?Sized> InputDevice for &mut T {
    fn poll(&mut self) -> bool {
        (**self).poll()
    }

    fn read_blocking(&mut self) -> io::Result<u8> {
        (**self).read_blocking()
    }
}

impl<T: InputDevice + ?Sized> InputDevice for Box<T> {
    fn poll(&mut self) -> bool {
        (**self).poll()
    }

    fn read_blocking(&mut self) -> io::Result<u8> {
        (**self).read_blocking()
    }
}

/// Input from a plain byte stream, such as piped stdin or a scripted buffer.
///
/// The stream is drained by a background thread, so polling never waits on a reader that has
/// nothing to say yet. The stream is closed once that thread hangs up.
pub struct ByteInput {
    bytes: Receiver<io::Result<u8>>,
    /// Taken from the channel by [`InputDevice::poll`], held back for the following read.
    lookahead: Option<io::Result<u8>>,
}

impl ByteInput {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || pump(reader, tx));
        Self {
            bytes: rx,
            lookahead: None,
        }
    }
}

/// Forward every byte of `reader` until it ends, fails, or nobody is listening.
fn pump(mut reader: impl Read, tx: Sender<io::Result<u8>>) {
    let mut buf = [0; 256];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if buf[..n].iter().any(|&byte| tx.send(Ok(byte)).is_err()) {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
    log::debug!("input stream reached end");
}

fn closed() -> io::Error {
    io::Error::new(ErrorKind::UnexpectedEof, "input stream closed")
}

impl InputDevice for ByteInput {
    fn poll(&mut self) -> bool {
        if self.lookahead.is_none() {
            match self.bytes.try_recv() {
                Ok(next) => {
                    if let Err(e) = &next {
                        log::warn!("input stream failed: {e}");
                    }
                    self.lookahead = Some(next);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return false,
            }
        }
        matches!(self.lookahead, Some(Ok(_)))
    }

    fn read_blocking(&mut self) -> io::Result<u8> {
        match self.lookahead.take() {
            Some(next) => next,
            None => self.bytes.recv().map_err(|_| closed())?,
        }
    }
}
