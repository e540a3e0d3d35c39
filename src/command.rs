//! Serial command channel.
//!
//! The remote side speaks a two-command text protocol: `load on` and
//! `load off`, newline terminated, mapping directly to the power-on flag.
//! Every accepted line is answered with `ok`, everything else with `err`.

use crate::{
    context::LoadCommand,
    error::{Error, Result},
};
use embedded_io::Error as _;

/// You can create a CommandPort over any interface which implements
/// [embedded_io::Read] & [embedded_io::Write].
///
/// Poll it once per scheduler pass; it consumes whatever bytes have arrived,
/// acts on each completed line and leaves a partial line buffered for the
/// next poll.
pub struct CommandPort<S: embedded_io::Read + embedded_io::Write, const L: usize = 64> {
    interface: S,
    line: heapless::Vec<u8, L>,
    /// Swallowing the tail of an overlong line, up to its newline.
    discarding: bool,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> CommandPort<S, L> {
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            line: heapless::Vec::new(),
            discarding: false,
        }
    }

    /// Drain the receive side and apply any completed commands.
    ///
    /// Returns after the interface reports no more data. An unknown or
    /// overlong command is answered with `err` on the wire (or silently
    /// discarded through its newline) and the first such failure reported to
    /// the caller; the drain keeps going so later commands in the same burst
    /// still apply. Bytes of a partial line stay queued for the next poll.
    pub fn poll(&mut self, command: &mut LoadCommand) -> Result<(), S::Error> {
        let mut result = Ok(());
        let mut temp_buf = [0u8; 8];
        loop {
            match self.interface.read(&mut temp_buf) {
                Ok(0) => return result,
                Ok(bytes_read) => {
                    for &byte in &temp_buf[0..bytes_read] {
                        if let Err(e) = self.handle_byte(byte, command) {
                            if result.is_ok() {
                                result = Err(e);
                            }
                        }
                    }
                }
                Err(e) => {
                    // WouldBlock-style errors just mean the buffer ran dry.
                    if matches!(
                        e.kind(),
                        embedded_io::ErrorKind::Other | embedded_io::ErrorKind::TimedOut
                    ) {
                        return result;
                    }
                    return Err(Error::SerialError(e));
                }
            }
        }
    }

    fn handle_byte(&mut self, byte: u8, command: &mut LoadCommand) -> Result<(), S::Error> {
        if self.discarding {
            if byte == b'\n' {
                self.discarding = false;
            }
            return Ok(());
        }
        if byte != b'\n' {
            if self.line.push(byte).is_err() {
                // Line longer than the buffer can never parse; drop it whole,
                // tail included, so the channel resynchronizes at the next
                // newline without parsing the tail as a command.
                self.line.clear();
                self.discarding = true;
                return Err(Error::BufferError);
            }
            return Ok(());
        }

        let line = trim_line(&self.line);
        let parsed = match line {
            b"" => {
                self.line.clear();
                return Ok(());
            }
            b"load on" => Some(true),
            b"load off" => Some(false),
            _ => None,
        };
        self.line.clear();

        match parsed {
            // The test/calibration override holds the command fields; the
            // remote side gets refused rather than silently ignored.
            Some(_) if command.io_control_disabled => {
                self.reply(b"err\n")?;
                Ok(())
            }
            Some(power_on) => {
                command.power_on = power_on;
                self.reply(b"ok\n")
            }
            None => {
                self.reply(b"err\n")?;
                Err(Error::UnknownCommand)
            }
        }
    }

    fn reply(&mut self, response: &[u8]) -> Result<(), S::Error> {
        self.interface
            .write_all(response)
            .map_err(Error::SerialError)?;
        Ok(())
    }

    pub fn interface(&self) -> &S {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }
}

/// Strip the trailing `\r` of CRLF-terminated senders.
fn trim_line(line: &[u8]) -> &[u8] {
    match line {
        [rest @ .., b'\r'] => rest,
        other => other,
    }
}
