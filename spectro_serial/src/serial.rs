//! Serial port transport (`hardware` feature).

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};
use spectro_traits::{Transport, TransportError};

use crate::error::{Result, SerialError};
use crate::util::LineAssembler;

pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    lines: LineAssembler,
}

impl SerialTransport {
    pub fn open(port: &str, baud: u32, read_timeout: Duration) -> Result<Self> {
        let handle = serialport::new(port, baud)
            .timeout(read_timeout)
            .open()
            .map_err(|e| SerialError::Open {
                port: port.to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(port, baud, "serial port opened");
        Ok(Self {
            port: Some(handle),
            name: port.to_string(),
            lines: LineAssembler::default(),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(SerialError::Closed)
    }
}

impl Transport for SerialTransport {
    fn read_line(&mut self, timeout: Duration) -> std::result::Result<Option<String>, TransportError> {
        if let Some(line) = self.lines.pop_line() {
            return Ok(Some(line));
        }
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let port = self.port()?;
            port.set_timeout(remaining)
                .map_err(|e| SerialError::Io(std::io::Error::other(e.to_string())))?;
            match port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    self.lines.push(&chunk[..n]);
                    if let Some(line) = self.lines.pop_line() {
                        return Ok(Some(line));
                    }
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Box::new(SerialError::Io(e))),
            }
        }
    }

    fn write_line(&mut self, line: &str) -> std::result::Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(line.as_bytes()).map_err(SerialError::Io)?;
        port.write_all(b"\n").map_err(SerialError::Io)?;
        port.flush().map_err(SerialError::Io)?;
        Ok(())
    }

    fn reset_input(&mut self) -> std::result::Result<(), TransportError> {
        self.lines.clear();
        self.port()?
            .clear(ClearBuffer::Input)
            .map_err(|e| SerialError::Io(std::io::Error::other(e.to_string())))?;
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        if self.port.take().is_some() {
            tracing::info!(port = %self.name, "serial port closed");
        }
        Ok(())
    }
}
