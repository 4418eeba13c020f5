use crate::infrastructure::obd::{Measurement, ObdClient, ObdCommand, ObdError, ObdResult};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Serial read timeout; a stalled adapter surfaces as a per-tick fault
const READ_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Reset, echo off, linefeeds off, automatic protocol selection
const INIT_SEQUENCE: [&str; 4] = ["ATZ", "ATE0", "ATL0", "ATSP0"];

/// ELM327 adapter client, generic over its serial transport.
///
/// The adapter speaks a line protocol: commands are terminated with `\r`
/// and every response ends with a `>` prompt. Tests substitute an
/// in-memory transport for the serial port.
pub struct Elm327Client<T> {
    port: T,
}

impl Elm327Client<Box<dyn serialport::SerialPort>> {
    /// Opens the serial device and runs the adapter initialization
    /// sequence. Any failure here is a startup fault.
    pub fn open(path: &str, baud: u32) -> ObdResult<Self> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| ObdError::Adapter(format!("cannot open {}: {}", path, e)))?;
        info!("Opened serial device {} at {} baud", path, baud);
        Self::from_transport(port)
    }
}

impl<T: Read + Write + Send> Elm327Client<T> {
    /// Wraps an already-open transport and initializes the adapter
    pub fn from_transport(port: T) -> ObdResult<Self> {
        let mut client = Self { port };
        client.initialize()?;
        Ok(client)
    }

    fn initialize(&mut self) -> ObdResult<()> {
        for command in INIT_SEQUENCE {
            self.send(command)?;
            let reply = self.read_until_prompt()?;
            debug!("init {} -> {:?}", command, reply.trim());
        }
        info!("ELM327 adapter initialized");
        Ok(())
    }

    fn send(&mut self, line: &str) -> ObdResult<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        Ok(())
    }

    /// Reads until the adapter's `>` prompt. EOF before the prompt ends the
    /// read with whatever was received (scripted transports in tests).
    fn read_until_prompt(&mut self) -> ObdResult<String> {
        let mut raw = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'>' => break,
                Ok(_) => raw.push(byte[0]),
                Err(e) => return Err(ObdError::Io(e)),
            }
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Extracts the data bytes for `command` from a raw adapter reply.
    ///
    /// `Ok(None)` means the vehicle had nothing to say (NO DATA and
    /// friends); `Err` means the reply could not be understood at all.
    fn parse_payload(command: ObdCommand, raw: &str) -> ObdResult<Option<Vec<u8>>> {
        let mode_echo = format!("{:02X}", command.pid());
        for line in raw.split(['\r', '\n']) {
            let line = line.trim();
            if line.is_empty() || line.starts_with("SEARCHING") {
                continue;
            }
            if line.contains("NO DATA")
                || line.contains("UNABLE TO CONNECT")
                || line.contains("CAN ERROR")
                || line.contains("STOPPED")
            {
                return Ok(None);
            }
            if line == "?" {
                return Err(ObdError::Adapter(format!(
                    "adapter rejected command {}",
                    command
                )));
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() >= 2 && tokens[0] == "41" && tokens[1] == mode_echo {
                let data = tokens[2..]
                    .iter()
                    .map(|t| u8::from_str_radix(t, 16))
                    .collect::<Result<Vec<u8>, _>>()
                    .map_err(|_| ObdError::Malformed(line.to_string()))?;
                return Ok(Some(data));
            }
        }
        Err(ObdError::Malformed(raw.trim().to_string()))
    }
}

impl<T: Read + Write + Send> ObdClient for Elm327Client<T> {
    fn query(&mut self, command: ObdCommand) -> ObdResult<Option<Measurement>> {
        self.send(&command.request())?;
        let raw = self.read_until_prompt()?;
        let data = match Self::parse_payload(command, &raw)? {
            Some(data) => data,
            None => return Ok(None),
        };
        let magnitude = command.decode(&data)?;
        Ok(Some(Measurement {
            magnitude,
            unit: command.unit(),
        }))
    }
}
