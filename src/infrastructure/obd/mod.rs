//! OBD-II device client
//!
//! This module owns everything that talks to the vehicle: the mode-01
//! command set with its PID encodings, the [`ObdClient`] trait the sampler
//! consumes, and the [`Elm327Client`] serial implementation. A scripted
//! client for tests lives in [`fake`].

/// ELM327 adapter client over a serial transport
pub mod elm327;
/// Scripted device client for tests
pub mod fake;

pub use elm327::Elm327Client;
pub use fake::ScriptedClient;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mode-01 OBD-II commands this exporter can issue and decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObdCommand {
    /// Engine speed (PID 0x0C)
    EngineRpm,
    /// Calculated engine load (PID 0x04)
    EngineLoad,
    /// Vehicle speed (PID 0x0D)
    VehicleSpeed,
    /// Engine coolant temperature (PID 0x05)
    CoolantTemp,
    /// Absolute throttle position (PID 0x11)
    ThrottlePosition,
    /// Ignition timing advance (PID 0x0E)
    TimingAdvance,
}

impl ObdCommand {
    /// Mode-01 parameter id
    pub fn pid(&self) -> u8 {
        match self {
            ObdCommand::EngineRpm => 0x0C,
            ObdCommand::EngineLoad => 0x04,
            ObdCommand::VehicleSpeed => 0x0D,
            ObdCommand::CoolantTemp => 0x05,
            ObdCommand::ThrottlePosition => 0x11,
            ObdCommand::TimingAdvance => 0x0E,
        }
    }

    /// Request string sent to the adapter, e.g. `010C` for engine RPM
    pub fn request(&self) -> String {
        format!("01{:02X}", self.pid())
    }

    /// Number of data bytes the decode formula needs
    pub fn expected_bytes(&self) -> usize {
        match self {
            ObdCommand::EngineRpm => 2,
            _ => 1,
        }
    }

    /// Unit of the decoded magnitude
    pub fn unit(&self) -> Unit {
        match self {
            ObdCommand::EngineRpm => Unit::Rpm,
            ObdCommand::EngineLoad | ObdCommand::ThrottlePosition => Unit::Percent,
            ObdCommand::VehicleSpeed => Unit::KilometersPerHour,
            ObdCommand::CoolantTemp => Unit::Celsius,
            ObdCommand::TimingAdvance => Unit::Degrees,
        }
    }

    /// Decodes the response data bytes into a physical magnitude.
    ///
    /// Formulas follow SAE J1979 (A = first data byte, B = second):
    /// RPM = (256A + B) / 4, load and throttle = 100A / 255, speed = A,
    /// coolant = A - 40, timing advance = A / 2 - 64.
    pub fn decode(&self, data: &[u8]) -> ObdResult<f64> {
        if data.len() < self.expected_bytes() {
            return Err(ObdError::Malformed(format!(
                "{} response too short: {} byte(s)",
                self,
                data.len()
            )));
        }
        let a = f64::from(data[0]);
        Ok(match self {
            ObdCommand::EngineRpm => (a * 256.0 + f64::from(data[1])) / 4.0,
            ObdCommand::EngineLoad | ObdCommand::ThrottlePosition => a * 100.0 / 255.0,
            ObdCommand::VehicleSpeed => a,
            ObdCommand::CoolantTemp => a - 40.0,
            ObdCommand::TimingAdvance => a / 2.0 - 64.0,
        })
    }
}

impl fmt::Display for ObdCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObdCommand::EngineRpm => "RPM",
            ObdCommand::EngineLoad => "ENGINE_LOAD",
            ObdCommand::VehicleSpeed => "SPEED",
            ObdCommand::CoolantTemp => "COOLANT_TEMP",
            ObdCommand::ThrottlePosition => "THROTTLE_POS",
            ObdCommand::TimingAdvance => "TIMING_ADVANCE",
        };
        write!(f, "{}", name)
    }
}

/// Physical unit of a decoded reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// Revolutions per minute
    Rpm,
    /// Percentage (0-100)
    Percent,
    /// Kilometers per hour
    KilometersPerHour,
    /// Degrees Celsius
    Celsius,
    /// Degrees before top dead center
    Degrees,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            Unit::Rpm => "rpm",
            Unit::Percent => "percent",
            Unit::KilometersPerHour => "kph",
            Unit::Celsius => "celsius",
            Unit::Degrees => "degrees",
        };
        write!(f, "{}", unit)
    }
}

/// One decoded reading from the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Decoded physical value
    pub magnitude: f64,
    /// Unit of the value
    pub unit: Unit,
}

/// Device communication errors
#[derive(Debug, thiserror::Error)]
pub enum ObdError {
    /// Serial I/O failure, including read timeouts
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The adapter itself reported a failure
    #[error("adapter error: {0}")]
    Adapter(String),

    /// The adapter replied with something we cannot parse
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Result type for device operations
pub type ObdResult<T> = Result<T, ObdError>;

/// A connected OBD-II instrument.
///
/// `query` returns `Ok(None)` when the vehicle has no data for the command
/// (ignition off, unsupported PID); callers keep the last known value in
/// that case. Communication faults surface as `Err` and are handled at the
/// tick boundary by the sampler.
pub trait ObdClient: Send {
    /// Issues one command and decodes the response
    fn query(&mut self, command: ObdCommand) -> ObdResult<Option<Measurement>>;
}
