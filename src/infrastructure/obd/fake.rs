use crate::infrastructure::obd::{Measurement, ObdClient, ObdCommand, ObdResult};
use std::collections::{HashMap, VecDeque};

/// Scripted device client used in tests to drive the sampler.
///
/// Responses are queued per command and popped in order; once a queue is
/// exhausted the client answers `Ok(None)`, which mimics a vehicle with
/// nothing to report.
#[derive(Default)]
pub struct ScriptedClient {
    script: HashMap<ObdCommand, VecDeque<ObdResult<Option<Measurement>>>>,
    queries: Vec<ObdCommand>,
}

impl ScriptedClient {
    /// Creates a client with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `command`
    pub fn push(&mut self, command: ObdCommand, response: ObdResult<Option<Measurement>>) {
        self.script.entry(command).or_default().push_back(response);
    }

    /// Queues a successful reading for `command`
    pub fn push_value(&mut self, command: ObdCommand, magnitude: f64) {
        self.push(
            command,
            Ok(Some(Measurement {
                magnitude,
                unit: command.unit(),
            })),
        );
    }

    /// Commands queried so far, in order
    pub fn queries(&self) -> &[ObdCommand] {
        &self.queries
    }
}

impl ObdClient for ScriptedClient {
    fn query(&mut self, command: ObdCommand) -> ObdResult<Option<Measurement>> {
        self.queries.push(command);
        match self.script.get_mut(&command).and_then(VecDeque::pop_front) {
            Some(response) => response,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::obd::{ObdError, Unit};

    #[test]
    fn scripted_responses_pop_in_order() {
        let mut client = ScriptedClient::new();
        client.push_value(ObdCommand::EngineRpm, 1500.0);
        client.push(ObdCommand::EngineRpm, Ok(None));
        client.push(
            ObdCommand::EngineRpm,
            Err(ObdError::Adapter("unplugged".into())),
        );

        let first = client.query(ObdCommand::EngineRpm).unwrap().unwrap();
        assert_eq!(first.magnitude, 1500.0);
        assert_eq!(first.unit, Unit::Rpm);
        assert!(client.query(ObdCommand::EngineRpm).unwrap().is_none());
        assert!(client.query(ObdCommand::EngineRpm).is_err());
    }

    #[test]
    fn exhausted_script_returns_none() {
        let mut client = ScriptedClient::new();
        assert!(client.query(ObdCommand::VehicleSpeed).unwrap().is_none());
        assert_eq!(client.queries(), &[ObdCommand::VehicleSpeed]);
    }
}
