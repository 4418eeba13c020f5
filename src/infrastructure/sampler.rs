use crate::domain::registry::{Gauge, MetricRegistry};
use crate::domain::types::{labels, LabelSet, RegistryResult};
use crate::infrastructure::obd::{ObdClient, ObdCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Ticks between periodic progress log lines
const STATS_LOG_INTERVAL: u64 = 120;

/// One configured association between an OBD command and a registry gauge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Command issued to the device each tick
    pub command: ObdCommand,
    /// Name of the gauge receiving the decoded value
    pub metric: String,
    /// Help text of the gauge
    pub help: String,
}

impl Reading {
    /// Creates a reading
    pub fn new(command: ObdCommand, metric: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            command,
            metric: metric.into(),
            help: help.into(),
        }
    }
}

/// The standard set of readings this exporter samples
pub fn standard_readings() -> Vec<Reading> {
    vec![
        Reading::new(ObdCommand::EngineRpm, "obd_engine_rpm", "OBD Engine RPM"),
        Reading::new(ObdCommand::EngineLoad, "obd_engine_load", "OBD Engine Load"),
        Reading::new(
            ObdCommand::VehicleSpeed,
            "obd_vehicle_speed",
            "OBD Vehicle Speed",
        ),
        Reading::new(
            ObdCommand::CoolantTemp,
            "obd_coolant_temperature",
            "OBD Coolant temp",
        ),
        Reading::new(
            ObdCommand::ThrottlePosition,
            "obd_throttle_position",
            "OBD throttle pos",
        ),
        Reading::new(
            ObdCommand::TimingAdvance,
            "obd_timing_advance",
            "OBD timing advance",
        ),
    ]
}

/// Registers one gauge per reading, each carrying a constant `host` label.
///
/// Runs once at startup; a duplicate name here is a configuration bug and
/// fails fast before sampling begins.
pub fn register_gauges(
    registry: &MetricRegistry,
    readings: &[Reading],
    host: &str,
) -> RegistryResult<()> {
    let tags = labels(&[("host", host)]);
    for reading in readings {
        registry.register(Gauge::new(
            reading.metric.as_str(),
            reading.help.as_str(),
            tags.clone(),
        ))?;
    }
    Ok(())
}

/// Counters kept by the sampling loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    /// Completed ticks
    pub ticks: u64,
    /// Readings successfully written to the registry
    pub samples: u64,
    /// Readings skipped because the vehicle had no data
    pub skipped: u64,
    /// Readings lost to communication faults
    pub faults: u64,
}

impl SamplerStats {
    /// Folds one completed tick into the running totals
    pub fn absorb_tick(&mut self, tick: &SamplerStats) {
        self.ticks += 1;
        self.samples += tick.samples;
        self.skipped += tick.skipped;
        self.faults += tick.faults;
    }
}

/// Fixed-interval sampling loop feeding the registry.
///
/// Runs as its own tokio task for the process lifetime; communication with
/// the scrape handler happens only through the shared registry. Shutdown is
/// signalled through a `watch` channel and observed at tick boundaries.
pub struct Sampler<C: ObdClient> {
    client: C,
    registry: Arc<MetricRegistry>,
    readings: Vec<Reading>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<C: ObdClient + 'static> Sampler<C> {
    /// Creates a sampler; gauges for `readings` must already be registered
    pub fn new(
        client: C,
        registry: Arc<MetricRegistry>,
        readings: Vec<Reading>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            registry,
            readings,
            interval,
            shutdown,
        }
    }

    /// Runs the sampling loop until shutdown is signalled.
    ///
    /// A device fault never terminates the loop: the reading is skipped for
    /// that tick, its last-known value stays exposed, and the next tick
    /// retries. Each tick's device I/O runs on the blocking thread pool so
    /// a slow serial read never holds an async worker away from scrapes.
    pub async fn run(self) -> SamplerStats {
        info!(
            "Starting sampler: {} readings every {:?}",
            self.readings.len(),
            self.interval
        );

        let Sampler {
            client,
            registry,
            readings,
            interval,
            mut shutdown,
        } = self;
        let readings = Arc::new(readings);
        let mut client = Some(client);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = SamplerStats::default();

        loop {
            tokio::select! {
                // Check shutdown before starting another tick
                biased;
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let mut tick_client = client.take().expect("device client in use");
                    let tick_registry = Arc::clone(&registry);
                    let tick_readings = Arc::clone(&readings);
                    let joined = tokio::task::spawn_blocking(move || {
                        let tick = sample_tick(&mut tick_client, &tick_registry, &tick_readings);
                        (tick_client, tick)
                    })
                    .await;
                    match joined {
                        Ok((returned, tick)) => {
                            client = Some(returned);
                            stats.absorb_tick(&tick);
                            if stats.ticks % STATS_LOG_INTERVAL == 0 {
                                info!(
                                    "Sampled {} ticks: {} values, {} skipped, {} faults",
                                    stats.ticks, stats.samples, stats.skipped, stats.faults
                                );
                            }
                        }
                        Err(e) => {
                            error!("Sampling tick panicked: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        info!(
            "Sampler stopped after {} ticks: {} values, {} skipped, {} faults",
            stats.ticks, stats.samples, stats.skipped, stats.faults
        );
        stats
    }
}

/// Queries every reading once and writes successes into the registry.
///
/// Runs on the blocking thread pool: a serial read can stall for the full
/// read timeout and must not occupy an async worker.
fn sample_tick<C: ObdClient>(
    client: &mut C,
    registry: &MetricRegistry,
    readings: &[Reading],
) -> SamplerStats {
    let mut tick = SamplerStats::default();
    for reading in readings {
        match client.query(reading.command) {
            Ok(Some(measurement)) => {
                tick.samples += 1;
                if let Err(e) =
                    registry.set(&reading.metric, &LabelSet::new(), measurement.magnitude)
                {
                    // Unreachable with gauges registered at startup
                    error!("Failed to record {}: {}", reading.metric, e);
                }
            }
            Ok(None) => {
                tick.skipped += 1;
                debug!("No data for {}, keeping last value", reading.command);
            }
            Err(e) => {
                tick.faults += 1;
                warn!("Query {} failed: {}", reading.command, e);
            }
        }
    }
    tick
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::obd::{ObdError, ScriptedClient};

    fn sampler_with(
        client: ScriptedClient,
        readings: Vec<Reading>,
    ) -> (Sampler<ScriptedClient>, Arc<MetricRegistry>, watch::Sender<bool>) {
        let registry = Arc::new(MetricRegistry::new());
        register_gauges(&registry, &readings, "testhost").unwrap();
        let (tx, rx) = watch::channel(false);
        let sampler = Sampler::new(
            client,
            Arc::clone(&registry),
            readings,
            Duration::from_millis(5),
            rx,
        );
        (sampler, registry, tx)
    }

    fn rpm_value(registry: &MetricRegistry) -> Option<f64> {
        registry
            .snapshot()
            .iter()
            .find(|m| m.name == "obd_engine_rpm")
            .and_then(|m| m.samples.first())
            .map(|s| s.value)
    }

    #[test]
    fn standard_readings_cover_all_commands() {
        let readings = standard_readings();
        assert_eq!(readings.len(), 6);
        assert_eq!(readings[0].metric, "obd_engine_rpm");
        assert_eq!(readings[3].metric, "obd_coolant_temperature");
    }

    #[test]
    fn register_gauges_fails_fast_on_duplicates() {
        let registry = MetricRegistry::new();
        let doubled = [standard_readings(), standard_readings()].concat();
        assert!(register_gauges(&registry, &doubled, "h").is_err());
    }

    #[test]
    fn sample_tick_writes_and_absorbs_faults() {
        let readings = vec![
            Reading::new(ObdCommand::EngineRpm, "obd_engine_rpm", "OBD Engine RPM"),
            Reading::new(ObdCommand::VehicleSpeed, "obd_vehicle_speed", "OBD Vehicle Speed"),
        ];
        let registry = MetricRegistry::new();
        register_gauges(&registry, &readings, "testhost").unwrap();
        let mut client = ScriptedClient::new();
        client.push_value(ObdCommand::EngineRpm, 1500.0);
        client.push(
            ObdCommand::VehicleSpeed,
            Err(ObdError::Adapter("unplugged".into())),
        );

        let tick = sample_tick(&mut client, &registry, &readings);

        assert_eq!(tick.samples, 1);
        assert_eq!(tick.faults, 1);
        assert_eq!(rpm_value(&registry), Some(1500.0));
    }

    #[test]
    fn null_response_retains_last_value() {
        let readings = vec![Reading::new(
            ObdCommand::EngineRpm,
            "obd_engine_rpm",
            "OBD Engine RPM",
        )];
        let registry = MetricRegistry::new();
        register_gauges(&registry, &readings, "testhost").unwrap();
        let mut client = ScriptedClient::new();
        client.push_value(ObdCommand::EngineRpm, 1500.0);
        client.push(ObdCommand::EngineRpm, Ok(None));

        let mut stats = SamplerStats::default();
        stats.absorb_tick(&sample_tick(&mut client, &registry, &readings));
        stats.absorb_tick(&sample_tick(&mut client, &registry, &readings));

        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(rpm_value(&registry), Some(1500.0));
    }

    #[tokio::test]
    async fn run_exits_on_shutdown_signal() {
        let readings = vec![Reading::new(
            ObdCommand::EngineRpm,
            "obd_engine_rpm",
            "OBD Engine RPM",
        )];
        let mut client = ScriptedClient::new();
        client.push_value(ObdCommand::EngineRpm, 900.0);

        let (sampler, registry, tx) = sampler_with(client, readings);
        let handle = tokio::spawn(sampler.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();
        assert!(stats.ticks >= 1);
        assert_eq!(rpm_value(&registry), Some(900.0));
    }

    #[tokio::test]
    async fn run_survives_device_faults() {
        let readings = vec![Reading::new(
            ObdCommand::CoolantTemp,
            "obd_coolant_temperature",
            "OBD Coolant temp",
        )];
        let mut client = ScriptedClient::new();
        client.push(
            ObdCommand::CoolantTemp,
            Err(ObdError::Adapter("bus off".into())),
        );
        client.push_value(ObdCommand::CoolantTemp, 88.0);

        let (sampler, registry, tx) = sampler_with(client, readings);
        let handle = tokio::spawn(sampler.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();
        assert_eq!(stats.faults, 1);
        let temp = registry
            .snapshot()
            .iter()
            .find(|m| m.name == "obd_coolant_temperature")
            .and_then(|m| m.samples.first())
            .map(|s| s.value);
        assert_eq!(temp, Some(88.0));
    }

    /// Client whose queries stall like a serial read waiting out its timeout
    struct StallingClient {
        delay: Duration,
    }

    impl ObdClient for StallingClient {
        fn query(&mut self, _command: ObdCommand) -> crate::ObdResult<Option<crate::Measurement>> {
            std::thread::sleep(self.delay);
            Ok(None)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn slow_device_query_does_not_starve_the_runtime() {
        let readings = vec![Reading::new(
            ObdCommand::EngineRpm,
            "obd_engine_rpm",
            "OBD Engine RPM",
        )];
        let registry = Arc::new(MetricRegistry::new());
        register_gauges(&registry, &readings, "testhost").unwrap();
        let (tx, rx) = watch::channel(false);
        let sampler = Sampler::new(
            StallingClient {
                delay: Duration::from_millis(400),
            },
            Arc::clone(&registry),
            readings,
            Duration::from_millis(5),
            rx,
        );
        let handle = tokio::spawn(sampler.run());

        // Land in the middle of a stalled tick, then check the single
        // async worker is still responsive
        tokio::time::sleep(Duration::from_millis(50)).await;
        let start = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let elapsed = start.elapsed();
        assert!(
            elapsed < Duration::from_millis(300),
            "runtime starved for {:?} by the device query",
            elapsed
        );

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();
    }
}
