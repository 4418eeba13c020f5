use clap::Parser;

/// Prometheus exporter for live OBD-II vehicle readings
#[derive(Debug, Clone, Parser)]
#[command(name = "obd-exporter", version, about)]
pub struct Config {
    /// Serial device the ELM327 adapter is attached to
    #[arg(long, env = "OBD_DEVICE", default_value = "/dev/ttyUSB0")]
    pub device: String,

    /// Serial baud rate
    #[arg(long, env = "OBD_BAUD", default_value_t = 115_200)]
    pub baud: u32,

    /// TCP port the metrics endpoint listens on
    #[arg(long, env = "OBD_EXPORTER_PORT", default_value_t = 8081)]
    pub port: u16,

    /// Sampling interval in milliseconds
    #[arg(long, env = "OBD_SAMPLE_INTERVAL_MS", default_value_t = 500)]
    pub interval_ms: u64,

    /// Value of the constant `host` label attached to every metric
    #[arg(long, env = "HOSTNAME", default_value_t = default_host())]
    pub host: String,
}

/// Default for the `host` label: the machine's hostname.
///
/// `HOSTNAME` is usually absent under systemd, so `/etc/hostname` is the
/// reliable source; `localhost` only when even that is missing.
fn default_host() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_minimal_deployment() {
        let config = Config::parse_from(["obd-exporter"]);
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.baud, 115_200);
        assert_eq!(config.port, 8081);
        assert_eq!(config.interval_ms, 500);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "obd-exporter",
            "--device",
            "/dev/ttyACM0",
            "--baud",
            "38400",
            "--port",
            "9100",
            "--interval-ms",
            "1000",
            "--host",
            "car01",
        ]);
        assert_eq!(config.device, "/dev/ttyACM0");
        assert_eq!(config.baud, 38_400);
        assert_eq!(config.port, 9100);
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.host, "car01");
    }

    #[test]
    fn default_host_is_the_machine_hostname() {
        let host = default_host();
        assert!(!host.is_empty());
        if let Ok(etc) = std::fs::read_to_string("/etc/hostname") {
            let machine = etc.trim();
            if !machine.is_empty() {
                assert_eq!(host, machine);
            }
        }
    }

    #[test]
    fn host_defaults_follow_default_host_when_env_is_unset() {
        if std::env::var("HOSTNAME").is_err() {
            let config = Config::parse_from(["obd-exporter"]);
            assert_eq!(config.host, default_host());
        }
    }
}
