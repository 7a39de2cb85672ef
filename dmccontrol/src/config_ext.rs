//! Control point settings read from `dmcconfig::Config`.
//!
//! Keys live under `control_point.discovery` and `control_point.transport`.
//! Missing or ill-typed values fall back to the built-in defaults.

use std::time::Duration;

use anyhow::Result;
use dmcconfig::Config;
use serde_yaml::Value;

use crate::controller::ControllerConfig;
use crate::discovery::DiscoveryConfig;

const DEFAULT_SEARCH_MX: u64 = 3;

const DISCOVERY: [&str; 2] = ["control_point", "discovery"];
const TRANSPORT: [&str; 2] = ["control_point", "transport"];

pub trait ControlPointConfigExt {
    /// Target device type, search budget and probe interval.
    fn get_discovery_config(&self) -> Result<DiscoveryConfig>;

    /// AVTransport instance id, worker count and poll interval.
    fn get_controller_config(&self) -> Result<ControllerConfig>;

    /// MX header of outgoing M-SEARCH requests, in seconds.
    fn get_search_mx(&self) -> Result<u32>;

    fn set_search_budget_ms(&self, millis: u64) -> Result<()>;

    fn set_poll_interval_ms(&self, millis: u64) -> Result<()>;
}

impl ControlPointConfigExt for Config {
    fn get_discovery_config(&self) -> Result<DiscoveryConfig> {
        let defaults = DiscoveryConfig::default();
        Ok(DiscoveryConfig {
            target_device_type: string_or(
                self,
                &path(&DISCOVERY, "target_device_type"),
                &defaults.target_device_type,
            ),
            search_budget: millis_or(
                self,
                &path(&DISCOVERY, "search_budget_ms"),
                defaults.search_budget,
            ),
            probe_interval: millis_or(
                self,
                &path(&DISCOVERY, "probe_interval_ms"),
                defaults.probe_interval,
            ),
        })
    }

    fn get_controller_config(&self) -> Result<ControllerConfig> {
        let defaults = ControllerConfig::default();
        let workers = u64_or(self, &path(&TRANSPORT, "workers"), defaults.workers as u64);
        Ok(ControllerConfig {
            instance_id: string_or(self, &path(&TRANSPORT, "instance_id"), &defaults.instance_id),
            workers: workers.max(1) as usize,
            poll_interval: millis_or(
                self,
                &path(&TRANSPORT, "poll_interval_ms"),
                defaults.poll_interval,
            ),
        })
    }

    fn get_search_mx(&self) -> Result<u32> {
        let mx = u64_or(self, &path(&DISCOVERY, "search_mx"), DEFAULT_SEARCH_MX);
        Ok(mx.clamp(1, 5) as u32)
    }

    fn set_search_budget_ms(&self, millis: u64) -> Result<()> {
        self.set_value(&path(&DISCOVERY, "search_budget_ms"), Value::from(millis))
    }

    fn set_poll_interval_ms(&self, millis: u64) -> Result<()> {
        self.set_value(&path(&TRANSPORT, "poll_interval_ms"), Value::from(millis))
    }
}

fn path<'a>(section: &[&'a str; 2], key: &'a str) -> [&'a str; 3] {
    [section[0], section[1], key]
}

fn u64_or(config: &Config, path: &[&str], default: u64) -> u64 {
    match config.get_value(path) {
        Ok(Value::Number(n)) => n.as_u64().unwrap_or(default),
        Ok(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn millis_or(config: &Config, path: &[&str], default: Duration) -> Duration {
    Duration::from_millis(u64_or(config, path, default.as_millis() as u64))
}

// Numbers are accepted too: `instance_id: 0` is a common spelling.
fn string_or(config: &Config, path: &[&str], default: &str) -> String {
    match config.get_value(path) {
        Ok(Value::String(s)) if !s.trim().is_empty() => s,
        Ok(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MEDIA_RENDERER_DEVICE_TYPE;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        Config::load_config(dir.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn embedded_defaults_match_built_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let discovery = config.get_discovery_config().unwrap();
        assert_eq!(discovery.target_device_type, MEDIA_RENDERER_DEVICE_TYPE);
        assert_eq!(discovery.search_budget, Duration::from_millis(5000));
        assert_eq!(discovery.probe_interval, Duration::from_millis(300));

        let controller = config.get_controller_config().unwrap();
        assert_eq!(controller.instance_id, "0");
        assert_eq!(controller.workers, 2);
        assert_eq!(controller.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.get_search_mx().unwrap(), 3);
    }

    #[test]
    fn file_values_and_setters_are_honoured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "control_point:\n  transport:\n    instance_id: 1\n    workers: 0\n  discovery:\n    search_mx: 9\n",
        )
        .unwrap();
        let config = config_in(&dir);

        let controller = config.get_controller_config().unwrap();
        assert_eq!(controller.instance_id, "1");
        assert_eq!(controller.workers, 1);
        assert_eq!(config.get_search_mx().unwrap(), 5);

        config.set_search_budget_ms(800).unwrap();
        config.set_poll_interval_ms(250).unwrap();
        assert_eq!(
            config.get_discovery_config().unwrap().search_budget,
            Duration::from_millis(800)
        );
        assert_eq!(
            config.get_controller_config().unwrap().poll_interval,
            Duration::from_millis(250)
        );
    }
}
