// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime tuning of the scheduler, the `[scheduler]` table of `fledge.toml`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Period of the scheduler loop
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// How long `stop` waits for running tasks before interrupting them
    #[serde(with = "humantime_serde")]
    pub stop_grace_period: Duration,
    /// Upper bound on concurrently running tasks
    pub max_running_tasks: usize,
    /// Row limit applied to queries that do not set one
    pub default_query_limit: usize,
    /// Base directory for relative scripts; also the tasks' cwd
    pub working_dir: Option<PathBuf>,
    pub storage_retry: RetryPolicy,
    /// Core management endpoint passed to every task
    pub management: Option<ManagementAddress>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            stop_grace_period: Duration::from_secs(30),
            max_running_tasks: 50,
            default_query_limit: 100,
            working_dir: None,
            storage_retry: RetryPolicy::default(),
            management: None,
        }
    }
}

/// Retry of transient storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub attempts: u32,
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementAddress {
    pub address: String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let config: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.default_query_limit, 100);
        assert_eq!(config.storage_retry.attempts, 3);
    }

    #[test]
    fn durations_use_humantime() {
        let config: SchedulerConfig = toml::from_str(
            r#"
            tick_interval = "250ms"
            stop_grace_period = "2m"
            max_running_tasks = 4
            working_dir = "/usr/local/fledge"

            [storage_retry]
            attempts = 5
            backoff = "1s"

            [management]
            address = "127.0.0.1"
            port = 8081
            "#,
        )
        .unwrap();

        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.stop_grace_period, Duration::from_secs(120));
        assert_eq!(config.max_running_tasks, 4);
        assert_eq!(config.working_dir, Some(PathBuf::from("/usr/local/fledge")));
        assert_eq!(
            config.storage_retry,
            RetryPolicy {
                attempts: 5,
                backoff: Duration::from_secs(1)
            }
        );
        assert_eq!(
            config.management,
            Some(ManagementAddress {
                address: "127.0.0.1".to_string(),
                port: 8081
            })
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<SchedulerConfig, _> = toml::from_str("tick = \"1s\"");
        assert!(result.is_err());
    }
}
