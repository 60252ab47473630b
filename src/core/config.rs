//! Pipeline configuration
//!
//! `AsyncConfig` can be built programmatically, parsed from JSON, or read
//! from `ASYNC_LOGGER_*` environment variables. Environment values that fail
//! to parse fall back to their defaults with a status warning.

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::overflow_policy::QueueFullPolicy;
use super::status::StatusLogger;
use super::thread_info::ThreadNameCaching;
use crate::pipeline::translator::TranslatorSettings;
use crate::pipeline::wait_strategy::WaitStrategy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Smallest ring buffer the pipeline will allocate
pub const MIN_RING_BUFFER_SIZE: usize = 8;

/// Ring buffer size when none is configured
pub const DEFAULT_RING_BUFFER_SIZE: usize = 4096;

/// Largest ring buffer the pipeline will allocate
pub const MAX_RING_BUFFER_SIZE: usize = 1 << 30;

/// Default shutdown timeout for pipeline cleanup (5 seconds)
///
/// Used when the context is dropped without an explicit `stop()`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default context name, used in the consumer thread name
pub const DEFAULT_CONTEXT_NAME: &str = "default";

pub const ENV_RING_BUFFER_SIZE: &str = "ASYNC_LOGGER_RING_BUFFER_SIZE";
pub const ENV_WAIT_STRATEGY: &str = "ASYNC_LOGGER_WAIT_STRATEGY";
pub const ENV_QUEUE_FULL_POLICY: &str = "ASYNC_LOGGER_QUEUE_FULL_POLICY";
pub const ENV_DISCARD_THRESHOLD: &str = "ASYNC_LOGGER_DISCARD_THRESHOLD";
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "ASYNC_LOGGER_SHUTDOWN_TIMEOUT_MS";
pub const ENV_SYNCHRONIZE_ENQUEUE: &str = "ASYNC_LOGGER_SYNCHRONIZE_ENQUEUE_WHEN_QUEUE_FULL";
pub const ENV_INCLUDE_LOCATION: &str = "ASYNC_LOGGER_INCLUDE_LOCATION";

/// Round a requested ring buffer size up to the next power of two within
/// `MIN_RING_BUFFER_SIZE..=MAX_RING_BUFFER_SIZE`
pub fn ring_buffer_capacity(requested: usize) -> usize {
    requested
        .clamp(MIN_RING_BUFFER_SIZE, MAX_RING_BUFFER_SIZE)
        .next_power_of_two()
}

/// Configuration of one asynchronous pipeline
///
/// # Example
///
/// ```
/// use rust_async_logger::core::{AsyncConfig, LogLevel, QueueFullPolicy};
///
/// let config = AsyncConfig::builder()
///     .ring_buffer_size(1000)
///     .queue_full_policy(QueueFullPolicy::Discard { threshold: LogLevel::Info })
///     .build();
///
/// assert_eq!(config.ring_buffer_capacity(), 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncConfig {
    /// Requested slot count; rounded up to a power of two
    pub ring_buffer_size: usize,
    pub wait_strategy: WaitStrategy,
    pub queue_full_policy: QueueFullPolicy,
    pub shutdown_timeout_ms: u64,
    /// Serialize producers that block on a full queue
    pub synchronize_enqueue_when_queue_full: bool,
    pub include_location: bool,
    /// Render messages on the consumer thread instead of the caller
    pub format_messages_in_background: bool,
    pub thread_name_caching: ThreadNameCaching,
    pub context_name: String,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            ring_buffer_size: DEFAULT_RING_BUFFER_SIZE,
            wait_strategy: WaitStrategy::default(),
            queue_full_policy: QueueFullPolicy::default(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
            synchronize_enqueue_when_queue_full: true,
            include_location: false,
            format_messages_in_background: false,
            thread_name_caching: ThreadNameCaching::default(),
            context_name: DEFAULT_CONTEXT_NAME.to_string(),
        }
    }
}

impl AsyncConfig {
    #[must_use]
    pub fn builder() -> AsyncConfigBuilder {
        AsyncConfigBuilder::new()
    }

    /// Effective ring buffer capacity
    pub fn ring_buffer_capacity(&self) -> usize {
        ring_buffer_capacity(self.ring_buffer_size)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn translator_settings(&self) -> TranslatorSettings {
        TranslatorSettings {
            include_location: self.include_location,
            render_message: !self.format_messages_in_background,
            thread_name_caching: self.thread_name_caching,
        }
    }

    /// Consumer thread name, `AsyncLogger[<context>]`
    pub fn thread_name(&self) -> String {
        format!("AsyncLogger[{}]", self.context_name)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.ring_buffer_size > MAX_RING_BUFFER_SIZE {
            return Err(LoggerError::config(
                "ring_buffer_size",
                format!(
                    "{} exceeds the maximum of {}",
                    self.ring_buffer_size, MAX_RING_BUFFER_SIZE
                ),
            ));
        }
        if let WaitStrategy::Timeout { timeout_ms: 0 } = self.wait_strategy {
            return Err(LoggerError::config(
                "wait_strategy",
                "timeout must be at least 1ms",
            ));
        }
        if self.context_name.trim().is_empty() {
            return Err(LoggerError::config("context_name", "must not be empty"));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AsyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `ASYNC_LOGGER_*` environment variables over the defaults
    pub fn from_env(status: &StatusLogger) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), status)
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, status: &StatusLogger) -> Self {
        let defaults = Self::default();

        let ring_buffer_size = parse_var(&lookup, status, ENV_RING_BUFFER_SIZE, defaults.ring_buffer_size);
        let wait_strategy = parse_var(&lookup, status, ENV_WAIT_STRATEGY, defaults.wait_strategy);
        let discard_threshold = parse_var(&lookup, status, ENV_DISCARD_THRESHOLD, LogLevel::Info);
        let queue_full_policy = match lookup(ENV_QUEUE_FULL_POLICY) {
            None => defaults.queue_full_policy,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "enqueue" | "default" => QueueFullPolicy::Enqueue,
                "synchronous" => QueueFullPolicy::Synchronous,
                "discard" => QueueFullPolicy::Discard {
                    threshold: discard_threshold,
                },
                _ => {
                    warn_invalid(status, ENV_QUEUE_FULL_POLICY, &value, &defaults.queue_full_policy);
                    defaults.queue_full_policy
                }
            },
        };
        let shutdown_timeout_ms =
            parse_var(&lookup, status, ENV_SHUTDOWN_TIMEOUT_MS, defaults.shutdown_timeout_ms);
        let synchronize_enqueue_when_queue_full = parse_var(
            &lookup,
            status,
            ENV_SYNCHRONIZE_ENQUEUE,
            defaults.synchronize_enqueue_when_queue_full,
        );
        let include_location =
            parse_var(&lookup, status, ENV_INCLUDE_LOCATION, defaults.include_location);

        Self {
            ring_buffer_size,
            wait_strategy,
            queue_full_policy,
            shutdown_timeout_ms,
            synchronize_enqueue_when_queue_full,
            include_location,
            ..defaults
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, status: &StatusLogger, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn_invalid(status, key, &value, &default);
                default
            }
        },
    }
}

fn warn_invalid(status: &StatusLogger, key: &str, value: &str, default: &dyn std::fmt::Display) {
    status.warn(format!(
        "Invalid value '{}' for {}, using default {}",
        value, key, default
    ));
}

/// Builder for [`AsyncConfig`]
#[derive(Debug, Clone, Default)]
pub struct AsyncConfigBuilder {
    config: AsyncConfig,
}

impl AsyncConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn ring_buffer_size(mut self, size: usize) -> Self {
        self.config.ring_buffer_size = size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.config.wait_strategy = strategy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_full_policy(mut self, policy: QueueFullPolicy) -> Self {
        self.config.queue_full_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn synchronize_enqueue_when_queue_full(mut self, enabled: bool) -> Self {
        self.config.synchronize_enqueue_when_queue_full = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn include_location(mut self, enabled: bool) -> Self {
        self.config.include_location = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn format_messages_in_background(mut self, enabled: bool) -> Self {
        self.config.format_messages_in_background = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn thread_name_caching(mut self, caching: ThreadNameCaching) -> Self {
        self.config.thread_name_caching = caching;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.config.context_name = name.into();
        self
    }

    pub fn build(self) -> AsyncConfig {
        self.config
    }
}
