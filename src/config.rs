use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub pin_workers: bool,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub panic_strategy: PanicStrategy,

    /// Poll granularity of `ManagedThread::join_timeout`.
    pub join_poll_interval: Duration,

    /// Backoff steps `Task::wait` spends spinning before it parks.
    pub wait_spin_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            pin_workers: false,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "strand-worker".to_string(),
            panic_strategy: PanicStrategy::default(),
            join_poll_interval: Duration::from_millis(1),
            wait_spin_limit: 10,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.join_poll_interval.is_zero() {
            return Err(Error::config("join_poll_interval must be > 0"));
        }
        if self.join_poll_interval > Duration::from_secs(1) {
            return Err(Error::config("join_poll_interval too large (max 1s)"));
        }

        if self.thread_name_prefix.contains('\0') {
            return Err(Error::config("thread_name_prefix must not contain NUL"));
        }

        Ok(())
    }

    /// Worker count, falling back to the hardware concurrency.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn join_poll_interval(mut self, interval: Duration) -> Self {
        self.config.join_poll_interval = interval;
        self
    }

    pub fn wait_spin_limit(mut self, steps: u32) -> Self {
        self.config.wait_spin_limit = steps;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
