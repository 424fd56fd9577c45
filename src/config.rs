//! Worker configuration.

use crate::util::PinConfig;

/// What happens to computations still queued when a context shuts down.
///
/// The run loop always resumes everything it has observed before honouring a
/// stop request; this policy only covers nodes that arrive after its final
/// empty check, or that are still queued when the context is dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Leave late nodes in the queue untouched. Their computations are never
    /// resumed and never released.
    Abandon,
    /// Release late nodes without resuming them, so their computations are
    /// dropped. Posts made after shutdown are cancelled on the spot.
    #[default]
    Cancel,
}

/// Settings for [`Worker::spawn`](crate::Worker::spawn).
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// OS thread name.
    pub name: String,
    /// Stack size for the worker thread; platform default when `None`.
    pub stack_size: Option<usize>,
    /// Optional CPU pinning for the worker thread.
    pub pin: Option<PinConfig>,
    /// Shutdown policy of the worker's context.
    pub shutdown: ShutdownPolicy,
}

impl WorkerConfig {
    /// Default settings with the given thread name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the thread stack size.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Pin the worker thread.
    pub fn pin(mut self, pin: PinConfig) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Choose the shutdown policy.
    pub fn shutdown(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown = policy;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "affine-worker".to_owned(),
            stack_size: None,
            pin: None,
            shutdown: ShutdownPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = WorkerConfig::named("io")
            .stack_size(1 << 20)
            .pin(PinConfig::core(0))
            .shutdown(ShutdownPolicy::Abandon);
        assert_eq!(cfg.name, "io");
        assert_eq!(cfg.stack_size, Some(1 << 20));
        assert_eq!(cfg.pin, Some(PinConfig::core(0)));
        assert_eq!(cfg.shutdown, ShutdownPolicy::Abandon);

        let def = WorkerConfig::default();
        assert_eq!(def.name, "affine-worker");
        assert_eq!(def.shutdown, ShutdownPolicy::Cancel);
    }
}
