/// Tuning knobs for an [`crate::EventBus`].
///
/// Both fields fall back to their defaults (with a `warn` log) if set to
/// zero rather than being treated as a construction error — the bus always
/// comes up usable.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    pub worker_pool_size: usize,
    pub event_buffer_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 10,
            event_buffer_size: 1000,
        }
    }
}

impl BusConfig {
    pub(crate) fn normalized(mut self) -> Self {
        let default = Self::default();
        if self.worker_pool_size == 0 {
            tracing::warn!("bus worker_pool_size of 0 is invalid, falling back to default");
            self.worker_pool_size = default.worker_pool_size;
        }
        if self.event_buffer_size == 0 {
            tracing::warn!("bus event_buffer_size of 0 is invalid, falling back to default");
            self.event_buffer_size = default.event_buffer_size;
        }
        self
    }
}
