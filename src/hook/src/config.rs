//! Runtime knobs for the hook layer.

use std::cell::Cell;

use sysdefs::constants::{DEFAULT_CONNECT_TIMEOUT_MS, FDCTX_INITIAL_CAPACITY};

/// Settings fixed when a [`crate::Hooks`] is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookConfig {
    /// How long a hooked `connect` waits for the handshake, in
    /// milliseconds.  Negative means no limit.
    pub connect_timeout_ms: i64,
    /// Starting size of the descriptor registry.
    pub initial_capacity: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        HookConfig {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            initial_capacity: FDCTX_INITIAL_CAPACITY,
        }
    }
}

impl HookConfig {
    /// Sets [`HookConfig::connect_timeout_ms`].
    #[must_use]
    pub fn connect_timeout_ms(mut self, ms: i64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Sets [`HookConfig::initial_capacity`].
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

thread_local! {
    static HOOK_ENABLE: Cell<bool> = const { Cell::new(false) };
}

/// Turns the hooks on or off for the calling thread.  Scheduler threads
/// switch them on; everything else gets plain kernel behavior.
pub fn set_hook_enable(flag: bool) {
    HOOK_ENABLE.with(|h| h.set(flag));
}

/// Whether hooked calls on this thread go through the registry and reactor.
#[must_use]
pub fn is_hook_enable() -> bool {
    HOOK_ENABLE.with(Cell::get)
}
