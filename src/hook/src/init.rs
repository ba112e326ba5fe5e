//! Building the hook layer.
//!
//! Nothing here is global: a [`Hooks`] owns (shares) its registry and its
//! reactor, and callers pass it around by reference.

use std::sync::Arc;

use fdctx::FdManager;

use crate::config::HookConfig;
use crate::reactor::{PollReactor, Reactor};

/// Entry point for every hooked call.
///
/// Cloning is cheap and every clone shares the same registry and reactor.
#[derive(Clone)]
pub struct Hooks {
    pub(crate) fdm: Arc<FdManager>,
    pub(crate) reactor: Arc<dyn Reactor>,
    pub(crate) config: HookConfig,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("fdm", &self.fdm)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Hooks {
    /// Wires the hooks to an existing registry and reactor.
    #[must_use]
    pub fn new(fdm: Arc<FdManager>, reactor: Arc<dyn Reactor>, config: HookConfig) -> Self {
        log::debug!(
            "hooks: start (registry capacity {}, connect timeout {} ms)",
            fdm.capacity(),
            config.connect_timeout_ms
        );
        Hooks {
            fdm,
            reactor,
            config,
        }
    }

    /// Fresh registry sized from `config`, driven by a [`PollReactor`].
    #[must_use]
    pub fn with_poll_reactor(config: HookConfig) -> Self {
        let fdm = Arc::new(FdManager::with_capacity(config.initial_capacity));
        Self::new(fdm, Arc::new(PollReactor::new()), config)
    }

    /// The registry every hooked call consults.
    #[must_use]
    pub fn fd_manager(&self) -> &Arc<FdManager> {
        &self.fdm
    }

    /// The reactor blocked calls park on.
    #[must_use]
    pub fn reactor(&self) -> &Arc<dyn Reactor> {
        &self.reactor
    }

    /// Settings this instance was built with.
    #[must_use]
    pub fn config(&self) -> &HookConfig {
        &self.config
    }
}
