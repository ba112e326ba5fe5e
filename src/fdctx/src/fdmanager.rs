//  FdManager:  RwLock<Vec<Option<Arc<FdCtx>>>>
//
//      One slot per descriptor number, indexed directly.  Lookups of a
//      populated slot only take the read lock, so any number of hooked calls
//      can find their context at once.  Creation, deletion and growth take
//      the write lock; because a Vec resize happens entirely under it, no
//      reader ever sees a half-grown table.

use crate::fdctx::FdCtx;

use parking_lot::RwLock;

use std::cmp;
use std::sync::Arc;

use sysdefs::constants::{
    FDCTX_GROWTH_DEN, FDCTX_GROWTH_NUM, FDCTX_INITIAL_CAPACITY, FDCTX_MAX_FD,
};

/// Process-wide table from descriptor number to its [`FdCtx`].
///
/// The registry is the only thing that creates or drops a slot's context.
/// Callers get an `Arc` clone, so a context they are using stays alive even
/// if the slot is cleared underneath them.
#[derive(Debug)]
pub struct FdManager {
    datas: RwLock<Vec<Option<Arc<FdCtx>>>>,
}

impl Default for FdManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FdManager {
    /// A registry with the standard starting capacity (64 slots).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(FDCTX_INITIAL_CAPACITY)
    }

    /// A registry with `capacity` empty slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        FdManager {
            datas: RwLock::new(vec![None; capacity]),
        }
    }

    /// Looks up the context for `fd`, optionally creating it.
    ///
    /// Negative descriptors and descriptors at or above `FDCTX_MAX_FD`
    /// never have a context and never allocate.  With
    /// `auto_create`, concurrent callers racing on the same empty slot all
    /// come back with the same context: the slot is checked again once the
    /// write lock is held, and whoever finds it filled returns what is there.
    pub fn get(&self, fd: i32, auto_create: bool) -> Option<Arc<FdCtx>> {
        let idx = usize::try_from(fd).ok()?;
        if idx >= FDCTX_MAX_FD {
            return None;
        }

        // Fast path: shared lock only.
        {
            let datas = self.datas.read();
            if let Some(Some(ctx)) = datas.get(idx) {
                return Some(Arc::clone(ctx));
            }
            if !auto_create {
                return None;
            }
        }

        let mut datas = self.datas.write();

        // Someone may have filled the slot between the two locks.
        if let Some(Some(ctx)) = datas.get(idx) {
            return Some(Arc::clone(ctx));
        }

        if idx >= datas.len() {
            let newcap = grown_capacity(datas.len(), idx);
            log::debug!(
                "fdmanager: growing table {} -> {} for fd {}",
                datas.len(),
                newcap,
                fd
            );
            datas.resize(newcap, None);
        }

        let ctx = Arc::new(FdCtx::new(fd));
        datas[idx] = Some(Arc::clone(&ctx));
        Some(ctx)
    }

    /// Drops the registry's context for `fd`.
    ///
    /// The removed context is marked closed, so anyone still holding it sees
    /// the close.  Out-of-range or already empty slots are left alone.  The
    /// table never shrinks.
    pub fn del(&self, fd: i32) {
        let Ok(idx) = usize::try_from(fd) else {
            return;
        };

        let removed = {
            let mut datas = self.datas.write();
            match datas.get_mut(idx) {
                Some(slot) => slot.take(),
                None => None,
            }
        };

        if let Some(ctx) = removed {
            ctx.set_closed(true);
        }
    }

    /// Number of slots currently allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.datas.read().len()
    }

    /// Number of slots holding a context.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.datas.read().iter().filter(|slot| slot.is_some()).count()
    }
}

/// Capacity to grow to so that index `fd` fits.
///
/// Geometric (x1.5) growth, but never less than `fd + 1`, so the result is
/// always strictly greater than `fd` whatever the current size is.  The
/// geometric step is capped at `FDCTX_MAX_FD` slots.
#[must_use]
pub fn grown_capacity(current: usize, fd: usize) -> usize {
    let scaled = current.saturating_mul(FDCTX_GROWTH_NUM) / FDCTX_GROWTH_DEN;
    cmp::max(fd.saturating_add(1), cmp::min(scaled, FDCTX_MAX_FD))
}
