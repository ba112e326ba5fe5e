//! Constants for the per-descriptor context registry.
//!

/// Number of slots the registry starts with.  The table only ever grows.
pub const FDCTX_INITIAL_CAPACITY: usize = 64;

/// Descriptors at or above this number never get a context, so a bogus
/// fd can't make the registry allocate.  Same as Linux's default
/// `fs.nr_open`, the hard ceiling on any process's descriptor numbers.
pub const FDCTX_MAX_FD: usize = 1_048_576;

/// Growth factor applied when a descriptor lands beyond the current
/// capacity, expressed as a fraction (3/2 == 1.5x).  The registry always
/// takes the larger of this and `fd + 1`, so the new capacity can never end
/// up at or below the requested descriptor.
pub const FDCTX_GROWTH_NUM: usize = 3;
/// See [`FDCTX_GROWTH_NUM`].
pub const FDCTX_GROWTH_DEN: usize = 2;

/// Timeout value meaning "nothing configured": the caller waits as long as
/// the reactor's own policy allows.
pub const NO_TIMEOUT: i64 = -1;
