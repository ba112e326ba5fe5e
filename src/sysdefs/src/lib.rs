//! Definitions shared by the descriptor registry (`fdctx`) and the hook
//! layer (`hook`): sizing constants, the timeout sentinel, socket option
//! identifiers and the errno conventions used by every hooked call.

pub mod constants;
