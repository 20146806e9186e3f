//! Dispatch routers.
//!
//! # Data Flow
//! ```text
//! Incoming locator
//!     → matcher resolves to a raw match code (no match → UnknownLocator,
//!       except query, which returns an empty result)
//!     → multi-table only: selector bits pick the owning handler, then are
//!       masked off
//!     → handler executes against the storage handle and triggers change
//!       notification
//! ```
//!
//! # Lifecycle
//! Construction registers every handler's routes and freezes the matcher
//! and registry (`Ready`). Injecting the storage handle makes the router
//! `Operational`; before that, data operations behave as "no data" while
//! routing errors still raise. Routers live for the process lifetime.

mod multi;
mod single;

pub use multi::MultiTableRouter;
pub use single::TableRouter;

/// Selector spacing: one slice of the match-code space per handler. Must
/// exceed every handler-local code so the two bit ranges never collide.
pub const SELECTOR_STRIDE: u32 = 0x10000;

/// High bits of a match code: which handler owns it.
pub const SELECTOR_MASK: u32 = 0xFFFF_0000;

/// Low bits of a match code: the handler-local route code.
pub const LOCAL_MASK: u32 = !SELECTOR_MASK;
