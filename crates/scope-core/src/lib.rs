//! Price table, refresh protocol and crank for the Scope oracle.
//!
//! The program keeps, per feed, a fixed-capacity table of dated prices and
//! a parallel mapping table naming the provider account behind each slot.
//! Refreshes decode provider accounts through `scope-adapters` and write
//! the normalized price into the slot. The crank keeps every mapped slot
//! fresh through a [`RefreshTransport`].

pub mod builder;
pub mod context;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod program;
pub mod transport;

pub use builder::{BuilderError, ScopeBuilder, ScopeFactories};
pub use context::{PriceRow, ScopeContext};
pub use engine::clock::{Clock, ManualClock, SystemClock};
pub use engine::event_bus::EventBus;
pub use engine::{CrankEngine, CycleSummary, EngineError};
pub use error::ScopeError;
pub use handlers::{BatchReport, RefreshOutcome, SlotResult, VaultShareOutcome};
pub use program::{Configuration, FeedStore, OracleFeed, ScopeProgram};
pub use transport::{LocalTransport, RefreshTransport, TransportError};
