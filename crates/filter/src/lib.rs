//! Gossip admission filter for QBFT consensus traffic.
//!
//! This crate is the choke point between the unauthenticated gossip mesh and
//! the consensus state machines. Every inbound payload runs through a staged
//! pipeline and receives exactly one [`Verdict`]:
//!
//! - `Accept`: forward to the mesh and deliver locally
//! - `Ignore`: drop silently, no peer penalty
//! - `Reject`: drop and penalize the propagating peer
//!
//! # Architecture
//!
//! - [`Mark`]: per-(identifier, signer) consensus history record
//! - [`MessageSchedule`]: concurrent two-level map of marks, with the
//!   timeliness and duplication predicates the pipeline consults
//! - [`MessageValidator`]: the staged pipeline itself
//! - [`FilterConfig`]: the temporal tunables and the schedule size bound
//!
//! Every cheap check runs before signature verification, which is the
//! dominant cost and the target of CPU-exhaustion attacks. Schedule state is
//! only updated after a signature verifies, so unverified traffic cannot
//! poison the bookkeeping.

mod clock;
mod config;
mod mark;
pub mod metrics;
mod schedule;
mod validator;
mod verdict;
mod verify;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FilterConfig;
pub use mark::Mark;
pub use schedule::MessageSchedule;
pub use validator::MessageValidator;
pub use verdict::{ValidationReason, Verdict};
pub use verify::{BlsAggregateVerifier, SignatureError, SignatureVerifier};
