//! # Triad Sync
//!
//! Keeps viewers of an identity's triad consistent with authoritative state.
//! Notifications are dirty signals: the loop never patches the shown triad
//! from a payload, it re-reads through the resolver.
//!
//! Pipeline per frame: [`NotificationFilter`] classifies, [`BannerBoard`]
//! tracks transient indicators, [`TriadRefetcher`] re-reads, and the result
//! lands in a [`TriadView`] published to every panel of a [`ViewerSession`].

#![forbid(unsafe_code)]

pub mod banner;
pub mod filter;
pub mod reconcile;
pub mod refetch;
pub mod session;
pub mod view;

pub use banner::{Banner, BannerBoard, BannerKind};
pub use filter::{DirtySignal, NotificationFilter, Verdict, DEFAULT_SYNTHETIC_MESSAGE};
pub use reconcile::{
    LoopHandle, ReconcileDeps, ReconciliationLoop, CONFLICT_MESSAGE, DISCONNECTED_NOTE,
};
pub use refetch::{Refetched, TriadRefetcher};
pub use session::ViewerSession;
pub use view::{Freshness, TriadView};
