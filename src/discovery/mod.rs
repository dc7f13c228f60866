//! Signable file discovery
//!
//! Discovery runs in two layers:
//!
//! ```text
//!        roots: /usr/bin   /opt/app   /srv/lib   ...
//!                  │          │          │
//!           ┌──────▼───┐ ┌────▼─────┐ ┌──▼───────┐
//!           │discover-0│ │discover-1│ │discover-N│   one FileEnumerator
//!           │ walkdir  │ │ walkdir  │ │ walkdir  │   per root, unbounded
//!           └──────┬───┘ └────┬─────┘ └──┬───────┘
//!                  └──────────┼──────────┘
//!                             ▼
//!                 ┌───────────────────────┐
//!                 │  crossbeam channel    │   single aggregation point
//!                 │  → collector (caller) │
//!                 └───────────┬───────────┘
//!                             ▼
//!                       FileCollection          returned only after every
//!                                               enumerator has finished
//! ```

pub mod enumerate;
pub mod fanout;

pub use enumerate::{collect_files, FileEnumerator};
pub use fanout::{DiscoveryFanOut, DiscoveryStats, FileCollection, RootSummary};
