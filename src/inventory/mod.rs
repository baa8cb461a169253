//! Cached access to host inventory reported by `system_profiler`.
mod cache;
mod category;
mod clock;
mod host;
mod snapshot;
mod store;

pub use cache::{DEFAULT_TTL, InventoryCache, SYSTEM_PROFILER};
pub use category::{InventoryCategory, parse_data_type_list};
pub use clock::{Clock, ManualClock, SystemClock};
pub use host::{HostKind, is_desktop, is_laptop};
pub use snapshot::{InventorySnapshot, Record, records_from_profile};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
