//! Index handles into the object arenas

use serde::Serialize;
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(
    /// Handle of a host in `ObjectStore::hosts`
    HostId
);
arena_id!(
    /// Handle of a service in `ObjectStore::services`
    ServiceId
);
arena_id!(
    /// Handle of a dependency edge in the host or service dependency arena
    DependencyId
);
arena_id!(
    /// Handle of a time period in `TimePeriods`
    TimePeriodId
);

/// The entity a scheduled check belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CheckTarget {
    Host(HostId),
    Service(ServiceId),
}
