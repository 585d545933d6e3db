use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Tracks which parts of an [`EntityState`](crate::state::EntityState) changed
    /// during one kernel operation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EntityFields: u16 {
        const IDENTITY   = 1 << 0;
        const HIT_POINTS = 1 << 1;
        const CONDITION  = 1 << 2;
        const RESOURCES  = 1 << 3;
        const CREDITS    = 1 << 4;
        const ABILITIES  = 1 << 5;
        const DEFENSES   = 1 << 6;
        const SPEED      = 1 << 7;
        const SHIELDS    = 1 << 8;
        const SUBSYSTEMS = 1 << 9;
        const RECORDS    = 1 << 10;
        const MARKERS    = 1 << 11;
        const DERIVED    = 1 << 12;
        const CREATED    = 1 << 13;
        const RESTORED   = 1 << 14;
    }
}
