use crate::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Open, close and inspect one's own work shift.
    WorkShift,
    /// Act on an outlet other than the one in the token (`?outlet_id=`).
    OverrideOutlet,
}

impl Capability {
    pub fn allowed_roles(self) -> &'static [Role] {
        use Role::*;
        match self {
            Capability::WorkShift => &[Owner, Director, Admin, Cashier],
            Capability::OverrideOutlet => &[Owner, Director],
        }
    }
}
