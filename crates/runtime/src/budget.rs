/// Per-frame work allowance, in abstract units.
///
/// Budgets count work items rather than wall-clock time so a batch always
/// covers the same items no matter how fast the host machine is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameBudget {
    limit: u32,
    used: u32,
}

impl FrameBudget {
    pub fn new(units: u32) -> Self {
        Self {
            limit: units,
            used: 0,
        }
    }

    pub fn remaining_units(&self) -> u32 {
        self.limit - self.used
    }

    /// Attempts to consume `units` from the budget.
    ///
    /// Returns `true` if the budget had enough remaining units.
    pub fn try_consume(&mut self, units: u32) -> bool {
        if self.remaining_units() < units {
            return false;
        }
        self.used += units;
        true
    }
}
