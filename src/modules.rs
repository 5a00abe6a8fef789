//! Market module table.
//!
//! A Mixologist market routes `executeModule` calls to one of its logic
//! modules by numeric slot. The slot numbers are fixed by the market
//! contract; [`ModuleRegistry`] is the single place they are defined and
//! is passed by value to everything that encodes module calls.

use std::fmt;

use alloy::primitives::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Base,
    LendingBorrowing,
    Liquidation,
    Setter,
}

impl ModuleId {
    pub const ALL: [Self; 4] = [
        Self::Base,
        Self::LendingBorrowing,
        Self::Liquidation,
        Self::Setter,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Base => "Base",
            Self::LendingBorrowing => "LendingBorrowing",
            Self::Liquidation => "Liquidation",
            Self::Setter => "Setter",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("unknown module name: {0}")]
    UnknownName(String),
    #[error("no module at slot {0}")]
    UnknownSlot(U256),
}

/// Immutable module-to-slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRegistry {
    slots: [(ModuleId, u8); 4],
}

impl ModuleRegistry {
    /// The slot layout of the deployed Mixologist market.
    pub const fn standard() -> Self {
        Self {
            slots: [
                (ModuleId::Base, 0),
                (ModuleId::LendingBorrowing, 1),
                (ModuleId::Liquidation, 2),
                (ModuleId::Setter, 3),
            ],
        }
    }

    pub fn slot(&self, module: ModuleId) -> U256 {
        self.slots
            .iter()
            .find(|(id, _)| *id == module)
            .map_or(U256::ZERO, |(_, slot)| U256::from(*slot))
    }

    pub fn lookup(&self, name: &str) -> Result<ModuleId, ModuleError> {
        self.slots
            .iter()
            .map(|(id, _)| *id)
            .find(|id| id.name() == name)
            .ok_or_else(|| ModuleError::UnknownName(name.to_string()))
    }

    pub fn module_at(&self, slot: U256) -> Result<ModuleId, ModuleError> {
        self.slots
            .iter()
            .find(|(_, candidate)| U256::from(*candidate) == slot)
            .map(|(id, _)| *id)
            .ok_or(ModuleError::UnknownSlot(slot))
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
