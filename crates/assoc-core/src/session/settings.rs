//! Session settings

use serde::{Serialize, Deserialize};

use crate::resolver::{ListboxSort, ResolverSettings};

/// Settings for one selection session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Resolver tuning
    pub resolver: ResolverSettings,

    /// Keep selections whose field and value text survive a reload
    pub retain_selections_on_reload: bool,

    /// Order used by presentation helpers when none is given
    pub default_sort: ListboxSort,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            resolver: ResolverSettings::default(),
            retain_selections_on_reload: true,
            default_sort: ListboxSort::LoadOrder,
        }
    }
}
