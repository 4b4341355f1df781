//! Options du chargeur.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use acs_core::{NUM_LOCAL_VARS, NUM_MAP_ARRAYS, NUM_MAP_VARS};

/// Options du chargeur.
///
/// Les bornes de variables/tableaux de map s'appliquent à tous les modules
/// chargés par un même [`Environment`](crate::Environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoaderConfig {
    /// Variables de map adressables (MINI, MIMP, MEXP, MSTR).
    pub num_map_vars: usize,
    /// Tableaux de map adressables (ARAY, AIMP, MEXP).
    pub num_map_arrays: usize,
    /// Slots locaux par défaut d'un script.
    pub num_local_vars: u32,
    /// Charger les bibliothèques listées par LOAD.
    pub follow_imports: bool,
    /// Décoder les séquences `\n`, `\x41`, … des littéraux.
    pub decode_escapes: bool,
    /// Taille au-delà de laquelle ASTR ne matérialise plus les cellules non initialisées.
    pub max_array_len: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            num_map_vars: NUM_MAP_VARS,
            num_map_arrays: NUM_MAP_ARRAYS,
            num_local_vars: NUM_LOCAL_VARS,
            follow_imports: true,
            decode_escapes: true,
            max_array_len: 1 << 16,
        }
    }
}
