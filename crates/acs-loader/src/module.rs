//! Modèle de données d'un module chargé.

use bitflags::bitflags;
use indexmap::IndexMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Identifiants ─────────────────────────── */

/// Index d'un module dans son [`Environment`](crate::Environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModuleId(pub u32);

impl ModuleId {
    /// Index brut.
    pub const fn index(self) -> usize { self.0 as usize }
}

/* ─────────────────────────── Scripts ─────────────────────────── */

/// Mode de démarrage d'un script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScriptKind {
    /// Démarré explicitement.
    #[default]
    Closed,
    /// Démarré au chargement du niveau.
    Open,
    /// Démarré à l'entrée de chaque joueur.
    Enter,
}

impl ScriptKind {
    /// Type SPTR → mode; les valeurs inconnues sont `Closed`.
    pub const fn from_sptr(raw: u32) -> Self {
        match raw {
            1 => Self::Open,
            4 => Self::Enter,
            _ => Self::Closed,
        }
    }
}

bitflags! {
    /// Drapeaux SFLG.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct ScriptFlags: u16 {
        /// Exécutable par un client distant.
        const NET        = 0x0001;
        /// Exécuté côté client uniquement.
        const CLIENTSIDE = 0x0002;
    }
}

/// Point d'entrée d'un script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScriptEntry {
    /// Numéro (négatif pour un script nommé).
    pub number: i32,
    /// Mode de démarrage.
    pub kind: ScriptKind,
    /// Offset dans le lump.
    pub code_index: u32,
    /// Nombre d'arguments.
    pub num_args: u32,
    /// Slots locaux.
    pub num_vars: u32,
    /// Drapeaux.
    pub flags: ScriptFlags,
    /// Nom (SNAM), index global.
    pub name: Option<u32>,
    /// Index d'instruction après traduction (0 si hors lump ou inatteignable).
    pub code_ptr: u32,
}

/* ─────────────────────────── Fonctions & sauts ─────────────────────────── */

/// Fonction du module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionEntry {
    /// Nombre d'arguments.
    pub argc: u32,
    /// Slots locaux (≥ `argc`).
    pub vars: u32,
    /// Valeurs de retour.
    pub retn: u32,
    /// Offset dans le lump; 0 pour une fonction importée.
    pub code_index: u32,
    /// Index d'instruction après traduction.
    pub code_ptr: u32,
    /// Numéro dans le registre global de l'environnement.
    pub global: u32,
}

/// Cible de saut dynamique (JUMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JumpTarget {
    /// Offset dans le lump.
    pub code_index: u32,
    /// Index d'instruction après traduction.
    pub code_ptr: u32,
}

/// Référence vers un slot d'un autre module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotRef {
    /// Module propriétaire.
    pub module: ModuleId,
    /// Index dans ce module.
    pub index: u32,
}

/* ─────────────────────────── Données de map ─────────────────────────── */

/// Tableau de map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapArray {
    /// Taille déclarée (ARAY).
    pub len: u32,
    /// Déclaré par ARAY.
    pub defined: bool,
    /// Cellules initialisées; les suivantes valent 0.
    pub cells: Vec<i32>,
    /// Liaison vers le tableau d'un autre module (AIMP).
    pub import: Option<SlotRef>,
    /// Nom exporté.
    pub name: Option<u32>,
}

impl MapArray {
    /// Écrit une cellule, en agrandissant le stockage.
    pub fn set(&mut self, i: usize, v: i32) {
        if self.cells.len() <= i {
            self.cells.resize(i + 1, 0);
        }
        self.cells[i] = v;
    }
}

/// Variable de map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapVar {
    /// Valeur initiale (MINI).
    pub value: i32,
    /// Liaison vers la variable d'un autre module (MIMP).
    pub import: Option<SlotRef>,
    /// Nom exporté.
    pub name: Option<u32>,
}

/// Ce qu'un nom exporté désigne.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Export {
    /// Tableau de map.
    Array(u32),
    /// Variable de map.
    Var(u32),
}

/* ─────────────────────────── Module ─────────────────────────── */

/// Un lump ACS chargé.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Module {
    /// Identifiant dans l'environnement.
    pub id: u32,
    /// Nom du lump.
    pub name: String,
    /// Vrai une fois le code traduit.
    pub loaded: bool,
    /// Dialecte à opcodes compressés (ACSe).
    pub compressed: bool,
    /// Scripts.
    pub scripts: Vec<ScriptEntry>,
    /// Fonctions.
    pub functions: Vec<FunctionEntry>,
    /// Noms de fonctions (FNAM), index globaux.
    pub func_names: Vec<u32>,
    /// Cibles JUMP.
    pub jumps: Vec<JumpTarget>,
    /// Flux d'instructions traduit.
    pub code: Vec<u32>,
    /// Littéraux (index local → index global).
    pub strings: Vec<u32>,
    /// Noms de scripts (SNAM), index globaux.
    pub script_names: Vec<u32>,
    /// Variables de map.
    pub map_vars: Vec<MapVar>,
    /// Tableaux de map.
    pub map_arrays: Vec<MapArray>,
    /// Noms exportés (MEXP), index globaux.
    pub export_names: Vec<u32>,
    /// Nom exporté → slot, dans l'ordre de MEXP.
    pub exports: IndexMap<String, Export>,
    /// Bibliothèques demandées (LOAD).
    pub imports: Vec<String>,
    /// Modules importés; `None` pour une bibliothèque absente ou auto-importée.
    pub import_modules: Vec<Option<ModuleId>>,
    /// Corps des fonctions importées (index local → fonction d'un autre module).
    pub func_imports: Vec<Option<SlotRef>>,
}

impl Module {
    pub(crate) fn new(id: ModuleId, name: &str, num_vars: usize, num_arrays: usize) -> Self {
        Self {
            id: id.0,
            name: name.to_owned(),
            map_vars: vec![MapVar::default(); num_vars],
            map_arrays: vec![MapArray::default(); num_arrays],
            ..Self::default()
        }
    }

    /// Identifiant typé.
    pub const fn module_id(&self) -> ModuleId { ModuleId(self.id) }

    /// Index global d'un littéral local; les valeurs hors table passent telles quelles.
    pub fn string_index(&self, v: i32) -> i32 {
        usize::try_from(v)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map_or(v, |&g| g as i32)
    }

    /// Script par numéro.
    pub fn script(&self, number: i32) -> Option<&ScriptEntry> {
        self.scripts.iter().find(|s| s.number == number)
    }

    /// Fonction par nom (global).
    pub fn function_by_name(&self, name: u32) -> Option<u32> {
        self.func_names.iter().position(|&n| n == name).map(|i| i as u32)
    }

    /// Remet le module à l'état « vide » en gardant son identité.
    pub(crate) fn reset(&mut self) {
        let (id, name) = (self.id, core::mem::take(&mut self.name));
        let (nv, na) = (self.map_vars.len(), self.map_arrays.len());
        *self = Self::new(ModuleId(id), &name, nv, na);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sptr_types() {
        assert_eq!(ScriptKind::from_sptr(0), ScriptKind::Closed);
        assert_eq!(ScriptKind::from_sptr(1), ScriptKind::Open);
        assert_eq!(ScriptKind::from_sptr(4), ScriptKind::Enter);
        assert_eq!(ScriptKind::from_sptr(2), ScriptKind::Closed);
        assert_eq!(ScriptKind::from_sptr(0xFFFF), ScriptKind::Closed);
    }

    #[test]
    fn string_index_passthrough() {
        let m = Module { strings: vec![7, 9], ..Module::default() };
        assert_eq!(m.string_index(1), 9);
        assert_eq!(m.string_index(2), 2);
        assert_eq!(m.string_index(-5), -5);
    }

    #[test]
    fn array_grows_on_write() {
        let mut a = MapArray::default();
        a.set(3, 42);
        assert_eq!(a.cells, vec![0, 0, 0, 42]);
    }

    #[test]
    fn flags_bits() {
        let f = ScriptFlags::from_bits_truncate(0x0003);
        assert!(f.contains(ScriptFlags::NET | ScriptFlags::CLIENTSIDE));
        assert_eq!(ScriptFlags::from_bits_truncate(0x8000), ScriptFlags::empty());
    }
}
