//! Environnement de chargement : modules, table de chaînes globale, registre
//! des fonctions et accès aux lumps.

use std::collections::HashMap;

use acs_core::{LoadError, LoadResult};
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::dispatch;
use crate::module::{Export, FunctionEntry, Module, ModuleId, ScriptEntry, ScriptKind, SlotRef};
use crate::strings::GlobalStrings;

/* ─────────────────────────── Source de lumps ─────────────────────────── */

/// Index d'un lump dans sa source.
pub type LumpId = usize;

/// Accès en lecture seule aux lumps d'une archive.
pub trait LumpSource {
    /// Lump portant ce nom (le plus récent en cas de doublon).
    fn find(&self, name: &str) -> Option<LumpId>;
    /// Nom d'un lump.
    fn name(&self, lump: LumpId) -> Option<&str>;
    /// Contenu d'un lump.
    fn data(&self, lump: LumpId) -> Option<&[u8]>;
}

/// Source en mémoire, dans l'ordre d'ajout.
#[derive(Debug, Default, Clone)]
pub struct MemoryLumps {
    lumps: Vec<(String, Vec<u8>)>,
}

impl MemoryLumps {
    /// Source vide.
    pub fn new() -> Self { Self::default() }

    /// Ajoute un lump et renvoie son index.
    pub fn push(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> LumpId {
        self.lumps.push((name.into(), data.into()));
        self.lumps.len() - 1
    }

    /// Variante chaînable de [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.push(name, data);
        self
    }

    /// Nombre de lumps.
    pub fn len(&self) -> usize { self.lumps.len() }

    /// Vrai si vide.
    pub fn is_empty(&self) -> bool { self.lumps.is_empty() }
}

impl LumpSource for MemoryLumps {
    fn find(&self, name: &str) -> Option<LumpId> {
        self.lumps.iter().rposition(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    fn name(&self, lump: LumpId) -> Option<&str> { self.lumps.get(lump).map(|(n, _)| n.as_str()) }

    fn data(&self, lump: LumpId) -> Option<&[u8]> { self.lumps.get(lump).map(|(_, d)| d.as_slice()) }
}

/* ─────────────────────────── Environnement ─────────────────────────── */

/// Longueur maximale d'un nom de lump.
pub const LUMP_NAME_LEN: usize = 8;

/// Tous les modules chargés pour un niveau.
#[derive(Debug, Clone)]
pub struct Environment {
    pub(crate) config: LoaderConfig,
    pub(crate) strings: GlobalStrings,
    pub(crate) modules: Vec<Module>,
    pub(crate) by_lump: HashMap<LumpId, ModuleId>,
    /// Numéro global → fonction; l'entrée 0 est réservée.
    pub(crate) functions: Vec<Option<SlotRef>>,
}

impl Environment {
    /// Environnement vide.
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            strings: GlobalStrings::new(),
            modules: Vec::new(),
            by_lump: HashMap::new(),
            functions: vec![None],
        }
    }

    /// Options en vigueur.
    pub const fn config(&self) -> &LoaderConfig { &self.config }

    /// Table de chaînes globale.
    pub const fn strings(&self) -> &GlobalStrings { &self.strings }

    /// Modules, dans l'ordre d'enregistrement.
    pub fn modules(&self) -> &[Module] { &self.modules }

    /// Module par identifiant.
    pub fn module(&self, id: ModuleId) -> Option<&Module> { self.modules.get(id.index()) }

    /// Module associé à un lump déjà vu.
    pub fn module_for_lump(&self, lump: LumpId) -> Option<ModuleId> { self.by_lump.get(&lump).copied() }

    /// Charge un lump (une seule fois par lump).
    ///
    /// Le module est enregistré avant la lecture de ses chunks : un cycle
    /// d'imports retrouve le module en cours et s'arrête. En cas d'erreur le
    /// module reste enregistré mais vide et non chargé.
    pub fn load_lump(&mut self, source: &dyn LumpSource, lump: LumpId) -> LoadResult<ModuleId> {
        if let Some(id) = self.module_for_lump(lump) {
            return Ok(id);
        }

        let name = source.name(lump).unwrap_or_default().to_owned();
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module::new(id, &name, self.config.num_map_vars, self.config.num_map_arrays));
        self.by_lump.insert(lump, id);

        let Some(data) = source.data(lump) else {
            warn!(lump = %name, "lump has no data");
            return Err(LoadError::MissingLump(name));
        };

        let first_global = self.functions.len();
        match dispatch::load(self, id, source, data) {
            Ok(()) => {
                let m = &self.modules[id.index()];
                debug!(
                    lump = %name,
                    module = id.0,
                    scripts = m.scripts.len(),
                    functions = m.functions.len(),
                    words = m.code.len(),
                    "module loaded"
                );
                Ok(id)
            }
            Err(e) => {
                warn!(lump = %name, error = %e, "ACS lump rejected");
                self.modules[id.index()].reset();
                self.release_functions(id, first_global);
                Err(e)
            }
        }
    }

    /// Libère les numéros globaux pris par `id` depuis `from`.
    fn release_functions(&mut self, id: ModuleId, from: usize) {
        for slot in &mut self.functions[from..] {
            if slot.is_some_and(|r| r.module == id) {
                *slot = None;
            }
        }
        while self.functions.len() > from && self.functions.last() == Some(&None) {
            self.functions.pop();
        }
    }

    /// Charge un lump par nom.
    pub fn load_named(&mut self, source: &dyn LumpSource, name: &str) -> LoadResult<ModuleId> {
        let lump = source.find(name).ok_or_else(|| LoadError::MissingLump(name.to_owned()))?;
        self.load_lump(source, lump)
    }

    /// Charge un module importé; son identifiant même en cas d'échec.
    pub(crate) fn import(&mut self, source: &dyn LumpSource, lump: LumpId) -> ModuleId {
        match self.load_lump(source, lump) {
            Ok(id) => id,
            // load_lump registers the module before it can fail
            Err(_) => self.by_lump[&lump],
        }
    }

    /// Lit une liste LOADACS (noms séparés par des blancs) et charge chaque
    /// bibliothèque pas encore chargée.
    ///
    /// Les noms sont tronqués à [`LUMP_NAME_LEN`] caractères; les noms
    /// introuvables sont ignorés.
    pub fn load_library_list(&mut self, source: &dyn LumpSource, list: LumpId) -> Vec<ModuleId> {
        let Some(text) = source.data(list) else { return Vec::new() };
        let mut loaded = Vec::new();
        for word in text.split(u8::is_ascii_whitespace).filter(|w| !w.is_empty()) {
            let name = String::from_utf8_lossy(&word[..word.len().min(LUMP_NAME_LEN)]).into_owned();
            let Some(lump) = source.find(&name) else {
                debug!(library = %name, "LOADACS entry not found");
                continue;
            };
            if self.module_for_lump(lump).is_some() {
                continue;
            }
            match self.load_lump(source, lump) {
                Ok(id) => loaded.push(id),
                Err(e) => warn!(library = %name, error = %e, "LOADACS library failed"),
            }
        }
        loaded
    }

    /* ─────────────────────────── Requêtes ─────────────────────────── */

    /// Premier script portant ce numéro, tous modules chargés confondus.
    pub fn find_script(&self, number: i32) -> Option<(ModuleId, &ScriptEntry)> {
        self.modules
            .iter()
            .filter(|m| m.loaded)
            .find_map(|m| m.script(number).map(|s| (m.module_id(), s)))
    }

    /// Script nommé (SNAM).
    pub fn find_named_script(&self, name: &str) -> Option<(ModuleId, &ScriptEntry)> {
        let id = self.strings.find(name.as_bytes())?;
        self.modules
            .iter()
            .filter(|m| m.loaded)
            .find_map(|m| m.scripts.iter().find(|s| s.name == Some(id)).map(|s| (m.module_id(), s)))
    }

    /// Scripts démarrés au chargement du niveau.
    pub fn open_scripts(&self) -> impl Iterator<Item = (ModuleId, &ScriptEntry)> + '_ {
        self.modules
            .iter()
            .filter(|m| m.loaded)
            .flat_map(|m| m.scripts.iter().filter(|s| s.kind == ScriptKind::Open).map(move |s| (m.module_id(), s)))
    }

    /// Fonction par numéro global.
    pub fn function(&self, global: u32) -> Option<(ModuleId, &FunctionEntry)> {
        let r = (*self.functions.get(global as usize)?)?;
        let f = self.module(r.module)?.functions.get(r.index as usize)?;
        Some((r.module, f))
    }

    /// Fonction qui porte le corps de la fonction `index` de `module` (import suivi).
    pub fn resolve_function(&self, module: ModuleId, index: u32) -> Option<SlotRef> {
        let m = self.module(module)?;
        m.functions.get(index as usize)?;
        Some(m.func_imports.get(index as usize).copied().flatten().unwrap_or(SlotRef { module, index }))
    }

    /// Numéro global effectif de la fonction `index` de `module`.
    pub(crate) fn global_function_number(&self, module: ModuleId, index: u32) -> u32 {
        self.resolve_function(module, index)
            .and_then(|r| self.module(r.module)?.functions.get(r.index as usize))
            .map_or(0, |f| f.global)
    }

    /// Slot final d'un nom exporté par `module`.
    pub(crate) fn find_export(&self, module: ModuleId, name: &str, array: bool) -> Option<SlotRef> {
        let m = self.module(module)?;
        let (index, import) = match (m.exports.get(name)?, array) {
            (Export::Array(i), true) => (*i, m.map_arrays.get(*i as usize)?.import),
            (Export::Var(i), false) => (*i, m.map_vars.get(*i as usize)?.import),
            _ => return None,
        };
        Some(import.unwrap_or(SlotRef { module, index }))
    }
}

impl Default for Environment {
    fn default() -> Self { Self::new(LoaderConfig::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_lumps_prefer_latest() {
        let src = MemoryLumps::new().with("MAP01", vec![1]).with("map01", vec![2]);
        assert_eq!(src.find("Map01"), Some(1));
        assert_eq!(src.data(1), Some(&[2u8][..]));
        assert_eq!(src.find("MAP02"), None);
        assert_eq!(src.name(7), None);
    }

    #[test]
    fn failed_load_stays_registered() {
        let src = MemoryLumps::new().with("BAD", b"nope".to_vec());
        let mut env = Environment::new(LoaderConfig::default());
        assert!(matches!(env.load_lump(&src, 0), Err(LoadError::TooShort { .. })));
        assert_eq!(env.modules().len(), 1);
        assert!(!env.modules()[0].loaded);
        // second attempt returns the registered module
        assert_eq!(env.load_lump(&src, 0), Ok(ModuleId(0)));
        assert_eq!(env.modules().len(), 1);
    }

    #[test]
    fn missing_named_lump() {
        let mut env = Environment::new(LoaderConfig::default());
        assert_eq!(
            env.load_named(&MemoryLumps::new(), "SCRIPTS"),
            Err(LoadError::MissingLump("SCRIPTS".into()))
        );
    }

    #[test]
    fn function_zero_is_reserved() {
        let env = Environment::new(LoaderConfig::default());
        assert_eq!(env.function(0), None);
        assert_eq!(env.function(99), None);
    }
}
