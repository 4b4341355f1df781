//! acs-loader: chargement des modules ACS (ACS0, ACSE, ACSe)
//!
//! Pipeline :
//! ```text
//! lump ──detect──► ACS0 (tables plates) ─┐
//!                  ACSE/ACSe (chunks)  ──┼─► trace ─► translate ─► fixup ─► Module
//!                  ACS0 enveloppant    ──┘
//! ```
//!
//! - `dispatch` : reconnaissance du magic, lumps ACSE enveloppés dans un en-tête ACS0
//! - `chunks` : table `{tag, len, payload}` et handlers (STRL/STRE, ARAY, FUNC, SPTR, LOAD, ATAG…)
//! - `trace` / `translate` : deux passes sur le bytecode brut, tailles identiques
//!   garanties, sauts réécrits en index d'instruction
//! - `Environment` : modules d'un niveau, table de chaînes globale, imports/exports,
//!   numérotation globale des fonctions, listes LOADACS
//!
//! Les modules sont enregistrés avant la lecture de leurs chunks : les cycles
//! d'imports se terminent. Un lump rejeté laisse un module vide non chargé.
//!
//! Features :
//! - `serde` (par défaut) : (dé)sérialisation des modules et de la configuration

#![warn(missing_docs)]

/* ─────────────────────────── Modules ─────────────────────────── */

mod acs0;
mod config;
mod env;
mod module;

/// Table de chunks et handlers ACSE/ACSe.
pub mod chunks;
/// Détection du format d'un lump.
pub mod dispatch;
/// Table des opcodes historiques, décodage et expansion.
pub mod opcodes;
/// Littéraux, échappements, STRE et table globale.
pub mod strings;
/// Premier passage : marquage des instructions atteignables.
pub mod trace;
/// Second passage : traduction et correction des sauts.
pub mod translate;

/* ─────────────────────────── Réexports ─────────────────────────── */

pub use acs_core::{LoadError, LoadResult};
pub use config::LoaderConfig;
pub use dispatch::{detect, Format};
pub use env::{Environment, LumpId, LumpSource, MemoryLumps, LUMP_NAME_LEN};
pub use module::{
    Export, FunctionEntry, JumpTarget, MapArray, MapVar, Module, ModuleId, ScriptEntry, ScriptFlags, ScriptKind,
    SlotRef,
};
pub use strings::GlobalStrings;

/// Prélude : types usuels du chargeur.
pub mod prelude {
    /// Réexports pour `use acs_loader::prelude::*`.
    pub use super::{
        Environment, Export, LoadError, LoadResult, LoaderConfig, LumpSource, MemoryLumps, Module, ModuleId,
        ScriptEntry, ScriptKind,
    };
    pub use acs_core::bytecode::Op;
}
