//! acs-tools: Bibliothèque commune pour les outils CLI ACS.
//!
//! Objectifs : mutualiser I/O, chrono, couleurs, logs, sources de lumps et
//! vues (résumé/JSON/désassemblage) d'un module chargé.
//!
//! ## Zones clés
//! - I/O       : `read_bytes`, `read_text`, `write_text`, `to_utf8`
//! - Lumps     : `lump_name`, `add_file`, `add_dir` (vers une `MemoryLumps`)
//! - Config    : `load_config` (JSON partiel, défauts sinon)
//! - Time      : `Timer`, `human_millis`
//! - Couleurs  : `ColorMode`, `setup_colors`
//! - Logs      : `init_tracing`
//! - Vues      : `entry_labels`, `ModuleReport`
//!
//! Les fonctions renvoient des `anyhow::Result`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]
#![cfg_attr(not(debug_assertions), warn(missing_docs))]

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use acs_loader::{Environment, LoaderConfig, LumpId, MemoryLumps, Module, ScriptKind, LUMP_NAME_LEN};

/// Version lisible du crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Petite bannière de version utile pour logs/outils.
pub fn version_banner(tool: &str) -> String { format!("{tool} (acs-tools {VERSION})") }

/* ─────────────────────────── Prelude ─────────────────────────── */

/// Prelude pratique pour les bins : re-exports compacts.
pub mod prelude {
    pub use crate::{
        add_dir, add_file, entry_labels, human_millis, init_tracing, load_config, lump_name, read_bytes, read_text,
        setup_colors, to_utf8, version_banner, write_text, ColorMode, ModuleReport, Timer,
    };
    pub use anyhow::{anyhow, Context, Result};
    pub use camino::{Utf8Path, Utf8PathBuf};
    pub use std::path::PathBuf;
}

/* ─────────────────────────── I/O ─────────────────────────── */

/// Lis un fichier binaire.
pub fn read_bytes(path: &Utf8Path) -> Result<Vec<u8>> { fs::read(path).with_context(|| format!("lecture {path}")) }

/// Lis un fichier texte en UTF-8.
pub fn read_text(path: &Utf8Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("lecture {path}"))
}

/// Écrit un texte (UTF-8). Crée les dossiers au besoin.
pub fn write_text(path: &Utf8Path, s: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path).with_context(|| format!("création {path}"))?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Convertit un `PathBuf` en `Utf8PathBuf` (erreur si non UTF-8).
pub fn to_utf8(p: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(p).map_err(|p| anyhow!("chemin non UTF-8: {}", p.display()))
}

/* ─────────────────────────── Lumps ─────────────────────────── */

/// Nom de lump d'un fichier : radical en majuscules, coupé à 8 caractères.
pub fn lump_name(path: &Utf8Path) -> String {
    let stem = path.file_stem().unwrap_or_default();
    stem.chars().take(LUMP_NAME_LEN).collect::<String>().to_ascii_uppercase()
}

/// Ajoute un fichier comme lump.
pub fn add_file(lumps: &mut MemoryLumps, path: &Utf8Path) -> Result<LumpId> {
    let data = read_bytes(path)?;
    Ok(lumps.push(lump_name(path), data))
}

/// Ajoute chaque fichier d'un dossier (ordre alphabétique, non récursif).
pub fn add_dir(lumps: &mut MemoryLumps, dir: &Utf8Path) -> Result<usize> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("lecture du dossier {dir}"))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(to_utf8(entry.path())?);
        }
    }
    files.sort();
    for f in &files {
        add_file(lumps, f)?;
    }
    Ok(files.len())
}

/* ─────────────────────────── Config ─────────────────────────── */

/// Lit une configuration JSON (champs absents = défauts), ou les défauts.
pub fn load_config(path: Option<&Utf8Path>) -> Result<LoaderConfig> {
    let Some(path) = path else { return Ok(LoaderConfig::default()) };
    let text = read_text(path)?;
    serde_json::from_str(&text).with_context(|| format!("configuration invalide: {path}"))
}

/* ─────────────────────────── Time / chrono ─────────────────────────── */

/// Chrono de scope simple.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Démarre un chrono.
    pub fn start() -> Self { Self { start: Instant::now() } }
    /// Durée écoulée.
    pub fn elapsed(&self) -> Duration { self.start.elapsed() }
    /// Format humain court.
    pub fn pretty(&self) -> String { human_millis(self.elapsed()) }
}

/// Format "humain" d'une durée.
pub fn human_millis(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1_000 {
        return format!("{ms} ms");
    }
    let s = ms as f64 / 1000.0;
    if s < 60.0 {
        return format!("{s:.3} s");
    }
    let m = (s / 60.0).floor();
    let rest = s - m * 60.0;
    format!("{m:.0} min {rest:.1} s")
}

/* ─────────────────────────── Couleurs & logs ─────────────────────────── */

/// Contrôle l'application de couleurs ANSI dans les sorties CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    /// Couleurs si la sortie les supporte.
    Auto,
    /// Toujours.
    Always,
    /// Jamais.
    Never,
}

/// Configure le mode couleur global de yansi (feature `colors`).
pub fn setup_colors(mode: ColorMode) {
    #[cfg(feature = "colors")]
    {
        match mode {
            ColorMode::Auto => yansi::whenever(yansi::Condition::DEFAULT),
            ColorMode::Always => yansi::enable(),
            ColorMode::Never => yansi::disable(),
        }
    }
    #[cfg(not(feature = "colors"))]
    {
        let _ = mode;
    }
}

/// Installe un subscriber `fmt` sur stderr.
///
/// `RUST_LOG` l'emporte; sinon `verbosity` choisit le niveau
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn init_tracing(verbosity: u8, ansi: bool) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();
}

/* ─────────────────────────── Vues ─────────────────────────── */

/// Étiquettes `(nom, pc)` des points d'entrée d'un module, pour le désassembleur.
pub fn entry_labels(env: &Environment, m: &Module) -> Vec<(String, u32)> {
    let mut labels = Vec::new();
    for s in &m.scripts {
        let name = s.name.and_then(|id| env.strings().get_lossy(id));
        let label = match (name, s.kind) {
            (Some(n), _) => format!("script \"{n}\""),
            (None, ScriptKind::Closed) => format!("script {}", s.number),
            (None, kind) => format!("script {} ({kind:?})", s.number),
        };
        labels.push((label, s.code_ptr));
    }
    for (i, f) in m.functions.iter().enumerate() {
        if f.code_index == 0 {
            continue;
        }
        let name = m.func_names.get(i).and_then(|&id| env.strings().get_lossy(id));
        let label = name.map_or_else(|| format!("function {i}"), |n| format!("function {n}"));
        labels.push((label, f.code_ptr));
    }
    labels.sort_by_key(|(_, pc)| *pc);
    labels
}

/// Vue sérialisable d'un module chargé.
#[derive(Debug, Serialize)]
pub struct ModuleReport<'a> {
    /// Nom du lump.
    pub name: &'a str,
    /// Identifiant dans l'environnement.
    pub id: u32,
    /// Chargé sans erreur.
    pub loaded: bool,
    /// Opcodes compressés (ACSe).
    pub compressed: bool,
    /// Module complet (scripts, fonctions, données de map, imports…).
    pub module: &'a Module,
    /// Littéraux locaux, résolus.
    pub strings: Vec<String>,
    /// Bibliothèques importées, résolues quand chargées.
    pub imports: Vec<ImportReport<'a>>,
}

/// Une bibliothèque listée par LOAD.
#[derive(Debug, Serialize)]
pub struct ImportReport<'a> {
    /// Nom tel qu'écrit dans le lump.
    pub name: &'a str,
    /// Module chargé, s'il a été trouvé.
    pub module: Option<u32>,
}

impl<'a> ModuleReport<'a> {
    /// Construit la vue de `m`.
    pub fn new(env: &'a Environment, m: &'a Module) -> Self {
        let strings = m
            .strings
            .iter()
            .map(|&id| env.strings().get_lossy(id).map(|s| s.into_owned()).unwrap_or_default())
            .collect();
        let imports = m
            .imports
            .iter()
            .zip(&m.import_modules)
            .map(|(name, id)| ImportReport { name, module: id.map(|id| id.0) })
            .collect();
        Self { name: &m.name, id: m.id, loaded: m.loaded, compressed: m.compressed, module: m, strings, imports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acs_loader::LumpSource;
    use pretty_assertions::assert_eq;

    #[test]
    fn lump_names() {
        assert_eq!(lump_name(Utf8Path::new("out/scripts.o")), "SCRIPTS");
        assert_eq!(lump_name(Utf8Path::new("verylongname.acs")), "VERYLONG");
        assert_eq!(lump_name(Utf8Path::new("")), "");
    }

    #[test]
    fn human_durations() {
        assert_eq!(human_millis(Duration::from_millis(12)), "12 ms");
        assert_eq!(human_millis(Duration::from_millis(1500)), "1.500 s");
        assert_eq!(human_millis(Duration::from_secs(90)), "1 min 30.0 s");
    }

    #[test]
    fn directory_lumps_and_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = to_utf8(dir.path().to_path_buf())?;
        fs::write(root.join("b.o"), b"ACSE")?;
        fs::write(root.join("a.o"), b"ACS\0")?;
        fs::create_dir(root.join("sub"))?;
        fs::write(root.join("cfg.json"), br#"{ "follow_imports": false }"#)?;

        let mut lumps = MemoryLumps::new();
        assert_eq!(add_dir(&mut lumps, &root)?, 3);
        assert_eq!(lumps.find("a"), Some(0));
        assert_eq!(lumps.data(1), Some(&b"ACSE"[..]));

        let cfg = load_config(Some(&root.join("cfg.json")))?;
        assert!(!cfg.follow_imports);
        assert_eq!(load_config(None)?, LoaderConfig::default());
        assert!(load_config(Some(&root.join("b.o"))).is_err());
        Ok(())
    }

    #[test]
    fn labels_and_report() -> Result<()> {
        let mut lump = b"ACSE".to_vec();
        lump.extend(12u32.to_le_bytes());
        lump.extend(1u32.to_le_bytes());
        lump.extend(b"SPTR");
        lump.extend(12u32.to_le_bytes());
        lump.extend(7i16.to_le_bytes());
        lump.extend(1u16.to_le_bytes());
        lump.extend(8u32.to_le_bytes());
        lump.extend(0u32.to_le_bytes());

        let lumps = MemoryLumps::new().with("SCRIPTS", lump);
        let mut env = Environment::new(LoaderConfig::default());
        let id = env.load_lump(&lumps, 0)?;
        let m = env.module(id).ok_or_else(|| anyhow!("module absent"))?;

        assert_eq!(entry_labels(&env, m), vec![("script 7 (Open)".to_owned(), 1)]);
        let json = serde_json::to_value(ModuleReport::new(&env, m))?;
        assert_eq!(json["name"], "SCRIPTS");
        assert_eq!(json["module"]["scripts"][0]["number"], 7);
        Ok(())
    }
}
