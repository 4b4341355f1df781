// crates/acs-tools/src/bin/acs-dump.rs
//! Chargeur/désassembleur ACS pour lumps `ACS\0`, `ACSE` et `ACSe`.
//!
//! Exemples :
//!   acs-dump scripts.o --summary
//!   acs-dump map01.o --lib-dir acs/ --disasm
//!   acs-dump behavior.o --json | jq '.module.scripts'
//!
//! Options utiles :
//!   --lib-dir <d>   : dossier de bibliothèques (un fichier = un lump, nom = radical)
//!   --loadacs       : charge aussi les bibliothèques listées par un lump LOADACS
//!   --disasm        : imprime le code traduit sur stdout
//!   --compact       : listing 1-ligne-par-instruction
//!   --emit <f>      : écrit le désassemblage dans un fichier (si 1 entrée)
//!   --json          : imprime une vue JSON du module
//!   --emit-json <f> : écrit le JSON dans un fichier (si 1 entrée)
//!   --summary       : résumé (scripts/fonctions/chaînes/imports)
//!   --config <f>    : options du chargeur (JSON)
//!   --no-imports    : ne suit pas les chunks LOAD
//!   --time          : chrono
//!   -v              : logs du chargeur (répétable)

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser, ValueEnum};
use yansi::{Color, Paint};

use acs_core::disasm::{disassemble_compact, disassemble_full};
use acs_loader::{Environment, LumpSource, MemoryLumps, Module, ModuleId, ScriptKind};
use acs_tools::prelude::*;
use acs_tools::ColorMode as GlobalColorMode;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Parser, Debug)]
#[command(name = "acs-dump", version, about = "Chargeur ACS (lumps compilés -> résumé/texte/JSON)")]
struct Cli {
    /// Lump(s) compilé(s) à charger
    inputs: Vec<PathBuf>,

    /// Dossier de bibliothèques résolues par LOAD et LOADACS
    #[arg(long)]
    lib_dir: Option<PathBuf>,

    /// Charge les bibliothèques listées par le lump LOADACS
    #[arg(long)]
    loadacs: bool,

    /// Affiche le désassemblage sur stdout
    #[arg(long)]
    disasm: bool,

    /// Vue compacte (1 ligne par instruction)
    #[arg(long)]
    compact: bool,

    /// Écrit le désassemblage dans un fichier (si 1 entrée)
    #[arg(long)]
    emit: Option<PathBuf>,

    /// Affiche un JSON structuré sur stdout
    #[arg(long)]
    json: bool,

    /// Écrit le JSON dans un fichier (si 1 entrée)
    #[arg(long)]
    emit_json: Option<PathBuf>,

    /// Résumé rapide
    #[arg(long)]
    summary: bool,

    /// Options du chargeur (JSON, champs absents = défauts)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ne charge pas les bibliothèques listées par LOAD
    #[arg(long)]
    no_imports: bool,

    /// Affiche la durée de traitement
    #[arg(long)]
    time: bool,

    /// Couleurs : auto|always|never
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Verbosité des logs (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();
    setup_colors(match cli.color {
        ColorMode::Auto => GlobalColorMode::Auto,
        ColorMode::Always => GlobalColorMode::Always,
        ColorMode::Never => GlobalColorMode::Never,
    });
    init_tracing(cli.verbose, !matches!(cli.color, ColorMode::Never));
    tracing::debug!("{}", version_banner("acs-dump"));

    if cli.inputs.is_empty() {
        bail!("Aucune entrée. Exemple: acs-dump scripts.o --summary");
    }
    if cli.inputs.len() > 1 && (cli.emit.is_some() || cli.emit_json.is_some()) {
        bail!("Plusieurs entrées → --emit / --emit-json n'acceptent qu'une entrée");
    }

    let timer = Timer::start();
    let config_path = cli.config.clone().map(to_utf8).transpose()?;
    let mut config = load_config(config_path.as_deref())?;
    if cli.no_imports {
        config.follow_imports = false;
    }

    // libraries first: a named input shadows a library of the same name
    let mut lumps = MemoryLumps::new();
    if let Some(dir) = &cli.lib_dir {
        let dir = to_utf8(dir.clone())?;
        let n = add_dir(&mut lumps, &dir)?;
        tracing::info!(dir = %dir, lumps = n, "library directory");
    }
    let mut inputs = Vec::with_capacity(cli.inputs.len());
    for p in &cli.inputs {
        let path = to_utf8(p.clone())?;
        inputs.push((add_file(&mut lumps, &path)?, path));
    }

    let mut env = Environment::new(config);
    if cli.loadacs {
        match lumps.find("LOADACS") {
            Some(list) => {
                let libs = env.load_library_list(&lumps, list);
                eprintln!("{} LOADACS: {} bibliothèque(s)", "•".paint(Color::Blue), libs.len());
            }
            None => eprintln!("{} pas de lump LOADACS", "•".paint(Color::Yellow)),
        }
    }

    let mut failures = 0usize;
    for (lump, path) in &inputs {
        match env.load_lump(&lumps, *lump) {
            Ok(id) => report(&env, id, path, &cli)?,
            Err(e) => {
                failures += 1;
                eprintln!("{} {path}: {e}", "✗".paint(Color::Red));
            }
        }
    }

    if cli.time {
        eprintln!("⏱️  {}", timer.pretty());
    }
    if failures > 0 {
        return Err(anyhow!("{failures} lump(s) rejeté(s)"));
    }
    Ok(())
}

fn report(env: &Environment, id: ModuleId, path: &Utf8Path, cli: &Cli) -> Result<()> {
    let m = env.module(id).ok_or_else(|| anyhow!("module {} absent", id.0))?;

    if cli.summary {
        print_summary(env, m, path);
    }

    if cli.disasm || cli.emit.is_some() {
        let txt = if cli.compact {
            disassemble_compact(&m.code)
        } else {
            disassemble_full(&m.code, &m.name, &entry_labels(env, m))
        };
        if let Some(file) = &cli.emit {
            let out = to_utf8(file.clone())?;
            write_text(&out, &txt)?;
            eprintln!("📝 Disasm → {out}");
        } else {
            println!("{txt}");
        }
    }

    if cli.json || cli.emit_json.is_some() {
        let pretty = serde_json::to_string_pretty(&ModuleReport::new(env, m))?;
        if let Some(file) = &cli.emit_json {
            let out = to_utf8(file.clone())?;
            write_text(&out, &pretty)?;
            eprintln!("🧾 JSON → {out}");
        } else {
            println!("{pretty}");
        }
    }
    Ok(())
}

fn print_summary(env: &Environment, m: &Module, path: &Utf8Path) {
    let bullet = "•".paint(Color::Blue);
    let hdr = format!("== {} ({path}) ==", m.name);
    eprintln!("{}", hdr.paint(Color::Cyan).bold());
    eprintln!(
        "{bullet} words={}, scripts={}, functions={}, strings={}, compressed={}",
        m.code.len(),
        m.scripts.len(),
        m.functions.len(),
        m.strings.len(),
        m.compressed
    );

    let open = m.scripts.iter().filter(|s| s.kind == ScriptKind::Open).count();
    let enter = m.scripts.iter().filter(|s| s.kind == ScriptKind::Enter).count();
    if open + enter > 0 {
        eprintln!("{bullet} open={open}, enter={enter}");
    }

    for (name, lib) in m.imports.iter().zip(&m.import_modules) {
        match lib.and_then(|id| env.module(id)) {
            Some(l) if l.loaded => eprintln!("{bullet} import {name} → module {}", l.id),
            _ => eprintln!("{bullet} import {name} {}", "(non résolu)".paint(Color::Yellow)),
        }
    }
    if !m.exports.is_empty() {
        let names: Vec<&str> = m.exports.keys().map(String::as_str).collect();
        eprintln!("{bullet} exports: {}", names.join(", "));
    }

    let unresolved = m
        .functions
        .iter()
        .zip(&m.func_imports)
        .filter(|(f, imp)| f.code_index == 0 && imp.is_none())
        .count();
    if unresolved > 0 {
        eprintln!("{bullet} {}", format!("{unresolved} fonction(s) importée(s) non résolue(s)").paint(Color::Yellow));
    }

    let preview: Vec<String> = m
        .strings
        .iter()
        .take(5)
        .filter_map(|&id| env.strings().get_lossy(id))
        .map(|s| if s.len() <= 64 { format!("\"{s}\"") } else { format!("\"{}…\"", s.chars().take(64).collect::<String>()) })
        .collect();
    if !preview.is_empty() {
        eprintln!("{bullet} strings[0..5]:");
        for (i, s) in preview.iter().enumerate() {
            eprintln!("   [{i}] {s}");
        }
    }
}
