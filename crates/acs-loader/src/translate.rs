//! Second passage : traduction, correction des sauts et résolution des
//! points d'entrée.

use acs_core::bytecode::Op;
use tracing::debug;

use crate::module::Module;
use crate::opcodes::{decode, expand, CodeSink};
use crate::trace::{trace, Trace};

/// Flux traduit avant correction des sauts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Mots émis, sentinelles comprises.
    pub code: Vec<u32>,
    /// Offset du lump → index d'instruction (valide pour les débuts d'instruction atteints).
    pub index_map: Vec<u32>,
    /// Positions dans `code` des mots qui portent encore un offset de lump.
    pub deferred: Vec<usize>,
}

struct Emitter<'a> {
    code: &'a mut Vec<u32>,
    deferred: &'a mut Vec<usize>,
}

impl CodeSink for Emitter<'_> {
    fn word(&mut self, w: u32) { self.code.push(w); }

    fn jump(&mut self, target: u32) {
        self.deferred.push(self.code.len());
        self.code.push(target);
    }
}

/// Traduit les instructions marquées par `trace`, dans l'ordre du lump.
pub fn translate(data: &[u8], compressed: bool, trace: &Trace) -> Translation {
    let len = data.len();
    let mut code = Vec::with_capacity(trace.num_code);
    let mut deferred = Vec::with_capacity(trace.num_jumps);
    let mut index_map = vec![0u32; len];

    code.push(Op::Halt.word());
    let mut addr = 0;
    while addr < len {
        if !trace.touched[addr] {
            addr += 1;
            continue;
        }
        // the tracer only marks ranges it could decode
        let Some(ins) = decode(data, addr, compressed) else { break };
        index_map[addr] = code.len() as u32;
        expand(&ins, &mut Emitter { code: &mut code, deferred: &mut deferred });
        addr += ins.size.max(1);
    }
    code.push(Op::Halt.word());

    debug_assert_eq!(code.len(), trace.num_code, "traced and emitted word counts differ");
    debug_assert_eq!(deferred.len(), trace.num_jumps, "traced and emitted jump counts differ");

    Translation { code, index_map, deferred }
}

/// Index d'instruction d'un offset brut; 0 hors du lump.
pub fn resolve(index_map: &[u32], raw: u32) -> u32 { index_map.get(raw as usize).copied().unwrap_or(0) }

/// Remplace chaque offset différé par l'index d'instruction correspondant.
pub fn fixup_jumps(code: &mut [u32], deferred: &[usize], index_map: &[u32]) {
    for &slot in deferred {
        if let Some(w) = code.get_mut(slot) {
            *w = resolve(index_map, *w);
        }
    }
}

/// Trace, traduit et relie le code d'un module à partir de ses points d'entrée.
pub fn load_code(module: &mut Module, data: &[u8]) {
    let compressed = module.compressed;
    let entries = module
        .scripts
        .iter()
        .map(|s| s.code_index)
        .chain(module.functions.iter().map(|f| f.code_index).filter(|&c| c != 0))
        .chain(module.jumps.iter().map(|j| j.code_index));

    let t = trace(data, compressed, entries);
    let Translation { mut code, index_map, deferred } = translate(data, compressed, &t);
    fixup_jumps(&mut code, &deferred, &index_map);

    for s in &mut module.scripts {
        s.code_ptr = resolve(&index_map, s.code_index);
    }
    for f in &mut module.functions {
        f.code_ptr = resolve(&index_map, f.code_index);
    }
    for j in &mut module.jumps {
        j.code_ptr = resolve(&index_map, j.code_index);
    }

    debug!(
        module = %module.name,
        instructions = t.num_instructions,
        words = code.len(),
        jumps = deferred.len(),
        "code translated"
    );
    module.code = code;
}
