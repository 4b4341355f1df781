//! Internal instruction set produced by the loader.
//!
//! The translated stream is a flat `Vec<u32>`: an [`Op`] word followed by its
//! operand words. [`Op::arity`] tells how many operand words follow, which is
//! all the disassembler (and any VM) needs to walk the stream.

/// Opcodes internes et arités.
pub mod op;
/// Fonctions natives appelées via `CallFunc`.
pub mod callfunc;
/// Rendu texte du flux traduit.
pub mod disasm;

pub use callfunc::{CallFunc, ThingProp};
pub use op::{Arity, Op};
