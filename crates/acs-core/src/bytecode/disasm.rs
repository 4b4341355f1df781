//! Textual disassembly of a translated instruction stream.

use core::fmt::Write;

use crate::bytecode::{CallFunc, Op, ThingProp};

/// One decoded instruction of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr<'a> {
    /// Index of the opcode word.
    pub pc: usize,
    /// Opcode, `None` for a word outside the internal set.
    pub op: Option<Op>,
    /// Raw opcode word.
    pub raw: u32,
    /// Operand words (clamped to the end of the stream).
    pub operands: &'a [u32],
}

/// Iterator over the instructions of a stream.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    code: &'a [u32],
    pc: usize,
}

/// Walks `code` instruction by instruction.
pub const fn instructions(code: &[u32]) -> Instructions<'_> { Instructions { code, pc: 0 } }

impl<'a> Iterator for Instructions<'a> {
    type Item = Instr<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let pc = self.pc;
        let raw = *self.code.get(pc)?;
        let op = Op::from_u32(raw);
        let following = &self.code[pc + 1..];
        let n = op
            .and_then(|op| op.arity().operand_words(following))
            .unwrap_or(0)
            .min(following.len());
        self.pc = pc + 1 + n;
        Some(Instr { pc, op, raw, operands: &following[..n] })
    }
}

/// Renders one instruction without its index.
pub fn render(instr: &Instr<'_>) -> String {
    let Some(op) = instr.op else {
        return format!("<bad 0x{:08X}>", instr.raw);
    };
    let ops = instr.operands;
    let mut out = String::from(op.name());
    match op {
        Op::CallFunc if ops.len() == 2 => {
            let _ = write!(out, " {} argc={}", callfunc_name(ops[1]), ops[0]);
        }
        Op::CallFuncImm if ops.len() >= 2 => {
            let _ = write!(out, " {} argc={}", callfunc_name(ops[0]), ops[1]);
            for v in &ops[2..] {
                let _ = write!(out, " {}", *v as i32);
            }
        }
        Op::GetThingVar if ops.len() == 1 => match ThingProp::from_u32(ops[0]) {
            Some(p) => {
                let _ = write!(out, " {p:?}");
            }
            None => {
                let _ = write!(out, " prop#{}", ops[0]);
            }
        },
        Op::Branch | Op::BranchTrue | Op::BranchFalse if ops.len() == 1 => {
            let _ = write!(out, " -> {:04}", ops[0]);
        }
        Op::BranchCase if ops.len() == 2 => {
            let _ = write!(out, " {} -> {:04}", ops[0] as i32, ops[1]);
        }
        Op::BranchTable if !ops.is_empty() => {
            let _ = write!(out, " [{}]", ops[0]);
            for pair in ops[1..].chunks_exact(2) {
                let _ = write!(out, " {}->{:04}", pair[0] as i32, pair[1]);
            }
        }
        _ => {
            for v in ops {
                let _ = write!(out, " {}", *v as i32);
            }
        }
    }
    out
}

fn callfunc_name(word: u32) -> String {
    CallFunc::from_u32(word).map_or_else(|| format!("func#{word}"), |f| f.name().to_owned())
}

/// Multi-line listing with a header and optional entry labels `(name, pc)`.
pub fn disassemble_full(code: &[u32], title: &str, labels: &[(String, u32)]) -> String {
    let mut out = String::new();
    let count = instructions(code).count();
    let _ = writeln!(out, "== {title} == (words={}, instructions={count})", code.len());

    if !labels.is_empty() {
        let _ = writeln!(out, ";; entry points");
        for (name, pc) in labels {
            let _ = writeln!(out, ";;   {name} @ {pc:04}");
        }
    }

    let _ = writeln!(out);
    for instr in instructions(code) {
        for (name, _) in labels.iter().filter(|(_, pc)| *pc as usize == instr.pc) {
            let _ = writeln!(out, "{name}:");
        }
        let _ = writeln!(out, "{:04} | {}", instr.pc, render(&instr));
    }
    out
}

/// One line per instruction, no header.
pub fn disassemble_compact(code: &[u32]) -> String {
    let mut out = String::new();
    for instr in instructions(code) {
        let _ = writeln!(out, "{:04}: {}", instr.pc, render(&instr));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn walks_variable_length_instructions() {
        let code = [
            Op::Halt.word(),
            Op::PushImms.word(), 2, 10, 20,
            Op::CallFunc.word(), 2, CallFunc::Random.word(),
            Op::BranchTable.word(), 1, 5, 0,
            Op::Halt.word(),
        ];
        let pcs: Vec<usize> = instructions(&code).map(|i| i.pc).collect();
        assert_eq!(pcs, vec![0, 1, 5, 8, 12]);
        assert_eq!(
            disassemble_compact(&code),
            "0000: Halt\n0001: PushImms 2 10 20\n0005: CallFunc Random argc=2\n0008: BranchTable [1] 5->0000\n0012: Halt\n"
        );
    }

    #[test]
    fn truncated_stream_is_clamped() {
        let code = [Op::LineSpecImm.word(), 80, 9];
        let all: Vec<Instr<'_>> = instructions(&code).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].operands, &[80, 9]);
    }

    #[test]
    fn full_listing_marks_labels() {
        let code = [Op::Halt.word(), Op::Terminate.word(), Op::Halt.word()];
        let txt = disassemble_full(&code, "MAP01", &[("script 1".into(), 1)]);
        assert!(txt.starts_with("== MAP01 == (words=3, instructions=3)"));
        assert!(txt.contains("script 1:\n0001 | Terminate"));
    }
}
