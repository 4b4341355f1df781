//! Premier passage : parcours d'atteignabilité du bytecode.
//!
//! Marque chaque octet appartenant à une instruction atteignable et compte
//! les mots que la traduction émettra. Un octet déjà marqué arrête la branche
//! sans recompter, ce qui fait aussi office d'ensemble « visité ».

use crate::opcodes::{decode, expand, CountingSink, Flow};

/// Résultat du traçage d'un lump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// Un booléen par octet du lump.
    pub touched: Vec<bool>,
    /// Mots du flux traduit, sentinelles `Halt` comprises.
    pub num_code: usize,
    /// Emplacements de saut à corriger.
    pub num_jumps: usize,
    /// Instructions atteintes.
    pub num_instructions: usize,
}

impl Trace {
    /// Vrai si l'octet `addr` appartient à une instruction atteinte.
    pub fn is_touched(&self, addr: usize) -> bool { self.touched.get(addr).copied().unwrap_or(false) }
}

/// Trace `data` à partir des offsets `entries`.
pub fn trace(data: &[u8], compressed: bool, entries: impl IntoIterator<Item = u32>) -> Trace {
    let len = data.len();
    let mut touched = vec![false; len];
    let mut counts = CountingSink::default();
    let mut num_instructions = 0;
    let mut worklist: Vec<usize> = entries.into_iter().map(|e| e as usize).collect();

    while let Some(start) = worklist.pop() {
        let mut addr = start;
        loop {
            if addr >= len {
                break;
            }
            let Some(ins) = decode(data, addr, compressed) else { break };
            let end = addr + ins.size;
            let range = &mut touched[addr..end];
            if range.iter().any(|&t| t) {
                break;
            }
            range.fill(true);

            expand(&ins, &mut counts);
            num_instructions += 1;

            match ins.flow() {
                Flow::Goto(target) => addr = target as usize,
                Flow::Next => {
                    worklist.extend(ins.jump_targets().map(|t| t as usize));
                    addr = end;
                }
                Flow::Stop => break,
            }
        }
    }

    Trace { touched, num_code: counts.words + 2, num_jumps: counts.jumps, num_instructions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(ws: &[u32]) -> Vec<u8> { ws.iter().flat_map(|w| w.to_le_bytes()).collect() }

    #[test]
    fn single_terminate() {
        let data = words(&[1]);
        let t = trace(&data, false, [0]);
        assert_eq!(t.num_code, 3);
        assert_eq!(t.num_jumps, 0);
        assert_eq!(t.touched, vec![true; 4]);
    }

    #[test]
    fn goto_skips_dead_bytes() {
        // 0: GOTO 12 | 8: junk | 12: TERMINATE
        let data = words(&[52, 12, 0xDEAD, 1]);
        let t = trace(&data, false, [0]);
        assert_eq!(t.num_code, 2 + 2 + 1);
        assert_eq!(t.num_jumps, 1);
        assert!(!t.is_touched(8));
        assert!(t.is_touched(12));
    }

    #[test]
    fn conditional_follows_both_sides() {
        // 0: IFGOTO 16 | 8: TERMINATE | 12: junk | 16: RESTART
        let data = words(&[53, 16, 1, 0xDEAD, 69]);
        let t = trace(&data, false, [0]);
        assert_eq!(t.num_instructions, 3);
        assert!(!t.is_touched(12));
    }

    #[test]
    fn loops_terminate() {
        // 0: GOTO 0
        let data = words(&[52, 0]);
        let t = trace(&data, false, [0, 0, 0]);
        assert_eq!(t.num_instructions, 1);
        assert_eq!(t.num_code, 4);
    }

    #[test]
    fn unknown_opcode_counts_one_halt() {
        let data = words(&[0, 9999, 1]);
        let t = trace(&data, false, [0]);
        assert_eq!(t.num_code, 2 + 1 + 1);
        assert!(!t.is_touched(8));
    }

    #[test]
    fn out_of_range_entries_are_ignored() {
        let data = words(&[1]);
        let t = trace(&data, false, [4, 1000, u32::MAX]);
        assert_eq!(t.num_code, 2);
        assert_eq!(t.touched, vec![false; 4]);
    }

    #[test]
    fn overlapping_entry_stops_without_counting() {
        // entry 4 lands on PUSHNUMBER's operand and is traced first
        let data = words(&[3, 1, 1]);
        let t = trace(&data, false, [0, 4]);
        assert_eq!(t.num_instructions, 1);
        assert!(!t.is_touched(0));
        assert_eq!(t.num_code, 3);
    }
}
