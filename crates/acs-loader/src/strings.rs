//! Littéraux : lecture, séquences d'échappement, déchiffrement STRE et table
//! globale partagée entre modules.

use std::borrow::Cow;
use std::collections::HashMap;

use acs_core::{ByteReader, ChunkTag, LoadError, LoadResult};

/* ─────────────────────────── Lecture brute ─────────────────────────── */

/// Chaîne à `off`, jusqu'au NUL ou à la fin de `data`; vide si `off` est hors du buffer.
pub fn cstr_at(data: &[u8], off: usize) -> &[u8] {
    let Some(rest) = data.get(off..) else { return &[] };
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    &rest[..end]
}

/// Clé STRE de l'octet `j` d'une chaîne commençant à `off`.
#[inline]
fn stre_key(off: usize, j: usize) -> u8 {
    (off.wrapping_mul(157_135).wrapping_add(j / 2)) as u8
}

/// Chaîne chiffrée à `off` (STRE), déchiffrée jusqu'au NUL clair ou à la fin de `data`.
pub fn decrypt_at(data: &[u8], off: usize) -> Vec<u8> {
    let Some(rest) = data.get(off..) else { return Vec::new() };
    rest.iter()
        .enumerate()
        .map(|(j, b)| b ^ stre_key(off, j))
        .take_while(|&b| b != 0)
        .collect()
}

/* ─────────────────────────── Échappements ─────────────────────────── */

/// Décode les séquences `\n`, `\t`, `\x41`, `\101`, … d'un littéral.
///
/// Une séquence inconnue donne le caractère qui suit la barre; une barre
/// finale est conservée telle quelle.
pub fn decode_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];
        i += 1;
        if c != b'\\' {
            out.push(c);
            continue;
        }
        let Some(&e) = raw.get(i) else {
            out.push(b'\\');
            break;
        };
        i += 1;
        match e {
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0B),
            b'x' | b'X' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    let Some(d) = raw.get(i).and_then(|b| char::from(*b).to_digit(16)) else { break };
                    value = value * 16 + d;
                    digits += 1;
                    i += 1;
                }
                if digits == 0 { out.push(e) } else { out.push(value as u8) }
            }
            b'0'..=b'7' => {
                let mut value = u32::from(e - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            digits += 1;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push(value as u8);
            }
            other => out.push(other),
        }
    }
    out
}

/* ─────────────────────────── Tables de chunk ─────────────────────────── */

/// Disposition d'une table de chaînes dans un chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// STRL/STRE : en-tête `{inutilisé, count, inutilisé}`.
    Literals,
    /// FNAM/MEXP/SNAM : `count` puis les offsets.
    Plain,
}

/// Lit une table de chaînes (offsets relatifs au début du payload).
///
/// Un offset hors de `[base, payload.len())` donne une chaîne vide. Un
/// compteur qui dépasse le payload est une erreur.
pub fn read_table(tag: ChunkTag, payload: &[u8], layout: TableLayout) -> LoadResult<Vec<Vec<u8>>> {
    let mut r = ByteReader::new(payload);
    let count = match layout {
        TableLayout::Literals => {
            r.skip(4)?;
            let n = r.read_u32_le()?;
            r.skip(4)?;
            n
        }
        TableLayout::Plain => r.read_u32_le()?,
    } as usize;

    if count > r.remaining() / 4 {
        return Err(LoadError::Malformed { tag, reason: "string count exceeds chunk" });
    }
    let base = r.offset() + count * 4;
    let encrypted = tag == ChunkTag::STRE;

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let off = r.read_u32_le()? as usize;
        if off < base || off >= payload.len() {
            out.push(Vec::new());
        } else if encrypted {
            out.push(decrypt_at(payload, off));
        } else {
            out.push(cstr_at(payload, off).to_vec());
        }
    }
    Ok(out)
}

/* ─────────────────────────── Table globale ─────────────────────────── */

/// Table des chaînes partagée par tous les modules d'un environnement.
///
/// Les premières entrées reflètent, position par position, la table du
/// module 0 : un index local de ce module est aussi un index global.
#[derive(Debug, Default, Clone)]
pub struct GlobalStrings {
    strings: Vec<Box<[u8]>>,
    lookup: HashMap<Box<[u8]>, u32>,
}

impl GlobalStrings {
    /// Table vide.
    pub fn new() -> Self { Self::default() }

    /// Nombre de chaînes.
    pub fn len(&self) -> usize { self.strings.len() }

    /// Vrai si vide.
    pub fn is_empty(&self) -> bool { self.strings.is_empty() }

    fn push(&mut self, s: &[u8]) -> u32 {
        let id = self.strings.len() as u32;
        self.strings.push(s.into());
        self.lookup.entry(s.into()).or_insert(id);
        id
    }

    /// Index global de `s`, ajoutée si absente.
    pub fn intern(&mut self, s: &[u8]) -> u32 {
        match self.lookup.get(s) {
            Some(&id) => id,
            None => self.push(s),
        }
    }

    /// Place `s` à la position `index` (module 0) quand c'est possible.
    pub fn mirror(&mut self, index: usize, s: &[u8]) -> u32 {
        match self.strings.get(index) {
            Some(existing) if **existing == *s => index as u32,
            Some(_) => self.intern(s),
            None if index == self.strings.len() => self.push(s),
            None => self.intern(s),
        }
    }

    /// Ajoute une table lue dans un lump et renvoie les index globaux.
    ///
    /// Avec `mirror_from = Some(base)`, l'entrée `i` vise la position globale
    /// `base + i` (littéraux du module 0).
    pub fn add_table(&mut self, raw: &[Vec<u8>], mirror_from: Option<usize>, escapes: bool) -> Vec<u32> {
        raw.iter()
            .enumerate()
            .map(|(i, s)| {
                let s: Cow<'_, [u8]> = if escapes { Cow::Owned(decode_escapes(s)) } else { Cow::Borrowed(s) };
                match mirror_from {
                    Some(base) => self.mirror(base + i, &s),
                    None => self.intern(&s),
                }
            })
            .collect()
    }

    /// Octets de la chaîne `id`.
    pub fn get(&self, id: u32) -> Option<&[u8]> { self.strings.get(id as usize).map(|s| &**s) }

    /// Chaîne `id` en UTF-8 (remplacement des octets invalides).
    pub fn get_lossy(&self, id: u32) -> Option<Cow<'_, str>> {
        self.get(id).map(String::from_utf8_lossy)
    }

    /// Index global d'une chaîne déjà présente.
    pub fn find(&self, s: &[u8]) -> Option<u32> { self.lookup.get(s).copied() }

    /// Parcourt `(index, octets)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.strings.iter().enumerate().map(|(i, s)| (i as u32, &**s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes() {
        assert_eq!(decode_escapes(br"A\nB\x41"), b"A\nBA");
        assert_eq!(decode_escapes(br"\101\7x"), b"A\x07x");
        assert_eq!(decode_escapes(br#"\"q\\"#), b"\"q\\");
        assert_eq!(decode_escapes(br"tail\"), b"tail\\");
        assert_eq!(decode_escapes(br"\xZ"), b"xZ");
        assert_eq!(decode_escapes(br"\x414"), b"A4");
    }

    #[test]
    fn cstr_bounds() {
        let data = b"ab\0cd";
        assert_eq!(cstr_at(data, 0), b"ab");
        assert_eq!(cstr_at(data, 3), b"cd");
        assert_eq!(cstr_at(data, 5), b"");
        assert_eq!(cstr_at(data, 99), b"");
    }

    #[test]
    fn stre_roundtrip() {
        let off = 16;
        let mut data = vec![0u8; off];
        for (j, b) in b"Hi!\0".iter().enumerate() {
            data.push(b ^ stre_key(off, j));
        }
        data.push(0x55);
        assert_eq!(decrypt_at(&data, off), b"Hi!");
    }

    #[test]
    fn literal_table() -> LoadResult<()> {
        // {0, 2, 0}, offsets 20 and 3 (below base → empty), then "hey\0"
        let mut p = Vec::new();
        for w in [0u32, 2, 0, 20, 3] {
            p.extend_from_slice(&w.to_le_bytes());
        }
        p.extend_from_slice(b"hey\0");
        let t = read_table(ChunkTag::STRL, &p, TableLayout::Literals)?;
        assert_eq!(t, vec![b"hey".to_vec(), Vec::new()]);
        Ok(())
    }

    #[test]
    fn oversized_count_is_an_error() {
        let mut p = 1000u32.to_le_bytes().to_vec();
        p.extend_from_slice(&[0; 8]);
        assert!(matches!(
            read_table(ChunkTag::FNAM, &p, TableLayout::Plain),
            Err(LoadError::Malformed { tag: ChunkTag::FNAM, .. })
        ));
    }

    #[test]
    fn mirror_then_intern() {
        let mut g = GlobalStrings::new();
        assert_eq!(g.mirror(0, b"a"), 0);
        assert_eq!(g.mirror(1, b"a"), 1);
        assert_eq!(g.intern(b"a"), 0);
        assert_eq!(g.intern(b"b"), 2);
        assert_eq!(g.mirror(1, b"a"), 1);
        assert_eq!(g.mirror(1, b"c"), 3);
        assert_eq!(g.get_lossy(2).as_deref(), Some("b"));
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn tables_decode_before_interning() {
        let mut g = GlobalStrings::new();
        let ids = g.add_table(&[br"x\n".to_vec(), b"y".to_vec()], Some(0), true);
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(g.get(0), Some(&b"x\n"[..]));
        let ids = g.add_table(&[b"y".to_vec(), br"x\n".to_vec()], None, false);
        assert_eq!(ids, vec![1, 2]);
    }
}
