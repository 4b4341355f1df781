//! acs-core: primitives partagées du chargeur ACS
//!
//! Fournit :
//! - Constantes de format (`MAGIC_ACS0`, `MAGIC_ACSE`, `MAGIC_ACSE_COMPRESSED`) + `ChunkTag` (fourcc)
//! - Limites de portée (`NUM_MAP_VARS`, `NUM_MAP_ARRAYS`, `NUM_LOCAL_VARS`)
//! - IO mémoire (little-endian) bornée : `ByteReader`
//! - Erreurs `LoadError` + alias `LoadResult<T>`
//! - Jeu d'instructions interne (`bytecode::{Op, CallFunc, ThingProp}`) et désassembleur
//!
//! Features :
//! - `serde` (par défaut) : derive (dé)sérialisation sur les types exposés aux outils

#![warn(missing_docs)]

/* ─────────────────────────── Imports ─────────────────────────── */

use core::fmt;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Jeu d'instructions interne (opcodes, fonctions natives, propriétés) et désassembleur.
pub mod bytecode;

/// Compatibilité : ré-exporte le désassembleur textuel.
pub use bytecode::disasm;

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au chargeur.
pub type LoadResult<T> = core::result::Result<T, LoadError>;

/* ─────────────────────────── Constantes de format ─────────────────────────── */

/// Magic d'un lump ACS0 (Hexen) : `b"ACS\0"`.
pub const MAGIC_ACS0: [u8; 4] = *b"ACS\0";

/// Magic / pré-tag d'un lump ACSE (opcodes sur 4 octets).
pub const MAGIC_ACSE: [u8; 4] = *b"ACSE";

/// Magic / pré-tag d'un lump ACSe (opcodes compressés).
pub const MAGIC_ACSE_COMPRESSED: [u8; 4] = *b"ACSe";

/// Nombre de variables de map adressables par module.
pub const NUM_MAP_VARS: usize = 128;

/// Nombre de tableaux de map adressables par module.
pub const NUM_MAP_ARRAYS: usize = 128;

/// Nombre de variables locales par défaut d'un script.
pub const NUM_LOCAL_VARS: u32 = 20;

/// Seuil à partir duquel un opcode compressé occupe deux octets.
pub const COMPRESSED_OP_THRESHOLD: u8 = 240;

/* ─────────────────────────── Tags de chunk ─────────────────────────── */

/// Tags de chunk ACSE (fourcc), dans l'ordre des octets du fichier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum ChunkTag {
    /// AIMP : imports de tableaux de map
    AIMP = u32::from_le_bytes(*b"AIMP"),
    /// AINI : initialisation d'un tableau de map
    AINI = u32::from_le_bytes(*b"AINI"),
    /// ARAY : définition des tableaux de map
    ARAY = u32::from_le_bytes(*b"ARAY"),
    /// ASTR : tableaux de map contenant des chaînes
    ASTR = u32::from_le_bytes(*b"ASTR"),
    /// ATAG : typage cellule par cellule d'un tableau
    ATAG = u32::from_le_bytes(*b"ATAG"),
    /// FNAM : noms de fonctions
    FNAM = u32::from_le_bytes(*b"FNAM"),
    /// FUNC : table des fonctions
    FUNC = u32::from_le_bytes(*b"FUNC"),
    /// JUMP : cibles de saut dynamiques
    JUMP = u32::from_le_bytes(*b"JUMP"),
    /// LOAD : bibliothèques à charger
    LOAD = u32::from_le_bytes(*b"LOAD"),
    /// MEXP : exports (variables/tableaux de map)
    MEXP = u32::from_le_bytes(*b"MEXP"),
    /// MIMP : imports de variables de map
    MIMP = u32::from_le_bytes(*b"MIMP"),
    /// MINI : initialisation des variables de map
    MINI = u32::from_le_bytes(*b"MINI"),
    /// MSTR : variables de map contenant des chaînes
    MSTR = u32::from_le_bytes(*b"MSTR"),
    /// SFLG : drapeaux de scripts
    SFLG = u32::from_le_bytes(*b"SFLG"),
    /// SNAM : noms de scripts
    SNAM = u32::from_le_bytes(*b"SNAM"),
    /// SPTR : pointeurs de scripts
    SPTR = u32::from_le_bytes(*b"SPTR"),
    /// STRE : littéraux chiffrés
    STRE = u32::from_le_bytes(*b"STRE"),
    /// STRL : littéraux
    STRL = u32::from_le_bytes(*b"STRL"),
    /// SVCT : nombre de variables par script
    SVCT = u32::from_le_bytes(*b"SVCT"),
}

impl ChunkTag {
    /// Tous les tags connus.
    pub const ALL: [Self; 19] = [
        Self::AIMP, Self::AINI, Self::ARAY, Self::ASTR, Self::ATAG, Self::FNAM, Self::FUNC,
        Self::JUMP, Self::LOAD, Self::MEXP, Self::MIMP, Self::MINI, Self::MSTR, Self::SFLG,
        Self::SNAM, Self::SPTR, Self::STRE, Self::STRL, Self::SVCT,
    ];

    /// Renvoie le fourcc tel qu'il apparaît dans le fichier.
    pub const fn to_bytes(self) -> [u8; 4] { (self as u32).to_le_bytes() }

    /// Lit un tag depuis 4 octets (ordre fichier).
    pub fn from_bytes(b: [u8; 4]) -> Option<Self> {
        let raw = u32::from_le_bytes(b);
        Self::ALL.iter().copied().find(|t| *t as u32 == raw)
    }

    /// Nom ASCII du tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AIMP => "AIMP",
            Self::AINI => "AINI",
            Self::ARAY => "ARAY",
            Self::ASTR => "ASTR",
            Self::ATAG => "ATAG",
            Self::FNAM => "FNAM",
            Self::FUNC => "FUNC",
            Self::JUMP => "JUMP",
            Self::LOAD => "LOAD",
            Self::MEXP => "MEXP",
            Self::MIMP => "MIMP",
            Self::MINI => "MINI",
            Self::MSTR => "MSTR",
            Self::SFLG => "SFLG",
            Self::SNAM => "SNAM",
            Self::SPTR => "SPTR",
            Self::STRE => "STRE",
            Self::STRL => "STRL",
            Self::SVCT => "SVCT",
        }
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/* ─────────────────────────── Byte Reader (LE) ─────────────────────────── */

/// Lecteur séquentiel borné sur un slice d'octets (helpers LE).
///
/// Every read checks the remaining length first, so an offset read from
/// untrusted data can never index past the end of the buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> ByteReader<'a> {
    /// Construit un lecteur.
    pub const fn new(data: &'a [u8]) -> Self { Self { data, off: 0 } }

    /// Construit un lecteur positionné à `off` (erreur si hors du buffer).
    pub fn at(data: &'a [u8], off: usize) -> LoadResult<Self> {
        if off > data.len() {
            return Err(LoadError::UnexpectedEof { needed: off - data.len(), at: data.len() });
        }
        Ok(Self { data, off })
    }

    /// Offset courant.
    pub const fn offset(&self) -> usize { self.off }

    /// Taille restante.
    pub const fn remaining(&self) -> usize { self.data.len().saturating_sub(self.off) }

    /// Vrai si plus rien à lire.
    pub const fn is_empty(&self) -> bool { self.remaining() == 0 }

    /// Octets restants, sans consommer.
    pub fn rest(&self) -> &'a [u8] { &self.data[self.off.min(self.data.len())..] }

    /// Lit `n` octets (ou erreur si EOF).
    pub fn read_bytes(&mut self, n: usize) -> LoadResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(LoadError::UnexpectedEof { needed: n, at: self.off });
        }
        let start = self.off;
        self.off += n;
        Ok(&self.data[start..self.off])
    }

    /// Saute `n` octets.
    pub fn skip(&mut self, n: usize) -> LoadResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Lit un tag brut (4 octets).
    pub fn read_fourcc(&mut self) -> LoadResult<[u8; 4]> {
        let b = self.read_bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Lit un u8.
    pub fn read_u8(&mut self) -> LoadResult<u8> { Ok(self.read_bytes(1)?[0]) }

    /// Lit un u16 LE.
    pub fn read_u16_le(&mut self) -> LoadResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Lit un i16 LE.
    pub fn read_i16_le(&mut self) -> LoadResult<i16> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// Lit un u32 LE.
    pub fn read_u32_le(&mut self) -> LoadResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Lit un i32 LE.
    pub fn read_i32_le(&mut self) -> LoadResult<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Lit une chaîne terminée par NUL; le NUL est consommé.
    ///
    /// Fails when the terminator is missing before the end of the buffer.
    pub fn read_cstr(&mut self) -> LoadResult<&'a [u8]> {
        let rest = self.rest();
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(LoadError::UnexpectedEof { needed: 1, at: self.data.len() });
        };
        let s = self.read_bytes(len)?;
        self.off += 1;
        Ok(s)
    }
}

/// Lit un u32 LE à une position absolue, sans curseur.
pub fn u32_at(data: &[u8], off: usize) -> Option<u32> {
    let end = off.checked_add(4)?;
    let b = data.get(off..end)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Lit un u16 LE à une position absolue, sans curseur.
pub fn u16_at(data: &[u8], off: usize) -> Option<u16> {
    let end = off.checked_add(2)?;
    let b = data.get(off..end)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de chargement d'un lump.
///
/// All of them are local to one lump: the module is left not loaded and the
/// caller carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Lump trop court pour contenir un en-tête.
    #[error("lump too short: {len} bytes (need at least {min})")]
    TooShort {
        /// Taille du lump.
        len: usize,
        /// Taille minimale attendue.
        min: usize,
    },
    /// En-tête inconnu.
    #[error("unrecognized lump header {magic:02X?}")]
    UnknownFormat {
        /// Quatre premiers octets du lump.
        magic: [u8; 4],
    },
    /// Fin de buffer inattendue.
    #[error("unexpected end of data: need {needed} bytes at {at}")]
    UnexpectedEof {
        /// Nombre d'octets manquants.
        needed: usize,
        /// Offset où l'erreur s'est produite.
        at: usize,
    },
    /// Offset ou compteur hors limites.
    #[error("{what} out of bounds: {value} (limit {limit})")]
    OutOfBounds {
        /// Champ fautif.
        what: &'static str,
        /// Valeur lue.
        value: u64,
        /// Limite autorisée.
        limit: u64,
    },
    /// Chunk incohérent avec sa propre longueur.
    #[error("malformed {tag} chunk: {reason}")]
    Malformed {
        /// Tag du chunk.
        tag: ChunkTag,
        /// Raison courte.
        reason: &'static str,
    },
    /// Lump introuvable dans la source.
    #[error("lump not found: {0}")]
    MissingLump(String),
}

impl LoadError {
    /// Construit une erreur « hors limites ».
    pub const fn out_of_bounds(what: &'static str, value: u64, limit: u64) -> Self {
        Self::OutOfBounds { what, value, limit }
    }
}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        bytecode::{CallFunc, Op, ThingProp},
        u16_at, u32_at, ByteReader, ChunkTag, LoadError, LoadResult, MAGIC_ACS0, MAGIC_ACSE,
        MAGIC_ACSE_COMPRESSED, NUM_LOCAL_VARS, NUM_MAP_ARRAYS, NUM_MAP_VARS,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tags_roundtrip() {
        for t in ChunkTag::ALL {
            assert_eq!(ChunkTag::from_bytes(t.to_bytes()), Some(t));
            assert_eq!(t.to_bytes(), t.as_str().as_bytes());
        }
        assert_eq!(ChunkTag::from_bytes(*b"ZZZZ"), None);
    }

    #[test]
    fn reader_le() -> LoadResult<()> {
        let data = [0xEF, 0xBE, 0xEF, 0xBE, 0xAD, 0xDE, 0xFE, 0xFF, b'h', b'i', 0, 7];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u16_le()?, 0xBEEF);
        assert_eq!(r.read_u32_le()?, 0xDEAD_BEEF);
        assert_eq!(r.read_i16_le()?, -2);
        assert_eq!(r.read_cstr()?, b"hi");
        assert_eq!(r.read_u8()?, 7);
        assert!(r.is_empty());
        Ok(())
    }

    #[test]
    fn reader_eof_is_an_error() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert_eq!(r.read_u32_le(), Err(LoadError::UnexpectedEof { needed: 4, at: 0 }));
        // rien n'a été consommé
        assert_eq!(r.offset(), 0);
        assert!(ByteReader::at(&[1, 2, 3], 4).is_err());
        assert!(ByteReader::new(b"abc").read_cstr().is_err());
    }

    #[test]
    fn absolute_reads() {
        let data = [1, 0, 0, 0, 2, 0];
        assert_eq!(u32_at(&data, 0), Some(1));
        assert_eq!(u16_at(&data, 4), Some(2));
        assert_eq!(u32_at(&data, 3), None);
        assert_eq!(u32_at(&data, usize::MAX), None);
    }
}
