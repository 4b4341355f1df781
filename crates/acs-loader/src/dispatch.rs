//! Détection du format d'un lump et aiguillage vers le bon lecteur.

use acs_core::{u32_at, LoadError, LoadResult, MAGIC_ACS0, MAGIC_ACSE, MAGIC_ACSE_COMPRESSED};
use tracing::trace;

use crate::acs0;
use crate::chunks::{self, TableLocation};
use crate::env::{Environment, LumpSource};
use crate::module::ModuleId;

/// Taille minimale d'un lump ACS.
pub const MIN_LUMP_LEN: usize = 16;

/// Format reconnu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Tables plates (Hexen).
    Acs0,
    /// Table de chunks.
    Acse {
        /// Opcodes compressés (`ACSe`).
        compressed: bool,
        /// Table enveloppée dans un en-tête ACS0 (code accessible aux anciens moteurs).
        fake_acs0: bool,
        /// Offset du pointeur de table.
        table_offset: usize,
    },
}

/// Identifie le format de `data`.
pub fn detect(data: &[u8]) -> LoadResult<Format> {
    if data.len() < MIN_LUMP_LEN {
        return Err(LoadError::TooShort { len: data.len(), min: MIN_LUMP_LEN });
    }
    let magic = [data[0], data[1], data[2], data[3]];

    match magic {
        MAGIC_ACS0 => {
            let off = u32_at(data, 4).map_or(0, |o| o as usize);
            if off >= MIN_LUMP_LEN && off <= data.len() {
                let pretag = &data[off - 4..off];
                if let Some(compressed) = acse_magic(pretag) {
                    return Ok(Format::Acse { compressed, fake_acs0: true, table_offset: off - 8 });
                }
            }
            Ok(Format::Acs0)
        }
        m => match acse_magic(&m) {
            Some(compressed) => Ok(Format::Acse { compressed, fake_acs0: false, table_offset: 4 }),
            None => Err(LoadError::UnknownFormat { magic }),
        },
    }
}

fn acse_magic(tag: &[u8]) -> Option<bool> {
    match tag {
        t if t == MAGIC_ACSE => Some(false),
        t if t == MAGIC_ACSE_COMPRESSED => Some(true),
        _ => None,
    }
}

/// Charge `data` dans le module `id` déjà enregistré.
pub(crate) fn load(env: &mut Environment, id: ModuleId, source: &dyn LumpSource, data: &[u8]) -> LoadResult<()> {
    let format = detect(data)?;
    trace!(module = id.0, ?format, len = data.len(), "lump format");
    match format {
        Format::Acs0 => {
            let cfg = env.config;
            acs0::read(&mut env.modules[id.index()], &mut env.strings, data, &cfg)
        }
        Format::Acse { compressed, fake_acs0, table_offset } => chunks::read(
            env,
            id,
            source,
            data,
            TableLocation { offset: table_offset, fake_acs0 },
            compressed,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn padded(head: &[u8], len: usize) -> Vec<u8> {
        let mut v = head.to_vec();
        v.resize(len, 0);
        v
    }

    #[test]
    fn short_and_unknown() {
        assert_eq!(detect(b"ACSE"), Err(LoadError::TooShort { len: 4, min: 16 }));
        assert_eq!(detect(&padded(b"WAD2", 16)), Err(LoadError::UnknownFormat { magic: *b"WAD2" }));
    }

    #[test]
    fn plain_formats() {
        assert_eq!(detect(&padded(b"ACS\0", 16)), Ok(Format::Acs0));
        assert_eq!(
            detect(&padded(b"ACSE", 16)),
            Ok(Format::Acse { compressed: false, fake_acs0: false, table_offset: 4 })
        );
        assert_eq!(
            detect(&padded(b"ACSe", 16)),
            Ok(Format::Acse { compressed: true, fake_acs0: false, table_offset: 4 })
        );
    }

    #[test]
    fn wrapped_acse() {
        let mut data = padded(b"ACS\0", 32);
        data[4..8].copy_from_slice(&24u32.to_le_bytes());
        data[20..24].copy_from_slice(b"ACSe");
        assert_eq!(detect(&data), Ok(Format::Acse { compressed: true, fake_acs0: true, table_offset: 16 }));

        // pretag mismatch or offset outside the lump: plain ACS0
        data[20..24].copy_from_slice(b"XXXX");
        assert_eq!(detect(&data), Ok(Format::Acs0));
        data[4..8].copy_from_slice(&64u32.to_le_bytes());
        assert_eq!(detect(&data), Ok(Format::Acs0));
    }
}
