//! Lecteur ACS0 (tables plates, format Hexen).

use acs_core::{u32_at, ByteReader, LoadError, LoadResult};
use tracing::debug;

use crate::config::LoaderConfig;
use crate::module::{Module, ScriptEntry, ScriptKind};
use crate::strings::{cstr_at, GlobalStrings};
use crate::translate::load_code;

/// Numéros de scripts à partir desquels un script est `Open`.
const OPEN_BASE: i32 = 1000;

/// Taille d'un enregistrement de script.
const SCRIPT_RECORD: u64 = 12;

/// Lit les tables ACS0 de `data` dans `module` puis traduit son code.
pub fn read(module: &mut Module, strings: &mut GlobalStrings, data: &[u8], cfg: &LoaderConfig) -> LoadResult<()> {
    let len = data.len() as u64;
    // magic, table offset, script count, string count
    let mut avail = len.checked_sub(16).ok_or(LoadError::TooShort { len: data.len(), min: 16 })?;

    let table = u64::from(u32_at(data, 4).ok_or(LoadError::TooShort { len: data.len(), min: 8 })?);
    if table > len - 8 {
        return Err(LoadError::out_of_bounds("ACS0 table offset", table, len - 8));
    }

    let mut r = ByteReader::at(data, table as usize)?;
    let num_scripts = u64::from(r.read_u32_le()?);
    let script_bytes = num_scripts * SCRIPT_RECORD;
    if script_bytes > avail {
        return Err(LoadError::out_of_bounds("ACS0 script count", num_scripts, avail / SCRIPT_RECORD));
    }
    avail -= script_bytes;
    if table + 8 > len - script_bytes {
        return Err(LoadError::out_of_bounds("ACS0 string count offset", table + 8 + script_bytes, len));
    }

    module.scripts.reserve(num_scripts as usize);
    for _ in 0..num_scripts {
        let number = r.read_i32_le()?;
        let code_index = r.read_u32_le()?;
        let num_args = r.read_u32_le()?;
        let (number, kind) =
            if number >= OPEN_BASE { (number - OPEN_BASE, ScriptKind::Open) } else { (number, ScriptKind::Closed) };
        module.scripts.push(ScriptEntry {
            number,
            kind,
            code_index,
            num_args,
            num_vars: cfg.num_local_vars,
            ..ScriptEntry::default()
        });
    }

    let num_strings = u64::from(r.read_u32_le()?);
    if num_strings * 4 > avail {
        return Err(LoadError::out_of_bounds("ACS0 string count", num_strings, avail / 4));
    }
    let raw = (0..num_strings)
        .map(|_| r.read_u32_le().map(|off| cstr_at(data, off as usize).to_vec()))
        .collect::<LoadResult<Vec<_>>>()?;
    module.strings = strings.add_table(&raw, (module.id == 0).then_some(0), cfg.decode_escapes);

    debug!(module = %module.name, scripts = num_scripts, strings = num_strings, "ACS0 tables read");

    module.compressed = false;
    load_code(module, data);
    module.loaded = true;
    Ok(())
}
