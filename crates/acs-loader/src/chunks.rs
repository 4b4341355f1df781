//! Lecteur de chunks ACSE/ACSe.
//!
//! La table est relue une fois par handler, dans un ordre fixe : les
//! littéraux d'abord (index globaux du module 0), les exports avant LOAD
//! (une bibliothèque peut importer depuis le module en cours), ATAG en
//! dernier (il a besoin des fonctions résolues).

use acs_core::{u32_at, ByteReader, ChunkTag, LoadError, LoadResult};
use tracing::{debug, trace, warn};

use crate::env::{Environment, LumpSource};
use crate::module::{Export, FunctionEntry, JumpTarget, ModuleId, ScriptEntry, ScriptFlags, ScriptKind, SlotRef};
use crate::strings::{read_table, TableLayout};
use crate::translate::load_code;

/* ─────────────────────────── Table ─────────────────────────── */

/// Table de chunks `{tag, longueur, payload}*`.
#[derive(Debug, Clone, Copy)]
pub struct ChunkTable<'a> {
    data: &'a [u8],
}

impl<'a> ChunkTable<'a> {
    /// Table sur `data`.
    pub const fn new(data: &'a [u8]) -> Self { Self { data } }

    /// Parcourt les chunks jusqu'à un en-tête incomplet ou un payload qui déborde.
    pub fn iter(&self) -> Chunks<'a> { Chunks { r: ByteReader::new(self.data) } }

    /// Payloads des chunks portant `tag`, dans l'ordre de la table.
    pub fn each(&self, tag: ChunkTag) -> impl Iterator<Item = &'a [u8]> {
        let raw = tag.to_bytes();
        self.iter().filter(move |(t, _)| *t == raw).map(|(_, p)| p)
    }
}

/// Itérateur de [`ChunkTable`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    r: ByteReader<'a>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.r.remaining() < 8 {
            return None;
        }
        let tag = self.r.read_fourcc().ok()?;
        let len = self.r.read_u32_le().ok()? as usize;
        match self.r.read_bytes(len) {
            Ok(payload) => Some((tag, payload)),
            Err(_) => {
                self.r = ByteReader::new(&[]);
                None
            }
        }
    }
}

/* ─────────────────────────── Chargement ─────────────────────────── */

/// Emplacement de la table de chunks dans le lump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLocation {
    /// Offset du mot qui donne le début de la table.
    pub offset: usize,
    /// Lump ACS0 enveloppant : la table s'arrête à `offset` et SPTR a des
    /// enregistrements de 8 octets.
    pub fake_acs0: bool,
}

/// Lit les chunks d'un lump ACSE/ACSe dans le module `id` puis traduit son code.
pub(crate) fn read(
    env: &mut Environment,
    id: ModuleId,
    source: &dyn LumpSource,
    data: &[u8],
    at: TableLocation,
    compressed: bool,
) -> LoadResult<()> {
    let len = data.len();
    if at.offset > len.saturating_sub(4) {
        return Err(LoadError::out_of_bounds("chunk table pointer", at.offset as u64, len.saturating_sub(4) as u64));
    }
    let start = u32_at(data, at.offset).map_or(usize::MAX, |v| v as usize);
    let end = if at.fake_acs0 { at.offset } else { len };
    if start > end {
        return Err(LoadError::out_of_bounds("chunk table", start as u64, end as u64));
    }
    let table = ChunkTable::new(&data[start..end]);
    debug!(module = id.0, start, end, compressed, fake_acs0 = at.fake_acs0, "reading chunk table");

    env.modules[id.index()].compressed = compressed;

    read_strings(env, id, table)?;
    read_map_arrays(env, id, table);
    read_functions(env, id, table)?;
    read_jumps(env, id, table);
    read_exports(env, id, table)?;
    read_map_vars(env, id, table);
    read_scripts(env, id, table, at.fake_acs0)?;
    publish_exports(env, id);
    read_libraries(env, id, source, table);
    import_map_arrays(env, id, table);
    import_map_vars(env, id, table);
    resolve_functions(env, id);
    tag_arrays(env, id, table);

    let m = &mut env.modules[id.index()];
    load_code(m, data);
    m.loaded = true;
    Ok(())
}

/* ─────────────────────────── Littéraux ─────────────────────────── */

fn read_strings(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) -> LoadResult<()> {
    let escapes = env.config.decode_escapes;
    for (raw_tag, payload) in table.iter() {
        let Some(tag @ (ChunkTag::STRL | ChunkTag::STRE)) = ChunkTag::from_bytes(raw_tag) else { continue };
        let raw = read_table(tag, payload, TableLayout::Literals)?;
        let m = &mut env.modules[id.index()];
        let mirror = (id.0 == 0).then_some(m.strings.len());
        let ids = env.strings.add_table(&raw, mirror, escapes);
        trace!(module = id.0, %tag, count = ids.len(), "string literals");
        m.strings.extend(ids);
    }
    Ok(())
}

fn read_names(env: &mut Environment, tag: ChunkTag, table: ChunkTable<'_>) -> LoadResult<Vec<u32>> {
    let escapes = env.config.decode_escapes;
    let mut ids = Vec::new();
    for payload in table.each(tag) {
        let raw = read_table(tag, payload, TableLayout::Plain)?;
        ids.extend(env.strings.add_table(&raw, None, escapes));
    }
    Ok(ids)
}

/* ─────────────────────────── Tableaux de map ─────────────────────────── */

fn read_map_arrays(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) {
    let max_len = env.config.max_array_len;
    let m = &mut env.modules[id.index()];
    let limit = m.map_arrays.len();

    // AINI
    for payload in table.each(ChunkTag::AINI) {
        let mut r = ByteReader::new(payload);
        let Ok(var) = r.read_u32_le() else { continue };
        let Some(arr) = m.map_arrays.get_mut(var as usize) else { continue };
        let mut i = 0;
        while let Ok(v) = r.read_i32_le() {
            arr.set(i, v);
            i += 1;
        }
    }

    // ARAY
    for payload in table.each(ChunkTag::ARAY) {
        for pair in payload.chunks_exact(8) {
            let var = u32_at(pair, 0).unwrap_or(u32::MAX) as usize;
            if var < limit {
                m.map_arrays[var].len = u32_at(pair, 4).unwrap_or(0);
                m.map_arrays[var].defined = true;
            }
        }
    }

    // ASTR
    for payload in table.each(ChunkTag::ASTR) {
        for word in payload.chunks_exact(4) {
            let var = u32_at(word, 0).unwrap_or(u32::MAX) as usize;
            if var >= limit {
                continue;
            }
            // unset cells hold local string 0 once converted
            let arr = &mut m.map_arrays[var];
            if arr.len <= max_len && arr.cells.len() < arr.len as usize {
                arr.cells.resize(arr.len as usize, 0);
            } else if arr.len > max_len {
                warn!(module = id.0, array = var, len = arr.len, "array too long, converting stored cells only");
            }
            let cells: Vec<i32> = m.map_arrays[var].cells.iter().map(|&v| m.string_index(v)).collect();
            m.map_arrays[var].cells = cells;
        }
    }
}

/* ─────────────────────────── Fonctions & sauts ─────────────────────────── */

fn read_functions(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) -> LoadResult<()> {
    let names = read_names(env, ChunkTag::FNAM, table)?;
    env.modules[id.index()].func_names.extend(names);

    for payload in table.each(ChunkTag::FUNC) {
        for rec in payload.chunks_exact(8) {
            let index = env.modules[id.index()].functions.len() as u32;
            let global = env.functions.len() as u32;
            env.functions.push(Some(SlotRef { module: id, index }));

            let (argc, vars, retn) = (u32::from(rec[0]), u32::from(rec[1]), u32::from(rec[2]));
            let m = &mut env.modules[id.index()];
            m.functions.push(FunctionEntry {
                argc,
                vars: vars.max(argc),
                retn,
                code_index: u32_at(rec, 4).unwrap_or(0),
                code_ptr: 0,
                global,
            });
            m.func_imports.push(None);
        }
    }
    Ok(())
}

fn read_jumps(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) {
    let m = &mut env.modules[id.index()];
    for payload in table.each(ChunkTag::JUMP) {
        m.jumps.extend(
            payload
                .chunks_exact(4)
                .filter_map(|w| u32_at(w, 0))
                .map(|code_index| JumpTarget { code_index, code_ptr: 0 }),
        );
    }
}

/* ─────────────────────────── Variables de map ─────────────────────────── */

fn read_exports(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) -> LoadResult<()> {
    let names = read_names(env, ChunkTag::MEXP, table)?;
    env.modules[id.index()].export_names.extend(names);
    Ok(())
}

fn read_map_vars(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) {
    let m = &mut env.modules[id.index()];
    let limit = m.map_vars.len() as u64;

    // MINI
    for payload in table.each(ChunkTag::MINI) {
        let Some(base) = u32_at(payload, 0).map(u64::from) else { continue };
        if base >= limit {
            continue;
        }
        let mut count = (payload.len() / 4) as u64 - 1;
        if count >= limit || base + count >= limit {
            count = limit - base;
        }
        for (i, word) in payload[4..].chunks_exact(4).take(count as usize).enumerate() {
            m.map_vars[base as usize + i].value = u32_at(word, 0).unwrap_or(0) as i32;
        }
    }

    // MSTR
    for payload in table.each(ChunkTag::MSTR) {
        for word in payload.chunks_exact(4) {
            let var = u32_at(word, 0).unwrap_or(u32::MAX) as usize;
            if let Some(v) = m.map_vars.get(var).map(|v| v.value) {
                let s = m.string_index(v);
                m.map_vars[var].value = s;
            }
        }
    }
}

/* ─────────────────────────── Scripts ─────────────────────────── */

fn read_scripts(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>, fake_acs0: bool) -> LoadResult<()> {
    let names = read_names(env, ChunkTag::SNAM, table)?;
    let num_vars = env.config.num_local_vars;
    let m = &mut env.modules[id.index()];
    m.script_names.extend(names);

    // SPTR
    let record = if fake_acs0 { 8 } else { 12 };
    for payload in table.each(ChunkTag::SPTR) {
        for rec in payload.chunks_exact(record) {
            let mut r = ByteReader::new(rec);
            let number = i32::from(r.read_i16_le()?);
            let (kind, code_index, num_args) = if fake_acs0 {
                let kind = r.read_u8()?;
                let argc = r.read_u8()?;
                (u32::from(kind), r.read_u32_le()?, u32::from(argc))
            } else {
                let kind = r.read_u16_le()?;
                let code = r.read_u32_le()?;
                (u32::from(kind), code, r.read_u32_le()?)
            };
            let name = usize::try_from(-1 - number).ok().and_then(|i| m.script_names.get(i)).copied();
            m.scripts.push(ScriptEntry {
                number,
                kind: ScriptKind::from_sptr(kind),
                code_index,
                num_args,
                num_vars,
                name,
                ..ScriptEntry::default()
            });
        }
    }

    // SFLG
    for payload in table.each(ChunkTag::SFLG) {
        for rec in payload.chunks_exact(4) {
            let mut r = ByteReader::new(rec);
            let number = i32::from(r.read_i16_le()?);
            let flags = ScriptFlags::from_bits_retain(r.read_u16_le()?);
            for s in m.scripts.iter_mut().filter(|s| s.number == number) {
                s.flags = flags;
            }
        }
    }

    // SVCT
    for payload in table.each(ChunkTag::SVCT) {
        for rec in payload.chunks_exact(4) {
            let mut r = ByteReader::new(rec);
            let number = i32::from(r.read_i16_le()?);
            let vars = u32::from(r.read_u16_le()?);
            for s in m.scripts.iter_mut().filter(|s| s.number == number) {
                s.num_vars = vars.max(s.num_args);
            }
        }
    }
    Ok(())
}

/* ─────────────────────────── Exports & imports ─────────────────────────── */

fn publish_exports(env: &mut Environment, id: ModuleId) {
    let Environment { modules, strings, .. } = env;
    let m = &mut modules[id.index()];
    for (i, &name_id) in m.export_names.iter().enumerate() {
        let Some(name) = strings.get_lossy(name_id).filter(|n| !n.is_empty()) else { continue };
        let slot = if m.map_arrays.get(i).is_some_and(|a| a.defined) {
            m.map_arrays[i].name = Some(name_id);
            Export::Array(i as u32)
        } else if let Some(var) = m.map_vars.get_mut(i) {
            var.name = Some(name_id);
            Export::Var(i as u32)
        } else {
            continue;
        };
        m.exports.entry(name.into_owned()).or_insert(slot);
    }
}

fn read_libraries(env: &mut Environment, id: ModuleId, source: &dyn LumpSource, table: ChunkTable<'_>) {
    let mut names = Vec::new();
    for payload in table.each(ChunkTag::LOAD) {
        // a trailing name without its NUL is not counted
        let mut rest = payload;
        while let Some(nul) = rest.iter().position(|&b| b == 0) {
            names.push(String::from_utf8_lossy(&rest[..nul]).into_owned());
            rest = &rest[nul + 1..];
        }
    }

    // libraries load last-first; slots stay in listing order
    let mut modules = vec![None; names.len()];
    if env.config.follow_imports {
        for (slot, name) in modules.iter_mut().zip(&names).rev() {
            *slot = match source.find(name) {
                Some(lump) => Some(env.import(source, lump)).filter(|&m| m != id),
                None => {
                    warn!(module = id.0, library = %name, "library lump not found");
                    None
                }
            };
        }
    }

    let m = &mut env.modules[id.index()];
    m.imports.extend(names);
    m.import_modules.extend(modules);
}

/// Premier module importé qui exporte `name`.
fn find_import(env: &Environment, id: ModuleId, name: &str, array: bool) -> Option<SlotRef> {
    env.modules[id.index()]
        .import_modules
        .iter()
        .flatten()
        .find_map(|&lib| env.find_export(lib, name, array))
}

/// Enregistrements `{index, [size,] nom\0}` d'AIMP/MIMP.
fn import_records(payload: &[u8], with_size: bool) -> Vec<(u32, String)> {
    let mut r = ByteReader::new(payload);
    let mut remaining = if with_size {
        match r.read_u32_le() {
            Ok(n) => n as usize,
            Err(_) => return Vec::new(),
        }
    } else {
        usize::MAX
    };
    let header = if with_size { 8 } else { 4 };

    let mut out = Vec::new();
    while remaining > 0 && r.remaining() > header {
        remaining -= 1;
        let Ok(index) = r.read_u32_le() else { break };
        if with_size && r.skip(4).is_err() {
            break;
        }
        // unterminated name ends the chunk
        let Ok(name) = r.read_cstr() else { break };
        out.push((index, String::from_utf8_lossy(name).into_owned()));
    }
    out
}

fn import_map_arrays(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) {
    let limit = env.modules[id.index()].map_arrays.len();
    for payload in table.each(ChunkTag::AIMP) {
        for (index, name) in import_records(payload, true) {
            if index as usize >= limit {
                continue;
            }
            match find_import(env, id, &name, true) {
                Some(slot) => env.modules[id.index()].map_arrays[index as usize].import = Some(slot),
                None => warn!(module = id.0, array = %name, "unresolved map array import"),
            }
        }
    }
}

fn import_map_vars(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) {
    let limit = env.modules[id.index()].map_vars.len();
    for payload in table.each(ChunkTag::MIMP) {
        for (index, name) in import_records(payload, false) {
            if index as usize >= limit {
                continue;
            }
            match find_import(env, id, &name, false) {
                Some(slot) => env.modules[id.index()].map_vars[index as usize].import = Some(slot),
                None => warn!(module = id.0, var = %name, "unresolved map variable import"),
            }
        }
    }
}

fn resolve_functions(env: &mut Environment, id: ModuleId) {
    let m = &env.modules[id.index()];
    let mut resolved = Vec::new();
    for (i, f) in m.functions.iter().enumerate() {
        if f.code_index != 0 {
            continue;
        }
        let Some(&name) = m.func_names.get(i) else { continue };
        let found = m.import_modules.iter().flatten().find_map(|&lib| {
            let index = env.module(lib)?.function_by_name(name)?;
            env.resolve_function(lib, index)
        });
        match found {
            Some(slot) => resolved.push((i, slot)),
            None => warn!(
                module = id.0,
                function = %env.strings.get_lossy(name).unwrap_or_default(),
                "unresolved function import"
            ),
        }
    }

    let m = &mut env.modules[id.index()];
    for (i, slot) in resolved {
        m.func_imports[i] = Some(slot);
    }
}

/* ─────────────────────────── ATAG ─────────────────────────── */

const TAG_STRING: u8 = 1;
const TAG_FUNCTION: u8 = 2;

fn tag_arrays(env: &mut Environment, id: ModuleId, table: ChunkTable<'_>) {
    for payload in table.each(ChunkTag::ATAG) {
        let mut r = ByteReader::new(payload);
        if r.read_u8() != Ok(0) {
            continue;
        }
        let Ok(var) = r.read_u32_le() else { continue };
        let var = var as usize;
        let m = &env.modules[id.index()];
        let Some(arr) = m.map_arrays.get(var) else { continue };

        let mut updates = Vec::new();
        for (i, &tag) in r.rest().iter().enumerate() {
            let v = arr.cells.get(i).copied().unwrap_or(0);
            match tag {
                TAG_STRING => updates.push((i, m.string_index(v))),
                TAG_FUNCTION => {
                    let global = u32::try_from(v)
                        .ok()
                        .filter(|&f| (f as usize) < m.functions.len())
                        .map_or(0, |f| env.global_function_number(id, f));
                    updates.push((i, global as i32));
                }
                _ => {}
            }
        }

        let arr = &mut env.modules[id.index()].map_arrays[var];
        for (i, v) in updates {
            arr.set(i, v);
        }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::env::MemoryLumps;
    use crate::module::Module;
    use pretty_assertions::assert_eq;

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn words(ws: &[u32]) -> Vec<u8> { ws.iter().flat_map(|w| w.to_le_bytes()).collect() }

    fn fresh() -> (Environment, ModuleId) {
        let mut env = Environment::new(LoaderConfig::default());
        let id = ModuleId(0);
        env.modules.push(Module::new(id, "T", 128, 128));
        (env, id)
    }

    #[test]
    fn table_walk_stops_on_overrun() {
        let mut data = chunk(b"JUMP", &words(&[4]));
        data.extend(chunk(b"ZZZZ", &[1, 2]));
        data.extend_from_slice(b"JUMP\xFF\0\0\0");
        let t = ChunkTable::new(&data);
        assert_eq!(t.iter().count(), 2);
        assert_eq!(t.each(ChunkTag::JUMP).count(), 1);
    }

    #[test]
    fn mini_is_clamped() {
        let (mut env, id) = fresh();
        let mut payload = words(&[126]);
        payload.extend(words(&[7, 8, 9, 10]));
        let data = chunk(b"MINI", &payload);
        read_map_vars(&mut env, id, ChunkTable::new(&data));
        let vals: Vec<i32> = env.modules[0].map_vars[125..].iter().map(|v| v.value).collect();
        assert_eq!(vals, vec![0, 7, 8]);
    }

    #[test]
    fn sptr_formats() -> LoadResult<()> {
        let (mut env, id) = fresh();
        let mut rec12 = (-3i16).to_le_bytes().to_vec();
        rec12.extend_from_slice(&4u16.to_le_bytes());
        rec12.extend(words(&[100, 2]));
        let data = chunk(b"SPTR", &rec12);
        read_scripts(&mut env, id, ChunkTable::new(&data), false)?;

        let mut rec8 = 5i16.to_le_bytes().to_vec();
        rec8.extend_from_slice(&[1, 3]);
        rec8.extend(words(&[200]));
        let data = chunk(b"SPTR", &rec8);
        read_scripts(&mut env, id, ChunkTable::new(&data), true)?;

        let s = &env.modules[0].scripts;
        assert_eq!((s[0].number, s[0].kind, s[0].code_index, s[0].num_args), (-3, ScriptKind::Enter, 100, 2));
        assert_eq!((s[1].number, s[1].kind, s[1].code_index, s[1].num_args), (5, ScriptKind::Open, 200, 3));
        assert_eq!(s[1].num_vars, 20);
        Ok(())
    }

    #[test]
    fn svct_keeps_room_for_args() -> LoadResult<()> {
        let (mut env, id) = fresh();
        let mut rec = 1i16.to_le_bytes().to_vec();
        rec.extend_from_slice(&0u16.to_le_bytes());
        rec.extend(words(&[8, 3]));
        let mut data = chunk(b"SPTR", &rec);
        let mut svct = 1i16.to_le_bytes().to_vec();
        svct.extend_from_slice(&1u16.to_le_bytes());
        data.extend(chunk(b"SVCT", &svct));
        let mut sflg = 1i16.to_le_bytes().to_vec();
        sflg.extend_from_slice(&2u16.to_le_bytes());
        data.extend(chunk(b"SFLG", &sflg));

        read_scripts(&mut env, id, ChunkTable::new(&data), false)?;
        let s = &env.modules[0].scripts[0];
        assert_eq!(s.num_vars, 3);
        assert_eq!(s.flags, ScriptFlags::CLIENTSIDE);
        Ok(())
    }

    #[test]
    fn func_records_and_global_numbers() -> LoadResult<()> {
        let (mut env, id) = fresh();
        let data = chunk(b"FUNC", &[2, 1, 1, 0, 40, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        read_functions(&mut env, id, ChunkTable::new(&data))?;
        let f = &env.modules[0].functions;
        assert_eq!((f[0].argc, f[0].vars, f[0].retn, f[0].code_index, f[0].global), (2, 2, 1, 40, 1));
        assert_eq!(f[1].global, 2);
        assert_eq!(env.function(2).map(|(m, _)| m), Some(id));
        Ok(())
    }

    #[test]
    fn astr_converts_every_declared_cell() {
        let (mut env, id) = fresh();
        env.modules[0].strings = vec![40, 41];
        let mut data = chunk(b"AINI", &words(&[3, 1]));
        data.extend(chunk(b"ARAY", &words(&[3, 4])));
        data.extend(chunk(b"ASTR", &words(&[3, 999])));
        read_map_arrays(&mut env, id, ChunkTable::new(&data));
        let arr = &env.modules[0].map_arrays[3];
        assert_eq!((arr.len, arr.defined), (4, true));
        assert_eq!(arr.cells, vec![41, 40, 40, 40]);
    }

    #[test]
    fn astr_on_oversized_array_keeps_stored_cells() {
        let (mut env, id) = fresh();
        env.config.max_array_len = 8;
        env.modules[0].strings = vec![40, 41];
        let mut data = chunk(b"AINI", &words(&[3, 1, 5, 0]));
        data.extend(chunk(b"ARAY", &words(&[3, 1000])));
        data.extend(chunk(b"ASTR", &words(&[3])));
        read_map_arrays(&mut env, id, ChunkTable::new(&data));
        assert_eq!(env.modules[0].map_arrays[3].cells, vec![41, 5, 40]);
    }

    fn atag(version: u8, var: u32, tags: &[u8]) -> Vec<u8> {
        let mut p = vec![version];
        p.extend(words(&[var]));
        p.extend_from_slice(tags);
        chunk(b"ATAG", &p)
    }

    #[test]
    fn atag_tags_functions_and_strings() {
        let (mut env, id) = fresh();
        env.modules[0].strings = vec![40, 41];
        env.modules[0].functions.push(FunctionEntry { global: 9, ..FunctionEntry::default() });
        env.modules[0].func_imports.push(None);

        // cells: function 0, function 5 (out of range), string 1, plain 7
        let mut data = chunk(b"AINI", &words(&[4, 0, 5, 1, 7]));
        data.extend(atag(0, 4, &[2, 2, 1, 0]));
        data.extend(atag(1, 4, &[1, 1, 1, 1]));
        read_map_arrays(&mut env, id, ChunkTable::new(&data));
        tag_arrays(&mut env, id, ChunkTable::new(&data));
        assert_eq!(env.modules[0].map_arrays[4].cells, vec![9, 0, 41, 7]);
    }

    #[test]
    fn exports_prefer_defined_arrays() {
        let (mut env, id) = fresh();
        let names = env.strings.add_table(&[b"arr".to_vec(), b"var".to_vec(), Vec::new()], None, false);
        let m = &mut env.modules[0];
        m.export_names = names;
        m.map_arrays[0].defined = true;
        publish_exports(&mut env, id);

        let m = &env.modules[0];
        assert_eq!(m.exports.get("arr"), Some(&Export::Array(0)));
        assert_eq!(m.exports.get("var"), Some(&Export::Var(1)));
        assert_eq!(m.exports.len(), 2);
    }

    #[test]
    fn aimp_records() {
        let mut p = words(&[2, 5, 10]);
        p.extend_from_slice(b"foo\0");
        p.extend(words(&[6, 1]));
        p.extend_from_slice(b"ba");
        assert_eq!(import_records(&p, true), vec![(5, "foo".to_owned())]);

        let mut p = words(&[1]);
        p.extend_from_slice(b"x\0");
        p.extend(words(&[2]));
        p.extend_from_slice(b"yz\0");
        assert_eq!(import_records(&p, false), vec![(1, "x".to_owned()), (2, "yz".to_owned())]);
    }

    #[test]
    fn self_import_is_nulled() -> LoadResult<()> {
        let src = MemoryLumps::new().with("LIB", Vec::new());
        let mut env = Environment::new(LoaderConfig::default());
        let id = ModuleId(0);
        env.modules.push(Module::new(id, "LIB", 128, 128));
        env.by_lump.insert(0, id);
        let data = chunk(b"LOAD", b"LIB\0MISSING\0tail");
        read_libraries(&mut env, id, &src, ChunkTable::new(&data));
        let m = &env.modules[0];
        assert_eq!(m.imports, vec!["LIB".to_owned(), "MISSING".to_owned()]);
        assert_eq!(m.import_modules, vec![None, None]);
        Ok(())
    }
}
