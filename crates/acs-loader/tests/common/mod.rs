//! Construction de lumps ACS pour les tests d'intégration.

#![allow(dead_code)]

/// Offset du premier octet de code dans les lumps construits ici.
pub const CODE_BASE: u32 = 8;

pub fn words(ws: &[u32]) -> Vec<u8> { ws.iter().flat_map(|w| w.to_le_bytes()).collect() }

pub fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn table(header: &[u32], strings: &[&str], encrypt: bool) -> Vec<u8> {
    let mut out = words(header);
    let base = out.len() + strings.len() * 4;
    let mut blobs = Vec::new();
    for s in strings {
        let off = base + blobs.len();
        out.extend_from_slice(&(off as u32).to_le_bytes());
        for (j, b) in s.bytes().chain([0]).enumerate() {
            let key = if encrypt { off.wrapping_mul(157_135).wrapping_add(j / 2) as u8 } else { 0 };
            blobs.push(b ^ key);
        }
    }
    out.extend(blobs);
    out
}

/// STRL
pub fn strl(strings: &[&str]) -> Vec<u8> { chunk(b"STRL", &table(&[0, strings.len() as u32, 0], strings, false)) }

/// STRE
pub fn stre(strings: &[&str]) -> Vec<u8> { chunk(b"STRE", &table(&[0, strings.len() as u32, 0], strings, true)) }

/// FNAM/MEXP/SNAM
pub fn names(tag: &[u8; 4], strings: &[&str]) -> Vec<u8> { chunk(tag, &table(&[strings.len() as u32], strings, false)) }

/// SPTR, enregistrements de 12 octets : `(numéro, type, code, argc)`.
pub fn sptr(scripts: &[(i16, u16, u32, u32)]) -> Vec<u8> {
    let mut p = Vec::new();
    for &(n, t, code, argc) in scripts {
        p.extend_from_slice(&n.to_le_bytes());
        p.extend_from_slice(&t.to_le_bytes());
        p.extend(words(&[code, argc]));
    }
    chunk(b"SPTR", &p)
}

/// SPTR, enregistrements de 8 octets (ACS0 enveloppant).
pub fn sptr8(scripts: &[(i16, u8, u8, u32)]) -> Vec<u8> {
    let mut p = Vec::new();
    for &(n, t, argc, code) in scripts {
        p.extend_from_slice(&n.to_le_bytes());
        p.extend_from_slice(&[t, argc]);
        p.extend(words(&[code]));
    }
    chunk(b"SPTR", &p)
}

/// FUNC : `(argc, vars, retn, code)`.
pub fn func(funcs: &[(u8, u8, u8, u32)]) -> Vec<u8> {
    let mut p = Vec::new();
    for &(argc, vars, retn, code) in funcs {
        p.extend_from_slice(&[argc, vars, retn, 0]);
        p.extend(words(&[code]));
    }
    chunk(b"FUNC", &p)
}

/// MIMP : `(index, nom)`.
pub fn mimp(entries: &[(u32, &str)]) -> Vec<u8> {
    let mut p = Vec::new();
    for (i, name) in entries {
        p.extend(words(&[*i]));
        p.extend_from_slice(name.as_bytes());
        p.push(0);
    }
    chunk(b"MIMP", &p)
}

/// AIMP : `(index, taille, nom)`.
pub fn aimp(entries: &[(u32, u32, &str)]) -> Vec<u8> {
    let mut p = words(&[entries.len() as u32]);
    for (i, size, name) in entries {
        p.extend(words(&[*i, *size]));
        p.extend_from_slice(name.as_bytes());
        p.push(0);
    }
    chunk(b"AIMP", &p)
}

/// LOAD
pub fn load(libs: &[&str]) -> Vec<u8> {
    let mut p = Vec::new();
    for l in libs {
        p.extend_from_slice(l.as_bytes());
        p.push(0);
    }
    chunk(b"LOAD", &p)
}

/// Lump ACSE (`ACSe` si `compressed`) : en-tête, code à [`CODE_BASE`], puis la table.
pub fn acse(code: &[u8], chunks: &[Vec<u8>], compressed: bool) -> Vec<u8> {
    let mut out = if compressed { b"ACSe".to_vec() } else { b"ACSE".to_vec() };
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(code);
    let start = out.len() as u32;
    out[4..8].copy_from_slice(&start.to_le_bytes());
    for c in chunks {
        out.extend_from_slice(c);
    }
    // keep the lump over the minimum size
    while out.len() < 16 {
        out.push(0);
    }
    out
}

/// Lump ACSE enveloppé dans un en-tête ACS0 vide.
pub fn wrapped_acse(code: &[u8], chunks: &[Vec<u8>], compressed: bool) -> Vec<u8> {
    let mut out = b"ACS\0".to_vec();
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(code);
    let start = out.len() as u32;
    for c in chunks {
        out.extend_from_slice(c);
    }
    out.extend_from_slice(&start.to_le_bytes());
    out.extend_from_slice(if compressed { b"ACSe" } else { b"ACSE" });
    let off = out.len() as u32;
    out[4..8].copy_from_slice(&off.to_le_bytes());
    // ACS0 tables seen by older engines: no scripts, no strings
    out.extend(words(&[0, 0]));
    out
}
