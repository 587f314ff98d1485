#![allow(dead_code)]

use std::path::PathBuf;

/// A per-test scratch directory under the cargo target dir, so thin
/// archives have somewhere real to dereference member payloads from.
pub fn tmp_dir(test_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ar_archive_tests_{}_{}_{:?}",
        test_name,
        std::process::id(),
        std::thread::current().id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Builds a minimal ELF64 little-endian relocatable object with a single
/// `SHT_SYMTAB` section containing one `STB_GLOBAL` symbol, defined
/// (non-absolute, non-undefined) in section 1, named `name`.
pub fn elf64_with_global_symbol(name: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 64];
    buf[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    buf[4] = 2; // ELFCLASS64
    buf[5] = 1; // ELFDATA2LSB

    let mut sections = vec![0u8; 64]; // section 0: SHT_NULL

    let mut symstr = vec![0u8];
    symstr.extend_from_slice(name);
    symstr.push(0);

    let mut symtab_bytes = vec![0u8; 24]; // null symbol entry
    symtab_bytes.extend_from_slice(&1u32.to_le_bytes()); // st_name
    symtab_bytes.push((1 << 4) | 1); // STB_GLOBAL, STT_OBJECT
    symtab_bytes.push(0);
    symtab_bytes.extend_from_slice(&1u16.to_le_bytes()); // st_shndx = 1 (defined)
    symtab_bytes.extend_from_slice(&0u64.to_le_bytes());
    symtab_bytes.extend_from_slice(&0u64.to_le_bytes());

    let symstr_offset = 64 + 64 * 3;
    let symtab_offset = symstr_offset + symstr.len();

    let mut symtab_sh = vec![0u8; 64];
    symtab_sh[4..8].copy_from_slice(&2u32.to_le_bytes()); // SHT_SYMTAB
    symtab_sh[24..32].copy_from_slice(&(symtab_offset as u64).to_le_bytes());
    symtab_sh[32..40].copy_from_slice(&(symtab_bytes.len() as u64).to_le_bytes());
    symtab_sh[40..44].copy_from_slice(&2u32.to_le_bytes()); // sh_link -> strtab section
    symtab_sh[56..64].copy_from_slice(&24u64.to_le_bytes()); // sh_entsize

    let mut strtab_sh = vec![0u8; 64];
    strtab_sh[4..8].copy_from_slice(&3u32.to_le_bytes()); // SHT_STRTAB
    strtab_sh[24..32].copy_from_slice(&(symstr_offset as u64).to_le_bytes());
    strtab_sh[32..40].copy_from_slice(&(symstr.len() as u64).to_le_bytes());

    sections.extend_from_slice(&symtab_sh);
    sections.extend_from_slice(&strtab_sh);

    buf[40..48].copy_from_slice(&64u64.to_le_bytes()); // e_shoff
    buf[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize
    buf[60..62].copy_from_slice(&3u16.to_le_bytes()); // e_shnum

    buf.extend_from_slice(&sections);
    buf.extend_from_slice(&symstr);
    buf.extend_from_slice(&symtab_bytes);
    buf
}
