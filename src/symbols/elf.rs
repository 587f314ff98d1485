// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! ELF64 little-endian symbol extraction. Other classes/endiannesses are
//! rejected with `NotSupportedMachine` per spec.md §4.4.

use crate::byteio::ByteReader;
use crate::error::{Error, ObjectErrorKind, Result};

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;

const SHT_SYMTAB: u32 = 2;
const SHT_DYNSYM: u32 = 11;

const STB_GLOBAL: u8 = 1;
const STB_WEAK: u8 = 2;

const SHN_UNDEF: u16 = 0;
const SHN_LORESERVE: u16 = 0xff00;
const SHN_HIRESERVE: u16 = 0xffff;

struct SectionHeader {
    sh_type: u32,
    sh_link: u32,
    sh_offset: u64,
    sh_size: u64,
    sh_entsize: u64,
}

fn read_section_header(r: &mut ByteReader<'_>) -> Result<SectionHeader> {
    let _sh_name = r.u32le()?;
    let sh_type = r.u32le()?;
    let _sh_flags = r.u64le()?;
    let _sh_addr = r.u64le()?;
    let sh_offset = r.u64le()?;
    let sh_size = r.u64le()?;
    let sh_link = r.u32le()?;
    let _sh_info = r.u32le()?;
    let _sh_addralign = r.u64le()?;
    let sh_entsize = r.u64le()?;
    Ok(SectionHeader {
        sh_type,
        sh_link,
        sh_offset,
        sh_size,
        sh_entsize,
    })
}

pub fn extract_symbols(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    if buf.len() < 64 {
        return Err(Error::object(ObjectErrorKind::NotSupportedMachine));
    }
    if buf[EI_CLASS] != ELFCLASS64 || buf[EI_DATA] != ELFDATA2LSB {
        return Err(Error::object(ObjectErrorKind::NotSupportedMachine));
    }

    let mut header = ByteReader::new(buf);
    header.seek(40); // e_shoff starts at offset 40 in Elf64_Ehdr
    let e_shoff = header.u64le()?;
    header.seek(58); // e_shentsize at 58, e_shnum at 60, e_shstrndx at 62
    let e_shentsize = header.u16le()? as u64;
    let e_shnum = header.u16le()? as u64;
    let _e_shstrndx = header.u16le()?;

    if e_shoff == 0 || e_shnum == 0 {
        return Ok(Vec::new());
    }

    let mut symtab: Option<SectionHeader> = None;
    for i in 0..e_shnum {
        let offset = e_shoff + i * e_shentsize;
        let mut r = ByteReader::at(buf, offset as usize);
        let sh = read_section_header(&mut r)?;
        if sh.sh_type == SHT_SYMTAB || (symtab.is_none() && sh.sh_type == SHT_DYNSYM) {
            symtab = Some(sh);
        }
    }
    let Some(symtab) = symtab else {
        return Ok(Vec::new());
    };

    // The associated string table is the section named by sh_link.
    let strtab_offset = e_shoff + symtab.sh_link as u64 * e_shentsize;
    let mut r = ByteReader::at(buf, strtab_offset as usize);
    let strtab = read_section_header(&mut r)?;

    let sym_entsize = if symtab.sh_entsize == 0 { 24 } else { symtab.sh_entsize };
    let num_syms = symtab.sh_size / sym_entsize;

    let mut names = Vec::new();
    for i in 0..num_syms {
        let offset = symtab.sh_offset + i * sym_entsize;
        let mut r = ByteReader::at(buf, offset as usize);
        let st_name = r.u32le()?;
        let st_info = r.u8()?;
        let _st_other = r.u8()?;
        let st_shndx = r.u16le()?;
        let _st_value = r.u64le()?;
        let _st_size = r.u64le()?;

        let binding = st_info >> 4;
        if binding != STB_GLOBAL && binding != STB_WEAK {
            continue;
        }
        if st_shndx == SHN_UNDEF {
            continue;
        }
        if (SHN_LORESERVE..=SHN_HIRESERVE).contains(&st_shndx) {
            continue;
        }
        if st_name == 0 {
            continue;
        }
        let name = crate::byteio::c_str_at(buf, (strtab.sh_offset + st_name as u64) as usize)?;
        names.push(name.to_vec());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal ELF64 LE object with one SHT_SYMTAB section
    /// containing a single `STB_GLOBAL` symbol named "foo" defined in
    /// section 1, plus its associated string table.
    fn build_elf_with_global_symbol() -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        buf[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        buf[EI_CLASS] = ELFCLASS64;
        buf[EI_DATA] = ELFDATA2LSB;

        // Section 0: SHT_NULL (required to exist).
        let mut sections = vec![0u8; 64]; // one null section header

        // strtab for symbol names: "\0foo\0"
        let symstr: &[u8] = b"\0foo\0";
        let symstr_offset = 64 + 64 * 3; // after ehdr + 3 section headers worth of space we'll still append

        // Symbol table: one null symbol + one global symbol named "foo".
        let mut symtab_bytes = vec![0u8; 24]; // null entry
        let sym_name_off: u32 = 1; // offset of "foo" in symstr
        let st_info: u8 = (1 << 4) | 1; // STB_GLOBAL, STT_OBJECT
        symtab_bytes.extend_from_slice(&sym_name_off.to_le_bytes());
        symtab_bytes.push(st_info);
        symtab_bytes.push(0); // st_other
        symtab_bytes.extend_from_slice(&1u16.to_le_bytes()); // st_shndx = 1 (defined)
        symtab_bytes.extend_from_slice(&0u64.to_le_bytes()); // st_value
        symtab_bytes.extend_from_slice(&0u64.to_le_bytes()); // st_size

        let symtab_offset = symstr_offset + symstr.len();
        let symtab_offset = (symtab_offset + 7) & !7;

        // Section 1: SHT_SYMTAB, sh_link -> section 2 (strtab)
        let mut symtab_sh = vec![0u8; 64];
        symtab_sh[4..8].copy_from_slice(&SHT_SYMTAB.to_le_bytes());
        symtab_sh[24..32].copy_from_slice(&(symtab_offset as u64).to_le_bytes());
        symtab_sh[32..40].copy_from_slice(&(symtab_bytes.len() as u64).to_le_bytes());
        symtab_sh[40..44].copy_from_slice(&2u32.to_le_bytes()); // sh_link
        symtab_sh[56..64].copy_from_slice(&24u64.to_le_bytes()); // sh_entsize

        // Section 2: SHT_STRTAB (type 3), holds symstr.
        let mut strtab_sh = vec![0u8; 64];
        strtab_sh[4..8].copy_from_slice(&3u32.to_le_bytes()); // SHT_STRTAB
        strtab_sh[24..32].copy_from_slice(&(symstr_offset as u64).to_le_bytes());
        strtab_sh[32..40].copy_from_slice(&(symstr.len() as u64).to_le_bytes());

        sections.extend_from_slice(&symtab_sh);
        sections.extend_from_slice(&strtab_sh);

        let e_shoff = 64u64; // right after the ELF header
        buf[40..48].copy_from_slice(&e_shoff.to_le_bytes());
        buf[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize
        buf[60..62].copy_from_slice(&3u16.to_le_bytes()); // e_shnum

        buf.extend_from_slice(&sections);
        while buf.len() < symstr_offset {
            buf.push(0);
        }
        buf.extend_from_slice(symstr);
        while buf.len() < symtab_offset {
            buf.push(0);
        }
        buf.extend_from_slice(&symtab_bytes);
        buf
    }

    #[test]
    fn extracts_global_defined_symbol() {
        let buf = build_elf_with_global_symbol();
        let names = extract_symbols(&buf).unwrap();
        assert_eq!(names, vec![b"foo".to_vec()]);
    }

    #[test]
    fn rejects_32_bit_elf() {
        let mut buf = vec![0u8; 64];
        buf[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        buf[EI_CLASS] = 1; // ELFCLASS32
        buf[EI_DATA] = ELFDATA2LSB;
        assert!(extract_symbols(&buf).is_err());
    }
}
