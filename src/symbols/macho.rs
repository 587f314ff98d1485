// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! Mach-O (32- and 64-bit, native byte order) symbol extraction.

use crate::byteio::{c_str_at, ByteReader};
use crate::error::Result;

const LC_SYMTAB: u32 = 0x2;
const N_TYPE: u8 = 0x0e;
const N_SECT: u8 = 0x0e;
const N_EXT: u8 = 0x01;

pub fn extract_symbols(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut r = ByteReader::new(buf);
    let magic = r.u32le()?;
    let is_64 = magic == super::MH_MAGIC_64;

    let _cputype = r.u32le()?;
    let _cpusubtype = r.u32le()?;
    let _filetype = r.u32le()?;
    let ncmds = r.u32le()?;
    let _sizeofcmds = r.u32le()?;
    let _flags = r.u32le()?;
    if is_64 {
        let _reserved = r.u32le()?;
    }

    let mut symtab = None;
    for _ in 0..ncmds {
        let cmd_start = r.position();
        let cmd = r.u32le()?;
        let cmdsize = r.u32le()?;
        if cmd == LC_SYMTAB {
            let symoff = r.u32le()?;
            let nsyms = r.u32le()?;
            let stroff = r.u32le()?;
            let _strsize = r.u32le()?;
            symtab = Some((symoff, nsyms, stroff));
        }
        r.seek(cmd_start + cmdsize as usize);
    }

    let Some((symoff, nsyms, stroff)) = symtab else {
        return Ok(Vec::new());
    };

    let entry_size: usize = if is_64 { 16 } else { 12 };
    let mut names = Vec::new();
    for i in 0..nsyms {
        let offset = symoff as usize + i as usize * entry_size;
        let mut r = ByteReader::at(buf, offset);
        let n_strx = r.u32le()?;
        let n_type = r.u8()?;
        let _n_sect = r.u8()?;
        let _n_desc = r.u16le()?;
        // n_value (u32 or u64) is unused for symbol enumeration.

        let is_external = n_type & N_EXT != 0;
        let is_defined_in_section = n_type & N_TYPE == N_SECT;
        if !is_external || !is_defined_in_section {
            continue;
        }
        if n_strx == 0 {
            continue;
        }
        let name = c_str_at(buf, stroff as usize + n_strx as usize)?;
        names.push(name.to_vec());
    }
    Ok(names)
}
