// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! Object-file symbol extractors (C2): enough of ELF, Mach-O and COFF to
//! enumerate the externally visible symbols a member defines, so the
//! archive writer can build a portable symbol directory.

mod coff;
mod elf;
mod macho;

use crate::error::Result;

const BITCODE_MAGIC: [u8; 4] = *b"BC\xC0\xDE";
const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const COFF_MACHINE_AMD64: u16 = 0x8664;

/// Extracts the names of every externally visible, defined symbol from
/// `buf`, dispatching on the leading magic bytes per spec.md §4.4.
/// Unrecognised leading bytes (including the bitcode magic) yield an
/// empty symbol list rather than an error; only a recognised-but-wrong
/// machine type is an error.
pub fn extract_symbols(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    if buf.len() >= 4 && buf[0..4] == ELF_MAGIC {
        return elf::extract_symbols(buf);
    }
    if buf.len() >= 4 {
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic == MH_MAGIC || magic == MH_MAGIC_64 {
            return macho::extract_symbols(buf);
        }
        if buf[0..4] == BITCODE_MAGIC {
            #[cfg(feature = "logging")]
            log::warn!("bitcode member accepted but contributes no symbols");
            return Ok(Vec::new());
        }
    }
    if buf.len() >= 2 {
        let machine = u16::from_le_bytes([buf[0], buf[1]]);
        if machine == COFF_MACHINE_AMD64 && coff::looks_like_coff_header(buf) {
            return coff::extract_symbols(buf);
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognised_bytes_yield_no_symbols() {
        assert_eq!(extract_symbols(b"not an object file at all").unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn bitcode_yields_no_symbols() {
        let mut buf = BITCODE_MAGIC.to_vec();
        buf.extend_from_slice(&[0u8; 16]);
        assert_eq!(extract_symbols(&buf).unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn short_buffer_is_not_mistaken_for_an_object() {
        assert_eq!(extract_symbols(b"\x7fE").unwrap(), Vec::<Vec<u8>>::new());
    }
}
