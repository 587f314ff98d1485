// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! Archive writer (C5): serializes the in-memory model back to ar(5)
//! bytes for whichever dialect is requested.
//!
//! Two simplifications relative to the format's full generality, both
//! recorded in the design ledger: there is no automatic 32-bit to
//! 64-bit symbol-table promotion (callers who need `gnu64`/`darwin64`
//! offsets ask for them directly via `output_archive_type`), and `coff`
//! archives never carry a symbol directory, since the real one lives in
//! Windows import-library records this crate does not build.

use std::collections::HashMap;
use std::io::{self, Cursor, Seek, Write};

use crate::alignment::offset_to_alignment;
use crate::archive::{Archive, ArchiveKind, MAX_MEMBER_SIZE};
use crate::error::{Error, IoOp, Result};

const MAGIC_LEN: u64 = 8;

fn resolved_kind(archive: &Archive) -> ArchiveKind {
    if archive.output_archive_type == ArchiveKind::Ambiguous {
        ArchiveKind::host_default()
    } else {
        archive.output_archive_type
    }
}

/// Serializes `archive` per its (resolved) `output_archive_type`.
pub fn write_archive<W: Write + Seek>(w: &mut W, archive: &Archive) -> Result<()> {
    let kind = resolved_kind(archive);

    let mut sym_entries: Vec<(Vec<u8>, usize)> = Vec::new();
    if archive.modifiers.build_symbol_table && !kind.is_coff() {
        for (index, member) in archive.members().iter().enumerate() {
            for name in crate::symbols::extract_symbols(&member.data)? {
                sym_entries.push((name, index));
            }
        }
        if archive.modifiers.sort_symbol_table {
            sym_entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
    }

    write_archive_io(w, archive, kind, &sym_entries)
        .map_err(|e| Error::io(IoOp::Writing, None, e))
}

fn print_rest_of_member_header<W: Write>(
    w: &mut W,
    mtime: u64,
    uid: u32,
    gid: u32,
    mode: u32,
    size: u64,
) -> io::Result<()> {
    // The mode field reads as decimal digits, not an octal encoding of
    // real permission bits — an LLVM ar quirk spec.md calls out by name;
    // see the matching comment in reader.rs's header parser.
    write!(
        w,
        "{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
        mtime,
        uid % 1_000_000,
        gid % 1_000_000,
        mode,
        size
    )
}

fn write_padded<W: Write>(w: &mut W, bytes: &[u8], width: usize) -> io::Result<()> {
    w.write_all(bytes)?;
    if bytes.len() < width {
        w.write_all(&vec![b' '; width - bytes.len()])?;
    }
    Ok(())
}

fn print_gnu_small_member_header<W: Write>(
    w: &mut W,
    name: &[u8],
    mtime: u64,
    uid: u32,
    gid: u32,
    mode: u32,
    size: u64,
) -> io::Result<()> {
    let mut field = Vec::with_capacity(name.len() + 1);
    field.extend_from_slice(name);
    field.push(b'/');
    write_padded(w, &field, 16)?;
    print_rest_of_member_header(w, mtime, uid, gid, mode, size)
}

fn print_bsd_member_header<W: Write>(
    w: &mut W,
    pos: u64,
    name: &[u8],
    mtime: u64,
    uid: u32,
    gid: u32,
    mode: u32,
    size: u64,
) -> io::Result<()> {
    let pos_after_header = pos + 60 + name.len() as u64;
    // ld64 expects 64-bit content 8-byte aligned; pad the inline name
    // uniformly so that rule holds regardless of payload width.
    let pad = offset_to_alignment(pos_after_header, 8);
    let name_with_padding = name.len() as u64 + pad;
    write!(w, "#1/{:<13}", name_with_padding)?;
    print_rest_of_member_header(w, mtime, uid, gid, mode, name_with_padding + size)?;
    w.write_all(name)?;
    w.write_all(&vec![0u8; pad as usize])
}

fn use_string_table(thin: bool, name: &[u8]) -> bool {
    thin || name.len() >= 16 || name.contains(&b'/')
}

#[allow(clippy::too_many_arguments)]
fn print_member_header<'a, W: Write, T: Write + Seek>(
    w: &mut W,
    pos: u64,
    string_table: &mut T,
    long_name_positions: &mut HashMap<&'a [u8], u64>,
    kind: ArchiveKind,
    thin: bool,
    name: &'a [u8],
    mtime: u64,
    uid: u32,
    gid: u32,
    mode: u32,
    size: u64,
) -> io::Result<()> {
    if kind.is_bsd_like() {
        return print_bsd_member_header(w, pos, name, mtime, uid, gid, mode, size);
    }

    if !use_string_table(thin, name) {
        return print_gnu_small_member_header(w, name, mtime, uid, gid, mode, size);
    }

    w.write_all(b"/")?;
    let name_pos;
    if thin {
        name_pos = string_table.stream_position()?;
        string_table.write_all(name)?;
        string_table.write_all(b"/\n")?;
    } else if let Some(&p) = long_name_positions.get(name) {
        name_pos = p;
    } else {
        name_pos = string_table.stream_position()?;
        long_name_positions.insert(name, name_pos);
        string_table.write_all(name)?;
        if kind.is_coff() {
            string_table.write_all(b"\0")?;
        } else {
            string_table.write_all(b"/\n")?;
        }
    }
    write!(w, "{:<15}", name_pos)?;
    print_rest_of_member_header(w, mtime, uid, gid, mode, size)
}

struct LongNamesMember {
    header: Vec<u8>,
    data: Vec<u8>,
    padding: &'static [u8],
}

impl LongNamesMember {
    fn total_len(&self) -> u64 {
        (self.header.len() + self.data.len() + self.padding.len()) as u64
    }
}

fn build_long_names_member(names: Vec<u8>) -> LongNamesMember {
    let size = names.len() as u64;
    let pad = offset_to_alignment(size, 2);
    let mut header = Vec::new();
    // "//" plus 46 spaces covers the name+mtime+uid+gid+mode fields (48
    // bytes) in one shot, since all but the name are blank for this
    // pseudo-member.
    write!(header, "{:<48}", "//").unwrap();
    write!(header, "{:<10}", size + pad).unwrap();
    header.extend_from_slice(b"`\n");
    LongNamesMember {
        header,
        data: names,
        padding: if pad != 0 { b"\n" } else { b"" },
    }
}

fn print_n_bits<W: Write>(w: &mut W, kind: ArchiveKind, val: u64) -> io::Result<()> {
    if kind.is_64bit() {
        w.write_all(&if kind.is_bsd_like() {
            val.to_le_bytes()
        } else {
            val.to_be_bytes()
        })
    } else {
        let val = u32::try_from(val).map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "offset too large for a 32-bit archive")
        })?;
        w.write_all(&if kind.is_bsd_like() {
            val.to_le_bytes()
        } else {
            val.to_be_bytes()
        })
    }
}

fn compute_symbol_table_size_and_pad(
    kind: ArchiveKind,
    num_syms: u64,
    offset_size: u64,
    string_table_size: u64,
) -> (u64, u64) {
    let mut size = offset_size; // entry count field
    if kind.is_bsd_like() {
        size += num_syms * offset_size * 2; // (name offset, member offset) pairs
        size += offset_size; // trailing string-blob byte count
    } else {
        size += num_syms * offset_size; // member offsets only
    }
    size += string_table_size;
    let pad = offset_to_alignment(size, if kind.is_bsd_like() { 8 } else { 2 });
    (size + pad, pad)
}

fn write_symbol_table_header<W: Write + Seek>(
    w: &mut W,
    kind: ArchiveKind,
    size: u64,
) -> io::Result<()> {
    if kind.is_bsd_like() {
        let name: &[u8] = if kind.is_64bit() {
            b"__.SYMDEF_64"
        } else {
            b"__.SYMDEF"
        };
        let pos = w.stream_position()?;
        print_bsd_member_header(w, pos, name, 0, 0, 0, 0, size)
    } else {
        let name: &[u8] = if kind.is_64bit() { b"/SYM64" } else { b"" };
        print_gnu_small_member_header(w, name, 0, 0, 0, 0, size)
    }
}

fn symbol_table_header_len(kind: ArchiveKind, size: u64) -> io::Result<u64> {
    let mut tmp = Cursor::new(Vec::new());
    write_symbol_table_header(&mut tmp, kind, size)?;
    Ok(tmp.into_inner().len() as u64)
}

#[allow(clippy::too_many_arguments)]
fn write_symbol_table<W: Write + Seek>(
    w: &mut W,
    kind: ArchiveKind,
    member_offsets: &[u64],
    sym_entries: &[(Vec<u8>, usize)],
    sym_name_offsets: &[u64],
    sym_names: &[u8],
    headers_size: u64,
) -> io::Result<()> {
    let offset_size = if kind.is_64bit() { 8 } else { 4 };
    let (size, pad) = compute_symbol_table_size_and_pad(
        kind,
        sym_entries.len() as u64,
        offset_size,
        sym_names.len() as u64,
    );
    write_symbol_table_header(w, kind, size)?;

    if kind.is_bsd_like() {
        print_n_bits(w, kind, sym_entries.len() as u64 * 2 * offset_size)?;
    } else {
        print_n_bits(w, kind, sym_entries.len() as u64)?;
    }

    for (i, (_, member_index)) in sym_entries.iter().enumerate() {
        let file_offset = headers_size + member_offsets[*member_index];
        if kind.is_bsd_like() {
            print_n_bits(w, kind, sym_name_offsets[i])?;
        }
        print_n_bits(w, kind, file_offset)?;
    }

    if kind.is_bsd_like() {
        print_n_bits(w, kind, sym_names.len() as u64)?;
    }

    w.write_all(sym_names)?;
    w.write_all(&vec![0u8; pad as usize])
}

fn write_archive_io<W: Write + Seek>(
    w: &mut W,
    archive: &Archive,
    kind: ArchiveKind,
    sym_entries: &[(Vec<u8>, usize)],
) -> io::Result<()> {
    let thin = kind.is_gnu_thin();

    // Lay out every member: header bytes (resolving long names into the
    // string table as we go), the payload to actually write (empty for
    // gnu-thin), and the padding that follows it.
    let mut string_table = Cursor::new(Vec::new());
    let mut long_name_positions: HashMap<&[u8], u64> = HashMap::new();
    let mut layouts: Vec<(Vec<u8>, &[u8], u64)> = Vec::with_capacity(archive.members().len());
    let mut member_offsets: Vec<u64> = Vec::with_capacity(archive.members().len());
    let mut pos = 0u64;

    for member in archive.members() {
        member_offsets.push(pos);
        let data: &[u8] = if thin { &[][..] } else { &member.data };

        let member_padding = if kind.is_darwin() {
            offset_to_alignment(data.len() as u64, kind.member_alignment())
        } else {
            0
        };
        let tail_padding =
            offset_to_alignment(data.len() as u64 + member_padding, kind.member_alignment());
        let padding_len = member_padding + tail_padding;
        let size = member.data.len() as u64 + member_padding;
        if size > MAX_MEMBER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "archive member {:?} is too big",
                    String::from_utf8_lossy(&member.name)
                ),
            ));
        }

        // Member::mtime is nanoseconds since the epoch widened to i128; the
        // on-disk field holds whole seconds.
        let mtime = (member.mtime.max(0) / 1_000_000_000) as u64;
        let mut header = Vec::new();
        print_member_header(
            &mut header,
            pos,
            &mut string_table,
            &mut long_name_positions,
            kind,
            thin,
            &member.name,
            mtime,
            member.uid,
            member.gid,
            member.mode,
            size,
        )?;

        pos += header.len() as u64 + data.len() as u64 + padding_len;
        layouts.push((header, data, padding_len));
    }

    let string_table_bytes = string_table.into_inner();
    let string_table_member = if string_table_bytes.is_empty() {
        None
    } else {
        Some(build_long_names_member(string_table_bytes))
    };
    let string_table_member_size = string_table_member.as_ref().map_or(0, |m| m.total_len());

    // Darwin's linker aborts on an archive with no symbol directory at
    // all, so it gets one even when there are zero symbols to record.
    // coff never gets one: the real Windows symbol directory belongs to
    // import-library records this crate does not build.
    let emit_symbol_table = !kind.is_coff() && (!sym_entries.is_empty() || kind.is_darwin());

    let mut sym_names = Vec::new();
    let mut sym_name_offsets = Vec::with_capacity(sym_entries.len());
    for (name, _) in sym_entries {
        sym_name_offsets.push(sym_names.len() as u64);
        sym_names.extend_from_slice(name);
        sym_names.push(0);
    }

    let offset_size = if kind.is_64bit() { 8 } else { 4 };
    let mut headers_size = MAGIC_LEN;
    if emit_symbol_table {
        let (symtab_size, _) = compute_symbol_table_size_and_pad(
            kind,
            sym_entries.len() as u64,
            offset_size,
            sym_names.len() as u64,
        );
        headers_size += symbol_table_header_len(kind, symtab_size)? + symtab_size;
    }
    headers_size += string_table_member_size;

    w.write_all(if thin { b"!<thin>\n" } else { b"!<arch>\n" })?;

    if emit_symbol_table {
        write_symbol_table(
            w,
            kind,
            &member_offsets,
            sym_entries,
            &sym_name_offsets,
            &sym_names,
            headers_size,
        )?;
    }

    if let Some(stm) = &string_table_member {
        w.write_all(&stm.header)?;
        w.write_all(&stm.data)?;
        w.write_all(stm.padding)?;
    }

    // GNU pads with '\n'; BSD/Darwin pad with a NUL byte (spec.md §4.1,
    // §4.3).
    let pad_byte = if kind.is_bsd_like() { 0u8 } else { b'\n' };
    for (header, data, padding_len) in &layouts {
        w.write_all(header)?;
        w.write_all(data)?;
        w.write_all(&vec![pad_byte; *padding_len as usize])?;
    }

    w.flush()
}
