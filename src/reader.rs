// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! Archive reader (C4): parses an existing archive's bytes into the
//! in-memory model, inferring its dialect as it goes.

use std::collections::HashMap;
use std::path::Path;

use crate::archive::{Archive, ArchiveKind, Member, SymbolRef, UNRESOLVED};
use crate::byteio::{parse_padded_decimal, ByteReader};
use crate::error::{Error, IoOp, ParseErrorKind, Result};

const GNU_MAGIC: &[u8; 8] = b"!<arch>\n";
const THIN_MAGIC: &[u8; 8] = b"!<thin>\n";
const HEADER_LEN: usize = 60;
const END_MAGIC: [u8; 2] = [b'`', b'\n'];

const BSD_SYMDEF: &[u8] = b"__.SYMDEF";
const BSD_SYMDEF_SORTED: &[u8] = b"__.SYMDEF SORTED";
const BSD_SYMDEF_64: &[u8] = b"__.SYMDEF_64";

fn trim_trailing_spaces(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map(|i| i + 1)
        .unwrap_or(0);
    &bytes[..end]
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    &bytes[..end]
}

struct RawHeader<'a> {
    name: &'a [u8],
    mtime: i128,
    uid: u32,
    gid: u32,
    mode: u32,
    size: u64,
}

fn parse_header<'a>(buf: &'a [u8], pos: usize) -> Result<RawHeader<'a>> {
    if pos + HEADER_LEN > buf.len() {
        return Err(Error::parse(ParseErrorKind::MalformedArchive));
    }
    let header = &buf[pos..pos + HEADER_LEN];
    let name = trim_trailing_spaces(&header[0..16]);
    // The on-disk field is whole seconds since the epoch; Member::mtime is
    // nanoseconds widened to i128, so scale up on the way in.
    let mtime = parse_padded_decimal(&header[16..28])? as i128 * 1_000_000_000;
    let uid = parse_padded_decimal(&header[28..34])? as u32;
    let gid = parse_padded_decimal(&header[34..40])? as u32;
    // LLVM ar stores the mode field's deterministic-mode value (644) as a
    // decimal literal rather than the octal value it would be if taken
    // as real POSIX permission bits; this crate follows that convention
    // for every member, not only ones written in deterministic mode, so
    // writer and reader stay consistent with each other.
    let mode = parse_padded_decimal(&header[40..48])? as u32;
    let size = parse_padded_decimal(&header[48..58])?;
    let fmag = &header[58..60];
    if fmag != END_MAGIC {
        return Err(Error::parse(ParseErrorKind::MalformedArchive));
    }
    Ok(RawHeader {
        name,
        mtime,
        uid,
        gid,
        mode,
        size,
    })
}

#[derive(Default)]
struct DialectState {
    kind: ArchiveKind,
}

impl DialectState {
    /// Locks onto a member of the GNU family. `preferred` is the variant
    /// to adopt from `Ambiguous` (plain `Gnu` for ordinary cues, `Gnu64`
    /// once a `/SYM64/` symbol index is seen); an archive already locked
    /// to some GNU variant just stays there.
    fn lock_gnu(&mut self, preferred: ArchiveKind) -> Result<()> {
        match self.kind {
            ArchiveKind::Ambiguous => {
                self.kind = preferred;
                Ok(())
            }
            ArchiveKind::Gnu | ArchiveKind::GnuThin | ArchiveKind::Gnu64 => Ok(()),
            _ => Err(Error::parse(ParseErrorKind::MalformedArchive)),
        }
    }

    fn lock_bsd(&mut self) -> Result<()> {
        match self.kind {
            ArchiveKind::Ambiguous => {
                self.kind = ArchiveKind::Bsd;
                Ok(())
            }
            ArchiveKind::Bsd | ArchiveKind::Darwin | ArchiveKind::Darwin64 => Ok(()),
            _ => Err(Error::parse(ParseErrorKind::MalformedArchive)),
        }
    }
}

/// Reads an archive from `bytes`. `base_dir`, when given, is the
/// directory the archive file itself lives in; it is required to
/// dereference GNU-thin member payloads and is stored on the returned
/// [`Archive`] so later `extract` calls know where to write.
pub fn read_archive(bytes: &[u8], base_dir: Option<&Path>) -> Result<Archive> {
    let mut archive = Archive::new();
    archive.base_dir = base_dir.map(|p| p.to_path_buf());

    if bytes.is_empty() {
        return Ok(archive);
    }

    if bytes.len() < 8 {
        return Err(Error::parse(ParseErrorKind::NotArchive));
    }
    let magic: [u8; 8] = bytes[0..8].try_into().expect("8-byte slice");
    let thin = if &magic == THIN_MAGIC {
        true
    } else if &magic == GNU_MAGIC {
        false
    } else {
        return Err(Error::parse(ParseErrorKind::NotArchive));
    };

    let mut dialect = DialectState::default();
    if thin {
        dialect.kind = ArchiveKind::GnuThin;
    }

    let mut pos = 8usize;
    let mut long_names: Vec<u8> = Vec::new();
    let mut have_long_names = false;
    let mut have_symbol_table = false;

    // Phase A: preamble inference. Loop while the next header is one of
    // the two GNU table names; anything else falls through to Phase B.
    loop {
        if pos >= bytes.len() {
            break;
        }
        let Ok(probe) = parse_header(bytes, pos) else {
            break;
        };
        if probe.name == b"//" && !have_long_names {
            let payload_start = pos + HEADER_LEN;
            let payload_end = payload_start + probe.size as usize;
            if payload_end > bytes.len() {
                return Err(Error::parse(ParseErrorKind::MalformedArchive));
            }
            long_names = bytes[payload_start..payload_end].to_vec();
            have_long_names = true;
            dialect.lock_gnu(ArchiveKind::Gnu)?;
            pos = advance_past_member(payload_end, 2);
            continue;
        }
        // Any other header starting with `/` is the GNU symbol index:
        // plain `/` with 32-bit big-endian offsets, or `/SYM64/` with
        // 64-bit ones (spec.md §4.2, §4.3).
        if probe.name.starts_with(b"/") && !have_symbol_table {
            let is_64 = probe.name == b"/SYM64/";
            let payload_start = pos + HEADER_LEN;
            let payload_end = payload_start + probe.size as usize;
            if payload_end > bytes.len() {
                return Err(Error::parse(ParseErrorKind::MalformedArchive));
            }
            let payload = &bytes[payload_start..payload_end];
            parse_gnu_symbol_table(payload, &mut archive, is_64)?;
            have_symbol_table = true;
            dialect.lock_gnu(if is_64 { ArchiveKind::Gnu64 } else { ArchiveKind::Gnu })?;
            pos = advance_past_member(payload_end, 2);
            continue;
        }
        break;
    }

    // Phase B: member loop.
    let mut offset_to_index: HashMap<u64, usize> = HashMap::new();
    let mut is_first_iteration = true;
    while pos < bytes.len() {
        let header_start = pos as u64;
        let header = parse_header(bytes, pos)?;
        let payload_start = pos + HEADER_LEN;
        let is_first_member = is_first_iteration;
        is_first_iteration = false;

        let (resolved_name, name_owned, consumed_bsd_name_bytes): (Vec<u8>, bool, usize) =
            if let Some(stripped) = header.name.strip_suffix(b"/") {
                dialect.lock_gnu(ArchiveKind::Gnu)?;
                (stripped.to_vec(), true, 0)
            } else if let Some(rest) = header.name.strip_prefix(b"/") {
                if !rest.is_empty() && rest.iter().all(u8::is_ascii_digit) {
                    dialect.lock_gnu(ArchiveKind::Gnu)?;
                    let offset: usize = std::str::from_utf8(rest)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| Error::parse(ParseErrorKind::InvalidCharacter))?;
                    if !have_long_names || offset >= long_names.len() {
                        return Err(Error::parse(ParseErrorKind::MalformedArchive));
                    }
                    let rel_end = long_names[offset..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .ok_or_else(|| Error::parse(ParseErrorKind::MalformedArchive))?;
                    let entry = &long_names[offset..offset + rel_end];
                    let entry = entry
                        .strip_suffix(b"/")
                        .ok_or_else(|| Error::parse(ParseErrorKind::MalformedArchive))?;
                    (entry.to_vec(), true, 0)
                } else if rest.is_empty() && is_first_member {
                    // Possible BSD symbol directory; resolved below via
                    // payload magic sniffing rather than the name.
                    (Vec::new(), false, 0)
                } else {
                    return Err(Error::parse(ParseErrorKind::MalformedArchive));
                }
            } else if let Some(rest) = header.name.strip_prefix(b"#1/") {
                dialect.lock_bsd()?;
                let name_len: usize = std::str::from_utf8(rest)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::parse(ParseErrorKind::InvalidCharacter))?;
                if payload_start + name_len > bytes.len() || name_len as u64 > header.size {
                    return Err(Error::parse(ParseErrorKind::MalformedArchive));
                }
                let name_bytes = &bytes[payload_start..payload_start + name_len];
                (trim_trailing_nuls(name_bytes).to_vec(), true, name_len)
            } else {
                dialect.lock_bsd()?;
                (trim_trailing_spaces(header.name).to_vec(), true, 0)
            };

        let data_start = payload_start + consumed_bsd_name_bytes;
        let data_len = (header.size as usize)
            .checked_sub(consumed_bsd_name_bytes)
            .ok_or_else(|| Error::parse(ParseErrorKind::MalformedArchive))?;
        let data_end = data_start
            .checked_add(data_len)
            .ok_or_else(|| Error::parse(ParseErrorKind::Overflow))?;
        if data_end > bytes.len() {
            return Err(Error::parse(ParseErrorKind::MalformedArchive));
        }
        let payload = &bytes[data_start..data_end];

        // BSD symbol directory: only ever the very first member, and only
        // when its payload head matches one of the three SYMDEF magics.
        if is_first_member
            && dialect.kind != ArchiveKind::Gnu
            && dialect.kind != ArchiveKind::GnuThin
            && dialect.kind != ArchiveKind::Gnu64
            && (payload.starts_with(BSD_SYMDEF_64)
                || payload.starts_with(BSD_SYMDEF_SORTED)
                || payload.starts_with(BSD_SYMDEF))
        {
            dialect.lock_bsd()?;
            parse_bsd_symbol_directory(payload, &mut archive)?;
            pos = advance_past_member(
                payload_start + header.size as usize,
                dialect.kind.member_alignment(),
            );
            continue;
        }

        if !name_owned {
            return Err(Error::parse(ParseErrorKind::MalformedArchive));
        }

        let member_index = archive.members().len();
        offset_to_index.insert(header_start, member_index);

        let member_data = if thin {
            let base_dir = archive
                .base_dir
                .clone()
                .ok_or_else(|| Error::parse(ParseErrorKind::MalformedArchive))?;
            let member_path = base_dir.join(String::from_utf8_lossy(&resolved_name).as_ref());
            std::fs::read(&member_path).map_err(|e| Error::io(IoOp::Reading, Some(member_path), e))?
        } else {
            payload.to_vec()
        };

        archive.push_member(Member {
            name: resolved_name,
            data: member_data,
            mtime: header.mtime,
            mode: header.mode,
            uid: header.uid,
            gid: header.gid,
        });

        pos = advance_past_member(
            payload_start + header.size as usize,
            dialect.kind.member_alignment(),
        );
    }

    // Phase C: resolve raw file offsets recorded against observed member
    // header start positions.
    for sym in archive.symbols_mut().iter_mut() {
        if sym.member_index == UNRESOLVED {
            continue;
        }
        sym.member_index = offset_to_index
            .get(&sym.member_index)
            .map(|&idx| idx as u64)
            .unwrap_or(UNRESOLVED);
    }

    archive.dialect = dialect.kind;
    if archive.output_archive_type == ArchiveKind::Ambiguous {
        archive.output_archive_type = archive.dialect;
    }

    Ok(archive)
}

/// Rounds the offset just past a member's payload up to the dialect's
/// member alignment (2 bytes for the GNU family, COFF and BSD, 8 bytes
/// for Darwin), matching the padding the writer inserts there.
fn advance_past_member(end_of_payload: usize, align: u64) -> usize {
    crate::alignment::align_to(end_of_payload as u64, align) as usize
}

/// Parses a GNU symbol index: `/` (32-bit big-endian offsets) or
/// `/SYM64/` (64-bit big-endian offsets, `is_64`).
fn parse_gnu_symbol_table(payload: &[u8], archive: &mut Archive, is_64: bool) -> Result<()> {
    let offset_size = if is_64 { 8 } else { 4 };
    let mut r = ByteReader::new(payload);
    let count = if is_64 {
        r.u64be()? as usize
    } else {
        r.u32be()? as usize
    };
    let offsets_end = offset_size
        .checked_add(count * offset_size)
        .ok_or_else(|| Error::parse(ParseErrorKind::Overflow))?;
    if offsets_end > payload.len() {
        return Err(Error::parse(ParseErrorKind::MalformedArchive));
    }
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(if is_64 { r.u64be()? } else { r.u32be()? as u64 });
    }
    let mut cursor = offsets_end;
    for &offset in &offsets {
        let rel_end = payload[cursor..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::parse(ParseErrorKind::MalformedArchive))?;
        let name = payload[cursor..cursor + rel_end].to_vec();
        cursor += rel_end + 1;
        archive.symbols_mut().push(SymbolRef {
            name,
            member_index: offset,
        });
    }
    Ok(())
}

fn parse_bsd_symbol_directory(payload: &[u8], archive: &mut Archive) -> Result<()> {
    let is_64 = payload.starts_with(BSD_SYMDEF_64);
    let magic_len = if is_64 {
        BSD_SYMDEF_64.len()
    } else if payload.starts_with(BSD_SYMDEF_SORTED) {
        BSD_SYMDEF_SORTED.len()
    } else {
        BSD_SYMDEF.len()
    };
    let align: usize = if is_64 { 8 } else { 8 };
    let mut pos = (magic_len + align - 1) / align * align;

    let int_len = if is_64 { 8 } else { 4 };
    let read_int = |buf: &[u8], pos: usize| -> Result<u64> {
        if pos + int_len > buf.len() {
            return Err(Error::parse(ParseErrorKind::MalformedArchive));
        }
        Ok(if is_64 {
            u64::from_le_bytes(buf[pos..pos + 8].try_into().expect("8 bytes"))
        } else {
            u32::from_le_bytes(buf[pos..pos + 4].try_into().expect("4 bytes")) as u64
        })
    };

    let ranlib_bytes_len = read_int(payload, pos)? as usize;
    pos += int_len;
    let entry_size = int_len * 2;
    if ranlib_bytes_len % entry_size != 0 {
        return Err(Error::parse(ParseErrorKind::MalformedArchive));
    }
    let num_entries = ranlib_bytes_len / entry_size;
    let ranlib_start = pos;
    if ranlib_start + ranlib_bytes_len > payload.len() {
        return Err(Error::parse(ParseErrorKind::MalformedArchive));
    }
    let mut entries = Vec::with_capacity(num_entries);
    for i in 0..num_entries {
        let base = ranlib_start + i * entry_size;
        let name_offset = read_int(payload, base)?;
        let member_offset = read_int(payload, base + int_len)?;
        entries.push((name_offset, member_offset));
    }
    pos = ranlib_start + ranlib_bytes_len;

    let _string_blob_len = read_int(payload, pos)? as usize;
    pos += int_len;
    let string_blob = &payload[pos..];

    for (name_offset, member_offset) in entries {
        let name = crate::byteio::c_str_at(string_blob, name_offset as usize)?.to_vec();
        archive.symbols_mut().push(SymbolRef {
            name,
            member_index: member_offset,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::write_archive;

    #[test]
    fn empty_bytes_is_empty_archive() {
        let a = read_archive(&[], None).unwrap();
        assert_eq!(a.members().len(), 0);
    }

    #[test]
    fn bare_magic_is_empty_archive() {
        let a = read_archive(GNU_MAGIC, None).unwrap();
        assert_eq!(a.members().len(), 0);
        assert_eq!(a.dialect, ArchiveKind::Ambiguous);
    }

    #[test]
    fn wrong_magic_is_not_archive() {
        let err = read_archive(b"not an archive!!", None).unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::error::ErrorKind::Parse(ParseErrorKind::NotArchive)
        ));
    }

    #[test]
    fn round_trips_gnu_archive_with_long_name() {
        let mut archive = Archive::new();
        archive.output_archive_type = ArchiveKind::Gnu;
        archive.push_member(Member::new(
            "this_is_a_very_long_name.o",
            vec![1, 2, 3, 4, 5],
        ));
        let mut out = Vec::new();
        write_archive(&mut std::io::Cursor::new(&mut out), &archive).unwrap();

        let reparsed = read_archive(&out, None).unwrap();
        assert_eq!(reparsed.members().len(), 1);
        assert_eq!(
            reparsed.member(0).unwrap().name,
            b"this_is_a_very_long_name.o"
        );
        assert_eq!(reparsed.member(0).unwrap().data, vec![1, 2, 3, 4, 5]);
        assert_eq!(reparsed.dialect, ArchiveKind::Gnu);
    }
}
