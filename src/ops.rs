// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! Mutation operations (C6): insert, delete, move, extract, list, print,
//! ranlib, expressed in terms of the archive model (C3), the reader (C4)
//! is not needed here, and the writer (C5) only for `ranlib`'s effect.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::archive::{Archive, Member, SymbolRef};
use crate::error::{Error, IoOp, IoResultExt, OperationErrorKind, Result};

fn os_str_to_bytes(s: &std::ffi::OsStr) -> Vec<u8> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        s.as_bytes().to_vec()
    }
    #[cfg(not(unix))]
    {
        s.to_string_lossy().into_owned().into_bytes()
    }
}

fn system_time_to_nanos(t: SystemTime) -> i128 {
    match t.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i128,
        Err(e) => -(e.duration().as_nanos() as i128),
    }
}

/// Inserts (or, for an already-present basename, replaces in place) each
/// path in `paths` as a member, per spec.md §4.5. `archive_mtime`, when
/// given, is the target archive's own on-disk modification time and is
/// consulted only when `Modifiers::update_only` is set. Returns the
/// index touched for each path, in order.
pub fn insert(
    archive: &mut Archive,
    paths: &[PathBuf],
    archive_mtime: Option<SystemTime>,
) -> Result<Vec<usize>> {
    let mut touched = Vec::with_capacity(paths.len());
    for path in paths {
        let metadata = fs::metadata(path).context(IoOp::Accessing, Some(path))?;
        let file_mtime = metadata.modified().context(IoOp::Accessing, Some(path))?;

        if archive.modifiers.update_only {
            if let Some(archive_mtime) = archive_mtime {
                if file_mtime <= archive_mtime {
                    continue;
                }
            }
        }

        let data = fs::read(path).context(IoOp::Reading, Some(path))?;
        let name = match path.file_name() {
            Some(n) => os_str_to_bytes(n),
            None => return Err(Error::operation(OperationErrorKind::MemberNotFound)),
        };

        let (mtime, uid, gid, mode) = if archive.modifiers.use_real_timestamps_and_ids {
            #[cfg(unix)]
            {
                use std::os::unix::fs::MetadataExt;
                (
                    system_time_to_nanos(file_mtime),
                    metadata.uid(),
                    metadata.gid(),
                    metadata.mode(),
                )
            }
            #[cfg(not(unix))]
            {
                (system_time_to_nanos(file_mtime), 0u32, 0u32, 644u32)
            }
        } else {
            // Deterministic mode (spec.md §3, §9): timestamps/ids zeroed,
            // mode stored as the decimal literal 644, not 0o644.
            (0i128, 0u32, 0u32, 644u32)
        };

        #[cfg(feature = "logging")]
        if archive.modifiers.verbose {
            log::debug!("a - {}", String::from_utf8_lossy(&name));
        }

        let member = Member {
            name: name.clone(),
            data,
            mtime,
            mode,
            uid,
            gid,
        };
        let (index, _replaced) = archive.upsert_member(member);

        if archive.modifiers.build_symbol_table {
            archive
                .symbols_mut()
                .retain(|s| !(s.is_resolved() && s.member_index == index as u64));
            let data_for_extraction = archive.member(index).expect("just inserted").data.clone();
            for name in crate::symbols::extract_symbols(&data_for_extraction)? {
                archive.symbols_mut().push(SymbolRef {
                    name,
                    member_index: index as u64,
                });
            }
        }

        touched.push(index);
    }
    Ok(touched)
}

/// Removes each named member, renumbering member indices and dropping or
/// renumbering `SymbolRef`s exactly as `Archive::remove_member` does
/// (spec.md §4.5). Basenames are matched byte-for-byte.
pub fn delete(archive: &mut Archive, names: &[Vec<u8>]) -> Result<()> {
    for name in names {
        #[cfg(feature = "logging")]
        if archive.modifiers.verbose {
            log::debug!("d - {}", String::from_utf8_lossy(name));
        }
        let index = archive
            .find_member(name)
            .ok_or_else(|| Error::operation(OperationErrorKind::MemberNotFound))?;
        archive.remove_member(index);
    }
    Ok(())
}

/// Relocates the member named `name` to immediately before `before` (or
/// to the end, when `before` is `None`). Supplemental operation carried
/// over from the `ar_archive_writer`/LLVM lineage (SPEC_FULL.md §4.5):
/// spec.md §6 lists `move` among the CLI operations the core must
/// support without specifying its semantics further. The member's own
/// `SymbolRef`s are renumbered to the new index rather than re-extracted.
pub fn move_member(archive: &mut Archive, name: &[u8], before: Option<&[u8]>) -> Result<()> {
    let index = archive
        .find_member(name)
        .ok_or_else(|| Error::operation(OperationErrorKind::MemberNotFound))?;

    if let Some(before) = before {
        if archive.find_member(before).is_none() {
            return Err(Error::operation(OperationErrorKind::MemberNotFound));
        }
    }

    let member = archive.member(index).expect("index from find_member").clone();
    let member_symbols: Vec<SymbolRef> = archive
        .symbols()
        .iter()
        .filter(|s| s.is_resolved() && s.member_index == index as u64)
        .cloned()
        .collect();

    archive.remove_member(index);

    let position = match before {
        Some(before) => archive
            .find_member(before)
            .expect("validated present before removal"),
        None => archive.members().len(),
    };
    archive.insert_member_at(position, member);

    for mut sym in member_symbols {
        sym.member_index = position as u64;
        archive.symbols_mut().push(sym);
    }
    Ok(())
}

/// Writes each named member's payload to a file in the archive's base
/// directory. Fails with `ExtractingFromThin` for a `gnuthin` archive,
/// whose members carry no payload bytes of their own (spec.md §4.5).
pub fn extract(archive: &Archive, names: &[Vec<u8>]) -> Result<()> {
    if archive.dialect.is_gnu_thin() {
        return Err(Error::operation(OperationErrorKind::ExtractingFromThin));
    }
    let base_dir = archive.base_dir.clone().unwrap_or_default();
    for name in names {
        let index = archive
            .find_member(name)
            .ok_or_else(|| Error::operation(OperationErrorKind::MemberNotFound))?;
        let member = archive.member(index).expect("index from find_member");
        let path = base_dir.join(String::from_utf8_lossy(&member.name).as_ref());
        fs::write(&path, &member.data).context(IoOp::Creating, Some(&path))?;
    }
    Ok(())
}

/// Streams every member basename, in archive order.
pub fn list(archive: &Archive) -> impl Iterator<Item = &[u8]> {
    archive.members().iter().map(|m| m.name.as_slice())
}

/// Writes each member's basename to `w`, one per line.
pub fn print_names<W: Write>(archive: &Archive, w: &mut W) -> Result<()> {
    for name in list(archive) {
        w.write_all(name)
            .and_then(|_| w.write_all(b"\n"))
            .map_err(|e| Error::io(IoOp::Writing, None, e))?;
    }
    Ok(())
}

/// Writes the concatenation of every member's payload to `w`, in archive
/// order, with no separators (spec.md §4.5: "stream payloads").
pub fn print_contents<W: Write>(archive: &Archive, w: &mut W) -> Result<()> {
    for member in archive.members() {
        w.write_all(&member.data)
            .map_err(|e| Error::io(IoOp::Writing, None, e))?;
    }
    Ok(())
}

/// Writes each symbol name to `w`, one per line, in the archive's
/// current symbol order (respecting `sort_symbol_table` if it was
/// already applied).
pub fn print_symbols<W: Write>(archive: &Archive, w: &mut W) -> Result<()> {
    for sym in archive.symbols() {
        w.write_all(&sym.name)
            .and_then(|_| w.write_all(b"\n"))
            .map_err(|e| Error::io(IoOp::Writing, None, e))?;
    }
    Ok(())
}

/// Equivalent to requesting a write with `build_symbol_table=true`; no
/// other state change (spec.md §4.5). The table itself is computed by
/// `write_archive` the next time this archive is serialized.
pub fn ranlib(archive: &mut Archive) {
    archive.modifiers.build_symbol_table = true;
}
