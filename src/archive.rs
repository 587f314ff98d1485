// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

// Derived from https://github.com/llvm/llvm-project/blob/8ef3e895ad8ab1724e2b87cabad1dacdc7a397a3/llvm/include/llvm/Object/Archive.h

//! In-memory representation of an archive: its dialect, members, symbol
//! directory and modifiers (C3 in the design).

use std::collections::HashMap;
use std::path::PathBuf;

/// Size field is 10 decimal digits long.
pub(crate) const MAX_MEMBER_SIZE: u64 = 9999999999;

/// The on-disk encoding of an archive. `Ambiguous` is a pre-inference
/// value produced only by a freshly constructed, empty [`Archive`]; the
/// reader resolves it during parsing, and the writer resolves it to the
/// host default the moment it is asked to serialize.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ArchiveKind {
    #[default]
    Ambiguous,
    Gnu,
    GnuThin,
    Gnu64,
    Bsd,
    Darwin,
    Darwin64,
    Coff,
}

impl ArchiveKind {
    /// The host's native dialect, used to resolve [`ArchiveKind::Ambiguous`]
    /// at write time (spec.md §3: "writes encountering `ambiguous` default
    /// to the host's native dialect").
    pub fn host_default() -> Self {
        if cfg!(target_os = "macos") {
            ArchiveKind::Darwin
        } else if cfg!(target_os = "windows") {
            ArchiveKind::Coff
        } else {
            ArchiveKind::Gnu
        }
    }

    pub(crate) fn is_bsd_like(self) -> bool {
        matches!(
            self,
            ArchiveKind::Bsd | ArchiveKind::Darwin | ArchiveKind::Darwin64
        )
    }

    pub(crate) fn is_darwin(self) -> bool {
        matches!(self, ArchiveKind::Darwin | ArchiveKind::Darwin64)
    }

    pub(crate) fn is_64bit(self) -> bool {
        matches!(self, ArchiveKind::Gnu64 | ArchiveKind::Darwin64)
    }

    pub(crate) fn is_gnu_thin(self) -> bool {
        matches!(self, ArchiveKind::GnuThin)
    }

    pub(crate) fn is_coff(self) -> bool {
        matches!(self, ArchiveKind::Coff)
    }

    /// Per-dialect member-payload alignment from spec.md §4.1: the offset
    /// the next header must start at, measured from the end of this
    /// member's own data.
    pub(crate) fn member_alignment(self) -> u64 {
        match self {
            ArchiveKind::Gnu | ArchiveKind::GnuThin | ArchiveKind::Gnu64 | ArchiveKind::Coff => 2,
            ArchiveKind::Bsd => 2,
            ArchiveKind::Darwin | ArchiveKind::Darwin64 => 8,
            ArchiveKind::Ambiguous => 2,
        }
    }
}

/// The sentinel used by [`SymbolRef::member_index`] while the reader has
/// not yet been able to resolve a symbol's file offset to a member.
pub const UNRESOLVED: u64 = u64::MAX;

/// An externally visible symbol contributed by one archive member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolRef {
    /// Name, without the NUL terminator used on disk.
    pub name: Vec<u8>,
    /// Index into the owning [`Archive`]'s member sequence, or
    /// [`UNRESOLVED`] transiently while the reader is still resolving raw
    /// file offsets (design note in spec.md §9: the reader may prefer a
    /// tagged `Pending(offset)` variant internally, but the type exposed
    /// to callers keeps the raw `u64` so all three reader phases share one
    /// representation without a conversion pass at the boundary).
    pub member_index: u64,
}

impl SymbolRef {
    pub fn is_resolved(&self) -> bool {
        self.member_index != UNRESOLVED
    }
}

/// A single archive member ("ArchivedFile" in spec.md's terminology).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Basename. Not guaranteed to be valid text in any encoding.
    pub name: Vec<u8>,
    pub data: Vec<u8>,
    pub mtime: i128,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl Member {
    pub fn new(name: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mtime: 0,
            mode: 644,
            uid: 0,
            gid: 0,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Behavioural flags consumed by the CLI front-end and honoured by the
/// mutation engine (C6) and the writer (C5). Names and effects match
/// spec.md §3 verbatim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Suppresses the "creating archive" warning; the core never emits
    /// that warning itself (it is a CLI diagnostic), so this flag only
    /// exists to be threaded through to that external collaborator.
    pub create: bool,
    /// Skip members whose mtime is not newer than the existing archive's.
    pub update_only: bool,
    /// When false (the default, "deterministic mode"), inserted members
    /// get mtime=0, uid=gid=0, mode=644 (decimal, per spec.md §9).
    pub use_real_timestamps_and_ids: bool,
    pub build_symbol_table: bool,
    pub sort_symbol_table: bool,
    pub verbose: bool,
}

/// The full in-memory archive model (C3).
pub struct Archive {
    /// Dialect inferred from (or supplied for) the archive's own bytes.
    pub dialect: ArchiveKind,
    /// The dialect a subsequent `write` should target. Defaults to
    /// [`ArchiveKind::Ambiguous`] until either a read infers `dialect` and
    /// copies it here, or a caller sets it explicitly.
    pub output_archive_type: ArchiveKind,
    pub modifiers: Modifiers,
    members: Vec<Member>,
    symbols: Vec<SymbolRef>,
    name_index: HashMap<Vec<u8>, usize>,
    /// Directory the archive's own file lives in; used to resolve
    /// GNU-thin member payloads and as the destination for `extract`.
    pub base_dir: Option<PathBuf>,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    pub fn new() -> Self {
        Self {
            dialect: ArchiveKind::Ambiguous,
            output_archive_type: ArchiveKind::Ambiguous,
            modifiers: Modifiers::default(),
            members: Vec::new(),
            symbols: Vec::new(),
            name_index: HashMap::new(),
            base_dir: None,
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn symbols(&self) -> &[SymbolRef] {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut Vec<SymbolRef> {
        &mut self.symbols
    }

    pub fn find_member(&self, name: &[u8]) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    pub fn member(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Appends a member and registers it in the basename index. Callers
    /// that want "replace existing member" semantics should use
    /// [`Archive::upsert_member`] instead.
    pub fn push_member(&mut self, member: Member) -> usize {
        let index = self.members.len();
        self.name_index.insert(member.name.clone(), index);
        self.members.push(member);
        index
    }

    /// Inserts `member`, replacing an existing member of the same
    /// basename in place if one exists (spec.md §4.5: "If a member with
    /// the same basename already exists, replace its content in place,
    /// preserving position; otherwise append"). Returns the member's
    /// index and whether it replaced an existing member.
    pub fn upsert_member(&mut self, member: Member) -> (usize, bool) {
        if let Some(&index) = self.name_index.get(&member.name) {
            self.members[index] = member;
            (index, true)
        } else {
            (self.push_member(member), false)
        }
    }

    /// Removes the member at `index`, renumbering later indices and
    /// dropping/renumbering symbol refs so the invariants in spec.md §3
    /// hold afterward.
    pub fn remove_member(&mut self, index: usize) -> Member {
        let removed = self.members.remove(index);
        self.name_index.remove(&removed.name);
        for (name, idx) in self.name_index.iter_mut() {
            debug_assert_ne!(*idx, index, "stale index for {name:?}");
            if *idx > index {
                *idx -= 1;
            }
        }
        self.symbols.retain(|s| {
            if !s.is_resolved() {
                return true;
            }
            s.member_index != index as u64
        });
        for s in &mut self.symbols {
            if s.is_resolved() && s.member_index > index as u64 {
                s.member_index -= 1;
            }
        }
        removed
    }

    /// Inserts `member` at `position`, shifting later members (and every
    /// `SymbolRef` pointing at or past `position`) up by one. Used by the
    /// `move` operation (spec.md §6, resolved in SPEC_FULL.md §4.5) to
    /// relocate a member without disturbing the `SymbolRef`s belonging to
    /// any other member.
    pub fn insert_member_at(&mut self, position: usize, member: Member) {
        self.members.insert(position, member);
        for s in &mut self.symbols {
            if s.is_resolved() && s.member_index >= position as u64 {
                s.member_index += 1;
            }
        }
        self.rebuild_name_index();
    }

    pub fn rebuild_name_index(&mut self) {
        self.name_index.clear();
        for (i, m) in self.members.iter().enumerate() {
            self.name_index.insert(m.name.clone(), i);
        }
    }

    pub fn into_members(self) -> Vec<Member> {
        self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_in_place() {
        let mut a = Archive::new();
        a.push_member(Member::new("a.o", vec![1]));
        a.push_member(Member::new("b.o", vec![2]));
        let (idx, replaced) = a.upsert_member(Member::new("a.o", vec![9]));
        assert_eq!(idx, 0);
        assert!(replaced);
        assert_eq!(a.member(0).unwrap().data, vec![9]);
        assert_eq!(a.member(1).unwrap().data, vec![2]);
    }

    #[test]
    fn remove_member_renumbers_symbols() {
        let mut a = Archive::new();
        a.push_member(Member::new("a.o", vec![]));
        a.push_member(Member::new("b.o", vec![]));
        a.push_member(Member::new("c.o", vec![]));
        a.symbols_mut().push(SymbolRef {
            name: b"sym_a".to_vec(),
            member_index: 0,
        });
        a.symbols_mut().push(SymbolRef {
            name: b"sym_b".to_vec(),
            member_index: 1,
        });
        a.symbols_mut().push(SymbolRef {
            name: b"sym_c".to_vec(),
            member_index: 2,
        });
        a.remove_member(1);
        assert_eq!(a.members().len(), 2);
        assert_eq!(a.member(0).unwrap().name, b"a.o");
        assert_eq!(a.member(1).unwrap().name, b"c.o");
        let names_and_idx: Vec<_> = a
            .symbols()
            .iter()
            .map(|s| (s.name.clone(), s.member_index))
            .collect();
        assert_eq!(
            names_and_idx,
            vec![(b"sym_a".to_vec(), 0), (b"sym_c".to_vec(), 1)]
        );
    }

    #[test]
    fn host_default_is_one_of_the_known_dialects() {
        let k = ArchiveKind::host_default();
        assert!(matches!(
            k,
            ArchiveKind::Gnu | ArchiveKind::Darwin | ArchiveKind::Coff
        ));
    }
}
