// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! A portable reader, writer and mutator for `ar(5)` static-library
//! archives, compatible with the GNU, GNU-thin, GNU64, BSD, Darwin,
//! Darwin64 and COFF dialects emitted by GNU binutils and LLVM.
//!
//! The crate is organized the way its own design doc (`DESIGN.md`)
//! describes it:
//! - `archive` is the in-memory model (dialect, members, symbols),
//!   re-exported here as [`Archive`], [`ArchiveKind`], [`Member`],
//!   [`SymbolRef`] and [`Modifiers`].
//! - [`read_archive`] parses bytes into that model, inferring the dialect.
//! - [`write_archive`] serializes the model back to bytes for a chosen
//!   dialect.
//! - [`extract_symbols`] pulls externally visible symbols out of ELF,
//!   Mach-O and COFF object files so the writer can build a symbol
//!   directory.
//! - [`insert`], [`delete`], [`move_member`], [`extract`], [`list`],
//!   [`print_names`], [`print_contents`], [`print_symbols`] and
//!   [`ranlib`] implement the mutation operations in terms of the three
//!   pieces above.

#![allow(clippy::too_many_arguments)]
// We are writing a very specific, well defined format, so it makes it easier to
// see exactly what is being written if we explicitly write out `\n` instead of
// hoping somebody notices the `writeln!` instead of `write!`.
#![allow(clippy::write_with_newline)]

mod alignment;
mod archive;
mod byteio;
mod error;
mod ops;
mod reader;
mod symbols;
mod writer;

pub use archive::{Archive, ArchiveKind, Member, Modifiers, SymbolRef, UNRESOLVED};
pub use error::{
    Error, ErrorKind, IoOp, ObjectErrorKind, OperationErrorKind, ParseErrorKind, Result,
    ResourceErrorKind,
};
pub use ops::{
    delete, extract, insert, list, move_member, print_contents, print_names, print_symbols,
    ranlib,
};
pub use reader::read_archive;
pub use symbols::extract_symbols;
pub use writer::write_archive;
