// Derived from code in LLVM, which is:
// Part of the LLVM Project, under the Apache License v2.0 with LLVM Exceptions.
// See https://llvm.org/LICENSE.txt for license information.
// SPDX-License-Identifier: Apache-2.0 WITH LLVM-exception

//! Error taxonomy for the archive codec.
//!
//! Handled I/O errors and unhandled parse/object/resource errors are kept
//! as a single [`Error`] type so callers can match on [`ErrorKind`] without
//! caring whether the failure originated in the filesystem or in a parser.
//! Phrasing a user-facing message is left to the caller.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// The filesystem operation an [`ErrorKind::Io`] failed during.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Accessing,
    Creating,
    Opening,
    Reading,
    Seeking,
    Writing,
    Truncating,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IoOp::Accessing => "accessing",
            IoOp::Creating => "creating",
            IoOp::Opening => "opening",
            IoOp::Reading => "reading",
            IoOp::Seeking => "seeking",
            IoOp::Writing => "writing",
            IoOp::Truncating => "truncating",
        };
        f.write_str(s)
    }
}

/// `ParseError` kinds: malformed archive structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// First 8 bytes are neither `!<arch>\n` nor `!<thin>\n`.
    NotArchive,
    /// Contradictory dialect cues, truncated tables, or corrupt name slots.
    MalformedArchive,
    /// A length or offset field did not fit the target integer type.
    Overflow,
    /// A decimal/ASCII header field contained a non-digit byte.
    InvalidCharacter,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::NotArchive => "not an archive",
            ParseErrorKind::MalformedArchive => "malformed archive",
            ParseErrorKind::Overflow => "integer overflow while parsing archive",
            ParseErrorKind::InvalidCharacter => "invalid character in archive header field",
        };
        f.write_str(s)
    }
}

/// Object-extractor error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectErrorKind {
    /// Leading bytes did not match any recognised object magic.
    NotObject,
    /// Recognised format, but an unsupported machine/class/endianness.
    NotSupportedMachine,
}

impl fmt::Display for ObjectErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectErrorKind::NotObject => "not an object file",
            ObjectErrorKind::NotSupportedMachine => "unsupported machine type",
        };
        f.write_str(s)
    }
}

/// Resource error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceErrorKind {
    OutOfMemory,
}

impl fmt::Display for ResourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceErrorKind::OutOfMemory => f.write_str("out of memory"),
        }
    }
}

/// Mutation-engine (C6) error kinds: these don't fit the I/O or parse
/// taxonomies spec.md §7 names explicitly, but the operations it defines
/// in §4.5 need a way to report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationErrorKind {
    /// `extract` against a `gnuthin` archive (spec.md §4.5).
    ExtractingFromThin,
    /// `delete`/`extract`/`move` named a basename not present in the archive.
    MemberNotFound,
}

impl fmt::Display for OperationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationErrorKind::ExtractingFromThin => "cannot extract from a thin archive",
            OperationErrorKind::MemberNotFound => "no such member in archive",
        };
        f.write_str(s)
    }
}

/// The kind of error, exposed so callers can match without downcasting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Io {
        op: IoOp,
        path: Option<PathBuf>,
        kind: io::ErrorKind,
    },
    Parse(ParseErrorKind),
    Object(ObjectErrorKind),
    Resource(ResourceErrorKind),
    Operation(OperationErrorKind),
    /// Unreachable dialect combination; carries a short static description
    /// rather than a bare sentinel so it stays debuggable.
    Unreachable(&'static str),
}

#[derive(Debug)]
enum ErrorInner {
    Io {
        op: IoOp,
        path: Option<PathBuf>,
        source: io::Error,
    },
    Parse(ParseErrorKind),
    Object(ObjectErrorKind),
    Resource(ResourceErrorKind),
    Operation(OperationErrorKind),
    Unreachable(&'static str),
}

/// An error produced by the archive codec.
#[derive(Debug)]
pub struct Error {
    inner: ErrorInner,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match &self.inner {
            ErrorInner::Io { op, path, source } => ErrorKind::Io {
                op: *op,
                path: path.clone(),
                kind: source.kind(),
            },
            ErrorInner::Parse(k) => ErrorKind::Parse(*k),
            ErrorInner::Object(k) => ErrorKind::Object(*k),
            ErrorInner::Resource(k) => ErrorKind::Resource(*k),
            ErrorInner::Operation(k) => ErrorKind::Operation(*k),
            ErrorInner::Unreachable(s) => ErrorKind::Unreachable(s),
        }
    }

    pub fn io(op: IoOp, path: Option<PathBuf>, source: io::Error) -> Self {
        Self {
            inner: ErrorInner::Io { op, path, source },
        }
    }

    pub fn parse(kind: ParseErrorKind) -> Self {
        Self {
            inner: ErrorInner::Parse(kind),
        }
    }

    pub fn object(kind: ObjectErrorKind) -> Self {
        Self {
            inner: ErrorInner::Object(kind),
        }
    }

    pub fn resource(kind: ResourceErrorKind) -> Self {
        Self {
            inner: ErrorInner::Resource(kind),
        }
    }

    pub fn operation(kind: OperationErrorKind) -> Self {
        Self {
            inner: ErrorInner::Operation(kind),
        }
    }

    pub fn unreachable(description: &'static str) -> Self {
        Self {
            inner: ErrorInner::Unreachable(description),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ErrorInner::Io { op, path, source } => match path {
                Some(path) => write!(f, "{op} {}: {source}", path.display()),
                None => write!(f, "{op} archive: {source}"),
            },
            ErrorInner::Parse(k) => k.fmt(f),
            ErrorInner::Object(k) => k.fmt(f),
            ErrorInner::Resource(k) => k.fmt(f),
            ErrorInner::Operation(k) => k.fmt(f),
            ErrorInner::Unreachable(s) => write!(f, "unreachable dialect combination: {s}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.inner {
            ErrorInner::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The `Result` type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) trait IoResultExt<T> {
    fn context(self, op: IoOp, path: Option<&std::path::Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn context(self, op: IoOp, path: Option<&std::path::Path>) -> Result<T> {
        self.map_err(|source| Error::io(op, path.map(|p| p.to_path_buf()), source))
    }
}
