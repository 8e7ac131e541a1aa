/*
 * Created on Sun Feb 09 2025
 *
 * This file is a part of hdag
 * hdag is a free and open-source hash-addressed DAG store that turns raw
 * adjacency streams into compact, queryable, memory-mapped graph bundles
 * without compromising on correctness or performance.
 *
 * Copyright (c) 2025, Sayan Nandan <nandansayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use std::{fmt, io};

/// Result of any fallible operation in this crate
pub type HdagResult<T> = Result<T, Fault>;

/// A fault raised by a fallible operation. Faults are plain values; no
/// recoverable path unwinds.
#[derive(Debug)]
pub enum Fault {
    /// OS-level failure (I/O, mapping, temp file creation). Carries the
    /// original error; the raw errno is available through [`Fault::os_code`]
    Errno(io::Error),
    /// the input describes a cycle
    GraphCycle,
    /// the same hash was seen with more than one known target set
    NodeConflict,
    /// strict ingest: the same hash was seen twice
    NodeDuplicate,
    /// strict ingest: the same (source, target) edge was listed twice
    EdgeDuplicate,
    /// file header or size validation failed
    InvalidFormat,
}

/// Payload-free discriminant of [`Fault`]. `io::Error` is not comparable,
/// kinds are; match on this when only the class of failure matters.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum FaultKind {
    Errno,
    GraphCycle,
    NodeConflict,
    NodeDuplicate,
    EdgeDuplicate,
    InvalidFormat,
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Errno(_) => FaultKind::Errno,
            Self::GraphCycle => FaultKind::GraphCycle,
            Self::NodeConflict => FaultKind::NodeConflict,
            Self::NodeDuplicate => FaultKind::NodeDuplicate,
            Self::EdgeDuplicate => FaultKind::EdgeDuplicate,
            Self::InvalidFormat => FaultKind::InvalidFormat,
        }
    }
    /// Capture the OS error of the syscall that just failed. Call this
    /// immediately after observing a failed raw OS call, before anything else
    /// can clobber the thread errno.
    pub fn last_os_error() -> Self {
        Self::Errno(io::Error::last_os_error())
    }
    /// The raw OS error code, if this is an [`Fault::Errno`] carrying one
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Errno(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

impl From<io::Error> for Fault {
    fn from(e: io::Error) -> Self {
        Self::Errno(e)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Errno(e) => write!(f, "os error: {e}"),
            Self::GraphCycle => write!(f, "graph contains a cycle"),
            Self::NodeConflict => write!(f, "node hash seen with conflicting target sets"),
            Self::NodeDuplicate => write!(f, "node hash seen twice"),
            Self::EdgeDuplicate => write!(f, "edge listed twice"),
            Self::InvalidFormat => write!(f, "invalid file format"),
        }
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Errno(e) => Some(e),
            _ => None,
        }
    }
}

#[test]
fn kinds_roundtrip() {
    let faults = [
        Fault::Errno(io::Error::from_raw_os_error(2)),
        Fault::GraphCycle,
        Fault::NodeConflict,
        Fault::NodeDuplicate,
        Fault::EdgeDuplicate,
        Fault::InvalidFormat,
    ];
    let kinds: Vec<_> = faults.iter().map(Fault::kind).collect();
    assert_eq!(
        kinds,
        vec![
            FaultKind::Errno,
            FaultKind::GraphCycle,
            FaultKind::NodeConflict,
            FaultKind::NodeDuplicate,
            FaultKind::EdgeDuplicate,
            FaultKind::InvalidFormat
        ]
    );
    assert_eq!(faults[0].os_code(), Some(2));
    assert_eq!(faults[1].os_code(), None);
}
