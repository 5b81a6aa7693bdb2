use serde::{Deserialize, Serialize};

use cascade_types::{AttrFlags, GroupId, Identifier, IoRequest, NodeAddr, RangeRequest};

/// Wire size limit for a single framed request.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Script payload shipped to a storage node for colocated execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Script {
    pub kind: ScriptKind,
    /// Opaque binary blob handed to the script alongside its source.
    pub binary: Vec<u8>,
}

/// The two dispatch variants of remote execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ScriptKind {
    /// Inline source, run by whatever interpreter the node registered.
    Inline { source: String },
    /// Named dispatch: the node resolves `name` in its script registry.
    /// `source` is a fallback for nodes that know the interpreter but not
    /// the name.
    Named { name: String, source: String },
}

impl Script {
    pub fn inline(source: impl Into<String>, binary: Vec<u8>) -> Self {
        Self {
            kind: ScriptKind::Inline {
                source: source.into(),
            },
            binary,
        }
    }

    pub fn named(name: impl Into<String>, source: impl Into<String>, binary: Vec<u8>) -> Self {
        Self {
            kind: ScriptKind::Named {
                name: name.into(),
                source: source.into(),
            },
            binary,
        }
    }
}

/// Per-node counters reported by the Stat request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSnapshot {
    /// Visible objects stored on the node.
    pub objects: u64,
    /// Logical bytes across those objects.
    pub bytes: u64,
    /// Requests handled since the node started.
    pub ops: u64,
}

/// All request types a storage node accepts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Request {
    /// Single-shot write of a whole payload.
    Write { io: IoRequest, data: Vec<u8> },
    /// Staged write, phase one: reserve space, optionally write a first chunk.
    WritePrepare {
        io: IoRequest,
        data: Vec<u8>,
        reserve: u64,
    },
    /// Staged write, middle phase: append a contiguous chunk.
    WritePlain { io: IoRequest, data: Vec<u8> },
    /// Staged write, final phase: optional last chunk, then make visible.
    WriteCommit {
        io: IoRequest,
        data: Vec<u8>,
        final_size: u64,
    },
    /// Read a column's bytes; `io.size == 0` means whole object.
    Read { io: IoRequest },
    /// Batched writes, one frame for many keys.
    BulkWrite { items: Vec<(IoRequest, Vec<u8>)> },
    /// Batched whole-object reads for many identifiers.
    BulkRead { ids: Vec<Identifier> },
    /// Iterate stored identifiers within an inclusive interval.
    Range {
        range: RangeRequest,
        attrs: AttrFlags,
    },
    /// Resolve an identifier to its placement.
    Lookup { id: Identifier },
    /// Persist the placement record that enables checksummed reads.
    WriteMetadata {
        id: Identifier,
        key: String,
        placements: Vec<(GroupId, NodeAddr)>,
        timestamp: u64,
    },
    /// Execute a script colocated with the data.
    Exec {
        id: Option<Identifier>,
        script: Script,
    },
    /// Node statistics snapshot.
    Stat,
}

impl Request {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Write { .. } => 1,
            Self::WritePrepare { .. } => 2,
            Self::WritePlain { .. } => 3,
            Self::WriteCommit { .. } => 4,
            Self::Read { .. } => 5,
            Self::BulkWrite { .. } => 6,
            Self::BulkRead { .. } => 7,
            Self::Range { .. } => 8,
            Self::Lookup { .. } => 9,
            Self::WriteMetadata { .. } => 10,
            Self::Exec { .. } => 11,
            Self::Stat => 12,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Write { .. } => "Write",
            Self::WritePrepare { .. } => "WritePrepare",
            Self::WritePlain { .. } => "WritePlain",
            Self::WriteCommit { .. } => "WriteCommit",
            Self::Read { .. } => "Read",
            Self::BulkWrite { .. } => "BulkWrite",
            Self::BulkRead { .. } => "BulkRead",
            Self::Range { .. } => "Range",
            Self::Lookup { .. } => "Lookup",
            Self::WriteMetadata { .. } => "WriteMetadata",
            Self::Exec { .. } => "Exec",
            Self::Stat => "Stat",
        }
    }

    /// The identifier this request addresses, if it has a single one.
    pub fn primary_id(&self) -> Option<Identifier> {
        match self {
            Self::Write { io, .. }
            | Self::WritePrepare { io, .. }
            | Self::WritePlain { io, .. }
            | Self::WriteCommit { io, .. }
            | Self::Read { io } => Some(io.id),
            Self::Lookup { id } | Self::WriteMetadata { id, .. } => Some(*id),
            Self::Exec { id, .. } => *id,
            _ => None,
        }
    }
}
