use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use cascade_proto::{
    CommandEnvelope, DataEntry, FileInfo, IoHeader, LookupResult, Request, StatSnapshot,
};
use cascade_store::{MetadataRecord, StorageBackend, StoreError};
use cascade_types::{status, AttrFlags, Digest, GroupId, Identifier, IoFlags, NodeAddr};

use crate::exec::ScriptRegistry;

/// Mode bits reported for stored objects in lookup file info.
const OBJECT_MODE: u32 = 0o100644;

/// One storage node: a backend plus the dispatch that turns requests into
/// status envelopes.
///
/// Replies follow the completion contract: zero or more MORE-flagged data
/// frames, then exactly one terminal envelope. Error terminals carry the
/// node-side message as their payload so the caller can surface it.
pub struct StorageNode {
    addr: NodeAddr,
    group: GroupId,
    backend: Arc<dyn StorageBackend>,
    scripts: ScriptRegistry,
    ops: AtomicU64,
}

impl StorageNode {
    pub fn new(addr: NodeAddr, group: GroupId, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            addr,
            group,
            backend,
            scripts: ScriptRegistry::new(),
            ops: AtomicU64::new(0),
        }
    }

    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// The node's script registry, for handler registration at setup time.
    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    /// Handle one request, producing the full reply frame sequence.
    pub fn handle(&self, trans: u64, request: Request) -> Vec<Vec<u8>> {
        self.ops.fetch_add(1, Ordering::Relaxed);
        let reply_id = request
            .primary_id()
            .unwrap_or(Identifier::from_digest(Digest::zero(), 0));
        debug!(node = %self.addr, trans, op = request.type_name(), "dispatch");

        match request {
            Request::Write { io, data } => {
                match self.backend.write_at(&io.id, io.offset, &data, io.flags) {
                    Ok(size) => {
                        let payload = self.lookup_payload(&io.id, io.offset, size, None);
                        vec![terminal_with_payload(io.id, trans, &payload)]
                    }
                    Err(e) => vec![self.error_ack(io.id, trans, &e)],
                }
            }
            Request::WritePrepare { io, data, reserve } => {
                let result = self
                    .backend
                    .reserve(&io.id, reserve)
                    .and_then(|()| self.backend.stage_chunk(&io.id, io.offset, &data));
                match result {
                    Ok(_) => vec![CommandEnvelope::ack(io.id, trans, status::OK).encode()],
                    Err(e) => vec![self.error_ack(io.id, trans, &e)],
                }
            }
            Request::WritePlain { io, data } => {
                match self.backend.stage_chunk(&io.id, io.offset, &data) {
                    Ok(_) => vec![CommandEnvelope::ack(io.id, trans, status::OK).encode()],
                    Err(e) => vec![self.error_ack(io.id, trans, &e)],
                }
            }
            Request::WriteCommit {
                io,
                data,
                final_size,
            } => match self.backend.commit(&io.id, io.offset, &data, final_size) {
                Ok(size) => {
                    let payload = self.lookup_payload(&io.id, 0, size, None);
                    vec![terminal_with_payload(io.id, trans, &payload)]
                }
                Err(e) => vec![self.error_ack(io.id, trans, &e)],
            },
            Request::Read { io } => self.handle_read(trans, io.id, io.offset, io.size, io.flags),
            Request::BulkWrite { items } => {
                let mut frames = Vec::with_capacity(items.len() + 1);
                for (io, data) in items {
                    match self.backend.write_at(&io.id, io.offset, &data, io.flags) {
                        Ok(_) => frames.push(
                            CommandEnvelope {
                                id: io.id,
                                trans,
                                status: status::OK,
                                flags: IoFlags::MORE,
                                size: 0,
                            }
                            .encode(),
                        ),
                        Err(e) => frames.push(self.element_error(io.id, trans, &e)),
                    }
                }
                frames.push(CommandEnvelope::ack(reply_id, trans, status::OK).encode());
                frames
            }
            Request::BulkRead { ids } => {
                let mut frames = Vec::with_capacity(ids.len() + 1);
                for id in ids {
                    match self.backend.read_at(&id, 0, 0) {
                        Ok(bytes) => {
                            let entry = DataEntry::new(id.digest, bytes).encode();
                            frames.push(
                                CommandEnvelope {
                                    id,
                                    trans,
                                    status: status::OK,
                                    flags: IoFlags::MORE,
                                    size: entry.len() as u64,
                                }
                                .encode_frame(&entry),
                            );
                        }
                        Err(e) => frames.push(self.element_error(id, trans, &e)),
                    }
                }
                frames.push(CommandEnvelope::ack(reply_id, trans, status::OK).encode());
                frames
            }
            Request::Range { range, attrs } => {
                let column = range.column;
                match self.backend.enumerate_range(&range) {
                    Ok(mut found) => {
                        if attrs.contains(AttrFlags::SORT) {
                            found.sort_by_key(|(digest, _)| *digest);
                        }
                        let skipped = found.into_iter().skip(range.start as usize);
                        let windowed: Vec<(Digest, u64)> = if range.num == 0 {
                            skipped.collect()
                        } else {
                            skipped.take(range.num as usize).collect()
                        };

                        let mut frames = Vec::with_capacity(windowed.len() + 1);
                        for (digest, _) in windowed {
                            let id = Identifier::from_digest(digest, column);
                            match self.backend.read_at(&id, 0, 0) {
                                Ok(bytes) => {
                                    let entry = DataEntry::new(digest, bytes).encode();
                                    frames.push(
                                        CommandEnvelope {
                                            id,
                                            trans,
                                            status: status::OK,
                                            flags: IoFlags::MORE,
                                            size: entry.len() as u64,
                                        }
                                        .encode_frame(&entry),
                                    );
                                }
                                Err(e) => frames.push(self.element_error(id, trans, &e)),
                            }
                        }
                        frames.push(CommandEnvelope::ack(reply_id, trans, status::OK).encode());
                        frames
                    }
                    Err(e) => vec![self.error_ack(reply_id, trans, &e)],
                }
            }
            Request::Lookup { id } => self.handle_lookup(trans, id),
            Request::WriteMetadata {
                id,
                key,
                placements,
                timestamp,
            } => {
                let checksum = self.backend.checksum(&id).ok();
                let record = MetadataRecord {
                    digest: id.digest,
                    key,
                    placements,
                    timestamp: if timestamp != 0 { timestamp } else { now() },
                    checksum,
                };
                match self.backend.put_metadata(record) {
                    Ok(()) => vec![CommandEnvelope::ack(id, trans, status::OK).encode()],
                    Err(e) => vec![self.error_ack(id, trans, &e)],
                }
            }
            Request::Exec { id: _, script } => {
                match self.scripts.run(&script, self.backend.as_ref()) {
                    Ok(ret) => vec![terminal_with_payload(reply_id, trans, &ret)],
                    Err(e) => {
                        warn!(node = %self.addr, trans, error = %e, "exec failed");
                        let msg = e.to_string();
                        vec![CommandEnvelope {
                            id: reply_id,
                            trans,
                            status: status::EREMOTEIO,
                            flags: IoFlags::empty(),
                            size: msg.len() as u64,
                        }
                        .encode_frame(msg.as_bytes())]
                    }
                }
            }
            Request::Stat => {
                let backend = self.backend.stats();
                let snapshot = StatSnapshot {
                    objects: backend.objects,
                    bytes: backend.bytes,
                    ops: self.ops.load(Ordering::Relaxed),
                };
                match bincode::serialize(&snapshot) {
                    Ok(payload) => vec![terminal_with_payload(reply_id, trans, &payload)],
                    Err(e) => {
                        let store_err = StoreError::Invalid(e.to_string());
                        vec![self.error_ack(reply_id, trans, &store_err)]
                    }
                }
            }
        }
    }

    fn handle_read(
        &self,
        trans: u64,
        id: Identifier,
        offset: u64,
        size: u64,
        flags: IoFlags,
    ) -> Vec<Vec<u8>> {
        // Checksummed reads need a metadata record to verify against;
        // objects written without one must be read with NOCSUM.
        if !flags.contains(IoFlags::NOCSUM) {
            let recorded = match self.backend.metadata(&id.digest) {
                Ok(record) => record.and_then(|r| r.checksum),
                Err(e) => return vec![self.error_ack(id, trans, &e)],
            };
            let Some(expected) = recorded else {
                let e = StoreError::ChecksumUnavailable { digest: id.digest };
                return vec![self.error_ack(id, trans, &e)];
            };
            match self.backend.checksum(&id) {
                Ok(computed) if computed == expected => {}
                Ok(computed) => {
                    let e = StoreError::ChecksumMismatch {
                        id,
                        expected,
                        computed,
                    };
                    return vec![self.error_ack(id, trans, &e)];
                }
                Err(e) => return vec![self.error_ack(id, trans, &e)],
            }
        }

        match self.backend.read_at(&id, offset, size) {
            Ok(bytes) => {
                let header = IoHeader {
                    offset,
                    size: bytes.len() as u64,
                };
                let mut payload = header.encode().to_vec();
                payload.extend_from_slice(&bytes);
                let data_frame = CommandEnvelope::data(id, trans, payload.len() as u64)
                    .encode_frame(&payload);
                let ack = CommandEnvelope::ack(id, trans, status::OK).encode();
                vec![data_frame, ack]
            }
            Err(e) => vec![self.error_ack(id, trans, &e)],
        }
    }

    fn handle_lookup(&self, trans: u64, id: Identifier) -> Vec<Vec<u8>> {
        let record = match self.backend.metadata(&id.digest) {
            Ok(record) => record,
            Err(e) => return vec![self.error_ack(id, trans, &e)],
        };
        match record {
            Some(record) => {
                let size = self.backend.object_size(&id).unwrap_or(0);
                let payload = self.lookup_payload(&id, 0, size, Some(record.key));
                vec![terminal_with_payload(id, trans, &payload)]
            }
            None if self.backend.exists(&id) => {
                // Object present but never metadataed: address only, no
                // file info block.
                let payload = LookupResult::new(self.addr.clone(), status::OK, None).encode();
                vec![terminal_with_payload(id, trans, &payload)]
            }
            None => {
                let e = StoreError::NotFound { id };
                vec![self.error_ack(id, trans, &e)]
            }
        }
    }

    /// Encoded lookup payload for a write ack or lookup reply.
    fn lookup_payload(
        &self,
        id: &Identifier,
        offset: u64,
        size: u64,
        name: Option<String>,
    ) -> Vec<u8> {
        LookupResult::new(
            self.addr.clone(),
            status::OK,
            Some(FileInfo {
                mode: OBJECT_MODE,
                offset,
                size,
                name: name.unwrap_or_else(|| id.digest.to_hex()),
            }),
        )
        .encode()
    }

    /// Terminal error frame carrying the node-side message as payload.
    fn error_ack(&self, id: Identifier, trans: u64, err: &StoreError) -> Vec<u8> {
        warn!(node = %self.addr, trans, error = %err, "request failed");
        let msg = err.to_string();
        CommandEnvelope {
            id,
            trans,
            status: status_of(err),
            flags: IoFlags::empty(),
            size: msg.len() as u64,
        }
        .encode_frame(msg.as_bytes())
    }

    /// Per-element error frame inside a batch: MORE stays set so siblings
    /// and the terminal ack still follow.
    fn element_error(&self, id: Identifier, trans: u64, err: &StoreError) -> Vec<u8> {
        let msg = err.to_string();
        CommandEnvelope {
            id,
            trans,
            status: status_of(err),
            flags: IoFlags::MORE,
            size: msg.len() as u64,
        }
        .encode_frame(msg.as_bytes())
    }
}

/// Map a store error to its errno-style wire status.
fn status_of(err: &StoreError) -> i32 {
    match err {
        StoreError::NotFound { .. } => status::ENOENT,
        StoreError::Sequence { .. } | StoreError::NotPrepared { .. } => status::EINVAL,
        StoreError::ChecksumMismatch { .. } => status::EILSEQ,
        StoreError::ChecksumUnavailable { .. } => status::ENODATA,
        StoreError::Truncated { .. } => status::ERANGE,
        StoreError::Compression { .. } => status::EIO,
        StoreError::Invalid(_) => status::EINVAL,
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Terminal envelope carrying a payload (MORE unset, status OK).
fn terminal_with_payload(id: Identifier, trans: u64, payload: &[u8]) -> Vec<u8> {
    CommandEnvelope {
        id,
        trans,
        status: status::OK,
        flags: IoFlags::empty(),
        size: payload.len() as u64,
    }
    .encode_frame(payload)
}
