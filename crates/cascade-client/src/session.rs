use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use cascade_proto::{
    DataEntry, IoHeader, LookupResult, Request, Script, StatSnapshot, IO_HEADER_SIZE,
};
use cascade_types::{
    AttrFlags, Digest, GroupId, Identifier, IoFlags, IoRequest, NodeAddr, RangeRequest,
    SuccessPolicy,
};

use crate::completion::{CompletionOutcome, CompletionRegistry};
use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;

/// Session-wide settings: which replica groups to address, how many must
/// acknowledge a write, and how long to wait per transaction.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub groups: Vec<GroupId>,
    pub policy: SuccessPolicy,
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            policy: SuccessPolicy::All,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Maps a replica group plus a digest to the node serving that key.
///
/// Within a group the digest's leading byte picks one of the registered
/// nodes, so a key always lands on the same node as long as membership
/// does not change.
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<GroupId, Vec<NodeAddr>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, group: GroupId, addr: NodeAddr) {
        self.routes
            .write()
            .expect("lock poisoned")
            .entry(group)
            .or_default()
            .push(addr);
    }

    pub fn route(&self, group: GroupId, digest: &Digest) -> Option<NodeAddr> {
        let routes = self.routes.read().expect("lock poisoned");
        let nodes = routes.get(&group)?;
        if nodes.is_empty() {
            return None;
        }
        let index = digest.as_bytes()[0] as usize % nodes.len();
        Some(nodes[index].clone())
    }
}

/// Client session over a set of replica groups.
///
/// Writes fan out to every configured group and are judged against the
/// session's [`SuccessPolicy`]; reads walk the groups in order and return
/// the first success. Each per-group transaction gets its own completion
/// slot and the session-wide timeout.
pub struct Session {
    transport: Arc<dyn Transport>,
    registry: Arc<CompletionRegistry>,
    routes: RouteTable,
    groups: RwLock<Vec<GroupId>>,
    policy: SuccessPolicy,
    timeout: Duration,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<CompletionRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            routes: RouteTable::new(),
            groups: RwLock::new(config.groups),
            policy: config.policy,
            timeout: config.timeout,
        }
    }

    /// Replace the replica groups this session addresses.
    pub fn add_groups(&self, groups: Vec<GroupId>) {
        *self.groups.write().expect("lock poisoned") = groups;
    }

    pub fn groups(&self) -> Vec<GroupId> {
        self.groups.read().expect("lock poisoned").clone()
    }

    /// Register a node serving a group.
    pub fn add_node(&self, group: GroupId, addr: NodeAddr) {
        self.routes.add(group, addr);
    }

    /// Key-to-identifier transform, exposed so callers can address columns
    /// directly.
    pub fn transform(key: &[u8], column: u32) -> Identifier {
        Identifier::transform(key, column)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write a whole object under `key`, column 0.
    pub async fn write(&self, key: &[u8], data: &[u8]) -> ClientResult<Vec<LookupResult>> {
        self.write_io(
            IoRequest::whole(Identifier::transform(key, 0), IoFlags::empty()),
            data,
        )
        .await
    }

    /// Write into a specific column with explicit flags.
    pub async fn write_in(
        &self,
        key: &[u8],
        column: u32,
        flags: IoFlags,
        data: &[u8],
    ) -> ClientResult<Vec<LookupResult>> {
        self.write_io(
            IoRequest::whole(Identifier::transform(key, column), flags),
            data,
        )
        .await
    }

    /// Write with full io control. Returns one placement per acknowledging
    /// group.
    pub async fn write_io(&self, io: IoRequest, data: &[u8]) -> ClientResult<Vec<LookupResult>> {
        let id = io.id;
        let outcomes = self
            .fan_out(
                id,
                Request::Write {
                    io,
                    data: data.to_vec(),
                },
                "write",
            )
            .await?;
        outcomes
            .iter()
            .map(|o| LookupResult::decode(&o.terminal.payload).map_err(ClientError::from))
            .collect()
    }

    /// Staged write, phase one: reserve `reserve` bytes and stage the first
    /// chunk. The object stays invisible until [`Session::write_commit`].
    pub async fn write_prepare(
        &self,
        io: IoRequest,
        data: &[u8],
        reserve: u64,
    ) -> ClientResult<()> {
        let id = io.id;
        self.fan_out(
            id,
            Request::WritePrepare {
                io,
                data: data.to_vec(),
                reserve,
            },
            "write_prepare",
        )
        .await
        .map(|_| ())
    }

    /// Staged write, middle phase: stage the next contiguous chunk.
    pub async fn write_plain(&self, io: IoRequest, data: &[u8]) -> ClientResult<()> {
        let id = io.id;
        self.fan_out(
            id,
            Request::WritePlain {
                io,
                data: data.to_vec(),
            },
            "write_plain",
        )
        .await
        .map(|_| ())
    }

    /// Staged write, final phase: stage the last chunk and make the object
    /// visible. `final_size == 0` keeps everything staged so far.
    pub async fn write_commit(
        &self,
        io: IoRequest,
        data: &[u8],
        final_size: u64,
    ) -> ClientResult<Vec<LookupResult>> {
        let id = io.id;
        let outcomes = self
            .fan_out(
                id,
                Request::WriteCommit {
                    io,
                    data: data.to_vec(),
                    final_size,
                },
                "write_commit",
            )
            .await?;
        outcomes
            .iter()
            .map(|o| LookupResult::decode(&o.terminal.payload).map_err(ClientError::from))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read a whole object from column 0 without checksum verification.
    pub async fn read(&self, key: &[u8]) -> ClientResult<Bytes> {
        self.read_io(IoRequest::whole(
            Identifier::transform(key, 0),
            IoFlags::NOCSUM,
        ))
        .await
    }

    /// Checksummed whole-object read; requires a metadata record written
    /// via [`Session::write_metadata`].
    pub async fn read_verified(&self, key: &[u8]) -> ClientResult<Bytes> {
        self.read_io(IoRequest::whole(
            Identifier::transform(key, 0),
            IoFlags::empty(),
        ))
        .await
    }

    /// Read with full io control, walking groups in order until one
    /// succeeds.
    pub async fn read_io(&self, io: IoRequest) -> ClientResult<Bytes> {
        let id = io.id;
        let outcome = self.first_group(id, Request::Read { io }, "read").await?;
        let frame = outcome.data.first().ok_or_else(|| {
            ClientError::InvalidResponse("read reply missing its data frame".into())
        })?;
        let (header, _) = IoHeader::decode(&frame.payload)?;
        let body = frame.payload.slice(IO_HEADER_SIZE..);
        if (body.len() as u64) < header.size {
            return Err(ClientError::InvalidResponse(format!(
                "read reply declares {} bytes, carries {}",
                header.size,
                body.len()
            )));
        }
        Ok(body.slice(..header.size as usize))
    }

    // -----------------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------------

    /// Write a batch of key/data pairs, replicated to every configured
    /// group and judged against the success policy.
    ///
    /// Within a group the batch splits into one sub-batch per owning node
    /// (per-key digest routing, same as singleton writes), so round trips
    /// stay proportional to nodes, not keys. Returns per-element statuses
    /// in batch order, taken from the first fully acknowledged group.
    pub async fn bulk_write(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> ClientResult<Vec<i32>> {
        let batch: Vec<(IoRequest, Vec<u8>)> = items
            .into_iter()
            .map(|(key, data)| {
                (
                    IoRequest::whole(Identifier::transform(&key, 0), IoFlags::empty()),
                    data,
                )
            })
            .collect();

        let groups = self.groups();
        if groups.is_empty() {
            return Err(ClientError::Configuration("no groups configured".into()));
        }
        let total = groups.len();
        let mut statuses: Option<Vec<i32>> = None;
        let mut acked = 0;
        let mut first_err: Option<ClientError> = None;
        for group in groups {
            match self.bulk_write_group(group, &batch).await {
                Ok(group_statuses) => {
                    acked += 1;
                    statuses.get_or_insert(group_statuses);
                }
                Err(e) => {
                    debug!(%group, error = %e, "bulk write group failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        if self.policy.satisfied(acked, total) {
            statuses.ok_or_else(|| {
                ClientError::InvalidResponse("bulk write produced no statuses".into())
            })
        } else {
            Err(first_err.unwrap_or_else(|| ClientError::Transport("no group replied".into())))
        }
    }

    async fn bulk_write_group(
        &self,
        group: GroupId,
        batch: &[(IoRequest, Vec<u8>)],
    ) -> ClientResult<Vec<i32>> {
        let mut statuses = vec![0i32; batch.len()];
        for (addr, indices) in self.split_by_node(group, batch.iter().map(|(io, _)| io.id))? {
            let sub: Vec<(IoRequest, Vec<u8>)> =
                indices.iter().map(|&i| batch[i].clone()).collect();
            let completion = self.registry.begin();
            self.transport
                .send(&addr, completion.trans(), Request::BulkWrite { items: sub })
                .await?;
            let outcome = completion.wait(self.timeout, "bulk_write").await?;
            if !outcome.is_ok() {
                return Err(reply_error(&outcome, &batch[indices[0]].0.id));
            }
            if outcome.data.len() != indices.len() {
                return Err(ClientError::InvalidResponse(format!(
                    "bulk write: {} elements sent, {} statuses returned",
                    indices.len(),
                    outcome.data.len()
                )));
            }
            for (frame, &i) in outcome.data.iter().zip(&indices) {
                statuses[i] = frame.status();
            }
        }
        Ok(statuses)
    }

    /// Read a batch of keys, walking groups in order until one answers.
    /// `None` marks a missing element, order preserved.
    pub async fn bulk_read(&self, keys: &[&[u8]]) -> ClientResult<Vec<Option<Bytes>>> {
        let ids: Vec<Identifier> = keys
            .iter()
            .map(|key| Identifier::transform(key, 0))
            .collect();
        let groups = self.groups();
        if groups.is_empty() {
            return Err(ClientError::Configuration("no groups configured".into()));
        }
        let mut last_err = None;
        for group in groups {
            match self.bulk_read_ids_in(group, ids.clone()).await {
                Ok(results) => return Ok(results),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ClientError::Transport("no group replied".into())))
    }

    /// Read a batch of keys from one explicit group.
    pub async fn bulk_read_in(
        &self,
        group: GroupId,
        keys: &[&[u8]],
    ) -> ClientResult<Vec<Option<Bytes>>> {
        let ids = keys
            .iter()
            .map(|key| Identifier::transform(key, 0))
            .collect();
        self.bulk_read_ids_in(group, ids).await
    }

    /// Batched read of explicit identifiers from one group, split per
    /// owning node the same way singleton reads route.
    pub async fn bulk_read_ids_in(
        &self,
        group: GroupId,
        ids: Vec<Identifier>,
    ) -> ClientResult<Vec<Option<Bytes>>> {
        let mut results: Vec<Option<Bytes>> = vec![None; ids.len()];
        for (addr, indices) in self.split_by_node(group, ids.iter().copied())? {
            let sub: Vec<Identifier> = indices.iter().map(|&i| ids[i]).collect();
            let completion = self.registry.begin();
            self.transport
                .send(&addr, completion.trans(), Request::BulkRead { ids: sub })
                .await?;
            let outcome = completion.wait(self.timeout, "bulk_read").await?;
            if !outcome.is_ok() {
                return Err(reply_error(&outcome, &ids[indices[0]]));
            }
            if outcome.data.len() != indices.len() {
                return Err(ClientError::InvalidResponse(format!(
                    "bulk read: {} keys sent, {} replies returned",
                    indices.len(),
                    outcome.data.len()
                )));
            }
            for (frame, &i) in outcome.data.iter().zip(&indices) {
                if frame.status() == 0 {
                    let entry = DataEntry::decode(&frame.payload)?;
                    results[i] = Some(Bytes::from(entry.data));
                }
            }
        }
        Ok(results)
    }

    /// Partition batch elements by the node owning each digest in `group`,
    /// preserving the original positions.
    fn split_by_node(
        &self,
        group: GroupId,
        ids: impl Iterator<Item = Identifier>,
    ) -> ClientResult<Vec<(NodeAddr, Vec<usize>)>> {
        let mut per_node: Vec<(NodeAddr, Vec<usize>)> = Vec::new();
        for (i, id) in ids.enumerate() {
            let addr = self.target(group, &id.digest)?;
            match per_node.iter_mut().find(|(a, _)| *a == addr) {
                Some((_, indices)) => indices.push(i),
                None => per_node.push((addr, vec![i])),
            }
        }
        Ok(per_node)
    }

    // -----------------------------------------------------------------------
    // Range, lookup, metadata
    // -----------------------------------------------------------------------

    /// Iterate stored objects whose digests fall in the range's interval,
    /// walking groups in order until one answers.
    pub async fn read_range(
        &self,
        range: RangeRequest,
        attrs: AttrFlags,
    ) -> ClientResult<Vec<DataEntry>> {
        let groups = self.groups();
        if groups.is_empty() {
            return Err(ClientError::Configuration("no groups configured".into()));
        }
        let mut last_err = None;
        for group in groups {
            match self.read_range_in(group, range.clone(), attrs).await {
                Ok(entries) => return Ok(entries),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ClientError::Transport("no group replied".into())))
    }

    /// Range iteration against one explicit group, addressed at the node
    /// owning the interval's lower bound.
    pub async fn read_range_in(
        &self,
        group: GroupId,
        range: RangeRequest,
        attrs: AttrFlags,
    ) -> ClientResult<Vec<DataEntry>> {
        let probe = Identifier::from_digest(range.lower, range.column);
        let addr = self.target(group, &probe.digest)?;
        let completion = self.registry.begin();
        self.transport
            .send(&addr, completion.trans(), Request::Range { range, attrs })
            .await?;
        let outcome = completion.wait(self.timeout, "read_range").await?;
        if !outcome.is_ok() {
            return Err(reply_error(&outcome, &probe));
        }
        outcome
            .data
            .iter()
            .map(|frame| DataEntry::decode(&frame.payload).map_err(ClientError::from))
            .collect()
    }

    /// Resolve a key's placement: which node holds it, and the recorded
    /// file info if metadata was written.
    pub async fn lookup(&self, key: &[u8]) -> ClientResult<LookupResult> {
        let id = Identifier::transform(key, 0);
        let outcome = self.first_group(id, Request::Lookup { id }, "lookup").await?;
        Ok(LookupResult::decode(&outcome.terminal.payload)?)
    }

    /// Persist the placement record for `key` on every group, enabling
    /// checksummed reads.
    pub async fn write_metadata(&self, key: &str) -> ClientResult<()> {
        let id = Identifier::transform(key.as_bytes(), 0);
        let groups = self.groups();
        let placements: Vec<(GroupId, NodeAddr)> = groups
            .iter()
            .filter_map(|group| {
                self.routes
                    .route(*group, &id.digest)
                    .map(|addr| (*group, addr))
            })
            .collect();
        self.fan_out(
            id,
            Request::WriteMetadata {
                id,
                key: key.to_string(),
                placements,
                timestamp: 0,
            },
            "write_metadata",
        )
        .await
        .map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Remote execution, stats
    // -----------------------------------------------------------------------

    /// Run a script remotely. With an identifier the script runs on the
    /// node holding that key; without one it runs on every group and the
    /// results are concatenated in group order.
    pub async fn exec(&self, id: Option<Identifier>, script: Script) -> ClientResult<Vec<u8>> {
        match id {
            Some(id) => {
                let outcome = self
                    .first_group(id, Request::Exec { id: Some(id), script }, "exec")
                    .await?;
                Ok(outcome.terminal.payload.to_vec())
            }
            None => {
                let probe = Identifier::from_digest(Digest::zero(), 0);
                let outcomes = self
                    .fan_out(probe, Request::Exec { id: None, script }, "exec")
                    .await?;
                let mut combined = Vec::new();
                for outcome in outcomes {
                    combined.extend_from_slice(&outcome.terminal.payload);
                }
                Ok(combined)
            }
        }
    }

    /// Run inline script source through whatever interpreter the nodes
    /// registered.
    pub async fn exec_script(&self, source: &str, binary: Vec<u8>) -> ClientResult<Vec<u8>> {
        self.exec(None, Script::inline(source, binary)).await
    }

    /// Run a handler registered under `name` on the nodes.
    pub async fn exec_name(&self, name: &str, binary: Vec<u8>) -> ClientResult<Vec<u8>> {
        self.exec(None, Script::named(name, "", binary)).await
    }

    /// Per-group node statistics.
    pub async fn stat(&self) -> ClientResult<Vec<(GroupId, StatSnapshot)>> {
        let groups = self.groups();
        if groups.is_empty() {
            return Err(ClientError::Configuration("no groups configured".into()));
        }
        let probe = Digest::zero();
        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            let addr = self.target(group, &probe)?;
            let completion = self.registry.begin();
            self.transport
                .send(&addr, completion.trans(), Request::Stat)
                .await?;
            let outcome = completion.wait(self.timeout, "stat").await?;
            if !outcome.is_ok() {
                return Err(reply_error(
                    &outcome,
                    &Identifier::from_digest(probe, 0),
                ));
            }
            let snapshot: StatSnapshot = bincode::deserialize(&outcome.terminal.payload)
                .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
            out.push((group, snapshot));
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Dispatch plumbing
    // -----------------------------------------------------------------------

    fn target(&self, group: GroupId, digest: &Digest) -> ClientResult<NodeAddr> {
        self.routes.route(group, digest).ok_or_else(|| {
            ClientError::Configuration(format!("no node registered for group {group}"))
        })
    }

    /// Send `request` to every configured group and join the replies
    /// against the success policy. Returns the successful outcomes in
    /// group order.
    async fn fan_out(
        &self,
        id: Identifier,
        request: Request,
        op: &'static str,
    ) -> ClientResult<Vec<CompletionOutcome>> {
        let groups = self.groups();
        if groups.is_empty() {
            return Err(ClientError::Configuration("no groups configured".into()));
        }
        let total = groups.len();

        // Dispatch everything first so the per-transaction timeouts run
        // concurrently with node work, then join.
        let mut pending = Vec::with_capacity(total);
        for group in groups {
            let result = match self.target(group, &id.digest) {
                Ok(addr) => {
                    let completion = self.registry.begin();
                    match self
                        .transport
                        .send(&addr, completion.trans(), request.clone())
                        .await
                    {
                        Ok(()) => Ok(completion),
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };
            pending.push((group, result));
        }

        let mut outcomes = Vec::new();
        let mut first_err: Option<ClientError> = None;
        for (group, result) in pending {
            let outcome = match result {
                Ok(completion) => completion.wait(self.timeout, op).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(outcome) if outcome.is_ok() => outcomes.push(outcome),
                Ok(outcome) => {
                    debug!(%group, op, status = outcome.terminal.status(), "group rejected");
                    first_err.get_or_insert(reply_error(&outcome, &id));
                }
                Err(e) => {
                    debug!(%group, op, error = %e, "group unreachable");
                    first_err.get_or_insert(e);
                }
            }
        }

        if self.policy.satisfied(outcomes.len(), total) {
            Ok(outcomes)
        } else {
            Err(first_err
                .unwrap_or_else(|| ClientError::Transport("no group replied".into())))
        }
    }

    /// Walk groups in order, returning the first successful outcome.
    async fn first_group(
        &self,
        id: Identifier,
        request: Request,
        op: &'static str,
    ) -> ClientResult<CompletionOutcome> {
        let groups = self.groups();
        if groups.is_empty() {
            return Err(ClientError::Configuration("no groups configured".into()));
        }
        let mut last_err = None;
        for group in groups {
            let addr = match self.target(group, &id.digest) {
                Ok(addr) => addr,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            let completion = self.registry.begin();
            if let Err(e) = self
                .transport
                .send(&addr, completion.trans(), request.clone())
                .await
            {
                last_err = Some(e);
                continue;
            }
            match completion.wait(self.timeout, op).await {
                Ok(outcome) if outcome.is_ok() => return Ok(outcome),
                Ok(outcome) => last_err = Some(reply_error(&outcome, &id)),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ClientError::Transport("no group replied".into())))
    }
}

fn reply_error(outcome: &CompletionOutcome, id: &Identifier) -> ClientError {
    let message = String::from_utf8_lossy(&outcome.terminal.payload).into_owned();
    ClientError::from_reply(outcome.terminal.status(), message, id)
}
