//! Flow operation orchestrator.
//!
//! [`FlowOffload`] composes the translator, the priority allocator and the
//! identifier index with blocking calls into a [`ClassifierBackend`]. No
//! lock is held across a backend call. Callers that can race `put`/`del`
//! on the same UFID must serialize those themselves.

use crate::config::OffloadConfig;
use crate::device::DeviceHandle;
use crate::error::{OffloadError, OffloadResult};
use crate::index::IdentifierIndex;
use crate::port::PortResolver;
use crate::priority::PriorityAllocator;
use crate::translate::{EncodeContext, Encoded, FlowIdentity, IgnoredField, Translator};
use flow_types::{Action, Match, OdpPort, Ufid};
use offload_common::RateLimiter;
use std::sync::Arc;
use tc_flower::{ClassifierBackend, DumpHandle, FlowerStats, NetlinkClassifier, TcError, TcFlower};
use tracing::{debug, info, instrument, warn};

/// Counters reported for an offloaded flow.
pub type FlowStats = FlowerStats;

/// Per-request options for [`FlowOffload::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutContext {
    /// Tunnel destination port for tunnel-set actions that leave it
    /// unset. Overrides the configured default.
    pub tunnel_dst_port: Option<u16>,
}

/// Where a successful `put` landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub prio: u16,
    pub handle: u32,
    /// Constrained fields the installed entry does not check.
    pub ignored: Vec<IgnoredField>,
}

/// A flow read back from the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadedFlow {
    pub ufid: Ufid,
    pub matched: Match,
    pub actions: Vec<Action>,
    pub stats: FlowStats,
    pub prio: u16,
    pub handle: u32,
}

/// Offloads switch flows to a flower classifier.
pub struct FlowOffload {
    backend: Arc<dyn ClassifierBackend>,
    translator: Translator,
    priorities: Arc<PriorityAllocator>,
    index: IdentifierIndex,
    config: OffloadConfig,
    failures: RateLimiter,
}

impl FlowOffload {
    pub fn new(
        backend: Arc<dyn ClassifierBackend>,
        ports: Arc<dyn PortResolver>,
        priorities: Arc<PriorityAllocator>,
        config: OffloadConfig,
    ) -> Self {
        let failures = config.failure_limiter();
        Self {
            backend,
            translator: Translator::new(ports),
            priorities,
            index: IdentifierIndex::new(),
            config,
            failures,
        }
    }

    /// Offloads to the kernel's tc subsystem over rtnetlink.
    pub fn with_kernel(
        ports: Arc<dyn PortResolver>,
        priorities: Arc<PriorityAllocator>,
        config: OffloadConfig,
    ) -> OffloadResult<Self> {
        let backend = NetlinkClassifier::new()?;
        Ok(Self::new(Arc::new(backend), ports, priorities, config))
    }

    pub fn index(&self) -> &IdentifierIndex {
        &self.index
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Turns a backend error into an offload error. Failures other than
    /// "no such entry" are logged, rate limited.
    fn backend_error(&self, ufid: Option<Ufid>, err: TcError) -> OffloadError {
        if matches!(err, TcError::NotFound) {
            debug!(ufid = ufid.map(tracing::field::display), "classifier entry not found");
            return OffloadError::not_found("classifier entry");
        }
        if let Some(suppressed) = self.failures.check() {
            warn!(
                ufid = ufid.map(tracing::field::display),
                error = %err,
                errno = err.errno(),
                suppressed,
                "classifier request failed"
            );
        }
        OffloadError::Backend(err)
    }

    /// Datapath port of `dev`, from the device itself or the port table.
    fn in_port(&self, dev: &DeviceHandle) -> Option<OdpPort> {
        dev.port()
            .or_else(|| self.translator.ports().ifindex_to_port(dev.ifindex()))
    }

    /// Removes every classifier entry on `dev`. The identifier index is
    /// not touched: mappings into the flushed device stay until a later
    /// `put`/`del` of their UFID replaces or removes them.
    #[instrument(skip(self, dev), fields(ifindex = dev.ifindex()))]
    pub fn flush(&self, dev: &DeviceHandle) -> OffloadResult<()> {
        self.backend
            .flush(dev.ifindex())
            .map_err(|e| self.backend_error(None, e))?;
        info!(device = dev.name(), "flushed classifier entries");
        Ok(())
    }

    /// Starts a lazy dump of the offloaded flows on `dev`.
    #[instrument(skip(self, dev), fields(ifindex = dev.ifindex()))]
    pub fn dump(&self, dev: &DeviceHandle) -> OffloadResult<FlowDump<'_>> {
        let handle = self
            .backend
            .dump_start(dev.ifindex())
            .map_err(|e| self.backend_error(None, e))?;
        Ok(FlowDump {
            offload: self,
            device: dev.clone(),
            handle: Some(handle),
        })
    }

    /// Installs `m`/`actions` for `ufid` on `dev`, replacing any entry the
    /// UFID already had.
    ///
    /// The request is translated before anything is removed, so a flow the
    /// classifier cannot express leaves the old entry in place. Once the
    /// old entry has been deleted there is no going back: if the install
    /// then fails the UFID ends up with no entry and no mapping.
    #[instrument(skip(self, dev, ufid, m, actions, ctx), fields(ufid = %ufid, ifindex = dev.ifindex()))]
    pub fn put(
        &self,
        dev: &DeviceHandle,
        ufid: Ufid,
        m: &Match,
        actions: &[Action],
        ctx: &PutContext,
    ) -> OffloadResult<PutOutcome> {
        let encode_ctx = EncodeContext {
            flags: self.config.flower_flags(),
            tunnel_dst_port: ctx.tunnel_dst_port.or(self.config.tunnel_dst_port()),
        };
        let Encoded { flower, ignored } = self.translator.encode(m, actions, ufid, &encode_ctx)?;

        let old = self.index.lookup_by_ufid(&ufid);
        // Handles are only unique per device, so a flow moving to another
        // device starts over there.
        let (prio, handle_hint) = match &old {
            Some(old) if old.device.ifindex() == dev.ifindex() => (old.prio, old.handle),
            _ => (self.priorities.priority_for(&flower.mask, flower.protocol)?, 0),
        };
        if let Some(old) = &old {
            if let Err(e) = self.backend.delete(old.device.ifindex(), old.prio, old.handle) {
                debug!(error = %e, prio = old.prio, handle = old.handle, "removing replaced entry failed");
            }
        }

        match self
            .backend
            .install_or_replace(dev.ifindex(), prio, handle_hint, &flower)
        {
            Ok(handle) => {
                self.index.upsert(ufid, prio, handle, dev);
                debug!(prio, handle, ignored = ignored.len(), "flow offloaded");
                Ok(PutOutcome { prio, handle, ignored })
            }
            Err(e) => {
                if old.is_some() {
                    self.index.remove(&ufid);
                }
                Err(self.backend_error(Some(ufid), e))
            }
        }
    }

    /// Reads the live entry for `ufid` back from the classifier.
    #[instrument(skip(self, ufid), fields(ufid = %ufid))]
    pub fn get(&self, ufid: Ufid) -> OffloadResult<OffloadedFlow> {
        let entry = self
            .index
            .lookup_by_ufid(&ufid)
            .ok_or_else(|| OffloadError::not_found(format!("ufid {}", ufid)))?;

        let flower = self
            .backend
            .get(entry.device.ifindex(), entry.prio, entry.handle)
            .map_err(|e| self.backend_error(Some(ufid), e))?;
        let decoded = self.translator.decode(&flower)?;

        let mut matched = decoded.matched;
        if let Some(port) = self.in_port(&entry.device) {
            matched.set_in_port(port);
        }
        Ok(OffloadedFlow {
            ufid,
            matched,
            actions: decoded.actions,
            stats: decoded.stats,
            prio: entry.prio,
            handle: entry.handle,
        })
    }

    /// Deletes the entry for `ufid`. The mapping is dropped whatever the
    /// classifier says; its error, if any, is still returned.
    #[instrument(skip(self, ufid), fields(ufid = %ufid))]
    pub fn del(&self, ufid: Ufid) -> OffloadResult<FlowStats> {
        let entry = self
            .index
            .lookup_by_ufid(&ufid)
            .ok_or_else(|| OffloadError::not_found(format!("ufid {}", ufid)))?;

        let result = self
            .backend
            .delete(entry.device.ifindex(), entry.prio, entry.handle);
        self.index.remove(&ufid);
        drop(entry);

        result.map_err(|e| self.backend_error(Some(ufid), e))?;
        Ok(FlowStats::default())
    }

    /// Decodes one dumped entry, or `None` if it cannot be attributed to a
    /// UFID.
    fn dumped_flow(&self, dev: &DeviceHandle, flower: TcFlower) -> Option<OffloadedFlow> {
        let decoded = match self.translator.decode(&flower) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(prio = flower.prio, handle = flower.handle, error = %e, "skipping undecodable entry");
                return None;
            }
        };

        let ufid = match decoded.identity {
            FlowIdentity::Cookie(ufid) => ufid,
            FlowIdentity::NeedsIndexLookup => {
                match self.index.lookup_by_tc(flower.prio, flower.handle, dev.ifindex()) {
                    Some(ufid) => ufid,
                    None => {
                        debug!(prio = flower.prio, handle = flower.handle, "skipping entry with unknown ufid");
                        return None;
                    }
                }
            }
        };

        let mut matched = decoded.matched;
        if let Some(port) = self.in_port(dev) {
            matched.set_in_port(port);
        }
        Some(OffloadedFlow {
            ufid,
            matched,
            actions: decoded.actions,
            stats: decoded.stats,
            prio: flower.prio,
            handle: flower.handle,
        })
    }
}

/// Lazy dump of one device's offloaded flows.
///
/// Entries are pulled from the backend one at a time. Entries that fail to
/// read, decode or map back to a UFID are skipped. The backend cursor is
/// released when the dump is dropped.
pub struct FlowDump<'a> {
    offload: &'a FlowOffload,
    device: DeviceHandle,
    handle: Option<DumpHandle>,
}

impl FlowDump<'_> {
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }
}

impl Iterator for FlowDump<'_> {
    type Item = OffloadedFlow;

    fn next(&mut self) -> Option<OffloadedFlow> {
        let handle = self.handle.as_mut()?;
        loop {
            match self.offload.backend.dump_next(handle)? {
                Ok(flower) => {
                    if let Some(flow) = self.offload.dumped_flow(&self.device, flower) {
                        return Some(flow);
                    }
                }
                Err(e) => debug!(ifindex = self.device.ifindex(), error = %e, "skipping unreadable entry"),
            }
        }
    }
}

impl Drop for FlowDump<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.offload.backend.dump_done(handle);
        }
    }
}
