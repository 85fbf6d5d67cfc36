//! Tunnel link lifecycle.

use crate::error::{VportError, VportResult};
use crate::message::*;
use crate::transport::LinkTransport;
use crate::types::{Vport, VportType, GENEVE_DST_PORT};
use netlink_packet_core::{Nla, NLM_F_CREATE, NLM_F_EXCL};
use offload_common::NlAttr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Link kind registered only by the out-of-tree geneve module.
pub const OUT_OF_TREE_PROBE_KIND: &str = "ovs_geneve";

/// Port name used for the out-of-tree probe.
const PROBE_PORT_NAME: &str = "ovs-system-probe";

/// `IFLA_INFO_DATA` a freshly created link of `vport`'s type carries.
fn info_data(vport: &Vport) -> VportResult<Vec<NlAttr>> {
    let dst_port = vport.tunnel.dst_port;
    match vport.vport_type {
        VportType::Vxlan => {
            let mut attrs = vec![
                NlAttr::U8(IFLA_VXLAN_LEARNING, 0),
                NlAttr::U8(IFLA_VXLAN_COLLECT_METADATA, 1),
                NlAttr::U8(IFLA_VXLAN_UDP_ZERO_CSUM6_RX, 1),
            ];
            if vport.tunnel.gbp {
                attrs.push(NlAttr::Flag(IFLA_VXLAN_GBP));
            }
            attrs.push(NlAttr::Be16(IFLA_VXLAN_PORT, dst_port));
            Ok(attrs)
        }
        VportType::Gre => Ok(vec![NlAttr::Flag(IFLA_GRE_COLLECT_METADATA)]),
        VportType::Geneve => Ok(vec![
            NlAttr::Flag(IFLA_GENEVE_COLLECT_METADATA),
            NlAttr::U8(IFLA_GENEVE_UDP_ZERO_CSUM6_RX, 1),
            NlAttr::Be16(IFLA_GENEVE_PORT, dst_port),
        ]),
        other => Err(VportError::Unsupported(other)),
    }
}

fn attr_value(attr: &NlAttr) -> Vec<u8> {
    let mut value = vec![0u8; attr.value_len()];
    attr.emit_value(&mut value);
    value
}

/// Creates and removes the kernel links behind tunnel ports.
pub struct VportManager {
    transport: Arc<dyn LinkTransport>,
}

impl VportManager {
    pub fn new(transport: Arc<dyn LinkTransport>) -> Self {
        Self { transport }
    }

    fn new_link(&self, name: &str, kind: &str, vport: &Vport, flags: u16) -> VportResult<()> {
        let request = LinkMessage::new_link(name, kind, &info_data(vport)?);
        self.transport.transact(request, NLM_F_CREATE | flags)?;
        Ok(())
    }

    fn del_link(&self, name: &str) -> VportResult<()> {
        self.transport.transact(LinkMessage::del_link(name), 0)?;
        Ok(())
    }

    /// Creates the link for `vport`, bringing it up in metadata mode.
    ///
    /// A link that already exists is kept if it verifies. Otherwise it is
    /// removed and creation is attempted once more.
    #[instrument(skip(self, vport), fields(port = %vport.name, vport_type = %vport.vport_type))]
    pub fn create(&self, vport: &Vport) -> VportResult<()> {
        let kind = vport
            .vport_type
            .link_kind()
            .ok_or(VportError::Unsupported(vport.vport_type))?;
        let name = vport.dpif_port_name();
        let mut retried = false;

        loop {
            match self.new_link(&name, kind, vport, NLM_F_EXCL) {
                Ok(()) => {
                    self.verify(vport)?;
                    info!(link = %name, kind, "tunnel link created");
                    return Ok(());
                }
                Err(e) if e.errno() == libc::EEXIST && !retried => match self.verify(vport) {
                    Ok(()) => {
                        debug!(link = %name, "reusing existing tunnel link");
                        return Ok(());
                    }
                    Err(mismatch) => {
                        warn!(link = %name, error = %mismatch, "existing tunnel link differs, recreating");
                        self.del_link(&name)?;
                        retried = true;
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Checks that the link behind `vport` has the kind and info data that
    /// [`create`](Self::create) would give it.
    pub fn verify(&self, vport: &Vport) -> VportResult<()> {
        let kind = vport
            .vport_type
            .link_kind()
            .ok_or(VportError::Unsupported(vport.vport_type))?;
        let name = vport.dpif_port_name();
        let expected = info_data(vport)?;

        let replies = self.transport.transact(LinkMessage::get_link(&name), 0)?;
        let link = replies
            .into_iter()
            .find(|m| m.message_type == RTM_NEWLINK)
            .ok_or_else(|| VportError::mismatch(&name, "no link in reply"))?;

        if link.kind.as_deref() != Some(kind) {
            return Err(VportError::mismatch(
                &name,
                format!("kind {:?}, expected {}", link.kind.as_deref().unwrap_or(""), kind),
            ));
        }

        let actual = link
            .info_attrs()
            .map_err(|e| VportError::mismatch(&name, format!("bad info data: {}", e)))?;
        for attr in &expected {
            match actual.get(&attr.kind()) {
                Some(value) if *value == attr_value(attr) => {}
                Some(_) => return Err(VportError::mismatch(&name, format!("attribute {} differs", attr.kind()))),
                None => return Err(VportError::mismatch(&name, format!("attribute {} missing", attr.kind()))),
            }
        }
        Ok(())
    }

    /// Removes the link named `name` for a port of `vport_type`.
    #[instrument(skip(self))]
    pub fn destroy(&self, name: &str, vport_type: VportType) -> VportResult<()> {
        if vport_type.link_kind().is_none() {
            return Err(VportError::Unsupported(vport_type));
        }
        self.del_link(name)?;
        info!(link = name, "tunnel link removed");
        Ok(())
    }

    /// Whether the kernel's tunnel modules are the out-of-tree ones.
    ///
    /// Only the out-of-tree geneve module knows the probe kind, so anything
    /// other than "not supported" counts as out-of-tree. A link the probe
    /// manages to create is removed again.
    pub fn probe_out_of_tree(&self) -> bool {
        let probe = Vport::new(PROBE_PORT_NAME, VportType::Geneve).with_dst_port(GENEVE_DST_PORT);
        let name = probe.dpif_port_name();

        match self.new_link(&name, OUT_OF_TREE_PROBE_KIND, &probe, 0) {
            Err(e) if e.errno() == libc::EOPNOTSUPP => {
                debug!("in-tree tunnel modules");
                false
            }
            Ok(()) => {
                if let Err(e) = self.del_link(&name) {
                    warn!(link = %name, error = %e, "failed to remove probe link");
                }
                info!("out-of-tree tunnel modules");
                true
            }
            Err(e) => {
                debug!(error = %e, "probe rejected, assuming out-of-tree tunnel modules");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_common::NlError;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Replays canned replies in order and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<VportResult<Vec<LinkMessage>>>>,
        requests: Mutex<Vec<(LinkMessage, u16)>>,
    }

    impl ScriptedTransport {
        fn reply(self, reply: VportResult<Vec<LinkMessage>>) -> Self {
            self.replies.lock().push_back(reply);
            self
        }

        fn types(&self) -> Vec<u16> {
            self.requests.lock().iter().map(|(m, _)| m.message_type).collect()
        }
    }

    impl LinkTransport for ScriptedTransport {
        fn transact(&self, request: LinkMessage, flags: u16) -> VportResult<Vec<LinkMessage>> {
            self.requests.lock().push((request, flags));
            self.replies.lock().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn kernel(errno: i32) -> VportResult<Vec<LinkMessage>> {
        Err(NlError::Kernel { errno }.into())
    }

    /// What the kernel reports for a link created from `vport`.
    fn link_for(vport: &Vport) -> LinkMessage {
        LinkMessage::new_link(
            &vport.dpif_port_name(),
            vport.vport_type.link_kind().unwrap(),
            &info_data(vport).unwrap(),
        )
    }

    fn manager(transport: ScriptedTransport) -> (VportManager, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (VportManager::new(transport.clone()), transport)
    }

    #[test]
    fn test_create_vxlan() {
        let vport = Vport::new("vx0", VportType::Vxlan).with_gbp(true);
        let (mgr, transport) = manager(
            ScriptedTransport::default()
                .reply(Ok(Vec::new()))
                .reply(Ok(vec![link_for(&vport)])),
        );

        mgr.create(&vport).unwrap();

        let requests = transport.requests.lock();
        let (create, flags) = &requests[0];
        assert_eq!(*flags, NLM_F_CREATE | NLM_F_EXCL);
        assert_eq!(create.name.as_deref(), Some("vxlan_sys_4789"));
        assert_eq!(create.kind.as_deref(), Some("vxlan"));
        assert_eq!(create.mtu, Some(65535));
        assert_eq!((create.flags, create.change), (IFF_UP, IFF_UP));

        let info = create.info_attrs().unwrap();
        assert_eq!(info.get(&IFLA_VXLAN_LEARNING), Some(&vec![0]));
        assert_eq!(info.get(&IFLA_VXLAN_COLLECT_METADATA), Some(&vec![1]));
        assert_eq!(info.get(&IFLA_VXLAN_UDP_ZERO_CSUM6_RX), Some(&vec![1]));
        assert_eq!(info.get(&IFLA_VXLAN_GBP), Some(&Vec::new()));
        assert_eq!(info.get(&IFLA_VXLAN_PORT), Some(&vec![0x12, 0xb5]));

        assert_eq!(requests[1].0.message_type, RTM_GETLINK);
    }

    #[test]
    fn test_info_data_per_type() {
        let gre = info_data(&Vport::new("gre0", VportType::Gre)).unwrap();
        assert_eq!(gre, vec![NlAttr::Flag(IFLA_GRE_COLLECT_METADATA)]);

        let geneve = info_data(&Vport::new("gnv0", VportType::Geneve)).unwrap();
        assert_eq!(
            geneve,
            vec![
                NlAttr::Flag(IFLA_GENEVE_COLLECT_METADATA),
                NlAttr::U8(IFLA_GENEVE_UDP_ZERO_CSUM6_RX, 1),
                NlAttr::Be16(IFLA_GENEVE_PORT, 6081),
            ]
        );

        let err = info_data(&Vport::new("stt0", VportType::Stt)).unwrap_err();
        assert_eq!(err.errno(), libc::EOPNOTSUPP);
    }

    #[test]
    fn test_existing_matching_link_is_kept() {
        let vport = Vport::new("gnv0", VportType::Geneve);
        let (mgr, transport) = manager(
            ScriptedTransport::default()
                .reply(kernel(libc::EEXIST))
                .reply(Ok(vec![link_for(&vport)])),
        );

        mgr.create(&vport).unwrap();
        assert_eq!(transport.types(), vec![RTM_NEWLINK, RTM_GETLINK]);
    }

    #[test]
    fn test_existing_mismatched_link_is_recreated_once() {
        let vport = Vport::new("vx0", VportType::Vxlan);
        let stale = link_for(&Vport::new("vx0", VportType::Vxlan).with_dst_port(8472));
        let (mgr, transport) = manager(
            ScriptedTransport::default()
                .reply(kernel(libc::EEXIST))
                .reply(Ok(vec![stale]))
                .reply(Ok(Vec::new()))
                .reply(Ok(Vec::new()))
                .reply(Ok(vec![link_for(&vport)])),
        );

        mgr.create(&vport).unwrap();
        assert_eq!(
            transport.types(),
            vec![RTM_NEWLINK, RTM_GETLINK, RTM_DELLINK, RTM_NEWLINK, RTM_GETLINK]
        );
    }

    #[test]
    fn test_second_eexist_is_returned() {
        let vport = Vport::new("gre0", VportType::Gre);
        let wrong_kind = LinkMessage::new_link("gre_sys", "gre", &[]);
        let (mgr, transport) = manager(
            ScriptedTransport::default()
                .reply(kernel(libc::EEXIST))
                .reply(Ok(vec![wrong_kind]))
                .reply(Ok(Vec::new()))
                .reply(kernel(libc::EEXIST)),
        );

        assert_eq!(mgr.create(&vport).unwrap_err().errno(), libc::EEXIST);
        assert_eq!(
            transport.types(),
            vec![RTM_NEWLINK, RTM_GETLINK, RTM_DELLINK, RTM_NEWLINK]
        );
    }

    #[test]
    fn test_failed_removal_of_stale_link_is_returned() {
        let vport = Vport::new("gre0", VportType::Gre);
        let (mgr, _) = manager(
            ScriptedTransport::default()
                .reply(kernel(libc::EEXIST))
                .reply(Ok(Vec::new()))
                .reply(kernel(libc::EBUSY)),
        );
        assert_eq!(mgr.create(&vport).unwrap_err().errno(), libc::EBUSY);
    }

    #[test]
    fn test_verify_reports_missing_attribute() {
        let vport = Vport::new("gnv0", VportType::Geneve);
        let partial = LinkMessage::new_link(
            "genev_sys_6081",
            "geneve",
            &[NlAttr::Flag(IFLA_GENEVE_COLLECT_METADATA)],
        );
        let (mgr, _) = manager(ScriptedTransport::default().reply(Ok(vec![partial])));

        let err = mgr.verify(&vport).unwrap_err();
        assert!(matches!(err, VportError::Mismatch { .. }));
        assert_eq!(err.errno(), libc::EINVAL);
    }

    #[test]
    fn test_create_failure_skips_verify() {
        let (mgr, transport) = manager(ScriptedTransport::default().reply(kernel(libc::EPERM)));
        let err = mgr.create(&Vport::new("vx0", VportType::Vxlan)).unwrap_err();
        assert_eq!(err.errno(), libc::EPERM);
        assert_eq!(transport.types(), vec![RTM_NEWLINK]);
    }

    #[test]
    fn test_unsupported_types() {
        let (mgr, transport) = manager(ScriptedTransport::default());
        assert_eq!(
            mgr.create(&Vport::new("lisp0", VportType::Lisp)).unwrap_err().errno(),
            libc::EOPNOTSUPP
        );
        assert_eq!(
            mgr.destroy("eth0", VportType::Netdev).unwrap_err().errno(),
            libc::EOPNOTSUPP
        );
        assert!(transport.types().is_empty());

        mgr.destroy("vxlan_sys_4789", VportType::Vxlan).unwrap();
        assert_eq!(transport.types(), vec![RTM_DELLINK]);
    }

    #[test]
    fn test_probe() {
        let (mgr, transport) = manager(ScriptedTransport::default().reply(kernel(libc::EOPNOTSUPP)));
        assert!(!mgr.probe_out_of_tree());
        let requests = transport.requests.lock();
        assert_eq!(requests[0].1, NLM_F_CREATE);
        assert_eq!(requests[0].0.name.as_deref(), Some("genev_sys_6081"));
        assert_eq!(requests[0].0.kind.as_deref(), Some(OUT_OF_TREE_PROBE_KIND));
        drop(requests);

        let (mgr, transport) = manager(ScriptedTransport::default());
        assert!(mgr.probe_out_of_tree());
        assert_eq!(transport.types(), vec![RTM_NEWLINK, RTM_DELLINK]);

        let (mgr, transport) = manager(ScriptedTransport::default().reply(kernel(libc::EEXIST)));
        assert!(mgr.probe_out_of_tree());
        assert_eq!(transport.types(), vec![RTM_NEWLINK]);
    }
}
