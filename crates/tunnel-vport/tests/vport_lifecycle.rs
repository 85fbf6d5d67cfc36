//! Link request sequences, checked with a mocked transport.

use mockall::mock;
use mockall::predicate::{eq, function};
use mockall::Sequence;
use netlink_packet_core::{NLM_F_CREATE, NLM_F_EXCL};
use offload_common::{NlAttr, NlError};
use std::sync::Arc;
use tunnel_vport::message::*;
use tunnel_vport::{LinkMessage, LinkTransport, Vport, VportManager, VportResult, VportType};

mock! {
    Transport {}

    impl LinkTransport for Transport {
        fn transact(&self, request: LinkMessage, flags: u16) -> VportResult<Vec<LinkMessage>>;
    }
}

fn is(message_type: u16, name: &'static str) -> impl Fn(&LinkMessage) -> bool {
    move |m: &LinkMessage| m.message_type == message_type && m.name.as_deref() == Some(name)
}

fn gre_link() -> LinkMessage {
    LinkMessage::new_link("gre_sys", "gretap", &[NlAttr::Flag(IFLA_GRE_COLLECT_METADATA)])
}

#[test]
fn test_gre_create_then_verify() {
    let mut seq = Sequence::new();
    let mut transport = MockTransport::new();
    transport
        .expect_transact()
        .with(function(is(RTM_NEWLINK, "gre_sys")), eq(NLM_F_CREATE | NLM_F_EXCL))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Vec::new()));
    transport
        .expect_transact()
        .with(function(is(RTM_GETLINK, "gre_sys")), eq(0))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(vec![gre_link()]));

    let manager = VportManager::new(Arc::new(transport));
    manager.create(&Vport::new("gre0", VportType::Gre)).unwrap();
}

#[test]
fn test_created_link_failing_verification_is_left_alone() {
    let mut seq = Sequence::new();
    let mut transport = MockTransport::new();
    transport
        .expect_transact()
        .with(function(is(RTM_NEWLINK, "vxlan_sys_4789")), eq(NLM_F_CREATE | NLM_F_EXCL))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Vec::new()));
    transport
        .expect_transact()
        .with(function(is(RTM_GETLINK, "vxlan_sys_4789")), eq(0))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(vec![LinkMessage::new_link("vxlan_sys_4789", "vxlan", &[])]));

    let manager = VportManager::new(Arc::new(transport));
    let err = manager.create(&Vport::new("vx0", VportType::Vxlan)).unwrap_err();
    assert_eq!(err.errno(), libc::EINVAL);
}

#[test]
fn test_verify_of_missing_link_reports_kernel_error() {
    let mut transport = MockTransport::new();
    transport
        .expect_transact()
        .with(function(is(RTM_GETLINK, "genev_sys_6081")), eq(0))
        .times(1)
        .returning(|_, _| Err(NlError::Kernel { errno: libc::ENODEV }.into()));

    let manager = VportManager::new(Arc::new(transport));
    let err = manager.verify(&Vport::new("gnv0", VportType::Geneve)).unwrap_err();
    assert_eq!(err.errno(), libc::ENODEV);
}

#[test]
fn test_destroy_sends_dellink() {
    let mut transport = MockTransport::new();
    transport
        .expect_transact()
        .with(function(is(RTM_DELLINK, "genev_sys_6081")), eq(0))
        .times(1)
        .returning(|_, _| Ok(Vec::new()));

    let manager = VportManager::new(Arc::new(transport));
    manager.destroy("genev_sys_6081", VportType::Geneve).unwrap();
}

#[test]
fn test_probe_failure_to_remove_is_not_fatal() {
    let mut seq = Sequence::new();
    let mut transport = MockTransport::new();
    transport
        .expect_transact()
        .with(function(is(RTM_NEWLINK, "genev_sys_6081")), eq(NLM_F_CREATE))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Vec::new()));
    transport
        .expect_transact()
        .with(function(is(RTM_DELLINK, "genev_sys_6081")), eq(0))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(NlError::Kernel { errno: libc::EBUSY }.into()));

    let manager = VportManager::new(Arc::new(transport));
    assert!(manager.probe_out_of_tree());
}
