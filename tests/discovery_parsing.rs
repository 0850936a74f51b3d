//! Discovery reply collection and deduplication

mod common;

use common::*;
use powershades_rs::discovery::DiscoveryCollector;
use std::net::{IpAddr, Ipv4Addr};

fn serial_reply(model: u8, serial: u64, ip: [u8; 4]) -> Bytes {
    Frame::new(Opcode::GetSerial, 1, 0, serial_payload(model, serial, ip)).into()
}

fn addr(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

#[test]
fn duplicate_replies_from_one_source_yield_one_result() {
    let mut collector = DiscoveryCollector::new();
    let source = addr(192, 168, 1, 40);

    assert!(
        collector
            .ingest(source, serial_reply(1, 111, [192, 168, 1, 40]))
            .is_some()
    );
    assert!(
        collector
            .ingest(source, serial_reply(1, 111, [192, 168, 1, 40]))
            .is_none()
    );

    let results = collector.into_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].serial, 111);
}

#[test]
fn distinct_sources_all_collected() {
    let mut collector = DiscoveryCollector::new();
    collector.ingest(addr(192, 168, 1, 40), serial_reply(1, 111, [192, 168, 1, 40]));
    collector.ingest(addr(192, 168, 1, 41), serial_reply(2, 222, [192, 168, 1, 41]));

    let results = collector.into_results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].ip, addr(192, 168, 1, 40));
    assert_eq!(results[1].ip, addr(192, 168, 1, 41));
    assert_eq!(results[1].model, 2);
}

#[test]
fn non_serial_datagrams_are_ignored() {
    let mut collector = DiscoveryCollector::new();
    let source = addr(192, 168, 1, 40);

    // noise: undecodable bytes, a status reply, then a real serial reply
    assert!(collector.ingest(source, Bytes::from_static(&[1, 2, 3])).is_none());
    assert!(collector.ingest(source, status_reply(1, 42, 3700)).is_none());
    assert!(
        collector
            .ingest(source, serial_reply(1, 111, [192, 168, 1, 40]))
            .is_some()
    );
    assert_eq!(collector.into_results().len(), 1);
}

#[test]
fn first_reply_per_source_wins() {
    let mut collector = DiscoveryCollector::new();
    let source = addr(10, 0, 0, 5);
    collector.ingest(source, serial_reply(1, 111, [10, 0, 0, 5]));
    collector.ingest(source, serial_reply(9, 999, [10, 0, 0, 5]));

    let results = collector.into_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].serial, 111);
    assert_eq!(results[0].model, 1);
}
