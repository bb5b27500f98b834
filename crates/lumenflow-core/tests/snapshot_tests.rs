use std::net::{IpAddr, Ipv4Addr};

use lumenflow_core::{
    ChannelLayout, ColorSample, MappingRange, MappingSnapshot, PatchRule, PatchSnapshot,
    UniverseAddress, UniverseBuffer, DMX_CHANNELS, MAX_LAYOUT_SLOTS,
};

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

/// Build a snapshot of many disjoint ranges across several universes, the
/// shape a venue-sized install produces.
fn venue_snapshot() -> MappingSnapshot {
    let mut ranges = Vec::new();
    // 8 controllers, 4 universes each, 100 RGB entities per universe.
    let mut next_id = 1u32;
    for controller in 0..8u8 {
        for universe in 0..4u16 {
            ranges.push(MappingRange {
                from: next_id,
                to: next_id + 99,
                controller: ip(40 + controller),
                universe,
                channel_start: 1,
                layout: ChannelLayout::rgb(),
            });
            next_id += 100;
        }
    }
    MappingSnapshot::validate(ranges).unwrap()
}

#[test]
fn resolve_covers_every_mapped_id() {
    let snapshot = venue_snapshot();
    assert_eq!(snapshot.len(), 32);
    assert_eq!(snapshot.keys().len(), 32);

    for id in 1..=3200u32 {
        let resolved = snapshot
            .resolve(id)
            .unwrap_or_else(|| panic!("id {id} should resolve"));
        let within_universe = (id - 1) % 100;
        assert_eq!(resolved.offset, within_universe as usize * 3);
    }

    assert!(snapshot.resolve(0).is_none());
    assert!(snapshot.resolve(3201).is_none());
}

#[test]
fn resolved_writes_stay_inside_the_entity_span() {
    let snapshot = venue_snapshot();
    let color = ColorSample::rgb(9, 8, 7);
    let mut scratch = [0u8; MAX_LAYOUT_SLOTS];

    for id in [1u32, 57, 100, 101, 3200] {
        let resolved = snapshot.resolve(id).unwrap();
        let mut buffer = UniverseBuffer::new(resolved.address);
        buffer.write_slice(resolved.offset, resolved.layout.project(color, &mut scratch));

        let end = resolved.offset + resolved.layout.len();
        for (channel, &byte) in buffer.frame().iter().enumerate() {
            if channel >= resolved.offset && channel < end {
                assert_ne!(byte, 0, "id {id} channel {channel}");
            } else {
                assert_eq!(byte, 0, "id {id} leaked into channel {channel}");
            }
        }
    }
}

#[test]
fn disabled_patch_is_identity_on_the_send_copy() {
    let patch = PatchSnapshot::empty();
    let mut frame = [0u8; DMX_CHANNELS];
    frame[0] = 10;
    frame[1] = 20;

    let mut copy = frame;
    patch.apply(0, &mut copy);
    assert_eq!(copy, frame);
}

#[test]
fn patch_only_rewrites_the_send_copy() {
    let address = UniverseAddress::new(ip(45), 0);
    let mut buffer = UniverseBuffer::new(address);
    buffer.write_slice(0, &[10, 20, 30]);

    let patch = PatchSnapshot::validate(
        vec![PatchRule {
            universe: 0,
            src_channel: 1,
            dst_channel: 4,
        }],
        true,
    )
    .unwrap();

    let (mut send_copy, _) = buffer.take_frame().unwrap();
    patch.apply(address.universe, &mut send_copy);

    assert_eq!(send_copy[3], 10);
    // The authoritative frame never sees patched bytes.
    assert_eq!(buffer.frame()[3], 0);
}

#[test]
fn long_patch_chains_validate_and_apply() {
    // 1 -> 2 -> 3 -> ... -> 64, declaration order.
    let rules: Vec<PatchRule> = (1u16..64)
        .map(|channel| PatchRule {
            universe: 2,
            src_channel: channel,
            dst_channel: channel + 1,
        })
        .collect();
    let patch = PatchSnapshot::validate(rules, true).unwrap();

    let mut frame = [0u8; DMX_CHANNELS];
    frame[0] = 123;
    patch.apply(2, &mut frame);

    for channel in 0..64 {
        assert_eq!(frame[channel], 123, "channel {channel}");
    }
    assert_eq!(frame[64], 0);
}
