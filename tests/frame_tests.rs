//! Frame codec integration tests: wire layout, CRC variant and
//! property-based round trips through the parser and the streaming decoder.

use nibus_rs::constants::{
    OFFSET_LENGTH, OFFSET_PROTOCOL, OFFSET_SERVICE, PREAMBLE, PROTOCOL_NMS, PROTOCOL_SARP,
    SERVICE_INFO_LENGTH,
};
use nibus_rs::nibus::frame::{crc16, parse_frame};
use nibus_rs::{Address, NibusDatagram, NibusDecoder};
use proptest::prelude::*;

#[test]
fn crc_is_xmodem_variant() {
    // CRC-16/XMODEM check value for the standard test vector
    assert_eq!(crc16(b"123456789"), 0x31C3);
}

#[test]
fn wire_layout_golden() {
    let frame = NibusDatagram::new(
        1,
        "1.2.3".parse().unwrap(),
        Address::Empty,
        PROTOCOL_NMS,
        vec![0x0B, 0x02, 0x00],
    )
    .unwrap();
    let raw = &frame.raw;

    assert_eq!(raw.len(), SERVICE_INFO_LENGTH + 3);
    assert_eq!(raw[0], PREAMBLE);
    assert_eq!(&raw[1..6], &[0, 0, 1, 2, 3]);
    assert_eq!(&raw[6..11], &[0, 0, 0, 0, 0]);
    // 0xC0 | prio 1 << 4 | net dest (2) << 2 | empty source (0)
    assert_eq!(raw[OFFSET_SERVICE], 0xC0 | 1 << 4 | 2 << 2);
    // length byte is payload length plus one
    assert_eq!(raw[OFFSET_LENGTH], 4);
    assert_eq!(raw[OFFSET_PROTOCOL], PROTOCOL_NMS);
    assert_eq!(&raw[14..17], &[0x0B, 0x02, 0x00]);

    let trailer = u16::from_be_bytes([raw[raw.len() - 2], raw[raw.len() - 1]]);
    assert_eq!(trailer, crc16(&raw[1..raw.len() - 2]));
}

fn address_strategy() -> impl Strategy<Value = Address> {
    prop_oneof![
        Just(Address::Empty),
        any::<[u8; 5]>().prop_map(Address::Mac),
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(domain, subnet, device)| {
            Address::Net {
                domain,
                subnet,
                device,
            }
        }),
        any::<[u8; 5]>().prop_map(Address::Group),
    ]
}

proptest! {
    #[test]
    fn round_trip(
        priority in 0u8..4,
        destination in address_strategy(),
        source in address_strategy(),
        protocol in prop_oneof![Just(PROTOCOL_NMS), Just(PROTOCOL_SARP)],
        payload in proptest::collection::vec(any::<u8>(), 0..=238),
    ) {
        let frame = NibusDatagram::new(
            priority,
            destination.clone(),
            source.clone(),
            protocol,
            payload.clone(),
        )
        .unwrap();
        let (rest, decoded) = parse_frame(&frame.raw).unwrap();
        prop_assert!(rest.is_empty());
        prop_assert_eq!(decoded.priority, priority);
        prop_assert_eq!(decoded.protocol, protocol);
        prop_assert_eq!(decoded.destination, destination);
        prop_assert_eq!(decoded.source, source);
        prop_assert_eq!(decoded.data, payload);
    }

    #[test]
    fn any_single_bit_flip_is_rejected(
        payload in proptest::collection::vec(any::<u8>(), 0..32),
        bit in any::<prop::sample::Index>(),
    ) {
        let frame = NibusDatagram::new(
            0,
            Address::broadcast(),
            Address::Empty,
            PROTOCOL_NMS,
            payload,
        )
        .unwrap();
        let mut corrupted = frame.raw.clone();
        let bit = bit.index(corrupted.len() * 8);
        corrupted[bit / 8] ^= 1 << (bit % 8);
        prop_assert!(parse_frame(&corrupted).is_err());
    }

    #[test]
    fn decoder_survives_arbitrary_chunking(
        payloads in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..16), 1..4),
        noise in proptest::collection::vec(any::<u8>(), 0..8),
        split in any::<prop::sample::Index>(),
    ) {
        let mut stream: Vec<u8> = noise.into_iter().filter(|&b| b != 0x7E).collect();
        let frames: Vec<NibusDatagram> = payloads
            .into_iter()
            .map(|payload| {
                NibusDatagram::new(
                    0,
                    "1.2.3".parse().unwrap(),
                    Address::Empty,
                    PROTOCOL_NMS,
                    payload,
                )
                .unwrap()
            })
            .collect();
        for frame in &frames {
            stream.extend_from_slice(&frame.raw);
        }

        let mut decoder = NibusDecoder::new();
        let split = split.index(stream.len() + 1);
        let mut decoded = decoder.push(&stream[..split]);
        decoded.extend(decoder.push(&stream[split..]));

        prop_assert_eq!(decoded.len(), frames.len());
        for (got, want) in decoded.iter().zip(&frames) {
            prop_assert_eq!(&got.data, &want.data);
        }
    }
}
