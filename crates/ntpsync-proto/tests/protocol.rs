use ntpsync_proto::error::ParseError;
use ntpsync_proto::protocol::{
    ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, Packet, ReadBytes, ShortFormat, Stratum,
    TimestampFormat, ToBytes, Version, WriteBytes,
};
use ntpsync_proto::unix_time::EPOCH_DELTA;
use ntpsync_proto::{Timeval, decode_reply, encode_request};

// A reply captured from a stratum 1 CDMA-referenced server.
const CAPTURED: [u8; 48] = [
    20u8, 1, 3, 240, 0, 0, 0, 0, 0, 0, 0, 24, 67, 68, 77, 65, 215, 188, 128, 105, 198, 169, 46, 99,
    215, 187, 177, 194, 159, 47, 120, 0, 215, 188, 128, 113, 45, 236, 230, 45, 215, 188, 128, 113,
    46, 35, 158, 108,
];

fn captured_packet() -> Packet {
    Packet {
        leap_indicator: LeapIndicator::NoWarning,
        version: Version::new(2),
        mode: Mode::Server,
        stratum: Stratum::PRIMARY,
        poll: 3,
        precision: -16,
        root_delay: ShortFormat {
            seconds: 0,
            fraction: 0,
        },
        root_dispersion: ShortFormat {
            seconds: 0,
            fraction: 24,
        },
        reference_id: *b"CDMA",
        reference_timestamp: TimestampFormat {
            seconds: 3619455081,
            fraction: 3332976227,
        },
        origin_timestamp: TimestampFormat {
            seconds: 3619402178,
            fraction: 2670688256,
        },
        receive_timestamp: TimestampFormat {
            seconds: 3619455089,
            fraction: 770500141,
        },
        transmit_timestamp: TimestampFormat {
            seconds: 3619455089,
            fraction: 774086252,
        },
    }
}

#[test]
fn packet_from_bytes() {
    let packet = (&CAPTURED[..]).read_bytes::<Packet>().unwrap();
    assert_eq!(captured_packet(), packet);
}

#[test]
fn packet_to_bytes() {
    let mut bytes = [0u8; Packet::PACKED_SIZE_BYTES];
    (&mut bytes[..]).write_bytes(captured_packet()).unwrap();
    assert_eq!(&bytes[..], &CAPTURED[..]);
}

#[test]
fn slice_traits_agree_with_io_traits() {
    let (packet, consumed) = Packet::from_bytes(&CAPTURED).unwrap();
    assert_eq!(consumed, 48);
    assert_eq!(packet, captured_packet());
    let mut out = [0u8; 48];
    packet.to_bytes(&mut out).unwrap();
    assert_eq!(out, CAPTURED);
}

#[test]
fn decode_captured_reply() {
    let destination = Timeval::new(3_619_455_090 - EPOCH_DELTA, 0);
    let decoded = decode_reply(&CAPTURED, destination).unwrap();
    assert_eq!(decoded.version.value(), 2);
    assert_eq!(decoded.mode, Mode::Server);
    assert_eq!(decoded.precision, 2f64.powi(-16));
    assert_eq!(decoded.poll_interval, 8.0);
    assert_eq!(decoded.transmit.secs(), 3_619_455_089 - EPOCH_DELTA);
    assert_eq!(decoded.reference_id, *b"CDMA");
    assert!(decoded.dispersion > 0.0 && decoded.dispersion < 0.001);
}

#[test]
fn decode_short_datagram() {
    assert_eq!(
        decode_reply(&CAPTURED[..40], Timeval::ZERO),
        Err(ParseError::BufferTooShort {
            needed: 48,
            available: 40
        })
    );
}

#[test]
fn encoded_request_parses_as_client_packet() {
    let now = Timeval::new(1_704_067_200, 250_000);
    let bytes = encode_request(now);
    let (packet, _) = Packet::from_bytes(&bytes).unwrap();
    assert_eq!(packet.mode, Mode::Client);
    assert_eq!(packet.version, Version::V4);
    assert_eq!(packet.leap_indicator, LeapIndicator::Unknown);
    assert_eq!(packet.transmit_timestamp, TimestampFormat::from(now));
    assert_eq!(packet.transmit_timestamp.fraction, 0x4000_0000);
}
