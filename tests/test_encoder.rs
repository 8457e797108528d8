//! Outbound request framing tests

use byteorder::{ByteOrder, LittleEndian};
use dhan_feed::encoder::{decode_instrument_slot, encode_batched};
use dhan_feed::protocol::{INSTRUMENT_SLOT_SIZE, SUBSCRIPTION_FRAME_SIZE};
use dhan_feed::{encode_auth_frame, encode_subscription_frame, ExchangeSegment, Instrument, SubscriptionMode};
use rand::Rng;

const SLOTS_AT: usize = 87;

fn instruments(n: usize) -> Vec<Instrument> {
    (0..n)
        .map(|i| {
            let segment = if i % 2 == 0 { ExchangeSegment::NseEq } else { ExchangeSegment::NseFno };
            Instrument::new(segment, (10_000 + i).to_string()).unwrap()
        })
        .collect()
}

fn slots(frame: &[u8]) -> Vec<Option<Instrument>> {
    (0..100)
        .map(|i| {
            let at = SLOTS_AT + i * INSTRUMENT_SLOT_SIZE;
            decode_instrument_slot(&frame[at..at + INSTRUMENT_SLOT_SIZE])
        })
        .collect()
}

#[test]
fn test_batch_count_matches_ceil() {
    let mut rng = rand::thread_rng();
    let mut sizes: Vec<usize> = vec![0, 1, 99, 100, 101, 200, 201];
    sizes.extend((0..20).map(|_| rng.gen_range(0..1000)));

    for n in sizes {
        let list = instruments(n);
        let frames = encode_batched(SubscriptionMode::Quote, "1000000001", &list, true).unwrap();
        assert_eq!(frames.len(), n.div_ceil(100), "n = {n}");

        let mut decoded = Vec::new();
        for frame in &frames {
            assert_eq!(frame.len(), SUBSCRIPTION_FRAME_SIZE);
            let count = LittleEndian::read_u32(&frame[83..87]) as usize;
            assert!(count >= 1 && count <= 100);
            assert_eq!(LittleEndian::read_u32(&frame[2..6]) as usize, 83 + 4 + count * 21);

            let slots = slots(frame);
            assert!(slots[..count].iter().all(Option::is_some));
            assert!(frame[SLOTS_AT + count * INSTRUMENT_SLOT_SIZE..].iter().all(|&b| b == 0));
            decoded.extend(slots.into_iter().flatten());
        }
        // consecutive batches preserve order
        assert_eq!(decoded, list);
    }
}

#[test]
fn test_unsubscribe_batches_use_off_code() {
    let frames = encode_batched(SubscriptionMode::Depth, "1", &instruments(250), false).unwrap();
    assert_eq!(frames.len(), 3);
    for frame in &frames {
        assert_eq!(LittleEndian::read_u16(&frame[0..2]), 20);
    }
    assert_eq!(LittleEndian::read_u32(&frames[2][83..87]), 50);
}

#[test]
fn test_header_layouts_differ() {
    let auth = encode_auth_frame("1000000001", "tok").unwrap();
    let sub = encode_subscription_frame(SubscriptionMode::Ticker, "1000000001", &instruments(1)).unwrap();

    // client id at 3 in the auth header, at 6 in the subscription header
    assert_eq!(&auth[3..13], b"1000000001");
    assert_eq!(&sub[6..16], b"1000000001");
    assert_eq!(auth[0], 11);
    assert_eq!(LittleEndian::read_u16(&sub[0..2]), 15);
}

#[test]
fn test_slot_round_trip_trims_padding() {
    let frame = encode_subscription_frame(
        SubscriptionMode::Ticker,
        "1",
        &[Instrument::new(ExchangeSegment::BseFno, "8").unwrap()],
    )
    .unwrap();
    let first = decode_instrument_slot(&frame[SLOTS_AT..SLOTS_AT + INSTRUMENT_SLOT_SIZE]).unwrap();
    assert_eq!(first.segment(), ExchangeSegment::BseFno);
    assert_eq!(first.security_id(), "8");
}
