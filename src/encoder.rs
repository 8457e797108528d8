//! Outbound request encoding
//!
//! Builds the authentication and (un)subscription frames. The two request
//! kinds use different header layouts; each has its own builder so neither
//! layout can drift into the other.

use crate::instrument::Instrument;
use crate::protocol::*;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("client id is {len} bytes, field holds {max}")]
    InvalidClientId { len: usize, max: usize },

    #[error("security id must be 1..={max} bytes, got {len}")]
    InvalidSecurityId { len: usize, max: usize },

    #[error("{count} instruments in one request, limit is {max}")]
    TooManyInstruments { count: usize, max: usize },

    #[error("frame of {size} bytes does not fit the length field")]
    FrameTooLarge { size: usize },
}

pub type EncodeResult<T> = Result<T, EncodeError>;

fn check_client_id(client_id: &str) -> EncodeResult<()> {
    if client_id.len() > CLIENT_ID_FIELD_SIZE {
        return Err(EncodeError::InvalidClientId {
            len: client_id.len(),
            max: CLIENT_ID_FIELD_SIZE,
        });
    }
    Ok(())
}

/// Authentication request
///
/// Layout: [code u8][length u16][client id 30][reserved 50][token >=500]["2P"]
///
/// The token is zero-padded up to 500 bytes and never truncated. The declared
/// length covers the padded token, so it always equals the frame size.
pub fn encode_auth_frame(client_id: &str, access_token: &str) -> EncodeResult<Vec<u8>> {
    check_client_id(client_id)?;

    let token = access_token.as_bytes();
    let token_field = token.len().max(AUTH_TOKEN_MIN_SIZE);
    let size = REQUEST_HEADER_SIZE + token_field + AUTH_TYPE.len();
    if size > u16::MAX as usize {
        return Err(EncodeError::FrameTooLarge { size });
    }

    let mut frame = vec![0u8; size];
    frame[0] = AUTH_REQUEST_CODE;
    LittleEndian::write_u16(&mut frame[1..3], size as u16);
    frame[3..3 + client_id.len()].copy_from_slice(client_id.as_bytes());
    // bytes 33..83 stay zero (reserved)

    let payload = REQUEST_HEADER_SIZE;
    frame[payload..payload + token.len()].copy_from_slice(token);
    frame[payload + token_field..].copy_from_slice(AUTH_TYPE);

    Ok(frame)
}

/// Write the (un)subscription header into the first 83 bytes of `buf`
fn write_request_header(buf: &mut [u8], request_code: u16, declared_len: u32, client_id: &str) {
    LittleEndian::write_u16(&mut buf[0..2], request_code);
    LittleEndian::write_u32(&mut buf[2..6], declared_len);
    buf[6..6 + client_id.len()].copy_from_slice(client_id.as_bytes());
}

/// Write one 21-byte instrument slot
pub fn encode_instrument_slot(instrument: &Instrument, slot: &mut [u8]) {
    slot[..INSTRUMENT_SLOT_SIZE].fill(0);
    slot[0] = instrument.segment().as_u8();
    let id = instrument.security_id().as_bytes();
    slot[1..1 + id.len()].copy_from_slice(id);
}

/// Read an instrument back out of a slot; `None` for an empty or malformed slot
pub fn decode_instrument_slot(slot: &[u8]) -> Option<Instrument> {
    if slot.len() < INSTRUMENT_SLOT_SIZE {
        return None;
    }
    let id_field = &slot[1..INSTRUMENT_SLOT_SIZE];
    let end = id_field.iter().position(|&b| b == 0).unwrap_or(id_field.len());
    let id = std::str::from_utf8(&id_field[..end]).ok()?;
    Instrument::new(slot[0], id).ok()
}

fn encode_instrument_request(
    request_code: u16,
    client_id: &str,
    instruments: &[Instrument],
) -> EncodeResult<Vec<u8>> {
    check_client_id(client_id)?;
    if instruments.len() > MAX_INSTRUMENTS_PER_REQUEST {
        return Err(EncodeError::TooManyInstruments {
            count: instruments.len(),
            max: MAX_INSTRUMENTS_PER_REQUEST,
        });
    }

    // Declared length counts only the filled slots; all 100 are sent.
    let declared = REQUEST_HEADER_SIZE + INSTRUMENT_COUNT_SIZE + instruments.len() * INSTRUMENT_SLOT_SIZE;

    let mut frame = vec![0u8; SUBSCRIPTION_FRAME_SIZE];
    write_request_header(&mut frame, request_code, declared as u32, client_id);

    let count_at = REQUEST_HEADER_SIZE;
    LittleEndian::write_u32(
        &mut frame[count_at..count_at + INSTRUMENT_COUNT_SIZE],
        instruments.len() as u32,
    );

    let slots_at = count_at + INSTRUMENT_COUNT_SIZE;
    for (i, instrument) in instruments.iter().enumerate() {
        let offset = slots_at + i * INSTRUMENT_SLOT_SIZE;
        encode_instrument_slot(instrument, &mut frame[offset..offset + INSTRUMENT_SLOT_SIZE]);
    }

    Ok(frame)
}

/// Subscription request for at most 100 instruments
pub fn encode_subscription_frame(
    mode: SubscriptionMode,
    client_id: &str,
    instruments: &[Instrument],
) -> EncodeResult<Vec<u8>> {
    encode_instrument_request(mode.subscribe_code(), client_id, instruments)
}

/// Unsubscription request for at most 100 instruments
pub fn encode_unsubscription_frame(
    mode: SubscriptionMode,
    client_id: &str,
    instruments: &[Instrument],
) -> EncodeResult<Vec<u8>> {
    encode_instrument_request(mode.unsubscribe_code(), client_id, instruments)
}

/// Split `instruments` into consecutive 100-instrument requests
pub fn encode_batched(
    mode: SubscriptionMode,
    client_id: &str,
    instruments: &[Instrument],
    subscribe: bool,
) -> EncodeResult<Vec<Vec<u8>>> {
    instruments
        .chunks(MAX_INSTRUMENTS_PER_REQUEST)
        .map(|batch| {
            if subscribe {
                encode_subscription_frame(mode, client_id, batch)
            } else {
                encode_unsubscription_frame(mode, client_id, batch)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nse(id: &str) -> Instrument {
        Instrument::new(ExchangeSegment::NseEq, id).unwrap()
    }

    #[test]
    fn test_auth_frame_layout() {
        let frame = encode_auth_frame("1000000001", "token-abc").unwrap();
        assert_eq!(frame.len(), 83 + 500 + 2);
        assert_eq!(frame[0], 11);
        assert_eq!(LittleEndian::read_u16(&frame[1..3]) as usize, frame.len());
        assert_eq!(&frame[3..13], b"1000000001");
        assert!(frame[13..83].iter().all(|&b| b == 0));
        assert_eq!(&frame[83..92], b"token-abc");
        assert!(frame[92..583].iter().all(|&b| b == 0));
        assert_eq!(&frame[583..], b"2P");
    }

    #[test]
    fn test_auth_frame_long_token_not_truncated() {
        let token = "t".repeat(640);
        let frame = encode_auth_frame("42", &token).unwrap();
        assert_eq!(frame.len(), 83 + 640 + 2);
        assert_eq!(&frame[83..723], token.as_bytes());
        assert_eq!(&frame[723..], b"2P");
    }

    #[test]
    fn test_auth_frame_rejects_oversized() {
        let token = "t".repeat(70_000);
        assert!(matches!(
            encode_auth_frame("42", &token),
            Err(EncodeError::FrameTooLarge { .. })
        ));
        let client_id = "9".repeat(31);
        assert!(matches!(
            encode_auth_frame(&client_id, "t"),
            Err(EncodeError::InvalidClientId { len: 31, max: 30 })
        ));
    }

    #[test]
    fn test_subscription_frame_layout() {
        let instruments = vec![nse("1333"), Instrument::new(ExchangeSegment::NseFno, "52175").unwrap()];
        let frame = encode_subscription_frame(SubscriptionMode::Quote, "1000000001", &instruments).unwrap();

        assert_eq!(frame.len(), SUBSCRIPTION_FRAME_SIZE);
        assert_eq!(LittleEndian::read_u16(&frame[0..2]), 17);
        assert_eq!(LittleEndian::read_u32(&frame[2..6]), 83 + 4 + 2 * 21);
        assert_eq!(&frame[6..16], b"1000000001");
        assert!(frame[16..83].iter().all(|&b| b == 0));
        assert_eq!(LittleEndian::read_u32(&frame[83..87]), 2);
        assert_eq!(frame[87], 1);
        assert_eq!(&frame[88..92], b"1333");
        assert_eq!(frame[108], 2);
        assert_eq!(&frame[109..114], b"52175");
        assert!(frame[87 + 2 * 21..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unsubscription_uses_off_code() {
        let frame = encode_unsubscription_frame(SubscriptionMode::Ticker, "1", &[nse("1")]).unwrap();
        assert_eq!(LittleEndian::read_u16(&frame[0..2]), 16);
    }

    #[test]
    fn test_request_capacity() {
        let instruments: Vec<_> = (0..101).map(|i| nse(&i.to_string())).collect();
        assert!(matches!(
            encode_subscription_frame(SubscriptionMode::Ticker, "1", &instruments),
            Err(EncodeError::TooManyInstruments { count: 101, max: 100 })
        ));
        let frames = encode_batched(SubscriptionMode::Ticker, "1", &instruments, true).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(LittleEndian::read_u32(&frames[1][83..87]), 1);
    }

    #[test]
    fn test_slot_round_trip() {
        let instrument = Instrument::new(ExchangeSegment::McxComm, "ABCDEFGHIJKLMNOPQRST").unwrap();
        let mut slot = [0xffu8; INSTRUMENT_SLOT_SIZE];
        encode_instrument_slot(&instrument, &mut slot);
        assert_eq!(decode_instrument_slot(&slot), Some(instrument));

        let short = nse("7");
        encode_instrument_slot(&short, &mut slot);
        assert!(slot[2..].iter().all(|&b| b == 0));
        assert_eq!(decode_instrument_slot(&slot), Some(short));

        assert_eq!(decode_instrument_slot(&[0u8; INSTRUMENT_SLOT_SIZE]), None);
    }
}
