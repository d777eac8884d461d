//! Wire frames exchanged between peers.
//!
//! Every frame is a fixed header of native-endian `u64` fields followed by
//! raw payload bytes. The receiver learns the payload layout from its own
//! registry (puts, gets) or queue descriptor (messages); nothing about the
//! element type travels on the wire. Encoders append into a caller-provided
//! scratch buffer so a superstep's worth of operations reuses one
//! allocation.

use transport::Pid;

use crate::error::{WorldError, WorldResult};
use crate::{QueueId, VarId};

const WORD: usize = std::mem::size_of::<u64>();

/// One-sided write: header `[var_id][byte_offset]`, then the payload.
pub(crate) struct PutFrame<'a> {
    pub var: VarId,
    pub offset: usize,
    pub payload: &'a [u8],
}

/// One-sided read request; carries no payload.
pub(crate) struct GetFrame {
    pub var: VarId,
    pub offset: usize,
    pub element_size: usize,
    pub count: usize,
    pub cookie: u64,
}

/// Reply to a [`GetFrame`]: header `[cookie][payload_len]`, then the bytes.
pub(crate) struct GetResponseFrame<'a> {
    pub cookie: u64,
    pub payload: &'a [u8],
}

/// Queue message: header `[queue_id][tag_len][content_len]`, then both parts.
pub(crate) struct MessageFrame<'a> {
    pub queue: QueueId,
    pub tag: &'a [u8],
    pub content: &'a [u8],
}

pub(crate) fn encode_put(scratch: &mut Vec<u8>, var: VarId, offset: usize, payload: &[u8]) {
    scratch.clear();
    scratch.reserve(2 * WORD + payload.len());
    scratch.extend_from_slice(&var.to_ne_bytes());
    scratch.extend_from_slice(&(offset as u64).to_ne_bytes());
    scratch.extend_from_slice(payload);
}

pub(crate) fn decode_put(rank: Pid, frame: &[u8]) -> WorldResult<PutFrame<'_>> {
    if frame.len() < 2 * WORD {
        return Err(malformed(rank, "put", frame.len()));
    }
    Ok(PutFrame {
        var: read_word(frame, 0),
        offset: read_word(frame, 1) as usize,
        payload: &frame[2 * WORD..],
    })
}

pub(crate) fn encode_get(scratch: &mut Vec<u8>, get: &GetFrame) {
    scratch.clear();
    scratch.reserve(5 * WORD);
    scratch.extend_from_slice(&get.var.to_ne_bytes());
    scratch.extend_from_slice(&(get.offset as u64).to_ne_bytes());
    scratch.extend_from_slice(&(get.element_size as u64).to_ne_bytes());
    scratch.extend_from_slice(&(get.count as u64).to_ne_bytes());
    scratch.extend_from_slice(&get.cookie.to_ne_bytes());
}

pub(crate) fn decode_get(rank: Pid, frame: &[u8]) -> WorldResult<GetFrame> {
    if frame.len() != 5 * WORD {
        return Err(malformed(rank, "get", frame.len()));
    }
    Ok(GetFrame {
        var: read_word(frame, 0),
        offset: read_word(frame, 1) as usize,
        element_size: read_word(frame, 2) as usize,
        count: read_word(frame, 3) as usize,
        cookie: read_word(frame, 4),
    })
}

pub(crate) fn encode_get_response(scratch: &mut Vec<u8>, cookie: u64, payload: &[u8]) {
    scratch.clear();
    scratch.reserve(2 * WORD + payload.len());
    scratch.extend_from_slice(&cookie.to_ne_bytes());
    scratch.extend_from_slice(&(payload.len() as u64).to_ne_bytes());
    scratch.extend_from_slice(payload);
}

pub(crate) fn decode_get_response(rank: Pid, frame: &[u8]) -> WorldResult<GetResponseFrame<'_>> {
    if frame.len() < 2 * WORD {
        return Err(malformed(rank, "get response", frame.len()));
    }
    let payload = &frame[2 * WORD..];
    if read_word(frame, 1) as usize != payload.len() {
        return Err(malformed(rank, "get response", frame.len()));
    }
    Ok(GetResponseFrame {
        cookie: read_word(frame, 0),
        payload,
    })
}

pub(crate) fn encode_message(scratch: &mut Vec<u8>, queue: QueueId, tag: &[u8], content: &[u8]) {
    scratch.clear();
    scratch.reserve(3 * WORD + tag.len() + content.len());
    scratch.extend_from_slice(&queue.to_ne_bytes());
    scratch.extend_from_slice(&(tag.len() as u64).to_ne_bytes());
    scratch.extend_from_slice(&(content.len() as u64).to_ne_bytes());
    scratch.extend_from_slice(tag);
    scratch.extend_from_slice(content);
}

pub(crate) fn decode_message(rank: Pid, frame: &[u8]) -> WorldResult<MessageFrame<'_>> {
    if frame.len() < 3 * WORD {
        return Err(malformed(rank, "message", frame.len()));
    }
    let tag_len = read_word(frame, 1) as usize;
    let content_len = read_word(frame, 2) as usize;
    let body = &frame[3 * WORD..];
    if body.len() != tag_len + content_len {
        return Err(malformed(rank, "message", frame.len()));
    }
    Ok(MessageFrame {
        queue: read_word(frame, 0),
        tag: &body[..tag_len],
        content: &body[tag_len..],
    })
}

fn read_word(frame: &[u8], index: usize) -> u64 {
    let mut bytes = [0u8; WORD];
    bytes.copy_from_slice(&frame[index * WORD..(index + 1) * WORD]);
    u64::from_ne_bytes(bytes)
}

fn malformed(rank: Pid, category: &'static str, len: usize) -> WorldError {
    WorldError::MalformedFrame {
        rank,
        category,
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_frame_carries_payload_after_header() {
        let mut scratch = Vec::new();
        encode_put(&mut scratch, 3, 16, &[0xAA, 0xBB]);
        let decoded = decode_put(0, &scratch).unwrap();
        assert_eq!(decoded.var, 3);
        assert_eq!(decoded.offset, 16);
        assert_eq!(decoded.payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn get_frame_is_header_only() {
        let mut scratch = Vec::new();
        encode_get(
            &mut scratch,
            &GetFrame {
                var: 1,
                offset: 8,
                element_size: 4,
                count: 2,
                cookie: 99,
            },
        );
        assert_eq!(scratch.len(), 40);
        let decoded = decode_get(0, &scratch).unwrap();
        assert_eq!(decoded.element_size, 4);
        assert_eq!(decoded.count, 2);
        assert_eq!(decoded.cookie, 99);
    }

    #[test]
    fn message_frame_splits_tag_and_content() {
        let mut scratch = Vec::new();
        encode_message(&mut scratch, 2, &[1, 2], &[3, 4, 5]);
        let decoded = decode_message(0, &scratch).unwrap();
        assert_eq!(decoded.queue, 2);
        assert_eq!(decoded.tag, &[1, 2]);
        assert_eq!(decoded.content, &[3, 4, 5]);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert!(decode_put(0, &[0; 8]).is_err());
        assert!(decode_get(0, &[0; 32]).is_err());
        assert!(decode_message(0, &[0; 16]).is_err());
    }

    #[test]
    fn response_length_field_must_match_payload() {
        let mut scratch = Vec::new();
        encode_get_response(&mut scratch, 7, &[1, 2, 3]);
        // Corrupt the length word.
        scratch[8] = 9;
        assert!(decode_get_response(0, &scratch).is_err());
    }
}
