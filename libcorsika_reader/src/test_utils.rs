//! Builders for synthetic CORSIKA byte streams used across the unit tests

use crate::constants::*;
use crate::eventio_format::pack_type_version;
use crate::format::FormatStream;

pub fn floats_to_bytes(words: &[f32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// A block of exactly 272 words, padded with zeros
pub fn block_words(words: &[(usize, f32)]) -> Vec<f32> {
    let mut block = vec![0.0; BLOCK_WORDS];
    for (idx, value) in words {
        block[*idx] = *value;
    }
    block
}

/// Raw sub-block: 4 byte tag followed by 272 words
pub fn raw_block(tag: &[u8; 4], words: &[f32]) -> Vec<u8> {
    let mut bytes = tag.to_vec();
    bytes.extend(floats_to_bytes(words));
    bytes
}

/// Raw shower payload: 273 words without a tag
pub fn raw_payload(fill: f32) -> Vec<u8> {
    floats_to_bytes(&[fill; BLOCK_WORDS + 1])
}

pub fn run_header_words(run_number: f32, n_obs_levels: f32) -> Vec<f32> {
    block_words(&[
        (0, run_number),
        (1, 100415.0),
        (2, 6.99),
        (3, n_obs_levels),
        (4, 220000.0),
        (14, -2.7),
        (15, 10.0),
        (16, 50000.0),
    ])
}

pub fn event_header_words(event_number: f32, tot_reuse: f32) -> Vec<f32> {
    let mut words = block_words(&[
        (0, event_number),
        (1, 1.0),
        (2, 1000.0),
        (9, 0.3),
        (10, 0.5),
        (75, 3.0),
        (83, 1.0),
        (96, tot_reuse),
    ]);
    for i in 0..MAX_REUSE {
        words[97 + i] = 100.0 * (i as f32 + 1.0);
        words[117 + i] = -10.0 * (i as f32 + 1.0);
    }
    words
}

pub fn event_end_words(event_number: f32, photons: f32) -> Vec<f32> {
    block_words(&[(0, event_number), (1, photons)])
}

pub fn run_end_words(run_number: f32, n_events: f32) -> Vec<f32> {
    block_words(&[(0, run_number), (1, n_events)])
}

/// A top-level EventIO object. The four classic blocks get the 8 legacy bytes
/// (word count and tag) in front of the body, as CORSIKA writes them.
pub fn eventio_block(type_code: u16, identifier: u32, body: &[u8]) -> Vec<u8> {
    let legacy = matches!(
        type_code,
        TYPE_RUN_HEADER | TYPE_RUN_END | TYPE_EVENT_HEADER | TYPE_EVENT_END
    );
    let length = body.len() as u32 + if legacy { EVENTIO_LEGACY_BYTES } else { 0 };
    let mut bytes = SYNC_MARKER.to_le_bytes().to_vec();
    bytes.extend(pack_type_version(type_code, 0).to_le_bytes());
    bytes.extend(identifier.to_le_bytes());
    bytes.extend(length.to_le_bytes());
    if legacy {
        bytes.extend((body.len() as u32 / 4 + 1).to_le_bytes());
        bytes.extend(b"XXXX");
    }
    bytes.extend_from_slice(body);
    bytes
}

/// A nested EventIO object, without sync marker
pub fn eventio_sub_block(type_code: u16, identifier: u32, body: &[u8]) -> Vec<u8> {
    let mut bytes = pack_type_version(type_code, 0).to_le_bytes().to_vec();
    bytes.extend(identifier.to_le_bytes());
    bytes.extend((body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(body);
    bytes
}

pub fn stream(bytes: Vec<u8>) -> FormatStream {
    FormatStream::from_bytes(bytes).unwrap()
}
