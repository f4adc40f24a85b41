//! Per-chunk framing of the chat response stream.
//!
//! The backend answers with a plain text stream. Most chunks are markdown to
//! append to the assistant reply; a chunk that starts with
//! [`METADATA_PREFIX`] instead carries a JSON usage report. A chunk is
//! always one or the other, never both.

use std::fmt;

use crate::core::usage::UsageMetadata;

pub const METADATA_PREFIX: &str = "__METADATA__:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    Content(&'a str),
    Metadata(UsageMetadata),
}

#[derive(Debug)]
pub enum FrameError {
    /// The payload was valid JSON but not an object.
    NotAnObject,
    Json(serde_json::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::NotAnObject => write!(f, "metadata payload is not a JSON object"),
            FrameError::Json(err) => write!(f, "invalid metadata payload: {err}"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::NotAnObject => None,
            FrameError::Json(err) => Some(err),
        }
    }
}

/// Classify one chunk of stream text.
///
/// Anything after the JSON object in a metadata chunk makes the whole frame
/// invalid; the payload is never split into metadata plus content. Inside a
/// valid object, fields of the wrong type are dropped one by one.
pub fn decode_chunk(chunk: &str) -> Result<Frame<'_>, FrameError> {
    let Some(payload) = chunk.strip_prefix(METADATA_PREFIX) else {
        return Ok(Frame::Content(chunk));
    };

    let value: serde_json::Value = serde_json::from_str(payload).map_err(FrameError::Json)?;
    let serde_json::Value::Object(object) = value else {
        return Err(FrameError::NotAnObject);
    };
    Ok(Frame::Metadata(UsageMetadata::from_object(&object)))
}

/// Turns transport byte chunks into text chunks.
///
/// A multi-byte character split across two transport chunks is held back
/// until its remaining bytes arrive, so each text chunk is valid UTF-8.
/// Invalid sequences are replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

/// Length of the sequence introduced by a UTF-8 lead byte.
fn sequence_len(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one transport chunk into zero or more text pieces.
    ///
    /// There is normally one piece. When a held-back partial character is
    /// not continued by `bytes`, its replacement character comes out as a
    /// piece of its own so the new chunk is still classified from its first
    /// byte.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut rest = bytes;

        if let Some(&lead) = self.pending.first() {
            let needed = sequence_len(lead).saturating_sub(self.pending.len());
            let continued = rest
                .iter()
                .take(needed)
                .take_while(|byte| is_continuation(**byte))
                .count();
            self.pending.extend_from_slice(&rest[..continued]);
            rest = &rest[continued..];
            if continued < needed {
                if rest.is_empty() {
                    return pieces;
                }
                pieces.push(char::REPLACEMENT_CHARACTER.to_string());
                self.pending.clear();
            }
        }

        self.pending.extend_from_slice(rest);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(prefix) = std::str::from_utf8(&self.pending[..valid]) {
                        out.push_str(prefix);
                    }
                    match err.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }

        if !out.is_empty() {
            pieces.push(out);
        }
        pieces
    }

    /// Flush bytes still held back when the stream ends.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_content() {
        assert_eq!(decode_chunk("Hello **world**").unwrap(), Frame::Content("Hello **world**"));
    }

    #[test]
    fn metadata_prefix_yields_usage() {
        let frame = decode_chunk(r#"__METADATA__:{"prompt_tokens":5}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Metadata(UsageMetadata {
                prompt_tokens: Some(5),
                ..UsageMetadata::default()
            })
        );
    }

    #[test]
    fn prefix_must_start_the_chunk() {
        let chunk = r#"see __METADATA__:{"prompt_tokens":5}"#;
        assert_eq!(decode_chunk(chunk).unwrap(), Frame::Content(chunk));
    }

    #[test]
    fn malformed_metadata_is_an_error() {
        assert!(matches!(
            decode_chunk("__METADATA__:{bad json"),
            Err(FrameError::Json(_))
        ));
    }

    #[test]
    fn non_object_metadata_is_rejected() {
        assert!(matches!(
            decode_chunk(r#"__METADATA__:["gpt",1,2,3]"#),
            Err(FrameError::NotAnObject)
        ));
    }

    #[test]
    fn trailing_content_invalidates_the_frame() {
        assert!(decode_chunk(r#"__METADATA__:{"total_tokens":3}tail"#).is_err());
    }

    #[test]
    fn wrong_field_type_drops_only_that_field() {
        let frame = decode_chunk(r#"__METADATA__:{"prompt_tokens":"five","total_tokens":3}"#)
            .unwrap();
        assert_eq!(
            frame,
            Frame::Metadata(UsageMetadata {
                total_tokens: Some(3),
                ..UsageMetadata::default()
            })
        );

        let frame = decode_chunk(r#"__METADATA__:{"model":7,"completion_tokens":-1}"#).unwrap();
        assert_eq!(frame, Frame::Metadata(UsageMetadata::default()));
    }

    #[test]
    fn utf8_decoder_holds_back_split_characters() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();
        // 'é' is two bytes starting at index 1.
        assert_eq!(decoder.decode(&bytes[..2]), vec!["h"]);
        assert_eq!(decoder.decode(&bytes[2..]), vec!["éllo"]);
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn utf8_decoder_waits_across_several_chunks() {
        let bytes = "€".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();
        assert!(decoder.decode(&bytes[..1]).is_empty());
        assert!(decoder.decode(&bytes[1..2]).is_empty());
        assert_eq!(decoder.decode(&bytes[2..]), vec!["€"]);
    }

    #[test]
    fn broken_tail_does_not_swallow_a_metadata_prefix() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xC3]), vec!["a"]);

        let pieces = decoder.decode(br#"__METADATA__:{"total_tokens":3}"#);
        assert_eq!(pieces, vec!["\u{FFFD}", r#"__METADATA__:{"total_tokens":3}"#]);
        assert_eq!(decode_chunk(&pieces[0]).unwrap(), Frame::Content("\u{FFFD}"));
        assert!(matches!(decode_chunk(&pieces[1]), Ok(Frame::Metadata(_))));
    }

    #[test]
    fn utf8_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn utf8_decoder_flushes_truncated_tail_lossily() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), vec!["x"]);
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
