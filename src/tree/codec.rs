//! Snapshot wire encoding: text form, gzip compressed.
//!
//! The gzip header carries no timestamp or file name, so equal trees encode
//! to identical bytes.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::tree::node::ConfigTree;
use crate::tree::{TreeError, TreeResult};

/// Serialize a tree to its deterministic text bytes.
pub fn serialize(tree: &ConfigTree) -> Vec<u8> {
    tree.to_text().into_bytes()
}

pub fn compress(bytes: &[u8]) -> TreeResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| TreeError::Codec(e.to_string()))?;
    encoder.finish().map_err(|e| TreeError::Codec(e.to_string()))
}

pub fn decompress(bytes: &[u8]) -> TreeResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| TreeError::Codec(e.to_string()))?;
    Ok(out)
}

/// Serialize and compress a tree for transport.
pub fn encode_snapshot(tree: &ConfigTree) -> TreeResult<Vec<u8>> {
    compress(&serialize(tree))
}

/// Decompress and parse a transported snapshot.
pub fn decode_snapshot(bytes: &[u8]) -> TreeResult<ConfigTree> {
    let raw = decompress(bytes)?;
    let text = String::from_utf8(raw)
        .map_err(|e| TreeError::Codec(format!("snapshot is not UTF-8: {}", e)))?;
    ConfigTree::load(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_deterministic() {
        let mut a = ConfigTree::new();
        a.set_option("/A/x", "1").unwrap();
        a.set_option("/B/y", "2").unwrap();
        let b = ConfigTree::load(&a.to_text()).unwrap();

        assert_eq!(encode_snapshot(&a).unwrap(), encode_snapshot(&b).unwrap());
    }

    #[test]
    fn test_decode_restores_tree() {
        let mut tree = ConfigTree::new();
        tree.set_option("/Systems/WMS/Port", "9130").unwrap();
        let decoded = decode_snapshot(&encode_snapshot(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(decode_snapshot(b"not gzip at all"), Err(TreeError::Codec(_))));

        let bad_text = compress(b"A\n{\n").unwrap();
        assert!(matches!(decode_snapshot(&bad_text), Err(TreeError::Parse { .. })));

        let bad_utf8 = compress(&[0xff, 0xfe, 0xfd]).unwrap();
        assert!(matches!(decode_snapshot(&bad_utf8), Err(TreeError::Codec(_))));
    }
}
