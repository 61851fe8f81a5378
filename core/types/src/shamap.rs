// Copyright (c) 2025 The Rivulet Project

//! SHAMap: an authenticated map from 256-bit keys to opaque blobs.
//!
//! A 16-ary Merkle trie keyed by the nibbles of the 32-byte key, in
//! natural big-endian order. The root digest depends only on the set of
//! inserted pairs, never on insertion order, which is what makes the
//! tx and state roots cross-validator comparable.

use riv_crypto_keys::hash256;

const LEAF_PREFIX: &[u8] = b"MLN\0";
const INNER_PREFIX: &[u8] = b"MIN\0";

/// Digest of an absent subtree.
const EMPTY_HASH: [u8; 32] = [0u8; 32];

enum Node {
    Leaf { key: [u8; 32], value: Vec<u8> },
    Inner { children: Box<[Option<Node>; 16]> },
}

impl Node {
    fn empty_inner() -> Node {
        Node::Inner {
            children: Box::new(std::array::from_fn(|_| None)),
        }
    }

    fn hash(&self) -> [u8; 32] {
        match self {
            Node::Leaf { key, value } => {
                let mut data = Vec::with_capacity(LEAF_PREFIX.len() + 32 + value.len());
                data.extend_from_slice(LEAF_PREFIX);
                data.extend_from_slice(key);
                data.extend_from_slice(value);
                hash256(&data)
            }
            Node::Inner { children } => {
                let mut data = Vec::with_capacity(INNER_PREFIX.len() + 16 * 32);
                data.extend_from_slice(INNER_PREFIX);
                for child in children.iter() {
                    match child {
                        Some(node) => data.extend_from_slice(&node.hash()),
                        None => data.extend_from_slice(&EMPTY_HASH),
                    }
                }
                hash256(&data)
            }
        }
    }
}

fn nibble(key: &[u8; 32], depth: usize) -> usize {
    let byte = key[depth / 2];
    if depth % 2 == 0 {
        (byte >> 4) as usize
    } else {
        (byte & 0x0f) as usize
    }
}

/// An authenticated key/value map.
#[derive(Default)]
pub struct ShaMap {
    root: Option<Node>,
    len: usize,
}

impl ShaMap {
    /// An empty map.
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Number of inserted pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert or replace a pair.
    pub fn insert(&mut self, key: [u8; 32], value: Vec<u8>) {
        let root = self.root.take();
        let (node, added) = Self::insert_at(root, key, value, 0);
        self.root = Some(node);
        if added {
            self.len += 1;
        }
    }

    /// Convenience: key a UTF-8 identifier by its hash.
    pub fn insert_str(&mut self, key: &str, value: &str) {
        self.insert(hash256(key.as_bytes()), value.as_bytes().to_vec());
    }

    /// The root digest. All zeroes for an empty map.
    pub fn root_hash(&self) -> [u8; 32] {
        match &self.root {
            Some(node) => node.hash(),
            None => EMPTY_HASH,
        }
    }

    /// Hex encoding of the root digest.
    pub fn root_hex(&self) -> String {
        hex::encode(self.root_hash())
    }

    fn insert_at(
        node: Option<Node>,
        key: [u8; 32],
        value: Vec<u8>,
        depth: usize,
    ) -> (Node, bool) {
        match node {
            None => (Node::Leaf { key, value }, true),
            Some(Node::Leaf {
                key: existing_key,
                value: existing_value,
            }) => {
                if existing_key == key {
                    return (Node::Leaf { key, value }, false);
                }
                // Split: push the existing leaf down and retry.
                let mut inner = Node::empty_inner();
                if let Node::Inner { children } = &mut inner {
                    let idx = nibble(&existing_key, depth);
                    children[idx] = Some(Node::Leaf {
                        key: existing_key,
                        value: existing_value,
                    });
                }
                Self::insert_at(Some(inner), key, value, depth)
            }
            Some(Node::Inner { mut children }) => {
                let idx = nibble(&key, depth);
                let child = children[idx].take();
                let (new_child, added) = Self::insert_at(child, key, value, depth + 1);
                children[idx] = Some(new_child);
                (Node::Inner { children }, added)
            }
        }
    }
}
