//! Content digests for tree nodes
//!
//! Digests are order-independent for folder children so two trees with the same
//! files compare equal no matter how they were built.

use crate::tree::node::FileNode;
use crate::types::Hash;

const FILE_TAG: &[u8] = b"file\0";
const FOLDER_TAG: &[u8] = b"folder\0";

/// Digest of raw file bytes.
pub fn file_digest(content: &[u8]) -> Hash {
    *blake3::hash(content).as_bytes()
}

/// Digest of a node, covering names, kinds and contents of everything below it.
pub fn tree_digest(node: &FileNode) -> Hash {
    let mut hasher = blake3::Hasher::new();
    match node {
        FileNode::File { name, content } => {
            hasher.update(FILE_TAG);
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
            hasher.update(&file_digest(content.as_bytes()));
        }
        FileNode::Folder { name, children } => {
            hasher.update(FOLDER_TAG);
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
            let mut entries: Vec<(&str, Hash)> = children
                .iter()
                .map(|child| (child.name(), tree_digest(child)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            hasher.update(&(entries.len() as u64).to_le_bytes());
            for (_, digest) in entries {
                hasher.update(&digest);
            }
        }
    }
    *hasher.finalize().as_bytes()
}

/// Hex form of [`tree_digest`].
pub fn tree_digest_hex(node: &FileNode) -> String {
    hex::encode(tree_digest(node))
}
