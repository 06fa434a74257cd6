//! Project file trees
//!
//! Tree nodes, the flat-map codec every backend normalizes through, and content
//! digests.

pub mod codec;
pub mod hasher;
pub mod node;

pub use codec::{flat_files_from_tree, tree_from_flat_files, FlatFiles};
pub use hasher::{file_digest, tree_digest, tree_digest_hex};
pub use node::{FileNode, ROOT_NAME};
