//! The profile tree: a typed facade over the content-addressed
//! filesystem every other module reads and writes through. The real
//! filesystem node (and the identity of the underlying peer) are
//! external collaborators injected at construction time; this module
//! only defines the interface and a lazy recursive tree walk built on
//! top of it, plus an in-memory implementation for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stat {
    pub entry_type: EntryType,
    pub size: u64,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub stat: Stat,
}

/// A node in a lazily-walked tree snapshot, as returned by `load_tree`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub entry_type: EntryType,
    pub size: u64,
    pub hash: String,
    pub contents: Option<BTreeMap<String, TreeNode>>,
}

/// The content-addressed filesystem collaborator. Implementations are
/// provided by the host application; this crate only consumes the trait.
#[async_trait]
pub trait ContentAddressedFs: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, bytes: &[u8], create_parents: bool) -> Result<()>;
    async fn ls(&self, path: &str) -> Result<Vec<Entry>>;
    async fn stat(&self, path: &str) -> Result<Stat>;
    async fn mkdir(&self, path: &str, parents: bool) -> Result<()>;
    async fn rm(&self, path: &str, recursive: bool) -> Result<()>;

    /// Plain recursive walk of `path`, no memoization — the tree is
    /// acyclic by construction so nothing is gained from caching it.
    async fn load_tree(&self, path: &str) -> Result<TreeNode> {
        load_tree_inner(self, path).await
    }
}

#[async_recursion::async_recursion]
async fn load_tree_inner(fs: &(impl ContentAddressedFs + ?Sized), path: &str) -> Result<TreeNode> {
    let stat = fs.stat(path).await?;
    match stat.entry_type {
        EntryType::File => Ok(TreeNode {
            entry_type: EntryType::File,
            size: stat.size,
            hash: stat.hash,
            contents: None,
        }),
        EntryType::Directory => {
            let entries = fs.ls(path).await?;
            let mut contents = BTreeMap::new();
            for entry in entries {
                let child_path = join_path(path, &entry.name);
                let child = load_tree_inner(fs, &child_path).await?;
                contents.insert(entry.name, child);
            }
            Ok(TreeNode {
                entry_type: EntryType::Directory,
                size: stat.size,
                hash: stat.hash,
                contents: Some(contents),
            })
        }
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty()).collect()
}

#[derive(Clone, Debug)]
enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, Node>),
}

/// An in-memory `ContentAddressedFs`, used by tests and by any caller
/// that just wants a working profile tree without a real filesystem
/// node behind it.
pub struct InMemoryFs {
    root: RwLock<Node>,
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self {
            root: RwLock::new(Node::Dir(BTreeMap::new())),
        }
    }
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_of(bytes: &[u8]) -> String {
        crate::crypto::keyed_hash(bytes)
    }
}

#[async_trait]
impl ContentAddressedFs for InMemoryFs {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let components = split_path(path);
        let root = self.root.read();
        let mut current = &*root;
        for component in &components {
            current = match current {
                Node::Dir(children) => children
                    .get(*component)
                    .ok_or_else(|| Error::PathMissing(path.to_string()))?,
                Node::File(_) => return Err(Error::PathMissing(path.to_string())),
            };
        }
        match current {
            Node::File(bytes) => Ok(bytes.clone()),
            Node::Dir(_) => Err(Error::Fs(format!("{path} is a directory"))),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8], create_parents: bool) -> Result<()> {
        let components = split_path(path);
        let (dirs, filename) = components
            .split_at(components.len().saturating_sub(1));
        let filename = filename
            .first()
            .ok_or_else(|| Error::Fs("empty path".into()))?;

        let mut root = self.root.write();
        let mut current = &mut *root;
        for component in dirs {
            current = match current {
                Node::Dir(children) => {
                    if !children.contains_key(*component) {
                        if create_parents {
                            children.insert(component.to_string(), Node::Dir(BTreeMap::new()));
                        } else {
                            return Err(Error::PathMissing(path.to_string()));
                        }
                    }
                    children.get_mut(*component).unwrap()
                }
                Node::File(_) => return Err(Error::Fs(format!("{path}: not a directory"))),
            };
        }
        match current {
            Node::Dir(children) => {
                children.insert(filename.to_string(), Node::File(bytes.to_vec()));
                Ok(())
            }
            Node::File(_) => Err(Error::Fs(format!("{path}: not a directory"))),
        }
    }

    async fn ls(&self, path: &str) -> Result<Vec<Entry>> {
        let components = split_path(path);
        let root = self.root.read();
        let mut current = &*root;
        for component in &components {
            current = match current {
                Node::Dir(children) => children
                    .get(*component)
                    .ok_or_else(|| Error::PathMissing(path.to_string()))?,
                Node::File(_) => return Err(Error::PathMissing(path.to_string())),
            };
        }
        match current {
            Node::Dir(children) => Ok(children
                .iter()
                .map(|(name, node)| Entry {
                    name: name.clone(),
                    stat: node_stat(node),
                })
                .collect()),
            Node::File(_) => Err(Error::Fs(format!("{path} is a file"))),
        }
    }

    async fn stat(&self, path: &str) -> Result<Stat> {
        let components = split_path(path);
        let root = self.root.read();
        let mut current = &*root;
        for component in &components {
            current = match current {
                Node::Dir(children) => children
                    .get(*component)
                    .ok_or_else(|| Error::PathMissing(path.to_string()))?,
                Node::File(_) => return Err(Error::PathMissing(path.to_string())),
            };
        }
        Ok(node_stat(current))
    }

    async fn mkdir(&self, path: &str, parents: bool) -> Result<()> {
        let components = split_path(path);
        let mut root = self.root.write();
        let mut current = &mut *root;
        for (i, component) in components.iter().enumerate() {
            current = match current {
                Node::Dir(children) => {
                    if !children.contains_key(*component) {
                        if parents || i == components.len() - 1 {
                            children.insert(component.to_string(), Node::Dir(BTreeMap::new()));
                        } else {
                            return Err(Error::PathMissing(path.to_string()));
                        }
                    }
                    children.get_mut(*component).unwrap()
                }
                Node::File(_) => return Err(Error::Fs(format!("{path}: not a directory"))),
            };
        }
        Ok(())
    }

    async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        let components = split_path(path);
        let (parents, name) = components.split_at(components.len().saturating_sub(1));
        let name = name
            .first()
            .ok_or_else(|| Error::Fs("cannot remove root".into()))?;

        let mut root = self.root.write();
        let mut current = &mut *root;
        for component in parents {
            current = match current {
                Node::Dir(children) => children
                    .get_mut(*component)
                    .ok_or_else(|| Error::PathMissing(path.to_string()))?,
                Node::File(_) => return Err(Error::PathMissing(path.to_string())),
            };
        }
        match current {
            Node::Dir(children) => {
                if let Some(Node::Dir(grandchildren)) = children.get(*name) {
                    if !recursive && !grandchildren.is_empty() {
                        return Err(Error::Fs(format!("{path}: directory not empty")));
                    }
                }
                children
                    .remove(*name)
                    .map(|_| ())
                    .ok_or_else(|| Error::PathMissing(path.to_string()))
            }
            Node::File(_) => Err(Error::PathMissing(path.to_string())),
        }
    }
}

fn node_stat(node: &Node) -> Stat {
    match node {
        Node::File(bytes) => Stat {
            entry_type: EntryType::File,
            size: bytes.len() as u64,
            hash: InMemoryFs::hash_of(bytes),
        },
        Node::Dir(children) => Stat {
            entry_type: EntryType::Directory,
            size: children.len() as u64,
            hash: InMemoryFs::hash_of(
                children
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(",")
                    .as_bytes(),
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let fs = InMemoryFs::new();
        fs.write("/private/contacts.json.enc", b"data", true)
            .await
            .unwrap();
        assert_eq!(fs.read("/private/contacts.json.enc").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn missing_path_is_structurally_recognizable() {
        let fs = InMemoryFs::new();
        let err = fs.read("/nope").await.unwrap_err();
        assert!(err.is_path_missing());
    }

    #[tokio::test]
    async fn load_tree_walks_nested_directories() {
        let fs = InMemoryFs::new();
        fs.write("/groups/abc/me", b"key", true).await.unwrap();
        fs.write("/groups/abc/info.json.enc", b"info", true)
            .await
            .unwrap();

        let tree = fs.load_tree("/").await.unwrap();
        let groups = tree.contents.unwrap();
        let abc = groups.get("groups").unwrap().contents.as_ref().unwrap();
        let abc_dir = abc.get("abc").unwrap().contents.as_ref().unwrap();
        assert!(abc_dir.contains_key("me"));
        assert!(abc_dir.contains_key("info.json.enc"));
    }

    #[tokio::test]
    async fn rm_recursive_removes_nonempty_directory() {
        let fs = InMemoryFs::new();
        fs.write("/groups/abc/me", b"key", true).await.unwrap();
        assert!(fs.rm("/groups/abc", false).await.is_err());
        fs.rm("/groups/abc", true).await.unwrap();
        assert!(fs.stat("/groups/abc").await.unwrap_err().is_path_missing());
    }
}
