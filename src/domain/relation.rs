//! Relation index: parent -> ordered children, partitioned by child type.
//!
//! Partitions are keyed by `(parent tag, parent key, child tag)` because keys
//! are only unique within a type. Each partition keeps attachment order and
//! offers O(1) lookup by child key. Entries are arena indices only; the index
//! never owns a node.

use std::collections::HashMap;

use generational_arena::Index;
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::factory::Handle;
use crate::domain::node::{BomNode, NodeRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PartitionKey {
    parent_tag: &'static str,
    parent_key: String,
    child_tag: &'static str,
}

impl PartitionKey {
    fn new(parent: &NodeRef, child_tag: &'static str) -> Self {
        Self {
            parent_tag: parent.tag(),
            parent_key: parent.key().to_string(),
            child_tag,
        }
    }
}

#[derive(Debug, Default)]
pub struct RelationIndex {
    partitions: HashMap<PartitionKey, IndexMap<String, Index>>,
}

impl RelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `child` under `parent` in the partition of `C`.
    ///
    /// The declared type must match the child's actual tag, and the child key
    /// must not be attached to that partition yet.
    #[instrument(level = "trace", skip(self))]
    pub fn attach<C: BomNode>(&mut self, parent: &NodeRef, child: &NodeRef) -> DomainResult<()> {
        if child.tag() != C::TYPE_TAG {
            return Err(DomainError::TypeMismatch {
                expected: C::TYPE_TAG,
                actual: child.tag(),
            });
        }
        self.attach_ref(parent, child)
    }

    pub(crate) fn attach_ref(&mut self, parent: &NodeRef, child: &NodeRef) -> DomainResult<()> {
        let partition = self
            .partitions
            .entry(PartitionKey::new(parent, child.tag()))
            .or_default();
        if partition.contains_key(child.key()) {
            return Err(DomainError::DuplicateRelation {
                parent: parent.to_string(),
                tag: child.tag(),
                key: child.key().to_string(),
            });
        }
        partition.insert(child.key().to_string(), child.index());
        debug!("attach {} under {}", child, parent);
        Ok(())
    }

    /// Drops one relation by erased reference; used to undo a failed restore.
    pub(crate) fn remove_ref(&mut self, parent: &NodeRef, child: &NodeRef) -> bool {
        let partition_key = PartitionKey::new(parent, child.tag());
        let Some(partition) = self.partitions.get_mut(&partition_key) else {
            return false;
        };
        let removed = partition.shift_remove(child.key()).is_some();
        if partition.is_empty() {
            self.partitions.remove(&partition_key);
        }
        removed
    }

    /// Handles of all `T` children of `parent`, in attachment order.
    pub fn children<T: BomNode>(&self, parent: &NodeRef) -> Vec<Handle<T>> {
        self.partition(parent, T::TYPE_TAG)
            .map(|partition| partition.values().map(|&index| Handle::new(index)).collect())
            .unwrap_or_default()
    }

    pub fn find_child<T: BomNode>(&self, parent: &NodeRef, key: &str) -> Option<Handle<T>> {
        self.partition(parent, T::TYPE_TAG)
            .and_then(|partition| partition.get(key))
            .map(|&index| Handle::new(index))
    }

    /// Removes the relation only; the child node stays in its pool.
    #[instrument(level = "trace", skip(self))]
    pub fn detach<T: BomNode>(&mut self, parent: &NodeRef, key: &str) -> DomainResult<Handle<T>> {
        let partition_key = PartitionKey::new(parent, T::TYPE_TAG);
        let not_found = || DomainError::NotFound {
            parent: parent.to_string(),
            tag: T::TYPE_TAG,
            key: key.to_string(),
        };
        let partition = self.partitions.get_mut(&partition_key).ok_or_else(not_found)?;
        let index = partition.shift_remove(key).ok_or_else(not_found)?;
        if partition.is_empty() {
            self.partitions.remove(&partition_key);
        }
        debug!("detach {} '{}' from {}", T::TYPE_TAG, key, parent);
        Ok(Handle::new(index))
    }

    /// Erased children of `parent` with the given tag, in attachment order.
    pub fn child_refs(&self, parent: &NodeRef, tag: &'static str) -> Vec<NodeRef> {
        self.partition(parent, tag)
            .map(|partition| {
                partition
                    .iter()
                    .map(|(key, &index)| NodeRef::new(tag, key.clone(), index))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Child type tags that have at least one child under `parent`.
    pub fn partitions_of(&self, parent: &NodeRef) -> Vec<&'static str> {
        let mut tags: Vec<_> = self
            .partitions
            .iter()
            .filter(|(key, children)| {
                key.parent_tag == parent.tag()
                    && key.parent_key == parent.key()
                    && !children.is_empty()
            })
            .map(|(key, _)| key.child_tag)
            .collect();
        tags.sort_unstable();
        tags
    }

    pub fn child_count(&self, parent: &NodeRef) -> usize {
        self.partitions
            .iter()
            .filter(|(key, _)| key.parent_tag == parent.tag() && key.parent_key == parent.key())
            .map(|(_, children)| children.len())
            .sum()
    }

    /// Total number of relations.
    pub fn len(&self) -> usize {
        self.partitions.values().map(|children| children.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    fn partition(
        &self,
        parent: &NodeRef,
        child_tag: &'static str,
    ) -> Option<&IndexMap<String, Index>> {
        self.partitions.get(&PartitionKey::new(parent, child_tag))
    }
}
