//! Object factory: one arena-backed pool per node type.
//!
//! Pools own their nodes exclusively. Everything else in the crate refers to
//! nodes through generation-checked arena indices, so a handle that outlives
//! its node resolves to `None` instead of dangling.

use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use generational_arena::{Arena, Index};
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{BomNode, BomObject, FieldReader, NodeRef};

/// Typed, non-owning reference to a node in its pool.
pub struct Handle<T> {
    index: Index,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(index: Index) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub(crate) fn index(&self) -> Index {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.index).finish()
    }
}

/// Owning store for every node of one type.
///
/// Iteration follows creation order; key lookups are O(1).
#[derive(Debug)]
pub struct Pool<T: BomNode> {
    arena: Arena<T>,
    keys: IndexMap<T::Key, Index>,
}

impl<T: BomNode> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BomNode> Pool<T> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            keys: IndexMap::new(),
        }
    }

    pub fn create(&mut self, node: T) -> DomainResult<Handle<T>> {
        if self.keys.contains_key(node.key()) {
            return Err(DomainError::DuplicateKey {
                tag: T::TYPE_TAG,
                key: node.key().to_string(),
            });
        }
        debug!("create {} '{}'", T::TYPE_TAG, node.key());
        Ok(self.insert(node))
    }

    // Caller guarantees the key is not taken yet.
    pub(crate) fn insert(&mut self, node: T) -> Handle<T> {
        let key = node.key().clone();
        let index = self.arena.insert(node);
        self.keys.insert(key, index);
        Handle::new(index)
    }

    pub fn find(&self, key: &T::Key) -> Option<&T> {
        self.keys.get(key).and_then(|&index| self.arena.get(index))
    }

    pub fn find_handle(&self, key: &T::Key) -> Option<Handle<T>> {
        self.keys.get(key).map(|&index| Handle::new(index))
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.arena.get(handle.index)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.arena.get_mut(handle.index)
    }

    /// Removes a single node, freeing its key.
    pub(crate) fn remove(&mut self, index: Index) -> Option<T> {
        let node = self.arena.remove(index)?;
        self.keys.shift_remove(node.key());
        Some(node)
    }

    pub fn all_of(&self) -> impl Iterator<Item = &T> + '_ {
        self.keys.values().filter_map(|&index| self.arena.get(index))
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        self.keys.values().map(|&index| Handle::new(index))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drops every node of the pool.
    ///
    /// Nodes are removed one by one so the arena generation moves on and
    /// previously issued handles can never resolve to a later node.
    pub fn destroy_all(&mut self) {
        for (_, index) in self.keys.drain(..) {
            self.arena.remove(index);
        }
        debug!("destroyed {} pool", T::TYPE_TAG);
    }
}

/// Type-erased pool interface used by the factory and the tree walker.
pub(crate) trait ErasedPool {
    fn type_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn object(&self, index: Index) -> Option<&dyn BomObject>;
    fn restore(&mut self, input: &mut FieldReader<'_>) -> DomainResult<NodeRef>;
    fn discard(&mut self, index: Index) -> bool;
    fn destroy_all(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: BomNode> ErasedPool for Pool<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn len(&self) -> usize {
        Pool::len(self)
    }

    fn object(&self, index: Index) -> Option<&dyn BomObject> {
        self.arena.get(index).map(|node| node as &dyn BomObject)
    }

    fn restore(&mut self, input: &mut FieldReader<'_>) -> DomainResult<NodeRef> {
        let node = T::load(input)?;
        input.finish()?;
        let key = node.key().to_string();
        let handle = self.create(node)?;
        Ok(NodeRef::new(T::TYPE_TAG, key, handle.index))
    }

    fn discard(&mut self, index: Index) -> bool {
        self.remove(index).is_some()
    }

    fn destroy_all(&mut self) {
        Pool::destroy_all(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registry of all pools of a session, kept in registration order.
///
/// The registration order is the order in which the tree walker visits the
/// child partitions of a node.
#[derive(Default)]
pub struct ObjectFactory {
    pools: IndexMap<&'static str, Box<dyn ErasedPool>>,
}

impl fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.pools.iter().map(|(tag, pool)| (tag, pool.len())))
            .finish()
    }
}

impl ObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the pool for `T` unless it exists already.
    ///
    /// A tag can only be bound to one Rust type.
    #[instrument(level = "trace", skip(self))]
    pub fn register<T: BomNode>(&mut self) -> DomainResult<()> {
        self.pool_mut::<T>().map(|_| ())
    }

    pub fn is_registered<T: BomNode>(&self) -> bool {
        self.pool::<T>().is_some()
    }

    /// Registered type tags in registration order.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pools.keys().copied()
    }

    pub fn pool<T: BomNode>(&self) -> Option<&Pool<T>> {
        self.pools
            .get(T::TYPE_TAG)
            .and_then(|pool| pool.as_any().downcast_ref::<Pool<T>>())
    }

    pub fn pool_mut<T: BomNode>(&mut self) -> DomainResult<&mut Pool<T>> {
        let pool = self.pools.entry(T::TYPE_TAG).or_insert_with(|| {
            debug!("register pool {} ({})", T::TYPE_TAG, type_name::<T>());
            Box::new(Pool::<T>::new())
        });
        let actual = pool.type_name();
        pool.as_any_mut()
            .downcast_mut::<Pool<T>>()
            .ok_or(DomainError::TypeMismatch {
                expected: type_name::<T>(),
                actual,
            })
    }

    pub fn create<T: BomNode>(&mut self, node: T) -> DomainResult<Handle<T>> {
        self.pool_mut::<T>()?.create(node)
    }

    pub fn find<T: BomNode>(&self, key: &T::Key) -> Option<&T> {
        self.pool::<T>().and_then(|pool| pool.find(key))
    }

    pub fn find_handle<T: BomNode>(&self, key: &T::Key) -> Option<Handle<T>> {
        self.pool::<T>().and_then(|pool| pool.find_handle(key))
    }

    pub fn get<T: BomNode>(&self, handle: Handle<T>) -> Option<&T> {
        self.pool::<T>().and_then(|pool| pool.get(handle))
    }

    pub fn get_mut<T: BomNode>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.pools
            .get_mut(T::TYPE_TAG)
            .and_then(|pool| pool.as_any_mut().downcast_mut::<Pool<T>>())
            .and_then(|pool| pool.get_mut(handle))
    }

    pub fn all_of<T: BomNode>(&self) -> impl Iterator<Item = &T> + '_ {
        self.pool::<T>().into_iter().flat_map(|pool| pool.all_of())
    }

    pub fn node_ref<T: BomNode>(&self, handle: Handle<T>) -> Option<NodeRef> {
        self.get(handle)
            .map(|node| NodeRef::new(T::TYPE_TAG, node.key().to_string(), handle.index))
    }

    /// Resolves an erased reference; `None` if the node no longer exists.
    pub fn object(&self, node: &NodeRef) -> Option<&dyn BomObject> {
        self.pools
            .get(node.tag())
            .and_then(|pool| pool.object(node.index()))
    }

    /// Number of live nodes with the given tag.
    pub fn count(&self, tag: &str) -> usize {
        self.pools.get(tag).map_or(0, |pool| pool.len())
    }

    /// Loads one node of the pool registered under `tag` from the field channel.
    pub(crate) fn restore(
        &mut self,
        tag: &str,
        input: &mut FieldReader<'_>,
    ) -> DomainResult<NodeRef> {
        let record = input.record();
        let pool = self
            .pools
            .get_mut(tag)
            .ok_or_else(|| DomainError::corrupt(record, format!("unknown node type '{}'", tag)))?;
        pool.restore(input)
    }

    /// Drops the node behind `node`; used to undo a failed restore.
    pub(crate) fn discard(&mut self, node: &NodeRef) -> bool {
        self.pools
            .get_mut(node.tag())
            .is_some_and(|pool| pool.discard(node.index()))
    }

    pub fn destroy_all<T: BomNode>(&mut self) {
        if let Some(pool) = self.pools.get_mut(T::TYPE_TAG) {
            pool.destroy_all();
        }
    }

    /// Tears down every pool, keeping their registration.
    pub fn destroy_everything(&mut self) {
        for pool in self.pools.values_mut() {
            pool.destroy_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::FieldWriter;

    #[derive(Debug, Clone, PartialEq)]
    struct Carrier {
        code: String,
    }

    impl BomNode for Carrier {
        type Key = String;
        const TYPE_TAG: &'static str = "Carrier";

        fn key(&self) -> &String {
            &self.code
        }

        fn save(&self, out: &mut FieldWriter) {
            out.write_str(self.code.as_str());
        }

        fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
            Ok(Self {
                code: input.read_str()?,
            })
        }
    }

    // Same tag as Carrier, different Rust type.
    #[derive(Debug)]
    struct Impostor(String);

    impl BomNode for Impostor {
        type Key = String;
        const TYPE_TAG: &'static str = "Carrier";

        fn key(&self) -> &String {
            &self.0
        }

        fn save(&self, _out: &mut FieldWriter) {}

        fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
            Ok(Self(input.read_str()?))
        }
    }

    fn carrier(code: &str) -> Carrier {
        Carrier { code: code.into() }
    }

    #[test]
    fn pool_iterates_in_creation_order() {
        let mut pool = Pool::new();
        for code in ["BA", "AF", "LH"] {
            pool.create(carrier(code)).unwrap();
        }
        let codes: Vec<_> = pool.all_of().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["BA", "AF", "LH"]);
    }

    #[test]
    fn destroyed_handles_never_resolve_to_new_nodes() {
        let mut pool = Pool::new();
        let old = pool.create(carrier("BA")).unwrap();
        pool.destroy_all();

        let new = pool.create(carrier("BA")).unwrap();
        assert!(pool.get(old).is_none());
        assert_eq!(pool.get(new), Some(&carrier("BA")));
    }

    #[test]
    fn factory_rejects_second_type_under_same_tag() {
        let mut factory = ObjectFactory::new();
        factory.register::<Carrier>().unwrap();

        let err = factory.register::<Impostor>().unwrap_err();
        assert!(matches!(err, DomainError::TypeMismatch { .. }));
        assert!(factory.find::<Impostor>(&"BA".to_string()).is_none());
    }

    #[test]
    fn factory_creates_pools_lazily() {
        let mut factory = ObjectFactory::new();
        assert!(!factory.is_registered::<Carrier>());

        factory.create(carrier("AF")).unwrap();
        assert!(factory.is_registered::<Carrier>());
        assert_eq!(factory.count("Carrier"), 1);
    }

    #[test]
    fn discarded_node_frees_its_key() {
        let mut factory = ObjectFactory::new();
        let handle = factory.create(carrier("BA")).unwrap();
        let node = factory.node_ref(handle).unwrap();

        assert!(factory.discard(&node));
        assert!(!factory.discard(&node));
        assert!(factory.find::<Carrier>(&"BA".to_string()).is_none());
        assert!(factory.create(carrier("BA")).is_ok());
    }
}
