//! Session store: object factory, relation index and the root node.
//!
//! A `BomStore` is single-writer state without internal locking. Share it
//! across threads only behind one lock spanning whole create/attach/detach
//! sequences, e.g. `Mutex<BomStore>`.

use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::factory::{Handle, ObjectFactory};
use crate::domain::node::{BomNode, BomObject, NodeRef};
use crate::domain::relation::RelationIndex;
use crate::domain::root::{BomRoot, ROOT_KEY};

#[derive(Debug)]
pub struct BomStore {
    // Declared before the factory: links are dropped before the nodes they name.
    relations: RelationIndex,
    factory: ObjectFactory,
    root: Handle<BomRoot>,
}

impl Default for BomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BomStore {
    /// Creates a session holding only the root node.
    pub fn new() -> Self {
        let mut factory = ObjectFactory::new();
        let root = Self::insert_root(&mut factory);
        Self {
            relations: RelationIndex::new(),
            factory,
            root,
        }
    }

    fn insert_root(factory: &mut ObjectFactory) -> Handle<BomRoot> {
        // The root pool is registered first, so no other type can claim its tag.
        let pool = factory
            .pool_mut::<BomRoot>()
            .expect("BomRoot tag bound to another type");
        pool.find_handle(&ROOT_KEY.to_string())
            .unwrap_or_else(|| pool.insert(BomRoot::default()))
    }

    pub fn register<T: BomNode>(&mut self) -> DomainResult<()> {
        self.factory.register::<T>()
    }

    #[instrument(level = "trace", skip(self, node))]
    pub fn create<T: BomNode>(&mut self, node: T) -> DomainResult<Handle<T>> {
        self.factory.create(node)
    }

    pub fn find<T: BomNode>(&self, key: &T::Key) -> Option<&T> {
        self.factory.find(key)
    }

    pub fn find_handle<T: BomNode>(&self, key: &T::Key) -> Option<Handle<T>> {
        self.factory.find_handle(key)
    }

    pub fn get<T: BomNode>(&self, handle: Handle<T>) -> Option<&T> {
        self.factory.get(handle)
    }

    pub fn get_mut<T: BomNode>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.factory.get_mut(handle)
    }

    pub fn all_of<T: BomNode>(&self) -> impl Iterator<Item = &T> + '_ {
        self.factory.all_of()
    }

    pub fn node_ref<T: BomNode>(&self, handle: Handle<T>) -> Option<NodeRef> {
        self.factory.node_ref(handle)
    }

    pub fn object(&self, node: &NodeRef) -> Option<&dyn BomObject> {
        self.factory.object(node)
    }

    /// Attaches `child` under `parent` as a `C` child.
    pub fn attach<C: BomNode>(&mut self, parent: &NodeRef, child: &NodeRef) -> DomainResult<()> {
        self.relations.attach::<C>(parent, child)
    }

    /// Typed variant of `attach`; both handles must still be live.
    pub fn link<P: BomNode, C: BomNode>(
        &mut self,
        parent: Handle<P>,
        child: Handle<C>,
    ) -> DomainResult<NodeRef> {
        let parent = self
            .node_ref(parent)
            .ok_or(DomainError::StaleHandle { tag: P::TYPE_TAG })?;
        let child = self
            .node_ref(child)
            .ok_or(DomainError::StaleHandle { tag: C::TYPE_TAG })?;
        self.relations.attach::<C>(&parent, &child)?;
        Ok(child)
    }

    /// Live `T` children of `parent`, in attachment order.
    pub fn children_of<T: BomNode>(&self, parent: &NodeRef) -> Vec<&T> {
        self.relations
            .children::<T>(parent)
            .into_iter()
            .filter_map(|handle| self.factory.get(handle))
            .collect()
    }

    pub fn find_child<T: BomNode>(&self, parent: &NodeRef, key: &T::Key) -> Option<&T> {
        self.relations
            .find_child::<T>(parent, &key.to_string())
            .and_then(|handle| self.factory.get(handle))
    }

    /// Removes the relation; the node itself stays in its pool.
    pub fn detach<T: BomNode>(&mut self, parent: &NodeRef, key: &T::Key) -> DomainResult<()> {
        self.relations.detach::<T>(parent, &key.to_string()).map(|_| ())
    }

    /// Destroys every `T` node. Relations naming them stay behind and resolve to nothing.
    pub fn destroy_all<T: BomNode>(&mut self) {
        self.factory.destroy_all::<T>();
        if T::TYPE_TAG == BomRoot::TYPE_TAG {
            self.root = Self::insert_root(&mut self.factory);
        }
    }

    /// Tears the whole session down and starts over with a fresh root.
    /// Registered types keep their order.
    pub fn clear(&mut self) {
        self.relations.clear();
        self.factory.destroy_everything();
        self.root = Self::insert_root(&mut self.factory);
        debug!("session cleared");
    }

    pub fn root(&self) -> Option<&BomRoot> {
        self.factory.get(self.root)
    }

    pub fn root_handle(&self) -> Handle<BomRoot> {
        self.root
    }

    pub fn root_ref(&self) -> NodeRef {
        NodeRef::new(BomRoot::TYPE_TAG, ROOT_KEY.to_string(), self.root.index())
    }

    pub fn root_child<T: BomNode>(&self, key: &T::Key) -> Option<&T> {
        self.find_child(&self.root_ref(), key)
    }

    pub fn root_children<T: BomNode>(&self) -> Vec<&T> {
        self.children_of(&self.root_ref())
    }

    /// Attaches a node directly under the root.
    pub fn add_to_root<T: BomNode>(&mut self, child: Handle<T>) -> DomainResult<NodeRef> {
        self.link(self.root, child)
    }

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    pub(crate) fn factory_mut(&mut self) -> &mut ObjectFactory {
        &mut self.factory
    }

    pub fn relations(&self) -> &RelationIndex {
        &self.relations
    }

    pub(crate) fn relations_mut(&mut self) -> &mut RelationIndex {
        &mut self.relations
    }
}
