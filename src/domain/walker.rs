//! Tree walker: deterministic traversal for dumps, tree display and persistence.
//!
//! Children of a node are visited partition by partition in type registration
//! order, and within a partition in attachment order. Two walks over an
//! unchanged store therefore produce identical output.
//!
//! All walks keep their position in an explicit stack, so tree depth is only
//! bounded by memory.

use std::collections::{HashMap, HashSet};
use std::str::Lines;
use std::vec::IntoIter;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use termtree::Tree;
use tracing::{debug, instrument, trace, warn};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{BomNode, Field, FieldReader, FieldWriter, NodeRef};
use crate::domain::root::{BomRoot, ROOT_KEY};
use crate::domain::store::BomStore;

/// Live children of `parent`, in walk order.
///
/// Relations whose node was destroyed are skipped.
pub fn children_in_order(store: &BomStore, parent: &NodeRef) -> Vec<NodeRef> {
    store
        .factory()
        .tags()
        .flat_map(|tag| store.relations().child_refs(parent, tag))
        .filter(|child| {
            let live = store.object(child).is_some();
            if !live {
                warn!("skipping dangling relation {} under {}", child, parent);
            }
            live
        })
        .collect()
}

struct Frame {
    node: NodeRef,
    children: IntoIter<NodeRef>,
}

/// Nodes from the walk root down to the current node, each with its
/// children still to visit.
#[derive(Default)]
struct Path {
    frames: Vec<Frame>,
    members: HashSet<NodeRef>,
}

impl Path {
    fn enter(&mut self, store: &BomStore, node: NodeRef) {
        let children = children_in_order(store, &node).into_iter();
        self.members.insert(node.clone());
        self.frames.push(Frame { node, children });
    }

    fn leave(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.members.remove(&frame.node);
        }
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }

    fn current(&self) -> Option<&NodeRef> {
        self.frames.last().map(|frame| &frame.node)
    }

    /// Next child of the current node; children already on the path are
    /// skipped so cycles end the descent.
    fn next_child(&mut self) -> Option<NodeRef> {
        loop {
            let frame = self.frames.last_mut()?;
            let child = frame.children.next()?;
            if self.members.contains(&child) {
                warn!("cycle detected at {}, not descending", child);
                continue;
            }
            return Some(child);
        }
    }
}

/// Flat CSV dump: one `description,type,depth,parent key` record per node.
#[instrument(level = "debug", skip(store))]
pub fn dump(store: &BomStore, root: &NodeRef) -> String {
    let mut out = String::new();
    if !dump_record(store, root, 0, None, &mut out) {
        return out;
    }

    let mut path = Path::default();
    path.enter(store, root.clone());
    while path.depth() > 0 {
        match path.next_child() {
            Some(child) => {
                if dump_record(store, &child, path.depth(), path.current(), &mut out) {
                    path.enter(store, child);
                }
            }
            None => path.leave(),
        }
    }
    out
}

fn dump_record(
    store: &BomStore,
    node: &NodeRef,
    depth: usize,
    parent: Option<&NodeRef>,
    out: &mut String,
) -> bool {
    let Some(object) = store.object(node) else {
        warn!("cannot dump {}: node no longer exists", node);
        return false;
    };
    trace!("dump {} at depth {}", node, depth);
    let record = [
        csv_field(&object.description()),
        csv_field(node.tag()),
        depth.to_string(),
        csv_field(parent.map(NodeRef::key).unwrap_or_default()),
    ]
    .iter()
    .join(",");
    out.push_str(&record);
    out.push('\n');
    true
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn label(store: &BomStore, node: &NodeRef) -> String {
    store
        .object(node)
        .map(|object| object.description())
        .unwrap_or_else(|| format!("<missing {}>", node))
}

/// Indented tree of node descriptions.
pub fn tree(store: &BomStore, root: &NodeRef) -> Tree<String> {
    let mut top = Tree::new(label(store, root));
    // subtrees of the path below the root, innermost last
    let mut open: Vec<Tree<String>> = Vec::new();
    let mut path = Path::default();
    path.enter(store, root.clone());

    while path.depth() > 0 {
        match path.next_child() {
            Some(child) => {
                open.push(Tree::new(label(store, &child)));
                path.enter(store, child);
            }
            None => {
                path.leave();
                if let Some(done) = open.pop() {
                    match open.last_mut() {
                        Some(parent) => parent.push(done),
                        None => top.push(done),
                    };
                }
            }
        }
    }
    top
}

/// One line of the persistence stream.
///
/// A record without `fields` refers back to a node written earlier in the stream.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    tag: String,
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<Field>>,
    #[serde(default)]
    children: usize,
}

/// Writes the tree below `root` as JSON lines.
#[instrument(level = "debug", skip(store))]
pub fn serialize(store: &BomStore, root: &NodeRef) -> DomainResult<Vec<u8>> {
    let mut writer = StreamWriter::default();
    let mut pending: Vec<IntoIter<NodeRef>> = Vec::new();
    if let Some(children) = writer.write_node(store, root)? {
        pending.push(children.into_iter());
    }
    while let Some(children) = pending.last_mut() {
        let next = children.next();
        match next {
            Some(child) => {
                if let Some(grandchildren) = writer.write_node(store, &child)? {
                    pending.push(grandchildren.into_iter());
                }
            }
            None => {
                pending.pop();
            }
        }
    }
    debug!("serialized {} records", writer.records);
    Ok(writer.out)
}

#[derive(Default)]
struct StreamWriter {
    out: Vec<u8>,
    seen: HashSet<NodeRef>,
    records: usize,
}

impl StreamWriter {
    /// Emits the record of `node` and returns the children to write after it,
    /// or `None` for a reference to a node written earlier.
    fn write_node(
        &mut self,
        store: &BomStore,
        node: &NodeRef,
    ) -> DomainResult<Option<Vec<NodeRef>>> {
        let record_no = self.records + 1;
        let object = store
            .object(node)
            .ok_or_else(|| DomainError::corrupt(record_no, format!("{} no longer exists", node)))?;

        if !self.seen.insert(node.clone()) {
            self.emit(Record {
                tag: node.tag().to_string(),
                key: node.key().to_string(),
                fields: None,
                children: 0,
            })?;
            return Ok(None);
        }

        let children = children_in_order(store, node);
        let mut fields = FieldWriter::new();
        object.write_fields(&mut fields);
        self.emit(Record {
            tag: node.tag().to_string(),
            key: node.key().to_string(),
            fields: Some(fields.into_fields()),
            children: children.len(),
        })?;
        Ok(Some(children))
    }

    fn emit(&mut self, record: Record) -> DomainResult<()> {
        self.records += 1;
        serde_json::to_writer(&mut self.out, &record).map_err(|e| {
            DomainError::corrupt(self.records, format!("cannot encode record: {}", e))
        })?;
        self.out.push(b'\n');
        Ok(())
    }
}

/// Rebuilds a tree written by [`serialize`] below the root of `store`.
///
/// All node types of the stream must be registered in `store`. The first
/// record must be the root; any structural violation aborts with
/// `CorruptStream` naming the offending record. On failure every node and
/// relation restored so far is removed again, leaving `store` as it was.
#[instrument(level = "debug", skip(store, input))]
pub fn deserialize(store: &mut BomStore, input: &[u8]) -> DomainResult<NodeRef> {
    let mut undo = UndoLog::default();
    let result = restore_tree(store, input, &mut undo);
    if let Err(e) = &result {
        debug!(
            "restore failed ({}), removing {} node(s) and {} relation(s)",
            e,
            undo.nodes.len(),
            undo.relations.len()
        );
        undo.roll_back(store);
    }
    result
}

/// Everything a restore added to the store, in order.
#[derive(Default)]
struct UndoLog {
    nodes: Vec<NodeRef>,
    relations: Vec<(NodeRef, NodeRef)>,
}

impl UndoLog {
    fn roll_back(self, store: &mut BomStore) {
        for (parent, child) in self.relations.iter().rev() {
            store.relations_mut().remove_ref(parent, child);
        }
        for node in self.nodes.iter().rev() {
            store.factory_mut().discard(node);
        }
    }
}

/// A restored parent still waiting for `remaining` child records.
struct Pending {
    parent: NodeRef,
    remaining: usize,
}

type Restored = HashMap<(String, String), NodeRef>;

fn restore_tree(store: &mut BomStore, input: &[u8], undo: &mut UndoLog) -> DomainResult<NodeRef> {
    let text = std::str::from_utf8(input)
        .map_err(|e| DomainError::corrupt(0, format!("stream is not valid UTF-8: {}", e)))?;
    let mut reader = StreamReader {
        lines: text.lines(),
        record: 0,
    };

    let head = reader
        .next_record()?
        .ok_or_else(|| DomainError::corrupt(0, "empty stream"))?;
    if head.tag != BomRoot::TYPE_TAG || head.key != ROOT_KEY {
        return Err(DomainError::corrupt(
            reader.record,
            format!("expected root record, found {} '{}'", head.tag, head.key),
        ));
    }
    let fields = head
        .fields
        .as_deref()
        .ok_or_else(|| DomainError::corrupt(reader.record, "root record carries no fields"))?;
    let mut root_fields = FieldReader::new(fields, reader.record);
    BomRoot::load(&mut root_fields)?;
    root_fields.finish()?;

    let root = store.root_ref();
    let mut restored = Restored::new();
    restored.insert((root.tag().to_string(), root.key().to_string()), root.clone());

    let mut pending = vec![Pending {
        parent: root.clone(),
        remaining: head.children,
    }];
    while let Some(frame) = pending.last_mut() {
        if frame.remaining == 0 {
            pending.pop();
            continue;
        }
        let missing = frame.remaining;
        frame.remaining -= 1;
        let parent = frame.parent.clone();

        let record = reader.next_record()?.ok_or_else(|| {
            DomainError::corrupt(
                reader.record,
                format!("stream ends with {} child record(s) of {} missing", missing, parent),
            )
        })?;
        let record_no = reader.record;
        let child = restore_child(store, &record, record_no, &mut restored, undo)?;

        store
            .relations_mut()
            .attach_ref(&parent, &child)
            .map_err(|e| DomainError::corrupt(record_no, e.to_string()))?;
        undo.relations.push((parent, child.clone()));

        if record.fields.is_some() && record.children > 0 {
            pending.push(Pending {
                parent: child,
                remaining: record.children,
            });
        }
    }

    if let Some(extra) = reader.next_record()? {
        return Err(DomainError::corrupt(
            reader.record,
            format!("trailing record {} '{}' after the root subtree", extra.tag, extra.key),
        ));
    }
    debug!("deserialized {} records", reader.record);
    Ok(root)
}

/// Resolves a reference record or creates the node of a full record.
fn restore_child(
    store: &mut BomStore,
    record: &Record,
    record_no: usize,
    restored: &mut Restored,
    undo: &mut UndoLog,
) -> DomainResult<NodeRef> {
    let identity = (record.tag.clone(), record.key.clone());
    let Some(fields) = &record.fields else {
        if record.children != 0 {
            return Err(DomainError::corrupt(record_no, "reference record cannot have children"));
        }
        return restored.get(&identity).cloned().ok_or_else(|| {
            DomainError::corrupt(
                record_no,
                format!("reference to unknown node {} '{}'", record.tag, record.key),
            )
        });
    };

    if restored.contains_key(&identity) {
        return Err(DomainError::corrupt(
            record_no,
            format!("node {} '{}' written twice", record.tag, record.key),
        ));
    }
    let mut input = FieldReader::new(fields, record_no);
    let child = store.factory_mut().restore(&record.tag, &mut input)?;
    undo.nodes.push(child.clone());
    if child.key() != record.key {
        return Err(DomainError::corrupt(
            record_no,
            format!("record key '{}' does not match node key '{}'", record.key, child.key()),
        ));
    }
    restored.insert(identity, child.clone());
    Ok(child)
}

struct StreamReader<'a> {
    lines: Lines<'a>,
    record: usize,
}

impl StreamReader<'_> {
    fn next_record(&mut self) -> DomainResult<Option<Record>> {
        for line in self.lines.by_ref() {
            if line.trim().is_empty() {
                continue;
            }
            self.record += 1;
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| DomainError::corrupt(self.record, format!("malformed record: {}", e)));
        }
        Ok(None)
    }
}
