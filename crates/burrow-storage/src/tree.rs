//! B+tree structural operations over one table file.
//!
//! A [`Table`] owns the tree rooted in its file: page 0 is the meta node,
//! every other page is an internal, leaf, or data node. Leaves hold
//! fixed-length record slots in ascending key order and are linked through
//! their header `link` field into one ascending chain across the table.
//! Internal nodes hold `(child, separator)` entries where the separator is
//! the largest key reachable through that child, plus a right pointer
//! covering everything greater; descent picks the first entry whose
//! separator is >= the key and falls back to the right pointer.
//!
//! Every public operation serializes against the table's operation lock,
//! so concurrent connections cannot interleave pin/mutate/unpin sequences
//! on the same table.

use crate::node::{self, meta, ChainStats, CELL_HEADER_SIZE, IDX_CELL_SIZE, NODE_CAPACITY};
use crate::pager::{PageRef, Pager};
use crate::record::{
    self, decode_key_slot, encode_row, OverflowPtr, Record, Schema, StoredField,
};
use burrow_common::page::{NodeKind, PageId};
use burrow_common::{BurrowError, Result, Value};
use bytes::Bytes;
use parking_lot::ReentrantMutex;
use std::cmp::Ordering;
use std::sync::Arc;

/// Upper bound on tree depth; a descent longer than this means a cycle in
/// the file, not a deep tree.
const MAX_DEPTH: usize = 16;

/// Bytes of slotted overhead per entry or record cell.
const CELL_OVERHEAD: usize = CELL_HEADER_SIZE + IDX_CELL_SIZE;

/// One internal-node entry: child pointer plus its inline-encoded
/// separator, kept in serialized form while shuffling entries around.
struct Entry {
    child: u32,
    sep: Bytes,
}

impl Entry {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.sep.len());
        buf.extend_from_slice(&self.child.to_le_bytes());
        buf.extend_from_slice(&self.sep);
        buf
    }

    fn decode(payload: &[u8]) -> Result<Entry> {
        if payload.len() < 5 {
            return Err(BurrowError::CorruptNode {
                page_no: 0,
                reason: "internal entry too short".to_string(),
            });
        }
        Ok(Entry {
            child: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
            sep: Bytes::copy_from_slice(&payload[4..]),
        })
    }

    fn sep_value(&self) -> Result<Value> {
        Ok(record::decode_value(&self.sep)?.0)
    }
}

/// Where a new record lands in a leaf's slot array.
enum LeafPos {
    /// Reuse the hole at this slot; order is preserved.
    FillHole(u16),
    /// Insert a fresh idxcell at this position, shifting higher slots.
    InsertAt(u16),
}

/// One open table: schema, file identity, and the tree algorithms.
pub struct Table {
    name: String,
    file_id: u32,
    schema: Schema,
    pager: Arc<Pager>,
    /// Serializes every pin/mutate/unpin sequence on this table.
    /// Reentrant so composite operations can call the locked accessors.
    op_lock: ReentrantMutex<()>,
}

impl Table {
    /// Creates a new table: its file, meta node, and an empty root leaf.
    pub(crate) fn create(pager: Arc<Pager>, name: &str, schema: Schema) -> Result<Table> {
        let record_size = schema.record_size();
        // A leaf must hold at least two records or splitting cannot halve it.
        if 2 * (record_size + CELL_OVERHEAD) > NODE_CAPACITY {
            return Err(BurrowError::RecordTooLarge {
                size: record_size,
                max: NODE_CAPACITY / 2 - CELL_OVERHEAD,
            });
        }
        let blob = schema.encode();
        if blob.len() > meta::SCHEMA_MAX {
            return Err(BurrowError::SchemaTooLarge {
                size: blob.len(),
                max: meta::SCHEMA_MAX,
            });
        }

        let file_id = pager.store().create_table(name)?;
        {
            let meta_page = pager.allocate(file_id)?;
            let mut data = meta_page.write();
            meta::init(&mut data[..], &blob)?;
        }
        let root_no = {
            let root = pager.allocate(file_id)?;
            let mut data = root.write();
            node::init(&mut data[..], NodeKind::Leaf);
            root.page_no()
        };
        let table = Table {
            name: name.to_string(),
            file_id,
            schema,
            pager,
            op_lock: ReentrantMutex::new(()),
        };
        let mut m = table.read_meta()?;
        m.root = root_no;
        m.last_leaf = root_no;
        table.write_meta(&m)?;
        Ok(table)
    }

    /// Opens an existing table, loading its schema from the meta node.
    pub(crate) fn open(pager: Arc<Pager>, name: &str) -> Result<Table> {
        let file_id = pager.store().open_table(name)?;
        let schema = {
            let meta_page = pager.get(PageId::new(file_id, 0))?;
            let data = meta_page.read();
            meta::read(&data[..])?;
            Schema::decode(meta::schema_bytes(&data[..]))?
        };
        Ok(Table {
            name: name.to_string(),
            file_id,
            schema,
            pager,
            op_lock: ReentrantMutex::new(()),
        })
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the file ID backing this table.
    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Reserves and returns the next auto-increment key value.
    pub fn next_auto_key(&self) -> Result<u64> {
        let _g = self.op_lock.lock();
        let mut m = self.read_meta()?;
        m.auto_key += 1;
        let key = m.auto_key;
        self.write_meta(&m)?;
        Ok(key)
    }

    // =========================================================================
    // Page and meta access
    // =========================================================================

    fn page(&self, page_no: u32) -> Result<PageRef<'_>> {
        self.pager.get(PageId::new(self.file_id, page_no))
    }

    pub(crate) fn read_meta(&self) -> Result<meta::Meta> {
        let _g = self.op_lock.lock();
        let page = self.page(0)?;
        let data = page.read();
        meta::read(&data[..])
    }

    fn write_meta(&self, m: &meta::Meta) -> Result<()> {
        let page = self.page(0)?;
        let mut data = page.write();
        meta::write(&mut data[..], m);
        Ok(())
    }

    /// Materializes the cached largest key, reading its overflow bytes for
    /// text keys.
    pub(crate) fn max_key_value(&self, m: &meta::Meta) -> Result<Option<Value>> {
        let _g = self.op_lock.lock();
        let value = match m.max_key {
            None => return Ok(None),
            Some(meta::MaxKey::Boolean(b)) => Value::Boolean(b),
            Some(meta::MaxKey::Integer(v)) => Value::Integer(v),
            Some(meta::MaxKey::Float(v)) => Value::Float(v),
            Some(meta::MaxKey::Text(ptr)) => Value::Text(self.read_chain(ptr)?),
        };
        Ok(Some(value))
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Picks the child of an internal node for a key: the first entry whose
    /// separator is >= the key, else the right pointer.
    fn pick_child(&self, data: &[u8], key: &Value) -> Result<u32> {
        for slot in 0..node::idx_count(data) {
            let entry = Entry::decode(node::cell_payload(data, slot))?;
            let sep = entry.sep_value()?;
            if key.compare(&sep)? != Ordering::Greater {
                return Ok(entry.child);
            }
        }
        let right = node::link(data);
        if right == 0 {
            return Err(BurrowError::CorruptNode {
                page_no: 0,
                reason: "internal node without right pointer".to_string(),
            });
        }
        Ok(right)
    }

    /// Descends from the root to the leaf owning `key`, returning the leaf
    /// page and the internal pages walked through, root first.
    pub(crate) fn locate_leaf(&self, key: &Value) -> Result<(u32, Vec<u32>)> {
        let _g = self.op_lock.lock();
        let m = self.read_meta()?;
        let mut path = Vec::new();
        let mut current = m.root;

        for _ in 0..MAX_DEPTH {
            let page = self.page(current)?;
            let data = page.read();
            match node::kind(&data[..])? {
                NodeKind::Leaf => return Ok((current, path)),
                NodeKind::Internal => {
                    let child = self.pick_child(&data[..], key)?;
                    path.push(current);
                    current = child;
                }
                other => {
                    return Err(BurrowError::CorruptNode {
                        page_no: current,
                        reason: format!("{} node in tree descent", other),
                    })
                }
            }
        }
        Err(BurrowError::CorruptNode {
            page_no: current,
            reason: "tree deeper than MAX_DEPTH".to_string(),
        })
    }

    /// Returns the leftmost leaf of the table.
    pub(crate) fn leftmost_leaf(&self) -> Result<u32> {
        let _g = self.op_lock.lock();
        let m = self.read_meta()?;
        let mut current = m.root;

        for _ in 0..MAX_DEPTH {
            let page = self.page(current)?;
            let data = page.read();
            match node::kind(&data[..])? {
                NodeKind::Leaf => return Ok(current),
                NodeKind::Internal => {
                    current = if node::idx_count(&data[..]) > 0 {
                        Entry::decode(node::cell_payload(&data[..], 0))?.child
                    } else {
                        node::link(&data[..])
                    };
                }
                other => {
                    return Err(BurrowError::CorruptNode {
                        page_no: current,
                        reason: format!("{} node in tree descent", other),
                    })
                }
            }
        }
        Err(BurrowError::CorruptNode {
            page_no: current,
            reason: "tree deeper than MAX_DEPTH".to_string(),
        })
    }

    // =========================================================================
    // Leaf record access
    // =========================================================================

    /// Decodes the key of a live leaf record, materializing text keys.
    fn stored_key_value(&self, leaf_data: &[u8], slot: u16) -> Result<Value> {
        let payload = node::cell_payload(leaf_data, slot);
        match decode_key_slot(&self.schema, payload)? {
            StoredField::Boolean(b) => Ok(Value::Boolean(b)),
            StoredField::Integer(v) => Ok(Value::Integer(v)),
            StoredField::Float(v) => Ok(Value::Float(v)),
            StoredField::Text(ptr) => Ok(Value::Text(self.read_chain(ptr)?)),
            StoredField::Null => Err(BurrowError::CorruptNode {
                page_no: 0,
                reason: "record with null key".to_string(),
            }),
        }
    }

    /// Reads the record at a leaf slot, or None for holes.
    pub(crate) fn read_record(&self, leaf_no: u32, slot: u16) -> Result<Option<Record>> {
        let _g = self.op_lock.lock();
        let page = self.page(leaf_no)?;
        let data = page.read();
        if !node::is_live(&data[..], slot) {
            return Ok(None);
        }
        let fields = record::decode_row(&self.schema, node::cell_payload(&data[..], slot))?;

        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            values.push(match field {
                StoredField::Null => Value::Null,
                StoredField::Boolean(b) => Value::Boolean(b),
                StoredField::Integer(v) => Value::Integer(v),
                StoredField::Float(v) => Value::Float(v),
                StoredField::Text(ptr) => Value::Text(self.read_chain(ptr)?),
            });
        }
        Ok(Some(Record::new(values)))
    }

    /// Returns (idxcell count, next-leaf link, live record count) of a leaf.
    pub(crate) fn leaf_info(&self, leaf_no: u32) -> Result<(u16, u32, u16)> {
        let _g = self.op_lock.lock();
        let page = self.page(leaf_no)?;
        let data = page.read();
        Ok((
            node::idx_count(&data[..]),
            node::link(&data[..]),
            node::live_count(&data[..]),
        ))
    }

    /// Returns the first live slot at or after `from`, if any.
    pub(crate) fn first_live_slot(&self, leaf_no: u32, from: u16) -> Result<Option<u16>> {
        let _g = self.op_lock.lock();
        let page = self.page(leaf_no)?;
        let data = page.read();
        Ok((from..node::idx_count(&data[..])).find(|&s| node::is_live(&data[..], s)))
    }

    // =========================================================================
    // Insert
    // =========================================================================

    fn validate_record(&self, record: &Record) -> Result<()> {
        let fields = self.schema.fields();
        if record.values.len() != fields.len() {
            return Err(BurrowError::TypeMismatch {
                expected: format!("{} columns", fields.len()),
                actual: format!("{} columns", record.values.len()),
            });
        }
        for (i, (value, field)) in record.values.iter().zip(fields).enumerate() {
            if value.is_null() {
                if i == self.schema.key_index() {
                    return Err(BurrowError::InvalidKey("key must not be null".to_string()));
                }
                continue;
            }
            if value.type_id() != field.type_id {
                return Err(BurrowError::TypeMismatch {
                    expected: field.type_id.to_string(),
                    actual: value.type_id().to_string(),
                });
            }
        }

        // Separator keys travel inline through internal nodes; a key too
        // large to share a split internal node cannot be indexed.
        let key = record.key(&self.schema);
        let inline = record::encode_value(key)?;
        if 2 * (4 + inline.len() + CELL_OVERHEAD) > NODE_CAPACITY {
            return Err(BurrowError::InvalidKey(format!(
                "key of {} bytes too large to index",
                inline.len()
            )));
        }
        Ok(())
    }

    /// Finds the ordered position for a key among a leaf's live slots.
    ///
    /// Live slots are kept in ascending key order, so a binary search over
    /// them yields the insertion point; an equal key is a duplicate and a
    /// hard error. Holes adjacent to the insertion point are reused so
    /// deletes keep paying for themselves.
    fn leaf_insert_pos(&self, data: &[u8], key: &Value) -> Result<LeafPos> {
        let count = node::idx_count(data);
        let occupied: Vec<u16> = (0..count).filter(|&s| node::is_live(data, s)).collect();

        let mut lo = 0usize;
        let mut hi = occupied.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let stored = self.stored_key_value(data, occupied[mid])?;
            match key.compare(&stored)? {
                Ordering::Equal => return Err(BurrowError::DuplicateKey),
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
            }
        }

        let start = if lo == 0 { 0 } else { occupied[lo - 1] + 1 };
        let end = occupied.get(lo).copied().unwrap_or(count);
        for hole in start..end {
            if !node::is_live(data, hole) {
                return Ok(LeafPos::FillHole(hole));
            }
        }
        Ok(LeafPos::InsertAt(end))
    }

    /// Inserts a record, splitting the target leaf first when it is full.
    pub fn insert(&self, record: &Record) -> Result<()> {
        let _g = self.op_lock.lock();
        self.validate_record(record)?;
        let key = record.key(&self.schema).clone();

        // Right-append fast path: a key above the cached maximum goes
        // straight to the most recently written leaf, provided that leaf is
        // still the rightmost one (a later mid-table insert may have moved
        // the cache off the right edge, which counts as a miss).
        let m = self.read_meta()?;
        let beyond_max = match self.max_key_value(&m)? {
            Some(max) => key.compare(&max)? == Ordering::Greater,
            None => false,
        };
        let mut fast_leaf = if beyond_max && m.last_leaf != 0 {
            Some(m.last_leaf)
        } else {
            None
        };
        if let Some(leaf) = fast_leaf {
            let (_, link, _) = self.leaf_info(leaf)?;
            if link != 0 {
                fast_leaf = None;
            }
        }
        let leaf_no = match fast_leaf {
            Some(leaf) => leaf,
            None => self.locate_leaf(&key)?.0,
        };

        if self.try_insert_leaf(leaf_no, record, &key)? {
            return Ok(());
        }

        // Leaf is full: take the slow path with a full parent chain.
        let (leaf_no, path) = self.locate_leaf(&key)?;
        self.split_leaf(leaf_no, &path)?;

        let (leaf_no, _) = self.locate_leaf(&key)?;
        if self.try_insert_leaf(leaf_no, record, &key)? {
            return Ok(());
        }
        Err(BurrowError::CorruptNode {
            page_no: leaf_no,
            reason: "record does not fit a freshly split leaf".to_string(),
        })
    }

    /// Attempts the insert into one leaf; false means the leaf is full.
    fn try_insert_leaf(&self, leaf_no: u32, record: &Record, key: &Value) -> Result<bool> {
        let record_size = self.schema.record_size();
        let page = self.page(leaf_no)?;

        let pos = {
            let data = page.read();
            let pos = self.leaf_insert_pos(&data[..], key)?;
            let fits = match pos {
                LeafPos::FillHole(_) => node::can_fit(&data[..], record_size, false),
                LeafPos::InsertAt(_) => node::can_fit(&data[..], record_size, true),
            };
            if !fits {
                return Ok(false);
            }
            pos
        };

        // Write overflow chains before the record that points into them.
        let stored = self.build_stored_fields(&page, record)?;
        let bytes = encode_row(&self.schema, &stored)?;

        {
            let mut data = page.write();
            match pos {
                LeafPos::FillHole(slot) => node::fill_hole_at(&mut data[..], slot, &bytes),
                LeafPos::InsertAt(slot) => node::insert_cell_at(&mut data[..], slot, &bytes),
            }
        }

        self.update_meta_after_insert(leaf_no, key, &stored)?;
        Ok(true)
    }

    /// Converts a record's values to stored fields, writing text values
    /// into the leaf's overflow chain.
    fn build_stored_fields(&self, leaf: &PageRef<'_>, record: &Record) -> Result<Vec<StoredField>> {
        let mut stored = Vec::with_capacity(record.values.len());
        for value in &record.values {
            stored.push(match value {
                Value::Null => StoredField::Null,
                Value::Boolean(b) => StoredField::Boolean(*b),
                Value::Integer(v) => StoredField::Integer(*v),
                Value::Float(v) => StoredField::Float(*v),
                Value::Text(s) => StoredField::Text(self.write_chain(leaf, s)?),
            });
        }
        Ok(stored)
    }

    /// Reads the stored key of the last live record in the rightmost leaf.
    ///
    /// The rightmost leaf owns every key above the largest separator, so
    /// its last live record is the table's true maximum. Returns None when
    /// that leaf holds no live records.
    fn rightmost_live_key(&self) -> Result<Option<StoredField>> {
        let m = self.read_meta()?;
        let mut current = m.root;

        for _ in 0..MAX_DEPTH {
            let page = self.page(current)?;
            let data = page.read();
            match node::kind(&data[..])? {
                NodeKind::Leaf => {
                    for slot in (0..node::idx_count(&data[..])).rev() {
                        if node::is_live(&data[..], slot) {
                            let stored =
                                decode_key_slot(&self.schema, node::cell_payload(&data[..], slot))?;
                            return Ok(Some(stored));
                        }
                    }
                    return Ok(None);
                }
                NodeKind::Internal => current = node::link(&data[..]),
                other => {
                    return Err(BurrowError::CorruptNode {
                        page_no: current,
                        reason: format!("{} node in tree descent", other),
                    })
                }
            }
        }
        Err(BurrowError::CorruptNode {
            page_no: current,
            reason: "tree deeper than MAX_DEPTH".to_string(),
        })
    }

    fn update_meta_after_insert(
        &self,
        leaf_no: u32,
        key: &Value,
        stored: &[StoredField],
    ) -> Result<()> {
        let mut m = self.read_meta()?;
        m.last_leaf = leaf_no;

        match self.max_key_value(&m)? {
            Some(max) => {
                if key.compare(&max)? == Ordering::Greater {
                    m.max_key = match (key, stored[self.schema.key_index()]) {
                        (Value::Text(_), StoredField::Text(ptr)) => Some(meta::MaxKey::Text(ptr)),
                        (other, _) => meta::MaxKey::from_value(other),
                    };
                }
            }
            None => {
                // Cache miss: first insert, or the old maximum was deleted.
                // The inserted key alone cannot be trusted here (records
                // above it may still sit in interior leaves), so recompute
                // from the rightmost leaf. An empty rightmost leaf leaves
                // the cache unset.
                m.max_key = match self.rightmost_live_key()? {
                    Some(StoredField::Boolean(b)) => Some(meta::MaxKey::Boolean(b)),
                    Some(StoredField::Integer(v)) => Some(meta::MaxKey::Integer(v)),
                    Some(StoredField::Float(v)) => Some(meta::MaxKey::Float(v)),
                    Some(StoredField::Text(ptr)) => Some(meta::MaxKey::Text(ptr)),
                    Some(StoredField::Null) | None => None,
                };
            }
        }
        self.write_meta(&m)
    }

    // =========================================================================
    // Splits
    // =========================================================================

    /// Splits a full leaf: the lower half stays put, the upper half moves
    /// to a new right sibling, and the parent gains a pointer to the left
    /// half under the mid key.
    fn split_leaf(&self, leaf_no: u32, path: &[u32]) -> Result<()> {
        let (payloads, next_leaf, chain) = {
            let page = self.page(leaf_no)?;
            let data = page.read();
            let mut payloads = Vec::new();
            for slot in 0..node::idx_count(&data[..]) {
                if node::is_live(&data[..], slot) {
                    payloads.push(node::cell_payload(&data[..], slot).to_vec());
                }
            }
            (payloads, node::link(&data[..]), node::chain_head(&data[..]))
        };

        let n = payloads.len();
        if n < 2 {
            return Err(BurrowError::CorruptNode {
                page_no: leaf_no,
                reason: "split of a leaf with fewer than two records".to_string(),
            });
        }
        let mid = n / 2;

        // Separator: the largest key staying in the left half. Read it
        // before the rebuild while its overflow bytes are still reachable.
        let mid_key = match decode_key_slot(&self.schema, &payloads[mid - 1])? {
            StoredField::Boolean(b) => Value::Boolean(b),
            StoredField::Integer(v) => Value::Integer(v),
            StoredField::Float(v) => Value::Float(v),
            StoredField::Text(ptr) => Value::Text(self.read_chain(ptr)?),
            StoredField::Null => {
                return Err(BurrowError::CorruptNode {
                    page_no: leaf_no,
                    reason: "record with null key".to_string(),
                })
            }
        };
        let sep = record::encode_value(&mid_key)?;

        let right_no = {
            let right = self.pager.allocate(self.file_id)?;
            let mut data = right.write();
            node::init(&mut data[..], NodeKind::Leaf);
            for payload in &payloads[mid..] {
                node::append_cell(&mut data[..], payload);
            }
            node::set_link(&mut data[..], next_leaf);
            right.page_no()
        };

        {
            let page = self.page(leaf_no)?;
            let mut data = page.write();
            node::init(&mut data[..], NodeKind::Leaf);
            for payload in &payloads[..mid] {
                node::append_cell(&mut data[..], payload);
            }
            node::set_link(&mut data[..], right_no);
            node::set_chain_head(&mut data[..], chain);
        }

        // The most recently written leaf is now the right half.
        let mut m = self.read_meta()?;
        if m.last_leaf == leaf_no {
            m.last_leaf = right_no;
            self.write_meta(&m)?;
        }

        self.update_parent(path, leaf_no, right_no, sep)
    }

    /// Installs a split's new sibling into the parent chain: the entry that
    /// pointed at the split node is repointed at the right half (its
    /// separator still holds) and a new `(left, mid)` entry lands before
    /// it. A parent overflowing in turn splits the same way, recursively,
    /// up to a new root.
    fn update_parent(
        &self,
        path: &[u32],
        left_no: u32,
        right_no: u32,
        sep: Bytes,
    ) -> Result<()> {
        let Some((&parent_no, rest)) = path.split_last() else {
            return self.grow_root(left_no, right_no, sep);
        };

        let new_payload = Entry {
            child: left_no,
            sep: sep.clone(),
        }
        .encode();

        // Fit case: patch the parent in place. The entry that pointed at
        // the split node keeps its separator but is repointed at the right
        // half, and the new (left, mid) entry slides in just before it.
        {
            let page = self.page(parent_no)?;
            let fits = {
                let data = page.read();
                node::can_fit(&data[..], new_payload.len(), true)
            };
            if fits {
                let mut data = page.write();
                let count = node::idx_count(&data[..]);
                if node::link(&data[..]) == left_no {
                    node::set_link(&mut data[..], right_no);
                    node::insert_cell_at(&mut data[..], count, &new_payload);
                } else {
                    let mut pos = None;
                    for slot in 0..count {
                        if Entry::decode(node::cell_payload(&data[..], slot))?.child == left_no {
                            pos = Some(slot);
                            break;
                        }
                    }
                    let pos = pos.ok_or(BurrowError::CorruptNode {
                        page_no: parent_no,
                        reason: "split child missing from parent".to_string(),
                    })?;
                    node::cell_payload_mut(&mut data[..], pos)[..4]
                        .copy_from_slice(&right_no.to_le_bytes());
                    node::insert_cell_at(&mut data[..], pos, &new_payload);
                }
                return Ok(());
            }
        }

        // Overflow: load the parent's entries, apply the repoint + insert
        // in memory, and split the result across two nodes.
        let (mut entries, mut right_ptr) = {
            let page = self.page(parent_no)?;
            let data = page.read();
            let mut entries = Vec::new();
            for slot in 0..node::idx_count(&data[..]) {
                entries.push(Entry::decode(node::cell_payload(&data[..], slot))?);
            }
            (entries, node::link(&data[..]))
        };

        let new_entry = Entry {
            child: left_no,
            sep,
        };
        if right_ptr == left_no {
            right_ptr = right_no;
            entries.push(new_entry);
        } else {
            let pos = entries
                .iter()
                .position(|e| e.child == left_no)
                .ok_or(BurrowError::CorruptNode {
                    page_no: parent_no,
                    reason: "split child missing from parent".to_string(),
                })?;
            entries[pos].child = right_no;
            entries.insert(pos, new_entry);
        }

        // The middle entry's child becomes the left half's right pointer
        // and its separator is promoted.
        let n = entries.len();
        let mid = n / 2;
        let promoted = entries[mid].sep.clone();
        let left_right_ptr = entries[mid].child;

        let new_parent_no = {
            let new_parent = self.pager.allocate(self.file_id)?;
            let mut data = new_parent.write();
            node::init(&mut data[..], NodeKind::Internal);
            for entry in &entries[mid + 1..] {
                node::append_cell(&mut data[..], &entry.encode());
            }
            node::set_link(&mut data[..], right_ptr);
            new_parent.page_no()
        };

        {
            let page = self.page(parent_no)?;
            let mut data = page.write();
            node::init(&mut data[..], NodeKind::Internal);
            for entry in &entries[..mid] {
                node::append_cell(&mut data[..], &entry.encode());
            }
            node::set_link(&mut data[..], left_right_ptr);
        }

        self.update_parent(rest, parent_no, new_parent_no, promoted)
    }

    /// Root split: a new root internal node takes the old root as its only
    /// entry and the new sibling as its right pointer. This is the only
    /// way the tree grows in depth.
    fn grow_root(&self, left_no: u32, right_no: u32, sep: Bytes) -> Result<()> {
        let new_root_no = {
            let new_root = self.pager.allocate(self.file_id)?;
            let mut data = new_root.write();
            node::init(&mut data[..], NodeKind::Internal);
            let entry = Entry {
                child: left_no,
                sep,
            };
            node::append_cell(&mut data[..], &entry.encode());
            node::set_link(&mut data[..], right_no);
            new_root.page_no()
        };

        let mut m = self.read_meta()?;
        m.root = new_root_no;
        self.write_meta(&m)
    }

    // =========================================================================
    // Delete / update
    // =========================================================================

    /// Deletes the record at a leaf slot: its overflow chains are released
    /// and the slot becomes a hole. Returns false for an already-dead slot.
    pub(crate) fn delete_at(&self, leaf_no: u32, slot: u16) -> Result<bool> {
        let _g = self.op_lock.lock();

        let (fields, key) = {
            let page = self.page(leaf_no)?;
            let data = page.read();
            if !node::is_live(&data[..], slot) {
                return Ok(false);
            }
            let fields = record::decode_row(&self.schema, node::cell_payload(&data[..], slot))?;
            let key = self.stored_key_value(&data[..], slot)?;
            (fields, key)
        };

        // Materialize the cached maximum before releasing anything: for a
        // text key the cache points into the chain about to be freed.
        let m = self.read_meta()?;
        let max_value = self.max_key_value(&m)?;

        for field in &fields {
            if let StoredField::Text(ptr) = field {
                self.free_chain(*ptr)?;
            }
        }

        {
            let page = self.page(leaf_no)?;
            let mut data = page.write();
            node::free_cell_keep(&mut data[..], slot);
        }

        // A deleted maximum would leave the cache pointing at freed bytes;
        // drop it and let the next insert fall back to full traversal.
        if let Some(max) = max_value {
            if key.compare(&max)? == Ordering::Equal {
                let mut m = m;
                m.max_key = None;
                self.write_meta(&m)?;
            }
        }
        Ok(true)
    }

    /// Rewrites named fields of the record at a leaf slot in place.
    ///
    /// Changed text fields free their old chain and write a new one; the
    /// key field cannot be updated (it would reorder the tree).
    pub(crate) fn update_at(
        &self,
        leaf_no: u32,
        slot: u16,
        changes: &[(usize, Value)],
    ) -> Result<bool> {
        let _g = self.op_lock.lock();

        for (index, value) in changes {
            if *index == self.schema.key_index() {
                return Err(BurrowError::InvalidKey(
                    "key column cannot be updated in place".to_string(),
                ));
            }
            let field = &self.schema.fields()[*index];
            if !value.is_null() && value.type_id() != field.type_id {
                return Err(BurrowError::TypeMismatch {
                    expected: field.type_id.to_string(),
                    actual: value.type_id().to_string(),
                });
            }
        }

        let page = self.page(leaf_no)?;
        let mut fields = {
            let data = page.read();
            if !node::is_live(&data[..], slot) {
                return Ok(false);
            }
            record::decode_row(&self.schema, node::cell_payload(&data[..], slot))?
        };

        for (index, value) in changes {
            if let StoredField::Text(old_ptr) = fields[*index] {
                self.free_chain(old_ptr)?;
            }
            fields[*index] = match value {
                Value::Null => StoredField::Null,
                Value::Boolean(b) => StoredField::Boolean(*b),
                Value::Integer(v) => StoredField::Integer(*v),
                Value::Float(v) => StoredField::Float(*v),
                Value::Text(s) => StoredField::Text(self.write_chain(&page, s)?),
            };
        }

        let bytes = encode_row(&self.schema, &fields)?;
        {
            let mut data = page.write();
            node::cell_payload_mut(&mut data[..], slot).copy_from_slice(&bytes);
        }
        Ok(true)
    }

    // =========================================================================
    // Overflow chains
    // =========================================================================

    /// Writes a string into the leaf's overflow chain, returning the
    /// location of its first fragment.
    ///
    /// The chain head is created lazily; fragments go to the chain's tail
    /// node, spilling into freshly allocated chained data nodes whenever
    /// the tail lacks room for at least one byte plus its slot overhead.
    fn write_chain(&self, leaf: &PageRef<'_>, s: &str) -> Result<OverflowPtr> {
        let bytes = s.as_bytes();
        if bytes.is_empty() {
            return Ok(OverflowPtr::EMPTY);
        }

        let mut head = {
            let data = leaf.read();
            node::chain_head(&data[..])
        };
        if head == 0 {
            let fresh = self.pager.allocate(self.file_id)?;
            {
                let mut data = fresh.write();
                node::init(&mut data[..], NodeKind::Data);
            }
            head = fresh.page_no();
            let mut data = leaf.write();
            node::set_chain_head(&mut data[..], head);
        }

        // Find the chain's tail node.
        let mut tail_no = head;
        loop {
            let page = self.page(tail_no)?;
            let data = page.read();
            let next = node::link(&data[..]);
            if next == 0 {
                break;
            }
            tail_no = next;
        }

        let mut remaining = bytes;
        let mut first: Option<(u32, u16)> = None;
        let mut prev: Option<(u32, u16)> = None;

        while !remaining.is_empty() {
            let page = self.page(tail_no)?;
            let (space, reuse_slot) = {
                let data = page.read();
                (node::free_space(&data[..]), node::has_free_slot(&data[..]))
            };
            let overhead = CELL_HEADER_SIZE + if reuse_slot { 0 } else { IDX_CELL_SIZE };

            if space < overhead + 1 {
                let next = self.pager.allocate(self.file_id)?;
                {
                    let mut data = next.write();
                    node::init(&mut data[..], NodeKind::Data);
                }
                {
                    let mut data = page.write();
                    node::set_link(&mut data[..], next.page_no());
                }
                tail_no = next.page_no();
                continue;
            }

            let take = remaining.len().min(space - overhead);
            let slot = {
                let mut data = page.write();
                node::append_cell(&mut data[..], &remaining[..take])
            };
            remaining = &remaining[take..];

            if first.is_none() {
                first = Some((tail_no, slot));
            }
            if let Some((prev_block, prev_slot)) = prev {
                let prev_page = self.page(prev_block)?;
                let mut data = prev_page.write();
                node::set_cell_next(&mut data[..], prev_slot, tail_no, slot);
            }
            prev = Some((tail_no, slot));
        }

        let (block, slot) = first.expect("non-empty string wrote no fragment");
        Ok(OverflowPtr {
            block,
            slot,
            len: bytes.len() as u32,
        })
    }

    /// Reads a string back from its overflow chain.
    pub(crate) fn read_chain(&self, ptr: OverflowPtr) -> Result<String> {
        if ptr.len == 0 {
            return Ok(String::new());
        }

        let corrupt = |block: u32, reason: String| BurrowError::CorruptNode {
            page_no: block,
            reason,
        };

        let mut out = Vec::with_capacity(ptr.len as usize);
        let mut block = ptr.block;
        let mut slot = ptr.slot;

        // A fragment holds at least one byte, so a healthy chain has at
        // most `len` links.
        for _ in 0..=ptr.len {
            let page = self.page(block)?;
            let data = page.read();
            if node::kind(&data[..])? != NodeKind::Data {
                return Err(corrupt(block, "overflow pointer into non-data node".into()));
            }
            if !node::is_live(&data[..], slot) {
                return Err(corrupt(block, format!("dead overflow fragment slot {}", slot)));
            }
            out.extend_from_slice(node::cell_payload(&data[..], slot));

            let (next_block, next_slot) = node::cell_next(&data[..], slot);
            if next_block == 0 {
                break;
            }
            block = next_block;
            slot = next_slot;
        }

        if out.len() != ptr.len as usize {
            return Err(corrupt(
                ptr.block,
                format!("chain holds {} bytes, pointer says {}", out.len(), ptr.len),
            ));
        }
        String::from_utf8(out).map_err(|_| corrupt(ptr.block, "overflow bytes not utf-8".into()))
    }

    /// Releases every fragment of an overflow chain.
    ///
    /// Drained data nodes stay allocated; only their slots are recycled.
    pub(crate) fn free_chain(&self, ptr: OverflowPtr) -> Result<()> {
        if ptr.len == 0 {
            return Ok(());
        }

        let mut block = ptr.block;
        let mut slot = ptr.slot;
        for _ in 0..=ptr.len {
            let page = self.page(block)?;
            let next = {
                let data = page.read();
                if !node::is_live(&data[..], slot) {
                    return Err(BurrowError::CorruptNode {
                        page_no: block,
                        reason: format!("freeing dead overflow fragment slot {}", slot),
                    });
                }
                node::cell_next(&data[..], slot)
            };
            {
                let mut data = page.write();
                node::free_cell_keep(&mut data[..], slot);
            }
            if next.0 == 0 {
                break;
            }
            block = next.0;
            slot = next.1;
        }
        Ok(())
    }

    /// Walks a leaf's overflow chain and tallies its live fragments.
    pub fn chain_stats(&self, leaf_no: u32) -> Result<ChainStats> {
        let _g = self.op_lock.lock();
        let mut stats = ChainStats::default();

        let mut current = {
            let page = self.page(leaf_no)?;
            let data = page.read();
            node::chain_head(&data[..])
        };
        while current != 0 {
            let page = self.page(current)?;
            let data = page.read();
            stats.nodes += 1;
            for slot in 0..node::idx_count(&data[..]) {
                if node::is_live(&data[..], slot) {
                    stats.fragments += 1;
                    stats.bytes += node::cell_size(&data[..], slot);
                }
            }
            current = node::link(&data[..]);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;
    use crate::store::PageStore;
    use burrow_buffer::BufferPool;
    use burrow_common::page::PAGE_SIZE;
    use burrow_common::{StorageConfig, TypeId};
    use tempfile::tempdir;

    fn test_pager(dir: &std::path::Path) -> Arc<Pager> {
        let config = StorageConfig {
            data_dir: dir.to_path_buf(),
            pool_working_set: 16,
            pool_ceiling: 32,
            fsync_enabled: false,
        };
        let store = Arc::new(PageStore::open(&config).unwrap());
        let pool = Arc::new(BufferPool::new(
            config.pool_working_set,
            config.pool_ceiling,
        ));
        Arc::new(Pager::new(store, pool))
    }

    fn test_schema() -> Schema {
        Schema::new(
            vec![
                Field::new("id", TypeId::Integer),
                Field::new("name", TypeId::Text),
                Field::new("score", TypeId::Float),
            ],
            0,
        )
        .unwrap()
    }

    fn row(id: i64, name: &str, score: f64) -> Record {
        Record::new(vec![
            Value::Integer(id),
            Value::Text(name.to_string()),
            Value::Float(score),
        ])
    }

    fn scan_ids(table: &Table) -> Vec<i64> {
        let mut ids = Vec::new();
        let mut leaf = table.leftmost_leaf().unwrap();
        while leaf != 0 {
            let (count, next, _) = table.leaf_info(leaf).unwrap();
            for slot in 0..count {
                if let Some(record) = table.read_record(leaf, slot).unwrap() {
                    match record.values[0] {
                        Value::Integer(id) => ids.push(id),
                        _ => panic!("non-integer id"),
                    }
                }
            }
            leaf = next;
        }
        ids
    }

    #[test]
    fn test_create_and_open_table() {
        let dir = tempdir().unwrap();
        let pager = test_pager(dir.path());

        let table = Table::create(pager.clone(), "users", test_schema()).unwrap();
        assert_eq!(table.name(), "users");

        let m = table.read_meta().unwrap();
        assert_eq!(m.root, 1);
        assert_eq!(m.last_leaf, 1);
        assert!(m.max_key.is_none());
        drop(table);

        let reopened = Table::open(pager, "users").unwrap();
        assert_eq!(reopened.schema(), &test_schema());
    }

    #[test]
    fn test_create_rejects_oversized_record() {
        let dir = tempdir().unwrap();
        let pager = test_pager(dir.path());

        let wide: Vec<Field> = (0..20)
            .map(|i| Field::new(format!("c{}", i), TypeId::Integer))
            .collect();
        let schema = Schema::new(wide, 0).unwrap();
        assert!(matches!(
            Table::create(pager, "wide", schema),
            Err(BurrowError::RecordTooLarge { .. })
        ));
    }

    #[test]
    fn test_insert_and_read_back() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        table.insert(&row(5, "five", 5.5)).unwrap();
        table.insert(&row(3, "three", 3.3)).unwrap();
        table.insert(&row(8, "eight", 8.8)).unwrap();

        assert_eq!(scan_ids(&table), vec![3, 5, 8]);

        let leaf = table.leftmost_leaf().unwrap();
        let slot = table.first_live_slot(leaf, 0).unwrap().unwrap();
        let record = table.read_record(leaf, slot).unwrap().unwrap();
        assert_eq!(record.values[1], Value::Text("three".to_string()));
        assert_eq!(record.values[2], Value::Float(3.3));
    }

    #[test]
    fn test_insert_duplicate_key_is_error() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        table.insert(&row(1, "a", 0.0)).unwrap();
        assert!(matches!(
            table.insert(&row(1, "b", 1.0)),
            Err(BurrowError::DuplicateKey)
        ));
    }

    #[test]
    fn test_insert_type_mismatch() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        let bad = Record::new(vec![
            Value::Text("one".to_string()),
            Value::Text("x".to_string()),
            Value::Float(0.0),
        ]);
        assert!(matches!(
            table.insert(&bad),
            Err(BurrowError::TypeMismatch { .. })
        ));

        let null_key = Record::new(vec![Value::Null, Value::Null, Value::Null]);
        assert!(matches!(
            table.insert(&null_key),
            Err(BurrowError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_meta_caches_follow_inserts() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        table.insert(&row(10, "a", 0.0)).unwrap();
        let m = table.read_meta().unwrap();
        assert_eq!(m.max_key, Some(meta::MaxKey::Integer(10)));

        // A smaller key does not move the cache.
        table.insert(&row(4, "b", 0.0)).unwrap();
        let m = table.read_meta().unwrap();
        assert_eq!(m.max_key, Some(meta::MaxKey::Integer(10)));

        table.insert(&row(12, "c", 0.0)).unwrap();
        let m = table.read_meta().unwrap();
        assert_eq!(m.max_key, Some(meta::MaxKey::Integer(12)));
        assert_ne!(m.last_leaf, 0);
    }

    #[test]
    fn test_split_preserves_records_and_links() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        // Enough records to force several leaf splits and root growth.
        let n = 40i64;
        for id in (0..n).rev() {
            table.insert(&row(id, &format!("r{}", id), id as f64)).unwrap();
        }

        let ids = scan_ids(&table);
        assert_eq!(ids.len(), n as usize);
        assert_eq!(ids, (0..n).collect::<Vec<_>>());

        // Root must have become internal.
        let m = table.read_meta().unwrap();
        let root = table.page(m.root).unwrap();
        assert_eq!(node::kind(&root.read()[..]).unwrap(), NodeKind::Internal);
        drop(root);

        // Every key is still reachable by seek.
        for id in 0..n {
            let (leaf, _) = table.locate_leaf(&Value::Integer(id)).unwrap();
            let (count, _, _) = table.leaf_info(leaf).unwrap();
            let found = (0..count).any(|slot| {
                table
                    .read_record(leaf, slot)
                    .unwrap()
                    .map(|r| r.values[0] == Value::Integer(id))
                    .unwrap_or(false)
            });
            assert!(found, "key {} unreachable after splits", id);
        }
    }

    #[test]
    fn test_overflow_string_spans_nodes() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        // Longer than a whole page: must span at least two data nodes.
        let long: String = "abcdefgh".repeat(40); // 320 bytes > PAGE_SIZE
        assert!(long.len() > PAGE_SIZE);
        table.insert(&row(1, &long, 0.0)).unwrap();

        let leaf = table.leftmost_leaf().unwrap();
        let stats = table.chain_stats(leaf).unwrap();
        assert!(stats.nodes >= 2, "expected >= 2 data nodes, got {:?}", stats);
        assert_eq!(stats.bytes, long.len());

        let slot = table.first_live_slot(leaf, 0).unwrap().unwrap();
        let record = table.read_record(leaf, slot).unwrap().unwrap();
        assert_eq!(record.values[1], Value::Text(long));
    }

    #[test]
    fn test_delete_releases_chain_and_allows_reinsert() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        let long: String = "x".repeat(500);
        table.insert(&row(1, &long, 1.0)).unwrap();
        table.insert(&row(2, "short", 2.0)).unwrap();

        let leaf = table.leftmost_leaf().unwrap();
        let before = table.chain_stats(leaf).unwrap();
        assert!(before.bytes >= 500);

        let slot = table.first_live_slot(leaf, 0).unwrap().unwrap();
        assert!(table.delete_at(leaf, slot).unwrap());

        let after = table.chain_stats(leaf).unwrap();
        assert_eq!(after.bytes, before.bytes - 500);

        // Re-inserting an equally large string reuses the released space
        // without corrupting the neighbor.
        table.insert(&row(3, &long, 3.0)).unwrap();
        assert_eq!(scan_ids(&table), vec![2, 3]);
        let slot2 = table.first_live_slot(leaf, 0).unwrap().unwrap();
        let neighbor = table.read_record(leaf, slot2).unwrap();
        assert!(neighbor.is_some());
    }

    #[test]
    fn test_delete_of_max_clears_cache() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        table.insert(&row(1, "a", 0.0)).unwrap();
        table.insert(&row(9, "b", 0.0)).unwrap();

        let (leaf, _) = table.locate_leaf(&Value::Integer(9)).unwrap();
        let (count, _, _) = table.leaf_info(leaf).unwrap();
        let slot = (0..count)
            .find(|&s| {
                table
                    .read_record(leaf, s)
                    .unwrap()
                    .map(|r| r.values[0] == Value::Integer(9))
                    .unwrap_or(false)
            })
            .unwrap();
        table.delete_at(leaf, slot).unwrap();

        let m = table.read_meta().unwrap();
        assert!(m.max_key.is_none());

        // The next insert falls back to traversal and repopulates the cache.
        table.insert(&row(5, "c", 0.0)).unwrap();
        let m = table.read_meta().unwrap();
        assert_eq!(m.max_key, Some(meta::MaxKey::Integer(5)));
        assert_eq!(scan_ids(&table), vec![1, 5]);
    }

    #[test]
    fn test_update_in_place() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        table.insert(&row(1, "before", 1.0)).unwrap();
        let leaf = table.leftmost_leaf().unwrap();
        let slot = table.first_live_slot(leaf, 0).unwrap().unwrap();

        let updated = table
            .update_at(
                leaf,
                slot,
                &[
                    (1, Value::Text("after-is-a-longer-string".to_string())),
                    (2, Value::Float(9.0)),
                ],
            )
            .unwrap();
        assert!(updated);

        let record = table.read_record(leaf, slot).unwrap().unwrap();
        assert_eq!(record.values[0], Value::Integer(1));
        assert_eq!(
            record.values[1],
            Value::Text("after-is-a-longer-string".to_string())
        );
        assert_eq!(record.values[2], Value::Float(9.0));
    }

    #[test]
    fn test_update_key_rejected() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        table.insert(&row(1, "a", 0.0)).unwrap();
        let leaf = table.leftmost_leaf().unwrap();
        let slot = table.first_live_slot(leaf, 0).unwrap().unwrap();

        assert!(matches!(
            table.update_at(leaf, slot, &[(0, Value::Integer(2))]),
            Err(BurrowError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_max_cache_recomputed_from_rightmost_leaf() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        // Force a split, then empty the rightmost leaf.
        for id in 1..=6i64 {
            table.insert(&row(id, "n", 0.0)).unwrap();
        }
        let delete_key = |id: i64| {
            let (leaf, _) = table.locate_leaf(&Value::Integer(id)).unwrap();
            let (count, _, _) = table.leaf_info(leaf).unwrap();
            let slot = (0..count)
                .find(|&s| {
                    table
                        .read_record(leaf, s)
                        .unwrap()
                        .map(|r| r.values[0] == Value::Integer(id))
                        .unwrap_or(false)
                })
                .unwrap();
            table.delete_at(leaf, slot).unwrap();
        };
        for id in [6i64, 5, 4, 3] {
            delete_key(id);
        }

        // An insert into an interior leaf must not re-arm the cache below
        // the records still in the tree: the rightmost leaf is empty, so
        // the cache stays unset.
        table.insert(&row(0, "n", 0.0)).unwrap();
        let m = table.read_meta().unwrap();
        assert!(m.max_key.is_none());

        // A seek at the true maximum still reaches it.
        let mut cursor = table.cursor(Some(&Value::Integer(2))).unwrap();
        let mut found = false;
        while let Some(record) = cursor.fetch().unwrap() {
            if record.values[0] == Value::Integer(2) {
                found = true;
            }
        }
        assert!(found, "record 2 unreachable after cache miss");

        // Once an insert lands in the rightmost leaf the cache re-arms.
        table.insert(&row(9, "n", 0.0)).unwrap();
        let m = table.read_meta().unwrap();
        assert_eq!(m.max_key, Some(meta::MaxKey::Integer(9)));
        assert_eq!(scan_ids(&table), vec![0, 1, 2, 9]);
    }

    #[test]
    fn test_next_auto_key() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        assert_eq!(table.next_auto_key().unwrap(), 1);
        assert_eq!(table.next_auto_key().unwrap(), 2);
        assert_eq!(table.next_auto_key().unwrap(), 3);
    }

    #[test]
    fn test_deleted_slot_reused_in_order() {
        let dir = tempdir().unwrap();
        let table = Table::create(test_pager(dir.path()), "t", test_schema()).unwrap();

        for id in [1i64, 3, 5] {
            table.insert(&row(id, "n", 0.0)).unwrap();
        }
        let leaf = table.leftmost_leaf().unwrap();

        // Delete the middle record; slot numbering must not compact.
        let (count, _, _) = table.leaf_info(leaf).unwrap();
        let mid_slot = (0..count)
            .find(|&s| {
                table
                    .read_record(leaf, s)
                    .unwrap()
                    .map(|r| r.values[0] == Value::Integer(3))
                    .unwrap_or(false)
            })
            .unwrap();
        table.delete_at(leaf, mid_slot).unwrap();
        let (count_after, _, live_after) = table.leaf_info(leaf).unwrap();
        assert_eq!(count_after, count);
        assert_eq!(live_after, 2);

        // A key in the same range fills the hole.
        table.insert(&row(4, "n", 0.0)).unwrap();
        assert_eq!(scan_ids(&table), vec![1, 4, 5]);
        let (count_final, _, _) = table.leaf_info(leaf).unwrap();
        assert_eq!(count_final, count);
    }
}
