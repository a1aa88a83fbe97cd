//! Per-thread store handles.

use crate::error::{CoreError, CoreResult};
use crate::object::{Cell, ObjectId, ObjectKey, StoreState};
use crate::query::Query;
use crate::schema::{FieldRef, FieldType, Schema};
use crate::store::Store;
use crate::transaction::WriteState;
use crate::types::{HandleId, SequenceNumber, TypeId};
use crate::value::Value;
use std::cell::{Cell as Flag, RefCell};
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// A store handle for one logical thread of execution.
///
/// Handles are cheap to obtain with [`Store::handle`] and are not `Send`:
/// each thread opens its own. Identities produced by a handle are bound to
/// it; another handle must re-resolve them with [`Handle::resolve`].
///
/// Reads are allowed at any time and see the latest committed state, or the
/// handle's own uncommitted changes while it has a write transaction open.
/// Creating, modifying and deleting objects requires an open write
/// transaction, best obtained through [`Handle::write`] or
/// [`Handle::write_scope`].
///
/// ```rust
/// use objdb_core::{EntitySchema, FieldDef, Schema, Store};
///
/// # fn main() -> objdb_core::CoreResult<()> {
/// let schema = Schema::from_entities([EntitySchema::new("Person")
///     .field(FieldDef::text("name"))
///     .field(FieldDef::int("age"))])?;
/// let store = Store::open_in_memory(schema)?;
/// let handle = store.handle();
///
/// let person = handle.write(|h| {
///     let person = h.create("Person")?;
///     h.set(person, "name", "Young Person")?;
///     h.set(person, "age", 34)?;
///     Ok(person)
/// })?;
///
/// assert_eq!(handle.get_int(person, "age")?, 34);
/// assert_eq!(handle.count("Person")?, 1);
/// handle.close();
/// # Ok(())
/// # }
/// ```
pub struct Handle {
    id: HandleId,
    store: Store,
    write: RefCell<Option<WriteState>>,
    closed: Flag<bool>,
    _not_send: PhantomData<Rc<()>>,
}

impl Handle {
    pub(crate) fn new(store: Store, id: HandleId) -> Self {
        debug!(handle = %id, "handle opened");
        Self {
            id,
            store,
            write: RefCell::new(None),
            closed: Flag::new(false),
            _not_send: PhantomData,
        }
    }

    /// Returns this handle's ID.
    #[must_use]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Returns the store this handle belongs to.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the store schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.store.schema()
    }

    // --- transactions ---

    /// Opens a write transaction, waiting for the writer slot.
    ///
    /// Waits at most [`Config::write_timeout`](crate::Config::write_timeout)
    /// if one is configured.
    ///
    /// # Errors
    ///
    /// `Transaction` if this handle already has a write open or the wait
    /// times out.
    pub fn begin_write(&self) -> CoreResult<()> {
        self.begin(self.store.config().write_timeout)
    }

    /// Opens a write transaction, waiting at most `timeout` for the slot.
    pub fn begin_write_timeout(&self, timeout: Duration) -> CoreResult<()> {
        self.begin(Some(timeout))
    }

    fn begin(&self, timeout: Option<Duration>) -> CoreResult<()> {
        self.ensure_open()?;
        if self.write.borrow().is_some() {
            return Err(CoreError::transaction(
                "a write transaction is already open on this handle",
            ));
        }
        let state = self
            .store
            .transactions()
            .begin_write(self.id, timeout)
            .inspect_err(|e| warn!(handle = %self.id, error = %e, "could not begin write"))?;
        *self.write.borrow_mut() = Some(state);
        Ok(())
    }

    /// Commits the open write transaction.
    ///
    /// # Errors
    ///
    /// `Transaction` if none is open. If the commit log append fails the
    /// transaction is rolled back and the storage error returned.
    pub fn commit(&self) -> CoreResult<SequenceNumber> {
        self.ensure_open()?;
        let state = self.take_write("commit")?;
        self.store.transactions().commit(self.id, state)
    }

    /// Discards the open write transaction.
    pub fn rollback(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let state = self.take_write("rollback")?;
        self.store.transactions().rollback(self.id, state);
        Ok(())
    }

    /// Returns true while this handle has a write transaction open.
    #[must_use]
    pub fn is_in_transaction(&self) -> bool {
        self.write.borrow().is_some()
    }

    /// Runs `body` in a write transaction.
    ///
    /// Commits if `body` returns `Ok`; rolls back if it returns `Err` or
    /// panics, so a failed body never leaves partial changes behind.
    ///
    /// A body that calls [`Handle::commit`] or [`Handle::rollback`] itself
    /// has already finished the transaction; the scope then has nothing
    /// left to do and `write` returns the body's result.
    pub fn write<R>(&self, body: impl FnOnce(&Handle) -> CoreResult<R>) -> CoreResult<R> {
        let scope = self.write_scope()?;
        match body(&scope) {
            Ok(value) => {
                scope.commit()?;
                Ok(value)
            }
            Err(e) => {
                scope.rollback()?;
                Err(e)
            }
        }
    }

    /// Opens a write transaction tied to the returned guard.
    ///
    /// The guard dereferences to the handle. Dropping it without calling
    /// [`WriteScope::commit`] rolls the transaction back.
    pub fn write_scope(&self) -> CoreResult<WriteScope<'_>> {
        self.begin_write()?;
        Ok(WriteScope {
            handle: self,
            finished: false,
        })
    }

    // --- objects ---

    /// Creates an object of `type_name` with zero values in every field:
    /// `0`, empty text, null reference, empty collection.
    ///
    /// # Errors
    ///
    /// `Transaction` outside a write transaction, `Schema` for an unknown type.
    pub fn create(&self, type_name: &str) -> CoreResult<ObjectId> {
        self.mutate("create", |write, schema| {
            let type_id = schema.type_id(type_name)?;
            let key = write.working.create(schema, type_id);
            write.touch(key);
            Ok(self.bind(key))
        })
    }

    /// Resolves a field of `type_name` once for repeated use with
    /// [`Handle::set_field`] and [`Handle::get_field`].
    pub fn field(&self, type_name: &str, field: &str) -> CoreResult<FieldRef> {
        let schema = self.schema();
        schema.resolve_field(schema.type_id(type_name)?, field)
    }

    /// Sets a field by name.
    ///
    /// # Errors
    ///
    /// - `Transaction` outside a write transaction
    /// - `UnknownField` if the type has no such field
    /// - `TypeMismatch` if the value does not fit, including a reference to
    ///   an object of the wrong type
    /// - `StaleIdentity` if the object or a referenced object is deleted
    pub fn set(&self, id: ObjectId, field: &str, value: impl Into<Value>) -> CoreResult<()> {
        let value = value.into();
        self.mutate("set", |write, schema| {
            let key = self.live_key(&write.working, id)?;
            let field = schema.resolve_field(key.type_id(), field)?;
            self.store_cell(write, schema, key, field, value)
        })
    }

    /// Sets a field through a resolved descriptor.
    pub fn set_field(&self, id: ObjectId, field: &FieldRef, value: impl Into<Value>) -> CoreResult<()> {
        let value = value.into();
        self.mutate("set_field", |write, schema| {
            let key = self.live_key(&write.working, id)?;
            let field = owned_field(schema, key, field)?;
            self.store_cell(write, schema, key, field, value)
        })
    }

    fn store_cell(
        &self,
        write: &mut WriteState,
        schema: &Schema,
        key: ObjectKey,
        field: FieldRef,
        value: Value,
    ) -> CoreResult<()> {
        let name = field_name(schema, field);
        let cell = self.to_cell(&write.working, schema, field, name, value)?;
        if let Some(row) = write.working.row_mut(key) {
            row[field.index()] = cell;
        }
        write.touch(key);
        Ok(())
    }

    /// Reads a field by name.
    ///
    /// # Errors
    ///
    /// `StaleIdentity` if the object is deleted, `UnknownField` if the type
    /// has no such field.
    pub fn get(&self, id: ObjectId, field: &str) -> CoreResult<Value> {
        self.read(|state| {
            let key = self.live_key(state, id)?;
            let field = self.schema().resolve_field(key.type_id(), field)?;
            Ok(self.cell_value(state, key, field))
        })
    }

    /// Reads a field through a resolved descriptor.
    pub fn get_field(&self, id: ObjectId, field: &FieldRef) -> CoreResult<Value> {
        self.read(|state| {
            let key = self.live_key(state, id)?;
            let field = owned_field(self.schema(), key, field)?;
            Ok(self.cell_value(state, key, field))
        })
    }

    /// Reads an integer field.
    pub fn get_int(&self, id: ObjectId, field: &str) -> CoreResult<i64> {
        let value = self.get(id, field)?;
        value
            .as_int()
            .ok_or_else(|| CoreError::type_mismatch(field, "integer", value.describe()))
    }

    /// Reads a text field.
    pub fn get_text(&self, id: ObjectId, field: &str) -> CoreResult<String> {
        match self.get(id, field)? {
            Value::Text(s) => Ok(s),
            other => Err(CoreError::type_mismatch(field, "text", other.describe())),
        }
    }

    /// Reads a single-reference field.
    pub fn get_link(&self, id: ObjectId, field: &str) -> CoreResult<Option<ObjectId>> {
        match self.get(id, field)? {
            Value::Null => Ok(None),
            Value::Link(target) => Ok(Some(target)),
            other => Err(CoreError::type_mismatch(field, "link", other.describe())),
        }
    }

    /// Deletes an object.
    ///
    /// Single references to it become null and collection entries pointing
    /// at it are removed.
    ///
    /// # Errors
    ///
    /// `Transaction` outside a write transaction, `StaleIdentity` if the
    /// object is already deleted.
    pub fn delete(&self, id: ObjectId) -> CoreResult<()> {
        self.mutate("delete", |write, schema| {
            let key = self.key_of(id)?;
            let touched = write
                .working
                .remove(schema, key)
                .ok_or_else(|| CoreError::stale(id))?;
            for object in touched {
                write.touch(object);
            }
            write.remove(key);
            Ok(())
        })
    }

    /// Deletes every object of `type_name`. Returns how many were deleted.
    pub fn delete_all(&self, type_name: &str) -> CoreResult<usize> {
        self.mutate("delete_all", |write, schema| {
            let type_id = schema.type_id(type_name)?;
            let keys = write.working.table(type_id).keys();
            for key in &keys {
                let object = ObjectKey::new(type_id, *key);
                if let Some(touched) = write.working.remove(schema, object) {
                    for other in touched {
                        write.touch(other);
                    }
                    write.remove(object);
                }
            }
            Ok(keys.len())
        })
    }

    /// Returns true if the object has not been deleted.
    pub fn exists(&self, id: ObjectId) -> CoreResult<bool> {
        self.read(|state| Ok(state.contains(self.key_of(id)?)))
    }

    /// Number of live objects of `type_name`.
    pub fn count(&self, type_name: &str) -> CoreResult<usize> {
        self.read(|state| {
            let type_id = self.schema().type_id(type_name)?;
            Ok(state.table(type_id).len())
        })
    }

    /// Re-resolves an identity obtained from another handle.
    ///
    /// Returns `None` if the object does not exist in this handle's view.
    pub fn resolve(&self, foreign: ObjectId) -> CoreResult<Option<ObjectId>> {
        self.read(|state| {
            Ok(state
                .contains(foreign.object)
                .then(|| self.bind(foreign.object)))
        })
    }

    // --- collections ---

    /// Appends `target` to a collection field.
    pub fn list_push(&self, id: ObjectId, field: &str, target: ObjectId) -> CoreResult<()> {
        self.mutate("list_push", |write, schema| {
            let key = self.live_key(&write.working, id)?;
            let field_ref = schema.resolve_field(key.type_id(), field)?;
            let FieldType::List(target_type) = field_ref.field_type() else {
                return Err(CoreError::type_mismatch(
                    field,
                    "list",
                    field_ref.field_type().describe(),
                ));
            };
            let target = self.target_key(&write.working, schema, field, target_type, target)?;
            if let Some(Cell::List(keys)) = write
                .working
                .row_mut(key)
                .map(|row| &mut row[field_ref.index()])
            {
                keys.push(target.key);
            }
            write.touch(key);
            Ok(())
        })
    }

    /// Removes and returns the collection entry at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` past the end of the collection.
    pub fn list_remove(&self, id: ObjectId, field: &str, index: usize) -> CoreResult<ObjectId> {
        self.mutate("list_remove", |write, schema| {
            let key = self.live_key(&write.working, id)?;
            let field_ref = list_field(schema, key, field)?;
            let target_type = list_target(field_ref);
            let Some(Cell::List(keys)) = write
                .working
                .row_mut(key)
                .map(|row| &mut row[field_ref.index()])
            else {
                return Err(CoreError::stale(id));
            };
            if index >= keys.len() {
                return Err(CoreError::IndexOutOfBounds {
                    index,
                    len: keys.len(),
                });
            }
            let removed = keys.remove(index);
            write.touch(key);
            Ok(self.bind(ObjectKey::new(target_type, removed)))
        })
    }

    /// Length of a collection field.
    pub fn list_len(&self, id: ObjectId, field: &str) -> CoreResult<usize> {
        self.read(|state| Ok(self.list_keys(state, id, field)?.1.len()))
    }

    /// Collection entry at `index`.
    pub fn list_get(&self, id: ObjectId, field: &str, index: usize) -> CoreResult<ObjectId> {
        self.read(|state| {
            let (target_type, keys) = self.list_keys(state, id, field)?;
            let key = keys.get(index).ok_or(CoreError::IndexOutOfBounds {
                index,
                len: keys.len(),
            })?;
            Ok(self.bind(ObjectKey::new(target_type, *key)))
        })
    }

    fn list_keys<'s>(
        &self,
        state: &'s StoreState,
        id: ObjectId,
        field: &str,
    ) -> CoreResult<(TypeId, &'s [u64])> {
        let key = self.live_key(state, id)?;
        let field_ref = list_field(self.schema(), key, field)?;
        match state.row(key).map(|row| &row[field_ref.index()]) {
            Some(Cell::List(keys)) => Ok((list_target(field_ref), keys.as_slice())),
            _ => Err(CoreError::stale(id)),
        }
    }

    // --- queries ---

    /// Starts a query over `type_name`.
    pub fn query(&self, type_name: &str) -> CoreResult<Query<'_>> {
        self.ensure_open()?;
        Ok(Query::new(self, self.schema().type_id(type_name)?))
    }

    // --- lifecycle ---

    /// Releases the handle, rolling back an open write transaction.
    ///
    /// Further use of the handle fails with `StoreClosed`. Closing twice is
    /// a no-op.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Some(state) = self.write.borrow_mut().take() {
            warn!(handle = %self.id, "handle closed with an open write transaction, rolling back");
            self.store.transactions().rollback(self.id, state);
        }
        debug!(handle = %self.id, "handle closed");
    }

    /// Returns true once [`Handle::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    // --- internals ---

    pub(crate) fn read<R>(&self, f: impl FnOnce(&StoreState) -> CoreResult<R>) -> CoreResult<R> {
        self.ensure_open()?;
        if let Some(write) = self.write.borrow().as_ref() {
            return f(&write.working);
        }
        let snapshot = self.store.transactions().snapshot();
        f(&snapshot)
    }

    fn mutate<R>(
        &self,
        op: &str,
        f: impl FnOnce(&mut WriteState, &Schema) -> CoreResult<R>,
    ) -> CoreResult<R> {
        self.ensure_open()?;
        let mut write = self.write.borrow_mut();
        let state = write.as_mut().ok_or_else(|| {
            CoreError::transaction(format!("{op} requires an open write transaction"))
        })?;
        f(state, self.store.schema())
    }

    pub(crate) fn require_write(&self, op: &str) -> CoreResult<()> {
        self.mutate(op, |_, _| Ok(()))
    }

    fn take_write(&self, op: &str) -> CoreResult<WriteState> {
        self.write.borrow_mut().take().ok_or_else(|| {
            CoreError::transaction(format!("{op} without an open write transaction"))
        })
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed.get() {
            Err(CoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn bind(&self, key: ObjectKey) -> ObjectId {
        ObjectId::new(key, self.id)
    }

    fn key_of(&self, id: ObjectId) -> CoreResult<ObjectKey> {
        if id.handle == self.id {
            Ok(id.object)
        } else {
            Err(CoreError::ForeignHandle {
                object: id.to_string(),
                owner: id.handle.as_u64(),
                caller: self.id.as_u64(),
            })
        }
    }

    fn live_key(&self, state: &StoreState, id: ObjectId) -> CoreResult<ObjectKey> {
        let key = self.key_of(id)?;
        if state.contains(key) {
            Ok(key)
        } else {
            Err(CoreError::stale(id))
        }
    }

    /// Checks that `id` is a live object of `expected` type.
    fn target_key(
        &self,
        state: &StoreState,
        schema: &Schema,
        field: &str,
        expected: TypeId,
        id: ObjectId,
    ) -> CoreResult<ObjectKey> {
        let key = self.key_of(id)?;
        if key.type_id() != expected {
            return Err(CoreError::type_mismatch(
                field,
                schema.entity(expected).name(),
                schema.entity(key.type_id()).name(),
            ));
        }
        if !state.contains(key) {
            return Err(CoreError::stale(id));
        }
        Ok(key)
    }

    fn to_cell(
        &self,
        state: &StoreState,
        schema: &Schema,
        field: FieldRef,
        name: &str,
        value: Value,
    ) -> CoreResult<Cell> {
        match (field.field_type(), value) {
            (FieldType::Int, Value::Int(n)) => Ok(Cell::Int(n)),
            (FieldType::Text, Value::Text(s)) => Ok(Cell::Text(s)),
            (FieldType::Link(_), Value::Null) => Ok(Cell::Link(None)),
            (FieldType::Link(target), Value::Link(id)) => {
                let key = self.target_key(state, schema, name, target, id)?;
                Ok(Cell::Link(Some(key.key)))
            }
            (FieldType::List(target), Value::List(ids)) => ids
                .into_iter()
                .map(|id| {
                    self.target_key(state, schema, name, target, id)
                        .map(|key| key.key)
                })
                .collect::<CoreResult<Vec<_>>>()
                .map(Cell::List),
            (expected, value) => Err(CoreError::type_mismatch(
                name,
                expected.describe(),
                value.describe(),
            )),
        }
    }

    fn cell_value(&self, state: &StoreState, key: ObjectKey, field: FieldRef) -> Value {
        let Some(cell) = state.row(key).map(|row| &row[field.index()]) else {
            return Value::Null;
        };
        match (cell, field.field_type()) {
            (Cell::Int(n), _) => Value::Int(*n),
            (Cell::Text(s), _) => Value::Text(s.clone()),
            (Cell::Link(Some(k)), FieldType::Link(target)) => {
                Value::Link(self.bind(ObjectKey::new(target, *k)))
            }
            (Cell::List(keys), FieldType::List(target)) => Value::List(
                keys.iter()
                    .map(|k| self.bind(ObjectKey::new(target, *k)))
                    .collect(),
            ),
            _ => Value::Null,
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("in_transaction", &self.is_in_transaction())
            .field("closed", &self.closed.get())
            .finish()
    }
}

fn field_name(schema: &Schema, field: FieldRef) -> &str {
    schema.entity(field.type_id()).fields()[field.index()].name()
}

/// Checks that a resolved field belongs to the object's type.
fn owned_field(schema: &Schema, key: ObjectKey, field: &FieldRef) -> CoreResult<FieldRef> {
    if field.type_id() == key.type_id() {
        Ok(*field)
    } else {
        Err(CoreError::unknown_field(
            schema.entity(key.type_id()).name(),
            field_name(schema, *field),
        ))
    }
}

fn list_field(schema: &Schema, key: ObjectKey, field: &str) -> CoreResult<FieldRef> {
    let field_ref = schema.resolve_field(key.type_id(), field)?;
    match field_ref.field_type() {
        FieldType::List(_) => Ok(field_ref),
        other => Err(CoreError::type_mismatch(field, "list", other.describe())),
    }
}

fn list_target(field: FieldRef) -> TypeId {
    match field.field_type() {
        FieldType::List(target) | FieldType::Link(target) => target,
        FieldType::Int | FieldType::Text => field.type_id(),
    }
}

/// A write transaction bound to a scope.
///
/// Dereferences to the [`Handle`]. Rolls back on drop unless committed.
///
/// ```rust
/// use objdb_core::{EntitySchema, FieldDef, Schema, Store};
///
/// # fn main() -> objdb_core::CoreResult<()> {
/// let store = Store::open_in_memory(Schema::from_entities([
///     EntitySchema::new("Cat").field(FieldDef::text("name")),
/// ])?)?;
/// let handle = store.handle();
///
/// {
///     let scope = handle.write_scope()?;
///     scope.create("Cat")?;
///     // dropped without commit
/// }
/// assert_eq!(handle.count("Cat")?, 0);
/// # Ok(())
/// # }
/// ```
pub struct WriteScope<'h> {
    handle: &'h Handle,
    finished: bool,
}

impl WriteScope<'_> {
    /// Commits the transaction.
    ///
    /// If the transaction was already finished through the handle, returns
    /// the current committed sequence number.
    pub fn commit(mut self) -> CoreResult<SequenceNumber> {
        self.finished = true;
        if !self.handle.is_in_transaction() {
            self.handle.ensure_open()?;
            return Ok(self.handle.store.committed_seq());
        }
        self.handle.commit()
    }

    /// Rolls the transaction back. A no-op if it was already finished
    /// through the handle.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.finished = true;
        if !self.handle.is_in_transaction() {
            return self.handle.ensure_open();
        }
        self.handle.rollback()
    }
}

impl Deref for WriteScope<'_> {
    type Target = Handle;

    fn deref(&self) -> &Handle {
        self.handle
    }
}

impl Drop for WriteScope<'_> {
    fn drop(&mut self) {
        if self.finished || !self.handle.is_in_transaction() || self.handle.is_closed() {
            return;
        }
        if std::thread::panicking() {
            warn!(handle = %self.handle.id(), "write body panicked, rolling back");
        } else {
            warn!(handle = %self.handle.id(), "write scope dropped without commit, rolling back");
        }
        if let Err(e) = self.handle.rollback() {
            warn!(handle = %self.handle.id(), error = %e, "rollback failed");
        }
    }
}

impl std::fmt::Debug for WriteScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteScope")
            .field("handle", &self.handle.id())
            .field("finished", &self.finished)
            .finish()
    }
}
