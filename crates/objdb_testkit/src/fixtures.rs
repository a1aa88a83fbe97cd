//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and the
//! sample Person/Dog/Cat data set.

use objdb_core::{Config, CoreResult, EntitySchema, FieldDef, Handle, ObjectId, Schema, Store};
use objdb_storage::InMemoryBackend;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The sample schema: a person has an identifier, a name, an age, one dog
/// and any number of cats.
pub fn sample_schema() -> Schema {
    Schema::from_entities([
        EntitySchema::new("Cat").field(FieldDef::text("name")),
        EntitySchema::new("Dog").field(FieldDef::text("name")),
        EntitySchema::new("Person")
            .field(FieldDef::int("id").identifier())
            .field(FieldDef::text("name"))
            .field(FieldDef::int("age"))
            .field(FieldDef::link("dog", "Dog"))
            .field(FieldDef::list("cats", "Cat")),
    ])
    .expect("sample schema is valid")
}

/// Where a test store keeps its commit log.
enum Backing {
    Memory(InMemoryBackend),
    File(TempDir),
}

/// A test store over the sample schema with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    backing: Backing,
}

impl TestStore {
    /// Creates a store whose commit log lives in memory.
    ///
    /// The log survives [`TestStore::reopen`], so recovery can be tested
    /// without touching disk.
    pub fn memory() -> Self {
        let backend = InMemoryBackend::new();
        let store = Store::open_with_backend(sample_schema(), Config::default(), Box::new(backend.clone()))
            .expect("Failed to open in-memory store");
        Self {
            store,
            backing: Backing::Memory(backend),
        }
    }

    /// Creates a store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open(temp_dir.path(), sample_schema()).expect("Failed to open file store");
        Self {
            store,
            backing: Backing::File(temp_dir),
        }
    }

    /// Closes the store and opens it again over the same commit log.
    pub fn reopen(self) -> CoreResult<Self> {
        let Self { store, backing } = self;
        drop(store);
        let store = match &backing {
            Backing::Memory(backend) => {
                Store::open_with_backend(sample_schema(), Config::default(), Box::new(backend.clone()))?
            }
            Backing::File(dir) => Store::open(dir.path(), sample_schema())?,
        };
        Ok(Self { store, backing })
    }

    /// Returns the in-memory commit log, for corruption tests.
    pub fn memory_log(&self) -> Option<&InMemoryBackend> {
        match &self.backing {
            Backing::Memory(backend) => Some(backend),
            Backing::File(_) => None,
        }
    }

    /// Returns the store directory if file-based.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory(_) => None,
            Backing::File(dir) => Some(dir.path()),
        }
    }

    /// Path of the commit log if file-based.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.path().map(|p| p.join("commit.log"))
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use objdb_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     assert_eq!(store.handle().count("Person").unwrap(), 0);
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let store = TestStore::memory();
    f(&store)
}

/// Runs a test with a temporary file-based store.
pub fn with_temp_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let store = TestStore::file();
    f(&store)
}

/// Creates one person in the caller's open write transaction.
pub fn add_person(h: &Handle, name: &str, age: i64, dog: Option<ObjectId>) -> CoreResult<ObjectId> {
    let person = h.create("Person")?;
    h.set(person, "name", name)?;
    h.set(person, "age", age)?;
    h.set(person, "dog", dog)?;
    Ok(person)
}

/// Commits one person per age, named `Person no. <i>`, sharing a dog
/// called `fido`.
pub fn populate_people(h: &Handle, ages: &[i64]) -> CoreResult<Vec<ObjectId>> {
    h.write(|h| {
        let fido = h.create("Dog")?;
        h.set(fido, "name", "fido")?;
        ages.iter()
            .enumerate()
            .map(|(i, age)| -> CoreResult<ObjectId> {
                let person = add_person(h, &format!("Person no. {i}"), *age, Some(fido))?;
                h.set(person, "id", i as i64)?;
                Ok(person)
            })
            .collect()
    })
}

/// Commits persons with explicit names and ages and no dog.
pub fn populate_named(h: &Handle, people: &[(String, i64)]) -> CoreResult<Vec<ObjectId>> {
    h.write(|h| {
        people
            .iter()
            .map(|(name, age)| add_person(h, name, *age, None))
            .collect()
    })
}
