//! The schema registry.

use crate::error::{CoreError, CoreResult};
use crate::schema::field::{EntitySchema, FieldKind, FieldRef, FieldType};
use crate::types::TypeId;
use std::collections::{HashMap, HashSet};

/// A registered entity together with its resolved field types.
#[derive(Debug, Clone)]
struct Registered {
    schema: EntitySchema,
    types: Vec<FieldType>,
}

/// The set of entity types a store is opened with.
///
/// ```rust
/// use objdb_core::{EntitySchema, FieldDef, Schema};
///
/// let mut schema = Schema::new();
/// schema.register(EntitySchema::new("Dog").field(FieldDef::text("name")))?;
/// schema.register(
///     EntitySchema::new("Person")
///         .field(FieldDef::text("name"))
///         .field(FieldDef::link("dog", "Dog")),
/// )?;
/// assert!(schema.lookup("Person").is_some());
/// # Ok::<(), objdb_core::CoreError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<Registered>,
    by_name: HashMap<String, TypeId>,
}

impl Schema {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from declarations given in dependency order.
    ///
    /// # Errors
    ///
    /// Fails with the first [`CoreError::Schema`] raised by [`Schema::register`].
    pub fn from_entities(entities: impl IntoIterator<Item = EntitySchema>) -> CoreResult<Self> {
        let mut schema = Self::new();
        for entity in entities {
            schema.register(entity)?;
        }
        Ok(schema)
    }

    /// Registers an entity type and returns its type ID.
    ///
    /// Re-registering an identical declaration returns the existing ID.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] when:
    /// - the name is already registered with a different definition
    /// - the entity or one of its fields has an empty or duplicate name
    /// - more than one field is marked as identifier
    /// - a reference targets an entity that is neither registered nor the
    ///   entity itself
    ///
    /// A failed registration leaves the registry unchanged.
    pub fn register(&mut self, entity: EntitySchema) -> CoreResult<TypeId> {
        if let Some(&existing) = self.by_name.get(entity.name()) {
            if self.entities[existing.index()].schema == entity {
                return Ok(existing);
            }
            return Err(CoreError::schema(format!(
                "entity `{}` is already registered with a different definition",
                entity.name()
            )));
        }

        if entity.name().is_empty() {
            return Err(CoreError::schema("entity name must not be empty"));
        }

        let type_id = TypeId::new(
            u32::try_from(self.entities.len())
                .map_err(|_| CoreError::schema("too many entity types"))?,
        );

        let mut seen = HashSet::new();
        let mut types = Vec::with_capacity(entity.fields().len());
        for field in entity.fields() {
            if field.name().is_empty() || field.name().contains('.') {
                return Err(CoreError::schema(format!(
                    "invalid field name `{}` on `{}`",
                    field.name(),
                    entity.name()
                )));
            }
            if !seen.insert(field.name()) {
                return Err(CoreError::schema(format!(
                    "duplicate field `{}` on `{}`",
                    field.name(),
                    entity.name()
                )));
            }
            types.push(self.resolve_kind(&entity, type_id, field.kind())?);
        }

        if entity.fields().iter().filter(|f| f.is_identifier()).count() > 1 {
            return Err(CoreError::schema(format!(
                "entity `{}` marks more than one identifier field",
                entity.name()
            )));
        }

        self.by_name.insert(entity.name().to_string(), type_id);
        self.entities.push(Registered {
            schema: entity,
            types,
        });
        Ok(type_id)
    }

    fn resolve_kind(
        &self,
        entity: &EntitySchema,
        own_id: TypeId,
        kind: &FieldKind,
    ) -> CoreResult<FieldType> {
        let target = match kind {
            FieldKind::Int => return Ok(FieldType::Int),
            FieldKind::Text => return Ok(FieldType::Text),
            FieldKind::Link { target } | FieldKind::List { target } => target,
        };

        let target_id = if target == entity.name() {
            own_id
        } else {
            *self.by_name.get(target.as_str()).ok_or_else(|| {
                CoreError::schema(format!(
                    "entity `{}` references undeclared entity `{target}`",
                    entity.name()
                ))
            })?
        };

        Ok(match kind {
            FieldKind::List { .. } => FieldType::List(target_id),
            _ => FieldType::Link(target_id),
        })
    }

    /// Returns the declaration registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&EntitySchema> {
        self.by_name
            .get(name)
            .map(|id| &self.entities[id.index()].schema)
    }

    /// Returns the type ID registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if no such entity is registered.
    pub fn type_id(&self, name: &str) -> CoreResult<TypeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::schema(format!("unknown entity type `{name}`")))
    }

    /// Returns the declaration for a type ID issued by this registry.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` was not issued by this registry.
    #[must_use]
    pub fn entity(&self, type_id: TypeId) -> &EntitySchema {
        &self.entities[type_id.index()].schema
    }

    /// Returns the resolved field types of an entity.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` was not issued by this registry.
    #[must_use]
    pub(crate) fn field_types(&self, type_id: TypeId) -> &[FieldType] {
        &self.entities[type_id.index()].types
    }

    /// Resolves a direct (single-segment) field of `type_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] if the entity has no such field,
    /// or [`CoreError::Schema`] if `type_id` was not issued by this registry.
    pub fn resolve_field(&self, type_id: TypeId, name: &str) -> CoreResult<FieldRef> {
        let registered = self
            .entities
            .get(type_id.index())
            .ok_or_else(|| CoreError::schema(format!("unknown {type_id}")))?;
        let index = registered
            .schema
            .field_index(name)
            .ok_or_else(|| CoreError::unknown_field(registered.schema.name(), name))?;
        Ok(FieldRef {
            type_id,
            index,
            field_type: registered.types[index],
        })
    }

    /// Iterates over `(TypeId, declaration)` pairs in registration order.
    pub fn entities(&self) -> impl Iterator<Item = (TypeId, &EntitySchema)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, r)| (TypeId::new(i as u32), &r.schema))
    }

    /// Number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Declarations in registration order, as persisted in the commit log header.
    pub(crate) fn declarations(&self) -> Vec<EntitySchema> {
        self.entities.iter().map(|r| r.schema.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn dog() -> EntitySchema {
        EntitySchema::new("Dog").field(FieldDef::text("name"))
    }

    #[test]
    fn register_resolves_targets() {
        let mut schema = Schema::new();
        let dog_id = schema.register(dog()).unwrap();
        let person_id = schema
            .register(
                EntitySchema::new("Person")
                    .field(FieldDef::int("age"))
                    .field(FieldDef::link("dog", "Dog"))
                    .field(FieldDef::list("friends", "Person")),
            )
            .unwrap();

        assert_eq!(
            schema.field_types(person_id),
            &[
                FieldType::Int,
                FieldType::Link(dog_id),
                FieldType::List(person_id)
            ]
        );
    }

    #[test]
    fn identical_reregistration_is_idempotent() {
        let mut schema = Schema::new();
        let first = schema.register(dog()).unwrap();
        let second = schema.register(dog()).unwrap();
        assert_eq!(first, second);
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn conflicting_reregistration_fails() {
        let mut schema = Schema::new();
        schema.register(dog()).unwrap();
        let err = schema
            .register(EntitySchema::new("Dog").field(FieldDef::int("name")))
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
        assert_eq!(schema.entity(TypeId::new(0)), &dog());
    }

    #[test]
    fn undeclared_target_fails_without_registering() {
        let mut schema = Schema::new();
        let err = schema
            .register(EntitySchema::new("Person").field(FieldDef::link("dog", "Dog")))
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
        assert!(schema.lookup("Person").is_none());
        assert!(schema.is_empty());
    }

    #[test]
    fn duplicate_fields_and_identifiers_fail() {
        let mut schema = Schema::new();
        assert!(schema
            .register(
                EntitySchema::new("A")
                    .field(FieldDef::int("x"))
                    .field(FieldDef::text("x"))
            )
            .is_err());
        assert!(schema
            .register(
                EntitySchema::new("B")
                    .field(FieldDef::int("x").identifier())
                    .field(FieldDef::int("y").identifier())
            )
            .is_err());
        assert!(schema
            .register(EntitySchema::new("C").field(FieldDef::int("a.b")))
            .is_err());
    }

    #[test]
    fn resolve_field_reports_unknown() {
        let mut schema = Schema::new();
        let id = schema.register(dog()).unwrap();
        let name = schema.resolve_field(id, "name").unwrap();
        assert_eq!(name.index(), 0);
        assert_eq!(name.field_type(), FieldType::Text);

        let err = schema.resolve_field(id, "age").unwrap_err();
        assert!(matches!(err, CoreError::UnknownField { .. }));
        assert!(matches!(
            schema.type_id("Cat").unwrap_err(),
            CoreError::Schema { .. }
        ));
        assert!(matches!(
            schema.resolve_field(TypeId::new(7), "name").unwrap_err(),
            CoreError::Schema { .. }
        ));
    }

    #[test]
    fn identifier_lookup() {
        let entity = EntitySchema::new("Person")
            .field(FieldDef::int("id").identifier())
            .field(FieldDef::text("name"));
        assert_eq!(entity.identifier().map(FieldDef::name), Some("id"));
        assert_eq!(entity.field_index("name"), Some(1));
    }
}
