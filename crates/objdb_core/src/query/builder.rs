//! The chainable query builder.

use crate::error::{CoreError, CoreResult};
use crate::handle::Handle;
use crate::object::{Cell, ObjectId, ObjectKey, StoreState};
use crate::query::path::{FieldPath, Hop, Reached};
use crate::query::predicate::{Condition, Predicate, Test, TextOp};
use crate::results::ResultSet;
use crate::schema::FieldType;
use crate::types::TypeId;
use crate::value::{Case, Sort, Value};

/// One parenthesized level: alternatives, each a conjunction.
type Group = Vec<Vec<Predicate>>;

/// A query over one entity type, built by chaining conditions.
///
/// Every step validates its field path and operand immediately, so a bad
/// path fails at the call that introduced it.
///
/// ```rust
/// use objdb_core::{Case, EntitySchema, FieldDef, Schema, Store};
///
/// # fn main() -> objdb_core::CoreResult<()> {
/// let schema = Schema::from_entities([
///     EntitySchema::new("Dog").field(FieldDef::text("name")),
///     EntitySchema::new("Person")
///         .field(FieldDef::text("name"))
///         .field(FieldDef::int("age"))
///         .field(FieldDef::link("dog", "Dog")),
/// ])?;
/// let store = Store::open_in_memory(schema)?;
/// let handle = store.handle();
///
/// handle.write(|h| {
///     let dog = h.create("Dog")?;
///     h.set(dog, "name", "Fido")?;
///     let person = h.create("Person")?;
///     h.set(person, "name", "Person no. 1")?;
///     h.set(person, "age", 30)?;
///     h.set(person, "dog", dog)
/// })?;
///
/// let found = handle
///     .query("Person")?
///     .between("age", 20, 50)?
///     .equal_to_case("dog.name", "fido", Case::Insensitive)?
///     .find_all()?;
/// assert_eq!(found.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Query<'h> {
    handle: &'h Handle,
    type_id: TypeId,
    groups: Vec<Group>,
}

impl<'h> Query<'h> {
    pub(crate) fn new(handle: &'h Handle, type_id: TypeId) -> Self {
        Self {
            handle,
            type_id,
            groups: vec![vec![Vec::new()]],
        }
    }

    fn condition(self, field: &str, test: Test) -> CoreResult<Self> {
        let path = FieldPath::resolve(self.handle.schema(), self.type_id, field)?;
        let condition = Condition::new(path, test)?;
        Ok(self.push(Predicate::Leaf(condition)))
    }

    fn push(mut self, predicate: Predicate) -> Self {
        if let Some(conjunction) = self.groups.last_mut().and_then(|g| g.last_mut()) {
            conjunction.push(predicate);
        }
        self
    }

    /// Matches integer fields equal to an integer, text fields equal to a
    /// string, and null single references when given [`Value::Null`].
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the operand does not fit the field.
    pub fn equal_to(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        match value.into() {
            Value::Int(n) => self.condition(field, Test::IntEquals(n)),
            Value::Text(s) => self.condition(field, Test::text(TextOp::Equals, &s, Case::Sensitive)),
            Value::Null => self.condition(field, Test::IsNull),
            other => {
                FieldPath::resolve(self.handle.schema(), self.type_id, field)?;
                Err(CoreError::type_mismatch(
                    field,
                    "integer, text or null",
                    other.describe(),
                ))
            }
        }
    }

    /// String equality with explicit case handling.
    pub fn equal_to_case(self, field: &str, value: &str, case: Case) -> CoreResult<Self> {
        self.condition(field, Test::text(TextOp::Equals, value, case))
    }

    /// Integer range, inclusive on both ends.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the field is not an integer.
    pub fn between(self, field: &str, low: i64, high: i64) -> CoreResult<Self> {
        self.condition(field, Test::Between(low, high))
    }

    /// Integer strictly greater than `value`.
    pub fn greater_than(self, field: &str, value: i64) -> CoreResult<Self> {
        self.condition(field, Test::GreaterThan(value))
    }

    /// Integer strictly less than `value`.
    pub fn less_than(self, field: &str, value: i64) -> CoreResult<Self> {
        self.condition(field, Test::LessThan(value))
    }

    /// Case-sensitive substring match.
    pub fn contains(self, field: &str, needle: &str) -> CoreResult<Self> {
        self.contains_case(field, needle, Case::Sensitive)
    }

    /// Substring match with explicit case handling.
    pub fn contains_case(self, field: &str, needle: &str, case: Case) -> CoreResult<Self> {
        self.condition(field, Test::text(TextOp::Contains, needle, case))
    }

    /// Case-sensitive prefix match.
    pub fn begins_with(self, field: &str, prefix: &str) -> CoreResult<Self> {
        self.begins_with_case(field, prefix, Case::Sensitive)
    }

    /// Prefix match with explicit case handling.
    pub fn begins_with_case(self, field: &str, prefix: &str, case: Case) -> CoreResult<Self> {
        self.condition(field, Test::text(TextOp::BeginsWith, prefix, case))
    }

    /// Case-sensitive suffix match.
    pub fn ends_with(self, field: &str, suffix: &str) -> CoreResult<Self> {
        self.ends_with_case(field, suffix, Case::Sensitive)
    }

    /// Suffix match with explicit case handling.
    pub fn ends_with_case(self, field: &str, suffix: &str, case: Case) -> CoreResult<Self> {
        self.condition(field, Test::text(TextOp::EndsWith, suffix, case))
    }

    /// Single reference is null.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` unless the path ends at a single-reference field.
    pub fn is_null(self, field: &str) -> CoreResult<Self> {
        self.condition(field, Test::IsNull)
    }

    /// Starts a new alternative within the current group.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` if no condition precedes it.
    pub fn or(mut self) -> CoreResult<Self> {
        let group = self
            .groups
            .last_mut()
            .ok_or_else(|| CoreError::invalid_query("query has no open group"))?;
        if group.last().map_or(true, Vec::is_empty) {
            return Err(CoreError::invalid_query("or() must follow a condition"));
        }
        group.push(Vec::new());
        Ok(self)
    }

    /// Opens a parenthesized group.
    pub fn begin_group(mut self) -> CoreResult<Self> {
        self.groups.push(vec![Vec::new()]);
        Ok(self)
    }

    /// Closes the innermost group.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` without a matching `begin_group`, for an empty group,
    /// or after a dangling `or()`.
    pub fn end_group(mut self) -> CoreResult<Self> {
        if self.groups.len() < 2 {
            return Err(CoreError::invalid_query(
                "end_group() without matching begin_group()",
            ));
        }
        let group = self
            .groups
            .pop()
            .ok_or_else(|| CoreError::invalid_query("query has no open group"))?;
        if group.len() == 1 && group[0].is_empty() {
            return Err(CoreError::invalid_query("empty group"));
        }
        let predicate = close(group)?;
        Ok(self.push(predicate))
    }

    fn finish(mut self) -> CoreResult<(&'h Handle, TypeId, Predicate)> {
        if self.groups.len() != 1 {
            return Err(CoreError::invalid_query(format!(
                "{} group(s) left open",
                self.groups.len() - 1
            )));
        }
        let root = self.groups.swap_remove(0);
        Ok((self.handle, self.type_id, close(root)?))
    }

    /// All matches in store iteration order (insertion order).
    pub fn find_all(self) -> CoreResult<ResultSet<'h>> {
        let (handle, type_id, predicate) = self.finish()?;
        let ids: Vec<ObjectId> = handle.read(|state| {
            Ok(matching(state, type_id, &predicate)
                .map(|(key, _)| handle.bind(ObjectKey::new(type_id, key)))
                .collect())
        })?;
        Ok(ResultSet::new(handle, ids))
    }

    /// First match in iteration order, or `None`.
    pub fn find_first(self) -> CoreResult<Option<ObjectId>> {
        let (handle, type_id, predicate) = self.finish()?;
        handle.read(|state| {
            Ok(matching(state, type_id, &predicate)
                .next()
                .map(|(key, _)| handle.bind(ObjectKey::new(type_id, key))))
        })
    }

    /// Number of matches.
    pub fn count(self) -> CoreResult<usize> {
        let (handle, type_id, predicate) = self.finish()?;
        handle.read(|state| Ok(matching(state, type_id, &predicate).count()))
    }

    /// All matches ordered by `field`.
    ///
    /// `field` may be a direct integer or text field, or one reached through
    /// a single reference. Text orders bytewise. Objects whose reference is
    /// null sort before every value ascending and after every value
    /// descending. Ties keep iteration order in both directions.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the field is a reference or collection, or is
    /// reached through a collection.
    pub fn find_all_sorted(self, field: &str, order: Sort) -> CoreResult<ResultSet<'h>> {
        let (handle, type_id, predicate) = self.finish()?;
        let path = FieldPath::resolve(handle.schema(), type_id, field)?;
        if matches!(path.hop, Some(Hop::List(_))) {
            return Err(CoreError::type_mismatch(
                field,
                "a field reached through a single reference",
                "collection path",
            ));
        }
        let leaf = path.leaf.field_type();
        if !matches!(leaf, FieldType::Int | FieldType::Text) {
            return Err(CoreError::type_mismatch(field, "integer or text", leaf.describe()));
        }

        let ids: Vec<ObjectId> = handle.read(|state| {
            let mut keyed: Vec<(SortKey<'_>, u64)> = matching(state, type_id, &predicate)
                .map(|(key, row)| (SortKey::of(path.cells(state, row)), key))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| match order {
                Sort::Ascending => a.cmp(b),
                Sort::Descending => b.cmp(a),
            });
            Ok(keyed
                .into_iter()
                .map(|(_, key)| handle.bind(ObjectKey::new(type_id, key)))
                .collect())
        })?;
        Ok(ResultSet::new(handle, ids))
    }
}

fn matching<'s>(
    state: &'s StoreState,
    type_id: TypeId,
    predicate: &'s Predicate,
) -> impl Iterator<Item = (u64, &'s Vec<Cell>)> + 's {
    state
        .table(type_id)
        .iter()
        .filter(move |(_, row)| predicate.eval(state, row))
}

fn close(group: Group) -> CoreResult<Predicate> {
    if group.len() > 1 && group.last().is_some_and(Vec::is_empty) {
        return Err(CoreError::invalid_query("or() must be followed by a condition"));
    }
    let mut alternatives: Vec<Predicate> = group.into_iter().map(conjunction).collect();
    Ok(if alternatives.len() == 1 {
        alternatives.swap_remove(0)
    } else {
        Predicate::Any(alternatives)
    })
}

fn conjunction(mut terms: Vec<Predicate>) -> Predicate {
    if terms.len() == 1 {
        terms.swap_remove(0)
    } else {
        Predicate::All(terms)
    }
}

/// Ordering key of one object. `Null` orders first.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum SortKey<'s> {
    Null,
    Int(i64),
    Text(&'s str),
}

impl<'s> SortKey<'s> {
    fn of(reached: Reached<'s>) -> Self {
        match reached {
            Reached::One(Some(Cell::Int(n))) => Self::Int(*n),
            Reached::One(Some(Cell::Text(s))) => Self::Text(s),
            _ => Self::Null,
        }
    }
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("type_id", &self.type_id)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, FieldDef, Schema};
    use crate::store::Store;

    fn store() -> Store {
        Store::open_in_memory(
            Schema::from_entities([
                EntitySchema::new("Cat").field(FieldDef::text("name")),
                EntitySchema::new("Dog").field(FieldDef::text("name")),
                EntitySchema::new("Person")
                    .field(FieldDef::text("name"))
                    .field(FieldDef::int("age"))
                    .field(FieldDef::link("dog", "Dog"))
                    .field(FieldDef::list("cats", "Cat")),
            ])
            .unwrap(),
        )
        .unwrap()
    }

    /// Ann 41 with dog Fido and cat Tiger, Bob 23 with no dog, Cid 23 with
    /// dog Rex and cats Tom and Tigger.
    fn populate(h: &Handle) -> Vec<ObjectId> {
        h.write(|h| {
            let fido = h.create("Dog")?;
            h.set(fido, "name", "Fido")?;
            let rex = h.create("Dog")?;
            h.set(rex, "name", "Rex")?;

            let mut people = Vec::new();
            for (name, age, dog, cats) in [
                ("Ann", 41, Some(fido), vec!["Tiger"]),
                ("Bob", 23, None, vec![]),
                ("Cid", 23, Some(rex), vec!["Tom", "Tigger"]),
            ] {
                let person = h.create("Person")?;
                h.set(person, "name", name)?;
                h.set(person, "age", age)?;
                h.set(person, "dog", dog)?;
                for cat_name in cats {
                    let cat = h.create("Cat")?;
                    h.set(cat, "name", cat_name)?;
                    h.list_push(person, "cats", cat)?;
                }
                people.push(person);
            }
            Ok(people)
        })
        .unwrap()
    }

    fn names(h: &Handle, results: &ResultSet<'_>) -> Vec<String> {
        results
            .iter()
            .map(|id| h.get_text(id, "name").unwrap())
            .collect()
    }

    #[test]
    fn empty_query_matches_all_in_insertion_order() {
        let store = store();
        let h = store.handle();
        populate(&h);
        let all = h.query("Person").unwrap().find_all().unwrap();
        assert_eq!(names(&h, &all), ["Ann", "Bob", "Cid"]);
    }

    #[test]
    fn chained_conditions_are_anded() {
        let store = store();
        let h = store.handle();
        populate(&h);
        let found = h
            .query("Person")
            .unwrap()
            .equal_to("age", 23)
            .unwrap()
            .begins_with("name", "C")
            .unwrap()
            .find_all()
            .unwrap();
        assert_eq!(names(&h, &found), ["Cid"]);
    }

    #[test]
    fn or_binds_looser_than_and() {
        let store = store();
        let h = store.handle();
        populate(&h);
        // (age > 40) OR (age < 30 AND name ends with "b")
        let found = h
            .query("Person")
            .unwrap()
            .greater_than("age", 40)
            .unwrap()
            .or()
            .unwrap()
            .less_than("age", 30)
            .unwrap()
            .ends_with("name", "b")
            .unwrap()
            .find_all()
            .unwrap();
        assert_eq!(names(&h, &found), ["Ann", "Bob"]);
    }

    #[test]
    fn groups_control_precedence() {
        let store = store();
        let h = store.handle();
        populate(&h);
        // age == 23 AND (name == "Ann" OR name == "Cid")
        let count = h
            .query("Person")
            .unwrap()
            .equal_to("age", 23)
            .unwrap()
            .begin_group()
            .unwrap()
            .equal_to("name", "Ann")
            .unwrap()
            .or()
            .unwrap()
            .equal_to("name", "Cid")
            .unwrap()
            .end_group()
            .unwrap()
            .count()
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn link_hop_treats_null_as_false() {
        let store = store();
        let h = store.handle();
        populate(&h);
        let found = h
            .query("Person")
            .unwrap()
            .equal_to_case("dog.name", "fido", Case::Insensitive)
            .unwrap()
            .find_all()
            .unwrap();
        assert_eq!(names(&h, &found), ["Ann"]);

        let dogless = h.query("Person").unwrap().is_null("dog").unwrap().find_all().unwrap();
        assert_eq!(names(&h, &dogless), ["Bob"]);
    }

    #[test]
    fn list_hop_matches_any_element() {
        let store = store();
        let h = store.handle();
        populate(&h);
        let found = h
            .query("Person")
            .unwrap()
            .contains_case("cats.name", "TIG", Case::Insensitive)
            .unwrap()
            .find_all()
            .unwrap();
        assert_eq!(names(&h, &found), ["Ann", "Cid"]);

        let exact = h
            .query("Person")
            .unwrap()
            .contains("cats.name", "TIG")
            .unwrap()
            .find_first()
            .unwrap();
        assert_eq!(exact, None);
    }

    #[test]
    fn operand_type_errors() {
        let store = store();
        let h = store.handle();
        assert!(matches!(
            h.query("Person").unwrap().between("name", 1, 2),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            h.query("Person").unwrap().contains("age", "1"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            h.query("Person").unwrap().equal_to("cats", "x"),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            h.query("Person").unwrap().equal_to("dog.owner", 1),
            Err(CoreError::UnknownField { .. })
        ));
    }

    #[test]
    fn unbalanced_groups_are_invalid() {
        let store = store();
        let h = store.handle();
        assert!(matches!(
            h.query("Person").unwrap().end_group(),
            Err(CoreError::InvalidQuery { .. })
        ));
        assert!(matches!(
            h.query("Person").unwrap().or(),
            Err(CoreError::InvalidQuery { .. })
        ));
        assert!(matches!(
            h.query("Person").unwrap().begin_group().unwrap().find_all(),
            Err(CoreError::InvalidQuery { .. })
        ));
        assert!(matches!(
            h.query("Person")
                .unwrap()
                .equal_to("age", 1)
                .unwrap()
                .or()
                .unwrap()
                .count(),
            Err(CoreError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn sorting_is_stable_both_ways() {
        let store = store();
        let h = store.handle();
        populate(&h);

        let up = h
            .query("Person")
            .unwrap()
            .find_all_sorted("age", Sort::Ascending)
            .unwrap();
        assert_eq!(names(&h, &up), ["Bob", "Cid", "Ann"]);

        let down = h
            .query("Person")
            .unwrap()
            .find_all_sorted("age", Sort::Descending)
            .unwrap();
        assert_eq!(names(&h, &down), ["Ann", "Bob", "Cid"]);
    }

    #[test]
    fn sorting_through_link_puts_nulls_first_ascending() {
        let store = store();
        let h = store.handle();
        populate(&h);

        let up = h
            .query("Person")
            .unwrap()
            .find_all_sorted("dog.name", Sort::Ascending)
            .unwrap();
        assert_eq!(names(&h, &up), ["Bob", "Ann", "Cid"]);

        let down = h
            .query("Person")
            .unwrap()
            .find_all_sorted("dog.name", Sort::Descending)
            .unwrap();
        assert_eq!(names(&h, &down), ["Cid", "Ann", "Bob"]);

        assert!(matches!(
            h.query("Person").unwrap().find_all_sorted("cats.name", Sort::Ascending),
            Err(CoreError::TypeMismatch { .. })
        ));
        assert!(matches!(
            h.query("Person").unwrap().find_all_sorted("dog", Sort::Ascending),
            Err(CoreError::TypeMismatch { .. })
        ));
    }
}
