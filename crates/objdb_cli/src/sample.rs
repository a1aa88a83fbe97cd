//! The sample schema the demo populates.

use objdb_core::{CoreResult, EntitySchema, FieldDef, Handle, ObjectId, Schema};

/// Cat, Dog and Person, where a person has one dog and any number of cats.
pub fn schema() -> CoreResult<Schema> {
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
}

/// One-line summary: `name:age : dog : cat count`.
pub fn describe_person(h: &Handle, person: ObjectId) -> CoreResult<String> {
    let dog = match h.get_link(person, "dog")? {
        Some(dog) => h.get_text(dog, "name")?,
        None => "None".to_string(),
    };
    Ok(format!(
        "{}:{} : {} : {}",
        h.get_text(person, "name")?,
        h.get_int(person, "age")?,
        dog,
        h.list_len(person, "cats")?
    ))
}
