//! Demo command: the sample Person/Dog/Cat scenarios.
//!
//! Runs, in order: delete half the persons, basic CRUD, a basic query, a
//! link query, then a bulk write and a compound query on a worker thread
//! with its own handle.

use crate::sample;
use objdb_core::{Case, CoreResult, Handle, Sort, Store};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::thread;
use tracing::info;

/// Runs the demo against the store at `path`, or an in-memory one.
pub fn run(path: Option<&Path>, seed: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let store = match path {
        Some(path) => Store::open(path, sample::schema()?)?,
        None => Store::open_in_memory(sample::schema()?)?,
    };
    let mut rng = seeded_rng(seed);

    let handle = store.handle();
    clear_half(&handle, &mut rng)?;
    basic_crud(&handle)?;
    basic_query(&handle)?;
    basic_link_query(&handle)?;

    let worker_store = store.clone();
    let worker_rng = seeded_rng(seed.map(|s| s.wrapping_add(1)));
    let worker = thread::spawn(move || -> CoreResult<Vec<String>> {
        let mut rng = worker_rng;
        let handle = worker_store.handle();
        let mut report = complex_read_write(&handle, &mut rng)?;
        report.extend(complex_query(&handle)?);
        handle.close();
        Ok(report)
    });
    let report = worker
        .join()
        .map_err(|_| "demo worker thread panicked")??;
    for line in report {
        info!("{line}");
    }

    handle.close();
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Deletes half of the persons, picking a random position each time.
pub fn clear_half(h: &Handle, rng: &mut impl Rng) -> CoreResult<usize> {
    info!("== Delete half database operation ==");
    info!("store contains {} persons", h.count("Person")?);

    let deleted = h.write(|h| {
        let mut all = h.query("Person")?.find_all()?;
        let half = all.len() / 2;
        for _ in 0..half {
            let index = rng.gen_range(0..all.len());
            all.delete_from_store(index)?;
        }
        Ok(half)
    })?;

    info!("[DELETE] now the store contains {} persons", h.count("Person")?);
    Ok(deleted)
}

/// Create, read, update and delete one person.
pub fn basic_crud(h: &Handle) -> CoreResult<()> {
    info!("== Basic CRUD operations ==");
    info!("store contains {} persons", h.count("Person")?);

    let created = h.write(|h| {
        let person = h.create("Person")?;
        h.set(person, "id", 1)?;
        h.set(person, "name", "Young Person")?;
        h.set(person, "age", 34)?;
        let dog = h.create("Dog")?;
        h.set(dog, "name", "Carlino")?;
        h.set(person, "dog", dog)?;
        let mut cats = Vec::new();
        for name in ["Vincent", "Theo"] {
            let cat = h.create("Cat")?;
            h.set(cat, "name", name)?;
            cats.push(cat);
        }
        h.set(person, "cats", cats)?;
        Ok(person)
    })?;
    info!("[CREATE] {}", sample::describe_person(h, created)?);

    let Some(person) = h.query("Person")?.equal_to("age", 34)?.find_first()? else {
        info!("[READ] no person with age=34");
        return Ok(());
    };
    info!(
        "[READ] the first person where age=34: {}, age = {}",
        h.get_text(person, "name")?,
        h.get_int(person, "age")?
    );

    h.write(|h| {
        h.set(person, "name", "Old Person")?;
        h.set(person, "age", 66)
    })?;
    info!(
        "[UPDATE] {} got older: {}",
        h.get_text(person, "name")?,
        h.get_int(person, "age")?
    );

    info!("before deleting a person the store contains {} persons", h.count("Person")?);
    let info = format!("{}, age = {}", h.get_text(person, "name")?, h.get_int(person, "age")?);
    h.write(|h| h.delete(person))?;
    info!("[DELETE] deleted a person: {info}");
    info!("after deleting a person the store contains {} persons", h.count("Person")?);
    Ok(())
}

/// Grouped query combining a substring, a range and a link hop.
pub fn basic_query(h: &Handle) -> CoreResult<usize> {
    info!("== Basic Query operation ==");
    info!("number of persons: {}", h.count("Person")?);

    let (min_age, max_age) = (20, 50);
    let results = h
        .query("Person")?
        .begin_group()?
        .contains("name", " no. ")?
        .between("age", min_age, max_age)?
        .equal_to("dog.name", "fido")?
        .end_group()?
        .find_all()?;

    info!(
        "[READ] number of persons with age between {min_age} and {max_age}: {}",
        results.len()
    );
    for person in &results {
        info!("  {}", sample::describe_person(h, person)?);
    }
    Ok(results.len())
}

/// Adds a person with a cat, then finds persons by cat name.
pub fn basic_link_query(h: &Handle) -> CoreResult<usize> {
    info!("== Basic Link Query operation ==");

    h.write(|h| {
        let person = h.create("Person")?;
        h.set(person, "name", "Antonio")?;
        h.set(person, "age", 20)?;
        let dog = h.create("Dog")?;
        h.set(dog, "name", "Tornaacasa Lessi")?;
        h.set(person, "dog", dog)?;
        let cat = h.create("Cat")?;
        h.set(cat, "name", "Mice Tiger Woods")?;
        h.list_push(person, "cats", cat)
    })?;
    info!("number of persons in the store: {}", h.count("Person")?);

    let results = h
        .query("Person")?
        .begin_group()?
        .contains_case("cats.name", "Tiger", Case::Insensitive)?
        .end_group()?
        .find_all()?;
    info!("number of persons with a cat like Tiger: {}", results.len());
    for person in &results {
        info!("  {}", sample::describe_person(h, person)?);
    }
    Ok(results.len())
}

/// Adds ten persons sharing one dog, lists everyone, and checks that the
/// last of a descending age sort is the youngest.
pub fn complex_read_write(h: &Handle, rng: &mut impl Rng) -> CoreResult<Vec<String>> {
    let mut report = vec!["== Complex Read/Write operation ==".to_string()];

    h.write(|h| {
        let fido = h.create("Dog")?;
        h.set(fido, "name", "fido")?;
        for i in 0..10_i64 {
            let person = h.create("Person")?;
            h.set(person, "id", i)?;
            h.set(person, "name", format!("Person no. {i}"))?;
            h.set(person, "age", rng.gen_range(0..i * 10 + 1) + i)?;
            h.set(person, "dog", fido)?;
            for j in 0..i {
                let cat = h.create("Cat")?;
                h.set(cat, "name", format!("Cat_{j}"))?;
                h.list_push(person, "cats", cat)?;
            }
        }
        Ok(())
    })?;

    report.push(format!("number of persons: {}", h.count("Person")?));
    for person in &h.query("Person")?.find_all()? {
        report.push(sample::describe_person(h, person)?);
    }

    let sorted = h.query("Person")?.find_all_sorted("age", Sort::Descending)?;
    let youngest = h.query("Person")?.find_all_sorted("age", Sort::Ascending)?;
    if let (Some(last), Some(first)) = (sorted.last(), youngest.first()) {
        report.push(format!(
            "sorting {} == {}",
            h.get_text(last, "name")?,
            h.get_text(first, "name")?
        ));
    }
    Ok(report)
}

/// Range plus prefix, ANDed.
pub fn complex_query(h: &Handle) -> CoreResult<Vec<String>> {
    let mut report = vec!["== Complex Query operation ==".to_string()];
    report.push(format!("number of persons: {}", h.count("Person")?));

    let results = h
        .query("Person")?
        .between("age", 20, 50)?
        .begins_with("name", "Person")?
        .find_all()?;
    report.push(format!("size of result set: {}", results.len()));
    Ok(report)
}
