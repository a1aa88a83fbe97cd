//! Property-based test generators using proptest.
//!
//! Provides strategies for generating people and operation sequences over
//! the sample schema.

use proptest::prelude::*;

/// Strategy for person ages.
pub fn age_strategy() -> impl Strategy<Value = i64> {
    0i64..100
}

/// Strategy for person names; some start with `Person`, some do not.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("(Person|Pet|Young|person) [a-z]{0,6}")
        .expect("Invalid regex")
}

/// Strategy for a set of people.
pub fn people_strategy(
    min: usize,
    max: usize,
) -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec((name_strategy(), age_strategy()), min..max)
}

/// An operation against the Person table.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Create a person.
    Create {
        /// Person name.
        name: String,
        /// Person age.
        age: i64,
    },
    /// Delete the live person at this position (modulo the count).
    Delete {
        /// Position among live persons.
        index: usize,
    },
    /// Change the age of the live person at this position.
    SetAge {
        /// Position among live persons.
        index: usize,
        /// New age.
        age: i64,
    },
}

/// Strategy for one store operation.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    prop_oneof![
        3 => (name_strategy(), age_strategy())
            .prop_map(|(name, age)| StoreOperation::Create { name, age }),
        1 => any::<usize>().prop_map(|index| StoreOperation::Delete { index }),
        2 => (any::<usize>(), age_strategy())
            .prop_map(|(index, age)| StoreOperation::SetAge { index, age }),
    ]
}

/// Strategy for a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{populate_named, TestStore};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn names_are_non_empty(name in name_strategy()) {
            prop_assert!(name.contains(' '));
        }

        #[test]
        fn count_tracks_committed_operations(ops in operation_sequence_strategy(1, 40)) {
            let store = TestStore::memory();
            let h = store.handle();
            let mut expected = 0usize;

            for op in ops {
                match op {
                    StoreOperation::Create { name, age } => {
                        populate_named(&h, &[(name, age)]).unwrap();
                        expected += 1;
                    }
                    StoreOperation::Delete { index } => {
                        let mut all = h.query("Person").unwrap().find_all().unwrap();
                        if !all.is_empty() {
                            let index = index % all.len();
                            h.begin_write().unwrap();
                            all.delete_from_store(index).unwrap();
                            h.commit().unwrap();
                            expected -= 1;
                        }
                    }
                    StoreOperation::SetAge { index, age } => {
                        let all = h.query("Person").unwrap().find_all().unwrap();
                        if let Some(person) = all.get(index % all.len().max(1)) {
                            // rolled back: must not be visible
                            h.begin_write().unwrap();
                            h.set(person, "age", age).unwrap();
                            h.create("Person").unwrap();
                            h.rollback().unwrap();
                        }
                    }
                }
                prop_assert_eq!(h.count("Person").unwrap(), expected);
            }
        }
    }
}
