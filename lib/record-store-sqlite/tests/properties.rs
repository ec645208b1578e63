#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use proptest::test_runner::Config;
use record_store::stock;
use record_store_sqlite::{
    Fields, Selection, SqliteConfig, SqliteRecordStore, StoreConfig, TableSchema, ValidationError,
    open_store,
};

fn store(authority: &str, schema: TableSchema) -> SqliteRecordStore {
    open_store(&SqliteConfig::in_memory(), StoreConfig::new(authority, schema))
        .expect("open store")
}

fn pet(name: &str, gender: i64, weight: i64) -> Fields {
    Fields::new()
        .with("name", name)
        .with("breed", "Mixed")
        .with("gender", gender)
        .with("weight", weight)
}

fn item(section: i64) -> Fields {
    Fields::new()
        .with(stock::NAME, "Sponge")
        .with(stock::BRAND, "Scotch")
        .with(stock::SUPPLIER_NAME, "Makro")
        .with(stock::SUPPLIER_PHONE, "0201234567")
        .with(stock::SUPPLIER_EMAIL, "orders@makro.nl")
        .with(stock::SECTION, section)
}

proptest! {
    #![proptest_config(Config::with_cases(64))]
    #[test]
    fn gender_outside_enumeration_is_rejected(gender in any::<i64>()) {
        let pets = store("eu.id2go.pets", TableSchema::pets());
        let result = pets.create(pet("Rex", gender, 10));
        if (0..=2).contains(&gender) {
            let id = result.expect("valid gender");
            prop_assert_eq!(pets.get(id).expect("get").expect("row").get_i64("gender"), Some(gender));
        } else {
            let err = result.unwrap_err();
            let is_classification = matches!(
                err.as_validation(),
                Some(ValidationError::InvalidClassification { .. })
            );
            prop_assert!(is_classification);
            prop_assert!(pets.list(Selection::all()).expect("list").is_empty());
        }
    }

    #[test]
    fn section_outside_enumeration_is_rejected_on_update(section in -5_i64..20) {
        let shop = store("eu.id2go.stock2go", TableSchema::stock());
        let id = shop.create(item(stock::SECTION_CLEANING)).expect("create");

        let result = shop.update_by_id(id, Fields::new().with(stock::SECTION, section));
        let stored = shop.get(id).expect("get").expect("row").get_i64(stock::SECTION);
        if (stock::SECTION_UNKNOWN..=stock::SECTION_VEGETABLES).contains(&section) {
            prop_assert_eq!(result.expect("valid section"), 1);
            prop_assert_eq!(stored, Some(section));
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(stored, Some(stock::SECTION_CLEANING));
        }
    }

    #[test]
    fn weight_must_be_non_negative(weight in -1_000_i64..1_000) {
        let pets = store("eu.id2go.pets", TableSchema::pets());
        let result = pets.create(pet("Rex", 1, weight));
        prop_assert_eq!(result.is_ok(), weight >= 0);
    }

    #[test]
    fn ids_increase_and_are_never_reused(ops in prop::collection::vec(any::<bool>(), 1..40)) {
        let pets = store("eu.id2go.pets", TableSchema::pets());
        let mut last = 0;
        let mut live = Vec::new();
        for create in ops {
            if create || live.is_empty() {
                let id = pets.create(pet("Rex", 0, 1)).expect("create");
                prop_assert!(id > last);
                last = id;
                live.push(id);
            } else if let Some(id) = live.pop() {
                prop_assert_eq!(pets.delete_by_id(id).expect("delete"), 1);
                prop_assert_eq!(pets.delete_by_id(id).expect("delete again"), 0);
            }
        }
        let ids: Vec<i64> = pets
            .list(Selection::all())
            .expect("list")
            .iter()
            .map(|r| r.id)
            .collect();
        prop_assert_eq!(ids, live);
    }

    #[test]
    fn created_fields_read_back_exactly(
        name in r#"[A-Za-z0-9 '"%_-]{1,32}"#,
        breed in "[A-Za-z ]{1,24}",
        gender in 0_i64..=2,
        weight in 0_i64..100_000
    ) {
        let pets = store("eu.id2go.pets", TableSchema::pets());
        let submitted = Fields::new()
            .with("name", name.as_str())
            .with("breed", breed.as_str())
            .with("gender", gender)
            .with("weight", weight);
        let id = pets.create(submitted.clone()).expect("create");

        let stored = pets.get(id).expect("get").expect("row");
        prop_assert_eq!(stored.id, id);
        prop_assert_eq!(stored.fields, submitted);

        let found = pets.list(Selection::all().eq("name", name.as_str())).expect("list");
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(found[0].id, id);
    }
}
