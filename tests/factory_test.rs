//! Tests for the object factory and its per-type pools

use rstest::rstest;

use bomgraph::domain::{
    BomNode, BomStore, DomainError, DomainResult, FieldReader, FieldWriter, ObjectFactory, ROOT_KEY,
};
use bomgraph::sample::Inventory;
use bomgraph::util::testing::init_test_setup;

/// Claims the tag of `Inventory` with a different Rust type.
#[derive(Debug)]
struct Impostor {
    key: String,
}

impl BomNode for Impostor {
    type Key = String;
    const TYPE_TAG: &'static str = "Inventory";

    fn key(&self) -> &String {
        &self.key
    }

    fn save(&self, out: &mut FieldWriter) {
        out.write_str(self.key.as_str());
    }

    fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
        Ok(Self { key: input.read_str()? })
    }
}

fn codes(factory: &ObjectFactory) -> Vec<String> {
    factory
        .all_of::<Inventory>()
        .map(|inv| inv.airline_code().to_string())
        .collect()
}

#[test]
fn given_created_node_when_find_by_key_then_returns_that_instance() {
    init_test_setup();
    // Arrange
    let mut factory = ObjectFactory::new();
    let handle = factory.create(Inventory::new("BA")).unwrap();

    // Act
    let found = factory.find::<Inventory>(&"BA".to_string());

    // Assert
    assert_eq!(found.map(Inventory::airline_code), Some("BA"));
    assert_eq!(factory.find_handle::<Inventory>(&"BA".to_string()), Some(handle));
    assert!(std::ptr::eq(found.unwrap(), factory.get(handle).unwrap()));
}

#[rstest]
#[case("BA")]
#[case("AF")]
fn given_existing_key_when_create_again_then_duplicate_key(#[case] code: &str) {
    init_test_setup();
    let mut factory = ObjectFactory::new();
    factory.create(Inventory::new(code)).unwrap();

    let err = factory.create(Inventory::new(code)).unwrap_err();

    assert_eq!(
        err,
        DomainError::DuplicateKey {
            tag: "Inventory",
            key: code.to_string()
        }
    );
    assert_eq!(factory.count("Inventory"), 1);
}

#[test]
fn given_unknown_key_when_find_then_absent_not_error() {
    let mut factory = ObjectFactory::new();
    assert!(factory.find::<Inventory>(&"LH".to_string()).is_none());

    factory.register::<Inventory>().unwrap();
    assert!(factory.find::<Inventory>(&"LH".to_string()).is_none());
}

#[test]
fn given_same_key_in_two_types_when_create_then_both_exist() {
    let mut store = BomStore::new();

    store.create(Inventory::new(ROOT_KEY)).unwrap();

    assert!(store.find::<Inventory>(&ROOT_KEY.to_string()).is_some());
    assert!(store.root().is_some());
}

#[test]
fn given_several_nodes_when_all_of_then_creation_order() {
    let mut factory = ObjectFactory::new();
    for code in ["LH", "BA", "AF"] {
        factory.create(Inventory::new(code)).unwrap();
    }

    assert_eq!(codes(&factory), vec!["LH", "BA", "AF"]);
}

#[test]
fn given_destroyed_pool_when_using_old_handle_then_nothing_resolves() {
    init_test_setup();
    // Arrange
    let mut factory = ObjectFactory::new();
    let old = factory.create(Inventory::new("BA")).unwrap();

    // Act
    factory.destroy_all::<Inventory>();
    let new = factory.create(Inventory::new("BA")).unwrap();

    // Assert
    assert!(factory.get(old).is_none());
    assert_ne!(old, new);
    assert_eq!(codes(&factory), vec!["BA"]);
}

#[test]
fn given_tag_bound_to_other_type_when_create_then_type_mismatch() {
    let mut factory = ObjectFactory::new();
    factory.create(Inventory::new("BA")).unwrap();

    let err = factory
        .create(Impostor {
            key: "AF".to_string(),
        })
        .unwrap_err();

    assert!(matches!(err, DomainError::TypeMismatch { .. }));
    assert_eq!(factory.count("Inventory"), 1);
}

#[test]
fn given_registered_types_when_tags_then_registration_order() {
    let mut store = BomStore::new();
    bomgraph::sample::register_sample_types(&mut store).unwrap();

    let tags: Vec<_> = store.factory().tags().collect();

    assert_eq!(tags, vec!["BomRoot", "Inventory", "FlightDate", "BookingClass"]);
}
