//! Tests for parent/child relations held by the store

use chrono::NaiveDate;
use rstest::{fixture, rstest};

use bomgraph::domain::{
    BomNode, BomStore, DomainError, DomainResult, FieldReader, FieldWriter, Handle,
};
use bomgraph::sample::{register_sample_types, FlightDate, Inventory, InventoryAccess};
use bomgraph::util::testing::init_test_setup;

struct Airlines {
    store: BomStore,
    ba: Handle<Inventory>,
    af: Handle<Inventory>,
}

/// Root with BA and AF attached in that order.
#[fixture]
fn airlines() -> Airlines {
    init_test_setup();
    let mut store = BomStore::new();
    register_sample_types(&mut store).unwrap();
    let ba = store.create(Inventory::new("BA")).unwrap();
    let af = store.create(Inventory::new("AF")).unwrap();
    store.add_to_root(ba).unwrap();
    store.add_to_root(af).unwrap();
    Airlines { store, ba, af }
}

/// Node whose key is displayed differently from its `Display` text.
#[derive(Debug)]
struct Carrier {
    code: String,
}

impl BomNode for Carrier {
    type Key = String;
    const TYPE_TAG: &'static str = "Carrier";

    fn key(&self) -> &String {
        &self.code
    }

    fn describe_key(&self) -> String {
        format!("carrier:{}", self.code)
    }

    fn save(&self, out: &mut FieldWriter) {
        out.write_str(self.code.as_str());
    }

    fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
        Ok(Self {
            code: input.read_str()?,
        })
    }
}

fn root_codes(store: &BomStore) -> Vec<&str> {
    store
        .root_children::<Inventory>()
        .into_iter()
        .map(Inventory::airline_code)
        .collect()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
}

#[rstest]
fn given_two_inventories_when_children_of_root_then_attachment_order(airlines: Airlines) {
    let store = &airlines.store;

    assert_eq!(root_codes(store), vec!["BA", "AF"]);
    let af = store.find_child::<Inventory>(&store.root_ref(), &"AF".to_string());
    assert_eq!(af.map(Inventory::airline_code), Some("AF"));
    assert_eq!(store.get_inventory("BA").map(Inventory::airline_code), Some("BA"));
}

#[rstest]
fn given_attached_child_when_attach_again_then_duplicate_relation(mut airlines: Airlines) {
    // Arrange
    let root = airlines.store.root_ref();
    let af = airlines.store.node_ref(airlines.af).unwrap();

    // Act
    let err = airlines.store.attach::<Inventory>(&root, &af).unwrap_err();

    // Assert
    assert!(matches!(
        err,
        DomainError::DuplicateRelation { tag: "Inventory", ref key, .. } if key == "AF"
    ));
    assert_eq!(root_codes(&airlines.store), vec!["BA", "AF"]);
}

#[rstest]
fn given_wrong_declared_type_when_attach_then_type_mismatch(mut airlines: Airlines) {
    let flight = airlines.store.create(FlightDate::new("BA", 9, date(20))).unwrap();
    let flight = airlines.store.node_ref(flight).unwrap();
    let root = airlines.store.root_ref();

    let err = airlines.store.attach::<Inventory>(&root, &flight).unwrap_err();

    assert_eq!(
        err,
        DomainError::TypeMismatch {
            expected: "Inventory",
            actual: "FlightDate"
        }
    );
    assert_eq!(airlines.store.relations().child_count(&root), 2);
}

#[rstest]
fn given_attached_child_when_detach_then_node_survives(mut airlines: Airlines) {
    let root = airlines.store.root_ref();
    let key = "BA".to_string();

    airlines.store.detach::<Inventory>(&root, &key).unwrap();

    assert!(airlines.store.find::<Inventory>(&key).is_some());
    assert!(airlines.store.find_child::<Inventory>(&root, &key).is_none());
    assert_eq!(root_codes(&airlines.store), vec!["AF"]);
}

#[rstest]
fn given_no_relation_when_detach_then_not_found(mut airlines: Airlines) {
    let root = airlines.store.root_ref();

    let err = airlines
        .store
        .detach::<Inventory>(&root, &"LH".to_string())
        .unwrap_err();

    assert!(matches!(err, DomainError::NotFound { tag: "Inventory", .. }));
}

#[rstest]
fn given_detached_child_when_attach_again_then_goes_to_the_end(mut airlines: Airlines) {
    let root = airlines.store.root_ref();
    airlines.store.detach::<Inventory>(&root, &"BA".to_string()).unwrap();

    airlines.store.add_to_root(airlines.ba).unwrap();

    assert_eq!(root_codes(&airlines.store), vec!["AF", "BA"]);
}

#[rstest]
fn given_parent_without_children_when_children_of_then_empty(airlines: Airlines) {
    let ba = airlines.store.node_ref(airlines.ba).unwrap();

    assert!(airlines.store.children_of::<FlightDate>(&ba).is_empty());
    assert!(airlines.store.flight_dates(airlines.ba).is_empty());
}

#[rstest]
fn given_child_under_two_parents_when_children_of_then_both_see_it(mut airlines: Airlines) {
    let flight = airlines.store.create(FlightDate::new("BA", 9, date(20))).unwrap();

    airlines.store.link(airlines.ba, flight).unwrap();
    airlines.store.link(airlines.af, flight).unwrap();

    assert_eq!(airlines.store.flight_dates(airlines.ba).len(), 1);
    assert_eq!(airlines.store.flight_dates(airlines.af).len(), 1);
}

#[rstest]
fn given_destroyed_child_when_link_then_stale_handle(mut airlines: Airlines) {
    let flight = airlines.store.create(FlightDate::new("BA", 9, date(20))).unwrap();
    airlines.store.destroy_all::<FlightDate>();

    let err = airlines.store.link(airlines.ba, flight).unwrap_err();

    assert_eq!(err, DomainError::StaleHandle { tag: "FlightDate" });
}

#[rstest]
fn given_destroyed_children_when_children_of_then_skipped(mut airlines: Airlines) {
    let flight = airlines.store.create(FlightDate::new("BA", 9, date(20))).unwrap();
    airlines.store.link(airlines.ba, flight).unwrap();

    airlines.store.destroy_all::<FlightDate>();

    assert!(airlines.store.flight_dates(airlines.ba).is_empty());
}

#[rstest]
fn given_populated_store_when_clear_then_only_root_remains(mut airlines: Airlines) {
    airlines.store.clear();

    assert!(airlines.store.root_children::<Inventory>().is_empty());
    assert!(airlines.store.relations().is_empty());
    assert!(airlines.store.root().is_some());
    assert!(airlines.store.get(airlines.ba).is_none());
}

#[test]
fn given_custom_key_display_when_find_child_and_detach_then_found_by_key() {
    init_test_setup();
    // Arrange
    let mut store = BomStore::new();
    let carrier = store
        .create(Carrier {
            code: "BA".to_string(),
        })
        .unwrap();
    store.add_to_root(carrier).unwrap();
    let root = store.root_ref();
    let key = "BA".to_string();

    // Act
    let found = store.find_child::<Carrier>(&root, &key).map(|c| c.code.clone());
    let detached = store.detach::<Carrier>(&root, &key);

    // Assert
    assert_eq!(found, Some("BA".to_string()));
    assert!(detached.is_ok());
    assert!(store.children_of::<Carrier>(&root).is_empty());
    assert_eq!(store.node_ref(carrier).map(|r| r.key().to_string()), Some(key));
}
