//! Sample airline inventory built on the object model.
//!
//! Shows how a domain extends the core: three node types, a fixed
//! registration order, a builder for a small built-in tree and typed
//! accessors on top of the root.

use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::domain::{
    BomNode, BomStore, DomainResult, FieldReader, FieldWriter, Handle, NodeRef,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inventory of one airline, keyed by its airline code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    airline_code: String,
}

impl Inventory {
    pub fn new(airline_code: impl Into<String>) -> Self {
        Self {
            airline_code: airline_code.into(),
        }
    }

    pub fn airline_code(&self) -> &str {
        &self.airline_code
    }
}

impl BomNode for Inventory {
    type Key = String;
    const TYPE_TAG: &'static str = "Inventory";

    fn key(&self) -> &String {
        &self.airline_code
    }

    fn describe(&self) -> String {
        format!("Inventory {}", self.airline_code)
    }

    fn save(&self, out: &mut FieldWriter) {
        out.write_str(self.airline_code.as_str());
    }

    fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
        Ok(Self::new(input.read_str()?))
    }
}

/// Airline, flight number and departure date, shown as `BA 9/2026-06-20`.
///
/// The flight number has no spaces and the date no slash, so the text form
/// splits back unambiguously from the right.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightDateKey {
    pub airline_code: String,
    pub flight_number: u32,
    pub departure_date: NaiveDate,
}

impl fmt::Display for FlightDateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.airline_code,
            self.flight_number,
            self.departure_date.format(DATE_FORMAT)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightDate {
    key: FlightDateKey,
}

impl FlightDate {
    pub fn new(
        airline_code: impl Into<String>,
        flight_number: u32,
        departure_date: NaiveDate,
    ) -> Self {
        Self {
            key: FlightDateKey {
                airline_code: airline_code.into(),
                flight_number,
                departure_date,
            },
        }
    }
}

impl BomNode for FlightDate {
    type Key = FlightDateKey;
    const TYPE_TAG: &'static str = "FlightDate";

    fn key(&self) -> &FlightDateKey {
        &self.key
    }

    fn describe(&self) -> String {
        format!("FlightDate {}", self.key)
    }

    fn save(&self, out: &mut FieldWriter) {
        out.write_str(self.key.airline_code.as_str())
            .write_u64(u64::from(self.key.flight_number))
            .write_str(self.key.departure_date.format(DATE_FORMAT).to_string());
    }

    fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
        let airline_code = input.read_str()?;
        let number = input.read_u64()?;
        let flight_number = u32::try_from(number)
            .map_err(|_| input.error(format!("flight number out of range: {}", number)))?;
        let date = input.read_str()?;
        let departure_date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| input.error(format!("invalid departure date '{}': {}", date, e)))?;
        Ok(Self::new(airline_code, flight_number, departure_date))
    }
}

/// Booking class of a flight-date. Class codes repeat across flights, so the
/// key carries the flight-date key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookingClassKey {
    pub flight: FlightDateKey,
    pub class_code: String,
}

impl fmt::Display for BookingClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flight, self.class_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingClass {
    key: BookingClassKey,
    availability: u64,
}

impl BookingClass {
    pub fn new(flight: FlightDateKey, class_code: impl Into<String>, availability: u64) -> Self {
        Self {
            key: BookingClassKey {
                flight,
                class_code: class_code.into(),
            },
            availability,
        }
    }

    pub fn availability(&self) -> u64 {
        self.availability
    }

    pub fn set_availability(&mut self, availability: u64) {
        self.availability = availability;
    }
}

impl BomNode for BookingClass {
    type Key = BookingClassKey;
    const TYPE_TAG: &'static str = "BookingClass";

    fn key(&self) -> &BookingClassKey {
        &self.key
    }

    fn describe(&self) -> String {
        format!("BookingClass {} (avl {})", self.key.class_code, self.availability)
    }

    fn save(&self, out: &mut FieldWriter) {
        FlightDate { key: self.key.flight.clone() }.save(out);
        out.write_str(self.key.class_code.as_str())
            .write_u64(self.availability);
    }

    fn load(input: &mut FieldReader<'_>) -> DomainResult<Self> {
        let flight = FlightDate::load(input)?.key;
        let class_code = input.read_str()?;
        let availability = input.read_u64()?;
        Ok(Self::new(flight, class_code, availability))
    }
}

/// Registers the sample types; their order fixes the dump order of siblings.
pub fn register_sample_types(store: &mut BomStore) -> DomainResult<()> {
    store.register::<Inventory>()?;
    store.register::<FlightDate>()?;
    store.register::<BookingClass>()
}

// (airline, flight number, year, month, day, classes)
const SAMPLE_SCHEDULE: &[(&str, u32, i32, u32, u32, &[(&str, u64)])] = &[
    ("BA", 9, 2026, 6, 20, &[("J", 12), ("Y", 150)]),
    ("BA", 117, 2026, 6, 21, &[("Y", 180)]),
    ("AF", 84, 2026, 6, 20, &[("C", 20), ("M", 90), ("Y", 120)]),
];

/// Builds the built-in sample tree: BA and AF inventories with a few flights.
#[instrument(level = "debug", skip(store))]
pub fn build_sample_bom(store: &mut BomStore) -> DomainResult<()> {
    register_sample_types(store)?;

    for (airline, number, year, month, day, classes) in SAMPLE_SCHEDULE {
        let Some(date) = NaiveDate::from_ymd_opt(*year, *month, *day) else {
            continue;
        };
        let inventory = match store.find_handle::<Inventory>(&airline.to_string()) {
            Some(handle) => handle,
            None => {
                let handle = store.create(Inventory::new(*airline))?;
                store.add_to_root(handle)?;
                handle
            }
        };
        let flight = FlightDate::new(*airline, *number, date);
        let flight_key = flight.key().clone();
        let flight = store.create(flight)?;
        store.link(inventory, flight)?;
        for (code, availability) in classes.iter() {
            let class = store.create(BookingClass::new(flight_key.clone(), *code, *availability))?;
            store.link(flight, class)?;
        }
    }
    debug!("sample BOM built");
    Ok(())
}

/// Typed accessors for the sample inventory.
pub trait InventoryAccess {
    fn get_inventory(&self, airline_code: &str) -> Option<&Inventory>;
    fn inventories(&self) -> Vec<&Inventory>;
    fn flight_dates(&self, inventory: Handle<Inventory>) -> Vec<&FlightDate>;
}

impl InventoryAccess for BomStore {
    fn get_inventory(&self, airline_code: &str) -> Option<&Inventory> {
        self.root_child::<Inventory>(&airline_code.to_string())
    }

    fn inventories(&self) -> Vec<&Inventory> {
        self.root_children::<Inventory>()
    }

    fn flight_dates(&self, inventory: Handle<Inventory>) -> Vec<&FlightDate> {
        self.node_ref(inventory)
            .map(|parent: NodeRef| self.children_of::<FlightDate>(&parent))
            .unwrap_or_default()
    }
}
