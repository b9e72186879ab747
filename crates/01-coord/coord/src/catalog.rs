//! Product catalog guarded by an [`AccessGate`].

use crate::gate::{AccessGate, Priority};

/// A single catalog entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Record {
    pub id: u32,
    pub price: f64,
    pub stock: u32,
}

impl Record {
    pub fn new(id: u32, price: f64, stock: u32) -> Self {
        Self { id, price, stock }
    }
}

/// Fixed set of records, populated once and then mutated in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    records: Vec<Record>,
}

/// Gate specialised to the catalog.
pub type CatalogGate = AccessGate<Catalog>;

impl Catalog {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Looks up a record by position.
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Scales the price by `price_pct` percent and shifts stock by
    /// `stock_delta`, clamping stock at zero.
    ///
    /// Returns the updated record, or `None` when `index` is out of range.
    pub fn adjust(&mut self, index: usize, price_pct: f64, stock_delta: i64) -> Option<Record> {
        let record = self.records.get_mut(index)?;
        record.price *= 1.0 + price_pct / 100.0;
        let stock = i64::from(record.stock).saturating_add(stock_delta);
        record.stock = u32::try_from(stock.max(0)).unwrap_or(u32::MAX);
        Some(*record)
    }

    /// Total units in stock across every record.
    pub fn total_stock(&self) -> u64 {
        self.records.iter().map(|record| u64::from(record.stock)).sum()
    }

    /// Moves the catalog behind a gate with the given policy.
    pub fn into_gate(self, priority: Priority) -> CatalogGate {
        AccessGate::new(self, priority)
    }
}

impl FromIterator<Record> for Catalog {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}


#[cfg(all(test, feature = "proptest"))]
mod prop {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Stock never underflows whatever sequence of deltas a writer applies.
        #[test]
        fn stock_never_negative(deltas in proptest::collection::vec(-20i64..20, 1..64)) {
            let mut catalog = Catalog::new(vec![Record::new(1, 10.0, 3)]);
            let mut expected: i64 = 3;
            for delta in deltas {
                expected = (expected + delta).max(0);
                let record = catalog.adjust(0, 0.0, delta).expect("record");
                prop_assert_eq!(i64::from(record.stock), expected);
            }
        }
    }
}
