//! Property dataset: loaded once at startup, read-only afterwards.

use std::io::Read;
use std::path::Path;

use crate::error::DatasetError;

const TYPE_COLUMN: &str = "Type";
const LOCATION_COLUMN: &str = "Location";
const PRICE_COLUMN: &str = "Price";

/// One listing. `values` holds every column of the row in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub property_type: String,
    pub location: String,
    pub price: String,
    values: Vec<String>,
    /// Lowercased values joined by a single space; what the lookup scans.
    /// Holds no quotes or brackets, so a query spanning adjacent columns
    /// ("villa dubai") matches, while one containing row punctuation
    /// ("'villa'") does not.
    haystack: String,
}

impl PropertyRecord {
    /// Build a record from all of its column values plus the three display fields.
    pub fn new(
        property_type: impl Into<String>,
        location: impl Into<String>,
        price: impl Into<String>,
        values: Vec<String>,
    ) -> Self {
        let haystack = values.join(" ").to_lowercase();
        Self {
            property_type: property_type.into(),
            location: location.into(),
            price: price.into(),
            values,
            haystack,
        }
    }

    /// Record whose only columns are Type, Location, Price.
    pub fn simple(
        property_type: impl Into<String>,
        location: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        let (t, l, p) = (property_type.into(), location.into(), price.into());
        let values = vec![t.clone(), l.clone(), p.clone()];
        Self::new(t, l, p, values)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub(crate) fn haystack(&self) -> &str {
        &self.haystack
    }
}

/// The injected reference table. Table order is significant for lookup results.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    headers: Vec<String>,
    records: Vec<PropertyRecord>,
}

impl PropertyTable {
    pub fn new(headers: Vec<String>, records: Vec<PropertyRecord>) -> Self {
        Self { headers, records }
    }

    /// Load from a CSV file. The header row must contain `Type`, `Location` and `Price`.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(DatasetError::MissingColumn(name))
        };
        let type_idx = column(TYPE_COLUMN)?;
        let location_idx = column(LOCATION_COLUMN)?;
        let price_idx = column(PRICE_COLUMN)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let values: Vec<String> = row.iter().map(String::from).collect();
            let field = |i: usize| values.get(i).cloned().unwrap_or_default();
            let (t, l, p) = (field(type_idx), field(location_idx), field(price_idx));
            records.push(PropertyRecord::new(t, l, p, values));
        }

        tracing::info!(rows = records.len(), columns = headers.len(), "property dataset loaded");
        Ok(Self { headers, records })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[PropertyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<PropertyRecord> for PropertyTable {
    fn from_iter<I: IntoIterator<Item = PropertyRecord>>(iter: I) -> Self {
        Self {
            headers: vec![
                TYPE_COLUMN.to_string(),
                LOCATION_COLUMN.to_string(),
                PRICE_COLUMN.to_string(),
            ],
            records: iter.into_iter().collect(),
        }
    }
}
