//! Market data: providers and canonicalization.

pub mod canonicalize;
pub mod csv_import;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use canonicalize::{canonicalize, CanonicalReport, MissingBarPolicy};
pub use csv_import::CsvProvider;
pub use provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult, RawBar};
pub use synthetic::SyntheticProvider;
pub use yahoo::{YahooProvider, YahooSettings};
