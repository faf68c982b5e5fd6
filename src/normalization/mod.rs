pub mod enrich;

pub use enrich::{enrich, estimate_gdp, CountryRecord};
