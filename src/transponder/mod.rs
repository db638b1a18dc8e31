mod catalog;

pub use catalog::{TransponderCatalog, TransponderError};
