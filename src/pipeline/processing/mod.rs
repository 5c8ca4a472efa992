// Pipeline processing: normalization, cleaning, and enrichment

pub mod clean;
pub mod enrich;
pub mod normalize;

pub use clean::{CleanRecord, CleanedTable, Cleaner, CleaningPolicy, CleaningReport};
pub use enrich::{Enricher, LineValueEnricher, Transaction};
pub use normalize::{NormalizedRecord, NormalizedTable, Normalizer};
