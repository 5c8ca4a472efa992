//! Registers metric descriptions with the installed recorder
//!
//! Also checks the catalog for duplicate names so a copy-paste slip shows up
//! at startup instead of as two series silently sharing a name.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::metrics::{catalog, MetricType};

/// Describe every catalog metric; returns the number registered
pub fn register_all_metrics() -> usize {
    let mut seen = HashSet::new();
    let mut registered = 0;

    for doc in catalog::documentation() {
        if !seen.insert(doc.name) {
            warn!("Metric name conflict detected: '{}' is defined twice", doc.name);
            continue;
        }
        match doc.metric_type {
            MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
            MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
        }
        registered += 1;
    }

    info!("Registered {} pipeline metrics", registered);
    registered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_unique_names() {
        let docs = catalog::documentation();
        assert_eq!(register_all_metrics(), docs.len());
    }
}
