//! Train-fitted feature construction.
//!
//! [`FeatureEngineer::fit`] learns every stateful transform (categorical vocabularies,
//! per-building maximum storey, numeric scaling) from the training partition alone.
//! The resulting [`FittedFeatures`] is then applied unchanged to train and test.

use crate::config::FeatureConfig;
use crate::data::record::CanonicalRecord;
use crate::error::PipelineError;
use crate::features::derive::DerivedRecord;
use crate::features::encoding::EncodingTable;
use crate::features::scaling::Scaler;
use crate::split::{FeatureRow, Partition, SplitLabel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric feature columns, in output order. Encoded categoricals follow.
pub const NUMERIC_COLUMNS: [&str; 10] = [
    "floor_area_sqm",
    "remaining_lease_months",
    "flat_age_years",
    "transaction_year",
    "transaction_month",
    "month_sin",
    "month_cos",
    "storey_lower",
    "storey_upper",
    "building_max_storey",
];

/// Highest upper storey seen per building (town, block, street) in training data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingStoreys {
    pub max_upper: BTreeMap<String, u32>,
}

impl BuildingStoreys {
    fn key(record: &CanonicalRecord) -> String {
        format!("{}|{}|{}", record.town, record.block, record.street_name)
    }

    pub fn fit<'a>(records: impl IntoIterator<Item = &'a CanonicalRecord>) -> Self {
        let mut max_upper = BTreeMap::new();
        for record in records {
            let entry = max_upper.entry(Self::key(record)).or_insert(0u32);
            *entry = (*entry).max(record.storey.upper);
        }
        Self { max_upper }
    }

    /// Known building height, never below the row's own upper storey.
    pub fn max_storey(&self, record: &CanonicalRecord) -> u32 {
        self.max_upper
            .get(&Self::key(record))
            .copied()
            .unwrap_or(0)
            .max(record.storey.upper)
    }
}

/// Learns [`FittedFeatures`] from a training partition.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    config: FeatureConfig,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn fit(&self, train: &[DerivedRecord]) -> FittedFeatures {
        let canonical: Vec<&CanonicalRecord> = train.iter().map(|d| &d.record).collect();
        let encoding = EncodingTable::fit(
            &canonical,
            self.config.encoding,
            &self.config.unseen_token,
        );
        let buildings = BuildingStoreys::fit(canonical.iter().copied());

        let unscaled = FittedFeatures {
            encoding,
            buildings,
            scaler: Scaler::fit(self.config.scaling, &[], 0),
        };
        let raw: Vec<Vec<f64>> = train.iter().map(|d| unscaled.raw_row(d)).collect();
        let scaler = Scaler::fit(self.config.scaling, &raw, NUMERIC_COLUMNS.len());

        let fitted = FittedFeatures { scaler, ..unscaled };
        tracing::info!(
            rows = train.len(),
            columns = fitted.columns().len(),
            buildings = fitted.buildings.max_upper.len(),
            "Fitted feature transforms on training partition"
        );
        fitted
    }
}

/// Every transform learned from the training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedFeatures {
    pub encoding: EncodingTable,
    pub buildings: BuildingStoreys,
    pub scaler: Scaler,
}

impl FittedFeatures {
    /// Feature column names; identical for every partition this transforms.
    pub fn columns(&self) -> Vec<String> {
        NUMERIC_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.encoding.columns())
            .collect()
    }

    fn raw_row(&self, derived: &DerivedRecord) -> Vec<f64> {
        let r = &derived.record;
        let mut row = vec![
            r.floor_area_sqm,
            f64::from(r.remaining_lease_months),
            derived.flat_age_years,
            f64::from(r.transaction.year),
            f64::from(r.transaction.month),
            derived.month_sin,
            derived.month_cos,
            f64::from(r.storey.lower),
            f64::from(r.storey.upper),
            f64::from(self.buildings.max_storey(r)),
        ];
        self.encoding.encode_into(r, &mut row);
        row
    }

    /// Encode one record into a feature row.
    pub fn encode(&self, derived: &DerivedRecord) -> FeatureRow {
        let mut features = self.raw_row(derived);
        self.scaler.transform(&mut features[..NUMERIC_COLUMNS.len()]);
        FeatureRow {
            id: derived.record.id,
            features,
            resale_price: derived.record.resale_price,
            price_per_sqm: derived.price_per_sqm,
        }
    }

    /// Encode a whole partition, preserving row order.
    pub fn transform(
        &self,
        label: SplitLabel,
        records: &[DerivedRecord],
    ) -> Result<Partition, PipelineError> {
        let rows = records.iter().map(|d| self.encode(d)).collect();
        Partition::new(label, self.columns(), rows)
    }

    /// Rows per categorical field that fell into the unseen bucket.
    pub fn unseen_counts(&self, records: &[DerivedRecord]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for d in records {
            for field in self.encoding.unseen_fields(&d.record) {
                *counts.entry(field.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}
