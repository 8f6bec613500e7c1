//! Feature engineering: row-local derivation, then train-fitted encoding and scaling.

pub mod derive;
pub mod encoding;
pub mod engineer;
pub mod scaling;

pub use derive::{DerivedRecord, derive_all};
pub use encoding::{CategoricalEncoder, CategoricalField, EncodingTable, UNSEEN_CODE};
pub use engineer::{BuildingStoreys, FeatureEngineer, FittedFeatures, NUMERIC_COLUMNS};
pub use scaling::{ColumnScale, Scaler};
