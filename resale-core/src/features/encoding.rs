//! Categorical encoding with a fixed, train-fitted vocabulary and an unseen bucket.
//!
//! The vocabulary of every field is learned from the training partition only. Values met
//! later that are not in it go to the unseen bucket; no code or column is ever added after
//! fitting, so train and test share one feature space.

use crate::config::EncodeMethod;
use crate::data::record::CanonicalRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categorical attributes of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    Town,
    FlatType,
    FlatModel,
    StoreyRange,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 4] = [
        CategoricalField::Town,
        CategoricalField::FlatType,
        CategoricalField::FlatModel,
        CategoricalField::StoreyRange,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CategoricalField::Town => "town",
            CategoricalField::FlatType => "flat_type",
            CategoricalField::FlatModel => "flat_model",
            CategoricalField::StoreyRange => "storey_range",
        }
    }

    pub fn value<'a>(&self, record: &'a CanonicalRecord) -> &'a str {
        match self {
            CategoricalField::Town => &record.town,
            CategoricalField::FlatType => &record.flat_type,
            CategoricalField::FlatModel => &record.flat_model,
            CategoricalField::StoreyRange => &record.storey_range,
        }
    }
}

/// Code reserved for the unseen bucket under label encoding.
pub const UNSEEN_CODE: u32 = 0;

/// Train-fitted vocabulary of one categorical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    pub field: CategoricalField,
    /// Sorted distinct training values. Value at index `i` has label code `i + 1`.
    pub vocabulary: Vec<String>,
    pub unseen_token: String,
}

impl CategoricalEncoder {
    /// Learn the vocabulary from training values. A value equal to the unseen token is
    /// left out so the bucket name stays unambiguous.
    pub fn fit<'a>(
        field: CategoricalField,
        values: impl IntoIterator<Item = &'a str>,
        unseen_token: &str,
    ) -> Self {
        let vocabulary: BTreeSet<&str> = values
            .into_iter()
            .filter(|v| *v != unseen_token)
            .collect();
        Self {
            field,
            vocabulary: vocabulary.into_iter().map(str::to_string).collect(),
            unseen_token: unseen_token.to_string(),
        }
    }

    /// Label code of `value`: `1..=n` for training values, [`UNSEEN_CODE`] otherwise.
    pub fn code(&self, value: &str) -> u32 {
        match self.vocabulary.binary_search_by(|v| v.as_str().cmp(value)) {
            Ok(idx) => idx as u32 + 1,
            Err(_) => UNSEEN_CODE,
        }
    }

    pub fn is_known(&self, value: &str) -> bool {
        self.code(value) != UNSEEN_CODE
    }

    /// Output column names for `method`, fixed at fit time.
    pub fn columns(&self, method: EncodeMethod) -> Vec<String> {
        let name = self.field.name();
        match method {
            EncodeMethod::Label => vec![format!("{name}_code")],
            EncodeMethod::OneHot => self
                .vocabulary
                .iter()
                .chain(std::iter::once(&self.unseen_token))
                .map(|v| format!("{name}={v}"))
                .collect(),
        }
    }

    /// Append the encoding of `value` to `out`.
    pub fn encode_into(&self, value: &str, method: EncodeMethod, out: &mut Vec<f64>) {
        let code = self.code(value);
        match method {
            EncodeMethod::Label => out.push(f64::from(code)),
            EncodeMethod::OneHot => {
                let width = self.vocabulary.len() + 1;
                // unseen bucket is the last column
                let hot = if code == UNSEEN_CODE {
                    width - 1
                } else {
                    code as usize - 1
                };
                out.extend((0..width).map(|i| if i == hot { 1.0 } else { 0.0 }));
            }
        }
    }
}

/// All categorical encoders fitted on one training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingTable {
    pub method: EncodeMethod,
    pub unseen_token: String,
    pub encoders: Vec<CategoricalEncoder>,
}

impl EncodingTable {
    pub fn fit(records: &[&CanonicalRecord], method: EncodeMethod, unseen_token: &str) -> Self {
        let encoders = CategoricalField::ALL
            .iter()
            .map(|field| {
                CategoricalEncoder::fit(
                    *field,
                    records.iter().map(|r| field.value(r)),
                    unseen_token,
                )
            })
            .collect();
        Self {
            method,
            unseen_token: unseen_token.to_string(),
            encoders,
        }
    }

    pub fn columns(&self) -> Vec<String> {
        self.encoders
            .iter()
            .flat_map(|e| e.columns(self.method))
            .collect()
    }

    pub fn encode_into(&self, record: &CanonicalRecord, out: &mut Vec<f64>) {
        for encoder in &self.encoders {
            encoder.encode_into(encoder.field.value(record), self.method, out);
        }
    }

    /// Names of the fields of `record` that fall into the unseen bucket.
    pub fn unseen_fields(&self, record: &CanonicalRecord) -> Vec<&'static str> {
        self.encoders
            .iter()
            .filter(|e| !e.is_known(e.field.value(record)))
            .map(|e| e.field.name())
            .collect()
    }
}
