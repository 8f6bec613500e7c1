//! Raw ingestion and schema unification.

pub mod era;
pub mod record;
pub mod report;
pub mod source;
pub mod unify;

pub use era::{AreaUnit, Era, EraSchema, Field, LeaseRule, SourceLayout};
pub use record::{CanonicalRecord, RawRecord, RowId, StoreyRange, YearMonth};
pub use report::SourceReport;
pub use source::{CsvSource, LoadedSource};
pub use unify::SchemaUnifier;
