//! eforms/crates/ef-core/src/lib.rs
//!
//! The central domain logic and interface definitions for eForms:
//! field types, form/field/response models, the submission validation
//! engine, answer normalization, and the export projection.

pub mod error;
pub mod export;
pub mod fields;
pub mod models;
pub mod traits;
pub mod validation;
pub mod value;

// Re-exporting for easier access in other crates
pub use error::*;
pub use fields::*;
pub use models::*;
pub use traits::*;
pub use value::*;
