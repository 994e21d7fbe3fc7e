//! `cardops-recon`: campaign and MIS reconciliation.
//!
//! Pure engine crate: receives loaded tables, returns matched tables and
//! summaries. No file, database or network access.

pub mod columns;
pub mod dates;
pub mod derive;
pub mod error;
pub mod google_ads;
pub mod model;
pub mod phone;
pub mod pivot;
pub mod status;

pub use derive::{derive_phone, fallback_key};
pub use error::ReconError;
pub use google_ads::{filter_google_campaigns, match_google_ads, GoogleAdsMatch, GoogleAdsRules};
pub use model::{Cell, Table};
pub use phone::{match_phones, PhoneMatch, PhoneSummary};
pub use pivot::{pivot_count, Pivot};
pub use status::{analyze_status, FilterBy, StatusQuery, StatusReport};
