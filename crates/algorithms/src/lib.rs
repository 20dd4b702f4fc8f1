//! # parcelmerge algorithms
//!
//! Vector geometry algorithms and the parcel merge operation.
//!
//! ## Modules
//!
//! - **vector**: validity check and repair, union, planar and ellipsoidal area,
//!   reprojection to geographic coordinates
//! - **merge**: merge selected features into one, concatenating parcel ids and
//!   recomputing the area attribute inside an editing session
//! - **interface**: notifications and map refresh requested from the host

pub mod interface;
pub mod merge;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interface::{Interface, Notice, NoticeLevel, NoticeLog};
    pub use crate::merge::{
        concat_parcel_ids, merge_selected, parcel_tokens, MergeError, MergeFailure, MergeParams,
        MergeReport, RollbackScope, SessionOutcome,
    };
    pub use crate::vector::{ellipsoidal_area, to_hectares, union_all, validate};
    pub use parcelmerge_core::prelude::*;
}
