pub mod aggregate;
pub mod lifecycle;
pub mod repo;
pub mod schema;

pub use schema::{
    Area, AreaError, AreaInput, AreaRejection, AreaStatus, AreaStatusReport, ContributingStation,
    DraftArea, SubmitOutcome,
};
