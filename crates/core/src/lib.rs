pub mod availability;
pub mod config;
pub mod error;
pub mod finder;
pub mod lookup;
pub mod municipality;
pub mod progress;

pub mod prelude {
    pub use crate::availability::{
        AvailabilityClient, BorrowingStatus, LibraryAvailability, NormalizedResult, SearchRequest,
    };
    pub use crate::error::*;
    pub use crate::finder::{BookFinder, BookLookup};
    pub use crate::lookup::{BookSummary, MetadataProvider};
}
