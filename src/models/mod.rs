pub mod center;
pub mod company;
pub mod flag;
pub mod office;

pub use center::{Center, CenterListItem};
pub use company::Company;
pub use flag::{DeletionFlag, FlagStatus};
pub use office::{CandidateOffice, Office, OfficeKey, OfficeWithDistance, OsmType};
