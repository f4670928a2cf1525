pub mod contacts;
pub mod contributors;
pub mod participants;
pub mod profile_input;

pub use contacts::{ContactCollector, ContactPipeline};
pub use contributors::{ContributorPipeline, ContributorSource};
pub use participants::{ParticipantLister, ParticipantPipeline};
