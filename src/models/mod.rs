pub mod job;
pub mod matches;
pub mod submission;
pub mod verification;
