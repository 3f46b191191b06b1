pub mod args;
pub mod curate;
pub mod enroll;
pub mod runner;
pub mod search;
