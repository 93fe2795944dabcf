pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{Fixture, build, delimited_object};
#[allow(unused_imports)]
pub use mocks::{Faults, MemoryStore};
