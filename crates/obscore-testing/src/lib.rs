//! Testing infrastructure shared by the obscore crates' test suites.
//!
//! - `fixtures`: event/annotation builders for constructing realistic
//!   `Event`s without repeating the payload boilerplate in every test.
//! - `world`: a `TestWorld` fluent builder wiring a temp-dir-backed
//!   `EventStore`/`BlobStore`/`EventBus` triple for integration tests that
//!   exercise more than one engine at once.

pub mod fixtures;
pub mod world;

pub use world::TestWorld;
