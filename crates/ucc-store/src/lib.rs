//! `JobStore`/`SegmentStore` adapters (`spec.md` §4.9, §4.12): an in-memory
//! implementation for tests and the CLI's single-shot path, and a Postgres
//! implementation for the server, grounded on `sem_os_postgres::store`'s
//! newtype-over-`PgPool` style and runtime-checked `sqlx::query`.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{PgJobStore, PgSegmentStore};
