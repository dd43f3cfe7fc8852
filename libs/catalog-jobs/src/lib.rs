//! Durable refresh job queue and worker pool (spec.md §4.7 / C7).

pub mod entity;
pub mod store;
pub mod worker;

pub use entity::{JobState, Model as RefreshJob, ALL_SOURCES};
pub use store::{clamp_page_size, JobStore, ListFilter, ListPage, NewJob, SeaOrmJobStore};
pub use worker::{spawn, WorkerPoolConfig};
