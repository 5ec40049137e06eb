//! Ingest boundary between the request pipeline and the usage store

mod hasher;
mod recorder;

pub use hasher::{KeyHasher, Sha256KeyHasher};
pub use recorder::{RecordError, RequestUsage, UsageRecorder};
