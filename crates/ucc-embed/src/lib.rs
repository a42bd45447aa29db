//! `Embedder` backends (`spec.md` §4.5): a local deterministic model and a
//! remote API client, selected once at orchestration start via
//! [`select_embedder`]. Both implement `ucc_core::ports::Embedder`.

pub mod local;
pub mod remote;
pub mod select;

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;
pub use select::select_embedder;
