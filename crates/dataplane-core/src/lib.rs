//! Async packet-processing dataplane core: per-core run-to-completion packet
//! handling with cooperative suspension at crypto boundaries, built around
//! native `async`/`.await` rather than stack-switched fibers (see
//! `DESIGN.md` for why). A pipeline (parsing, matching, deparsing) is
//! supplied by the surrounding data-plane program through [`PacketPipeline`]
//! and [`PipelineEntry`]; this crate owns admission, queuing, batching, and
//! resume.

pub mod asyncop;
pub mod batcher;
pub mod buffer;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod metrics;
pub mod packet;
pub mod pipeline;
pub mod resume;
pub mod storage;
pub mod worker;

pub use asyncop::{AsyncOp, AsyncQueue};
pub use batcher::{Batcher, BatcherStats, CryptoKeyMaterial};
pub use buffer::BufferWrapper;
pub use config::{AsyncMode, CryptoFailurePolicy, CryptoNodeMode, EngineConfig};
pub use context::{ContextFreeRing, ContextId, ContextPool};
pub use crypto::{CryptoDescriptor, CryptoDevice, CryptoOpKind, CryptoStatus};
pub use error::EngineError;
pub use metrics::WorkerMetrics;
pub use packet::{HeaderInstance, PacketDescriptor, PacketState};
pub use pipeline::{PacketOutcome, PacketPipeline};
pub use resume::resume_packet_handling;
pub use storage::{init_storage, new_worker_metrics, Storage};
pub use worker::{do_blocking_sync_op, handle_packet_async, PipelineContext, PipelineEntry};
