//! DVB service-discovery scan engine.
//!
//! Ties together identifier derivation, the transponder queue, PSI/SI
//! parsing, the per-transponder section filter orchestrator, and the
//! top-level scan driver that walks a set of candidate transponders into a
//! de-duplicated set of services and channels.

pub mod error;
pub mod frontend;
pub mod ident;
pub mod lcn;
pub mod orchestrator;
pub mod processors;
pub mod psi;
pub mod queue;
pub mod scan;
pub mod service;
pub mod tuning;

pub use error::{ScanError, SectionError};
pub use ident::{build_namespace, is_valid_onid_tsid, ChannelId, Namespace, ServiceRef};
pub use queue::TransponderQueue;
pub use scan::{ScanDriver, ScanEvent, ScanObserver};
pub use service::Service;
pub use tuning::TuningParams;
