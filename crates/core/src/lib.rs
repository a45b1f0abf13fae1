//! Coverbot core - the conversational state machine and its collaborators
//!
//! The dialog that collects an identity document, a vehicle document, a data
//! confirmation and a price acceptance lives here, together with every seam
//! it drives: session storage, document storage, mock extraction, policy
//! generation and the phrasing/transport traits the outer crates implement.
//!
//! The engine itself is pure (`engine`); all side effects are described as
//! `DialogAction`s and executed by the `DialogService` (`dialog`). The LLM
//! only ever words the replies - it never decides transitions, prices or
//! extracted data.

pub mod config;
pub mod dialog;
pub mod engine;
pub mod errors;
pub mod extraction;
pub mod policy;
pub mod session;
pub mod states;
pub mod storage;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use dialog::{DialogService, InboundEvent, InboundPayload, Phraser, ReplySink};
pub use engine::{DialogDefinition, DialogEngine, InsuranceDialog};
pub use errors::{DialogError, SinkError};
pub use extraction::{
    DocumentExtractor, ExtractionError, IdentityFields, SeededExtractor, VehicleFields,
};
pub use policy::{PolicyArtifact, PolicyError, PolicyGenerator};
pub use session::{InMemorySessionStore, Session, SessionStore, UserId};
pub use states::{DialogAction, DialogEvent, DialogState, Instruction, TransitionOutcome};
pub use storage::{DocumentKind, DocumentStore, FsDocumentStore, StorageError};
