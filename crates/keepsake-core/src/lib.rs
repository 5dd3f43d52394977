pub mod audit;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod record;
pub mod slice;
pub mod types;

pub use audit::{AuditEntry, AuditFilter, AuditLog};
pub use chain::{Pattern, PatternData, ReasoningChain, ReasoningStep, StepKind};
pub use config::{EncryptionConfig, RetrievalConfig, StorageConfig, VaultConfig};
pub use constants::*;
pub use error::VaultError;
pub use record::{CommunalMemory, PersonaMemory, VaultMetadata, VaultState};
pub use slice::{MemorySlice, MemoryType, RetrievalResult};
pub use types::{MemoryKind, Timestamp};
