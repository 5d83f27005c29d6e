//! IONA EVM: a deterministic, gas-metered EVM bytecode interpreter with a
//! deploy-time validator for sectioned (EOF) code containers.
//!
//! The crate is the execution core only. World state, block plumbing and the
//! transaction pipeline live behind the [`state::StateDB`] trait; callers
//! construct an [`evm::Evm`] per transaction and drive it through
//! `call`/`create`.

pub mod analysis;
pub mod context;
pub mod eof;
pub mod errors;
pub mod evm;
pub mod frame;
pub mod gas;
pub mod instructions;
pub mod interpreter;
pub mod jump_table;
pub mod memory;
pub mod opcode;
pub mod precompile;
pub mod stack;
pub mod state;
pub mod word;

pub use context::{BlockContext, ChainRules, EvmConfig, Fork, TxContext};
pub use errors::VmError;
pub use evm::{CallResult, CreateResult, Evm};
pub use interpreter::{Exit, FrameResult};
pub use state::{Log, MemoryState, StateDB};
