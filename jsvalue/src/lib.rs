mod activation;
mod arith;
mod boxing;
mod engine;
mod error;
mod function;
mod handles;
mod native;
mod object;
mod rope;
mod scope;
mod tag;
mod value;
pub mod word;

pub use activation::*;
pub use arith::*;
pub use boxing::*;
pub use engine::{Engine, EngineSettings};
pub use error::{ExecutionError, ValueError};
pub use function::*;
pub use handles::HandleTable;
pub use native::NativeHandle;
pub use object::*;
pub use rope::RopeString;
pub use scope::{ScopeChain, ScopeIter};
pub use tag::Tag;
pub use value::Value;
pub use word::{Word, canonicalize_nan};
