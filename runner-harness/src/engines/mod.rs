//! Mock `Runner` implementations standing in for real inference backends.
//! Nothing here touches a model file or a GPU - they exist to prove the
//! core's Registry/Selector/Dispatcher wiring end to end.

mod cloud_llm;
mod guardian;
mod local_llm;

pub use cloud_llm::CloudLlmRunner;
pub use guardian::KeywordGuardianRunner;
pub use local_llm::LocalLlmRunner;
