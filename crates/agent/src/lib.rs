//! Query orchestration for the pool equipment assistant.
//!
//! Every inbound message walks the same constrained path:
//! 1. **Scope check** (`scope`) - refuse anything outside pools and pool equipment
//! 2. **Classification** (`classifier`) - pattern rules first, LLM fallback for the rest
//! 3. **Dispatch** (`specialists`) - product, pricing, store and advisory lookups, run
//!    concurrently behind the shared response cache
//! 4. **Fusion** (`fusion`) - order, deduplicate and render the fragments as one reply
//!
//! `coordinator::Coordinator` drives the steps and always produces exactly one reply.
//!
//! # Safety Principle
//!
//! The LLM never decides prices, stock or store data. It classifies ambiguous text into a
//! closed schema, answers advisory questions and rewords facts that came from the upstream
//! services.

pub mod classifier;
pub mod coordinator;
pub mod fusion;
pub mod llm;
pub mod prompts;
pub mod scope;
pub mod specialists;
pub mod text;

pub use coordinator::{Coordinator, Reply};
pub use llm::{DisabledLlmClient, LlmClient, PromptContext};
