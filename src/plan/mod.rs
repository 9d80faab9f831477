//! Deferred query plans.
//!
//! ```text
//!   Resolution + Partition schema
//!        │
//!        ▼
//!   ┌────────────────┐
//!   │ QueryPlanBuilder│  scan → harmonize → clean → derive → sample → select
//!   └────────────────┘
//!        │  one PartitionPlan per month
//!        ▼
//!   ┌───────────┐
//!   │ QueryPlan  │  ordered union, unified output schema
//!   └───────────┘
//!        │
//!        ▼
//!     engine::ExecutionEngine::collect
//! ```

pub mod builder;
pub mod expr;
pub mod harmonize;
pub mod logical;
pub mod sample;

pub use builder::QueryPlanBuilder;
pub use expr::{col, lit, Expr};
pub use harmonize::SchemaHarmonizer;
pub use logical::{PartitionPlan, QueryPlan, Step};
pub use sample::Sampler;
