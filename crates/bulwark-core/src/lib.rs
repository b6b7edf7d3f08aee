// crates/bulwark-core/src/lib.rs
//
// bulwark-core: Core types, fixed-point math, and the error type for the
// Bulwark validator-economics engine.
//
// This is the leaf crate the staking engine depends on. It defines the
// operator/delegator address type, the 18-decimal fixed-point number used by
// every monetary formula, and the single protocol-wide error enum.

pub mod address;
pub mod decimal;
pub mod error;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use bulwark_core::Dec;`
pub use address::Address;
pub use decimal::{mul_div, mul_div_ceil, Dec, ParseDecError, DECIMAL_FRACTIONAL};
pub use error::StakingError;
