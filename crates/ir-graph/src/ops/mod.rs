//! Built-in operation kinds and their factory functions.
//!
//! Each factory validates its arguments, constructs the node (which infers
//! its shapes eagerly) and hands back the resulting value(s).

pub mod as_strided;
pub mod collective_permute;
pub mod cumulative;
pub mod max_in_dim;
pub mod parameter;

pub use as_strided::{as_strided, AsStrided};
pub use collective_permute::{collective_permute, CollectivePermute, CollectivePermuteOutputs};
pub use cumulative::{cumprod, cumsum, CumulativeReduction, Cumulative};
pub use max_in_dim::{max_in_dim, MaxInDim, MaxInDimOutputs};
pub use parameter::{create_token, parameter, CreateToken, Parameter};

/// Renders `[1, 2, 3]` as `(1, 2, 3)`.
fn join<T: std::fmt::Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    format!("({})", parts.join(", "))
}
