//! Model variables: constructed series and design matrices.
//!
//! - `derive`: time index, intervention dummy, interaction, Brent in R$
//! - `design`: which regressors enter each model and how rows are filled

pub mod derive;
pub mod design;

pub use derive::*;
pub use design::*;
