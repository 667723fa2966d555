//! Stateless derivation layer between the state engines and prompt assembly.
//!
//! Everything in this crate is a pure function of the current turn's inputs:
//! the [`compass`] maps hostility onto a social stance, the [`valve`] gates
//! how much expression is allowed, and the [`profile`] compiler folds traits,
//! intimacy and resentment into bounded numeric generation constraints.

pub mod compass;
pub mod profile;
pub mod valve;

pub use compass::{read as read_compass, CompassReading, SocialStance};
pub use profile::{compile as compile_profile, ExpressionProfile};
pub use valve::{ToneConstraints, ToneLevel};
