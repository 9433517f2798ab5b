//! Constraint solving and profile detection for sketches.
//!
//! The solver drives free point coordinates (and coupled circle radii) to
//! satisfy the sketch's constraint system with damped Gauss-Newton
//! (Levenberg-Marquardt) iteration over analytically assembled residuals
//! and Jacobians. The profile detector walks the solved geometry into
//! closed loops and open chains for downstream modeling operations.

pub mod assembly;
pub mod profiles;
pub mod residuals;
pub mod solver;

pub use assembly::VariableSet;
pub use profiles::{detect_profiles, first_closed_profile, has_closed_profile};
pub use solver::{solve, SolveStatus, SolverResult};
