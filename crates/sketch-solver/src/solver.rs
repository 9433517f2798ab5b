//! Damped Gauss-Newton (Levenberg-Marquardt) iteration over the assembled
//! constraint system, with a rank-based degree-of-freedom report.
//!
//! Each accepted step solves `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr`, halving λ on
//! improvement and multiplying it by ten on rejection. The sketch is only
//! written back after the iteration terminates successfully, so failed
//! solves never move geometry.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use caliper_types::{ConstraintKind, Sketch};

use crate::assembly::VariableSet;
use crate::residuals::{eval_jacobian, eval_residuals, residual_rows, EvalContext};

/// Infinity-norm residual threshold for convergence.
pub const RESIDUAL_TOLERANCE: f64 = 1e-8;
/// Relative step-size threshold for convergence.
pub const STEP_TOLERANCE: f64 = 1e-10;
/// Relative tolerance for the column-pivoted-QR rank estimate.
pub const RANK_TOLERANCE: f64 = 1e-10;
/// Cap on accepted iteration steps.
pub const MAX_ITERATIONS: usize = 100;

const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-9;
const LAMBDA_MAX: f64 = 1e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Converged with a full-rank, exactly determined system.
    Success,
    /// Converged, but the geometry is not uniquely determined.
    Underconstrained,
    /// The constraint rows are rank-deficient (redundant or conflicting).
    Overconstrained,
    /// Ran out of iterations (or stalled) before reaching tolerance.
    MaxIterations,
    /// NaN or infinity appeared in the residuals, Jacobian, or step.
    NumericalError,
}

/// Outcome of one solver run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverResult {
    pub status: SolveStatus,
    /// Accepted iteration steps.
    pub iterations: usize,
    /// Infinity norm of the residual vector at exit.
    pub final_residual: f64,
    pub message: String,
    pub free_variables: usize,
    pub residual_count: usize,
    /// Estimated rank of the Jacobian at exit.
    pub rank: usize,
}

impl SolverResult {
    /// Whether the iteration hit a convergence criterion (residual or
    /// step size) and geometry was written back.
    pub fn converged(&self) -> bool {
        matches!(
            self.status,
            SolveStatus::Success | SolveStatus::Underconstrained | SolveStatus::Overconstrained
        )
    }

    /// Remaining degrees of freedom.
    pub fn dof(&self) -> i64 {
        self.free_variables as i64 - self.rank as i64
    }
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn matrix_finite(m: &DMatrix<f64>) -> bool {
    m.iter().all(|x| x.is_finite())
}

/// Estimate rank via column-pivoted QR, relative tolerance against the
/// largest |R| diagonal.
fn rank_estimate(j: &DMatrix<f64>) -> usize {
    let (m, n) = j.shape();
    if m == 0 || n == 0 {
        return 0;
    }
    let qr = j.clone().col_piv_qr();
    let r = qr.r();
    let k = m.min(n);
    let diag: Vec<f64> = (0..k).map(|i| r[(i, i)].abs()).collect();
    let max_diag = diag.iter().cloned().fold(0.0_f64, f64::max);
    if max_diag <= 0.0 {
        return 0;
    }
    diag.iter().filter(|&&d| d > RANK_TOLERANCE * max_diag).count()
}

/// Solve the sketch's constraint system in place.
///
/// On convergence the solved coordinates (and coupled circle radii) are
/// written back and non-driving dimension readouts are refreshed. On
/// MaxIterations or NumericalError the sketch is left untouched.
pub fn solve(sketch: &mut Sketch) -> SolverResult {
    let vars = VariableSet::build(sketch);
    let active: Vec<ConstraintKind> = sketch
        .constraints
        .iter()
        .filter(|c| c.enabled && c.driving)
        .map(|c| c.kind.clone())
        .collect();
    let m: usize = active.iter().map(residual_rows).sum();
    let n = vars.len();

    let mut result = SolverResult {
        status: SolveStatus::Success,
        iterations: 0,
        final_residual: 0.0,
        message: String::new(),
        free_variables: n,
        residual_count: m,
        rank: 0,
    };

    if m == 0 {
        if n > 0 {
            result.status = SolveStatus::Underconstrained;
            result.message = format!("no active constraints, {n} free variables");
        } else {
            result.message = "nothing to solve".into();
        }
        refresh_reference_dimensions(sketch);
        return result;
    }

    // The whole iteration runs on a local parameter vector; the sketch is
    // only touched by the final scatter.
    let (x, converged) = {
        let ctx = EvalContext {
            sketch: &*sketch,
            vars: &vars,
        };
        let residuals_of = |x: &DVector<f64>| -> DVector<f64> {
            let mut out = Vec::with_capacity(m);
            for kind in &active {
                eval_residuals(&ctx, x, kind, &mut out);
            }
            DVector::from_vec(out)
        };
        let jacobian_of = |x: &DVector<f64>| -> DMatrix<f64> {
            let mut jac = DMatrix::zeros(m, n);
            let mut row = 0;
            for kind in &active {
                row += eval_jacobian(&ctx, x, kind, &mut jac, row);
            }
            debug_assert_eq!(row, m);
            jac
        };

        let mut x = vars.gather(sketch);
        let mut r = residuals_of(&x);
        if !all_finite(&r) {
            result.status = SolveStatus::NumericalError;
            result.message = "non-finite residual".into();
            result.final_residual = f64::NAN;
            return result;
        }

        let mut lambda = LAMBDA_INITIAL;
        let mut converged = r.amax() < RESIDUAL_TOLERANCE;
        let mut stalled = false;

        while !converged && !stalled && result.iterations < MAX_ITERATIONS {
            if n == 0 {
                // Everything is pinned; residuals cannot improve.
                break;
            }
            let jac = jacobian_of(&x);
            if !matrix_finite(&jac) {
                result.status = SolveStatus::NumericalError;
                result.message = "non-finite Jacobian".into();
                result.final_residual = r.amax();
                return result;
            }
            let jtj = jac.transpose() * &jac;
            let jtr = jac.transpose() * &r;
            let rhs = jtr.map(|v| -v);

            let mut accepted = false;
            while lambda <= LAMBDA_MAX {
                let mut a = jtj.clone();
                for i in 0..n {
                    let d = jtj[(i, i)];
                    a[(i, i)] += lambda * if d > 1e-12 { d } else { 1e-12 };
                }
                let delta = match a.lu().solve(&rhs) {
                    Some(d) if all_finite(&d) => d,
                    _ => {
                        lambda *= 10.0;
                        continue;
                    }
                };
                let x_new = &x + &delta;
                let r_new = residuals_of(&x_new);
                if !all_finite(&r_new) {
                    lambda *= 10.0;
                    continue;
                }
                if r_new.norm_squared() < r.norm_squared() {
                    let step_small = delta.norm() < STEP_TOLERANCE * x.norm().max(1.0);
                    x = x_new;
                    r = r_new;
                    lambda = (lambda / 2.0).max(LAMBDA_MIN);
                    result.iterations += 1;
                    accepted = true;
                    converged = r.amax() < RESIDUAL_TOLERANCE || step_small;
                    break;
                }
                lambda *= 10.0;
            }
            if !accepted {
                stalled = true;
            }
        }

        result.final_residual = r.amax();

        if converged {
            result.rank = rank_estimate(&jacobian_of(&x));
        }
        (x, converged)
    };

    if !converged {
        result.status = SolveStatus::MaxIterations;
        result.message = format!(
            "did not converge after {} accepted steps (residual {:.3e})",
            result.iterations, result.final_residual
        );
        tracing::debug!(
            iterations = result.iterations,
            residual = result.final_residual,
            "solve did not converge"
        );
        return result;
    }

    result.status = if n == 0 {
        // Everything pinned and already satisfied.
        SolveStatus::Success
    } else if result.rank < m {
        SolveStatus::Overconstrained
    } else if result.rank < n {
        SolveStatus::Underconstrained
    } else {
        SolveStatus::Success
    };
    result.message = match result.status {
        SolveStatus::Success => format!("converged in {} iterations", result.iterations),
        SolveStatus::Underconstrained => format!(
            "converged, {} degrees of freedom remain",
            n as i64 - result.rank as i64
        ),
        SolveStatus::Overconstrained => format!(
            "converged with {} redundant equations",
            m as i64 - result.rank as i64
        ),
        _ => String::new(),
    };

    vars.scatter(sketch, &x);
    refresh_reference_dimensions(sketch);
    tracing::debug!(
        status = ?result.status,
        iterations = result.iterations,
        residual = result.final_residual,
        rank = result.rank,
        "solve finished"
    );
    result
}

/// Update non-driving dimension values to measure the current geometry.
fn refresh_reference_dimensions(sketch: &mut Sketch) {
    let mut updates = Vec::new();
    for c in sketch.constraints.iter().filter(|c| !c.driving) {
        let measured = match c.kind {
            ConstraintKind::Distance { a, b, .. } => sketch.measured_distance(a, b).ok(),
            ConstraintKind::DistanceX { a, b, .. } => sketch.measured_dx(a, b).ok(),
            ConstraintKind::DistanceY { a, b, .. } => sketch.measured_dy(a, b).ok(),
            ConstraintKind::Angle { line_a, line_b, .. } => {
                sketch.measured_angle(line_a, line_b).ok()
            }
            ConstraintKind::Radius { entity, .. } => sketch.circle_radius(entity).ok(),
            ConstraintKind::Diameter { entity, .. } => {
                sketch.circle_radius(entity).ok().map(|r| 2.0 * r)
            }
            _ => None,
        };
        if let Some(v) = measured {
            updates.push((c.id, v));
        }
    }
    for (id, v) in updates {
        sketch.modify_constraint_value(id, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::SketchPlane;

    fn sketch() -> Sketch {
        Sketch::new("t", SketchPlane::xy())
    }

    #[test]
    fn test_solve_horizontal_line() {
        let mut s = sketch();
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(10.0, 5.0, false);
        // Steep enough that no auto-constraint appears.
        let line = s.add_line(a, b).unwrap();
        s.add_constraint(ConstraintKind::Horizontal { line }).unwrap();

        let result = solve(&mut s);
        assert!(result.converged(), "{}", result.message);
        let pb = s.point(b).unwrap();
        assert!(pb.y.abs() < 1e-7, "y = {}", pb.y);
    }

    #[test]
    fn test_solve_distance() {
        let mut s = sketch();
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(3.0, 4.0, false);
        s.add_constraint(ConstraintKind::Distance { a, b, value: 10.0 })
            .unwrap();

        let result = solve(&mut s);
        assert!(result.converged(), "{}", result.message);
        let d = s.measured_distance(a, b).unwrap();
        assert!((d - 10.0).abs() < 1e-6, "distance = {d}");
        // One equation, two variables.
        assert_eq!(result.status, SolveStatus::Underconstrained);
        assert_eq!(result.dof(), 1);
    }

    #[test]
    fn test_rectangle_solves_to_exact_dimensions() {
        let mut s = sketch();
        let p0 = s.add_point(0.0, 0.0, true);
        let p1 = s.add_point(3.2, 0.1, false);
        let p2 = s.add_point(3.1, 2.1, false);
        let p3 = s.add_point(0.1, 1.9, false);
        let bottom = s.add_line(p0, p1).unwrap();
        let right = s.add_line(p1, p2).unwrap();
        let top = s.add_line(p2, p3).unwrap();
        let left = s.add_line(p3, p0).unwrap();
        // Strip whatever auto-constraints the near-aligned edges picked up
        // so the test controls the full system.
        let auto: Vec<u32> = s.constraints.iter().map(|c| c.id).collect();
        for id in auto {
            s.remove_constraint(id);
        }

        s.add_constraint(ConstraintKind::Horizontal { line: bottom }).unwrap();
        s.add_constraint(ConstraintKind::Vertical { line: left }).unwrap();
        s.add_constraint(ConstraintKind::Perpendicular {
            line_a: bottom,
            line_b: right,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::Parallel {
            line_a: bottom,
            line_b: top,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::DistanceX {
            a: p0,
            b: p1,
            value: 3.0,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::DistanceY {
            a: p0,
            b: p3,
            value: 2.0,
        })
        .unwrap();

        let result = solve(&mut s);
        assert_eq!(result.status, SolveStatus::Success, "{}", result.message);

        let expect = [(p0, 0.0, 0.0), (p1, 3.0, 0.0), (p2, 3.0, 2.0), (p3, 0.0, 2.0)];
        for (id, ex, ey) in expect {
            let p = s.point(id).unwrap();
            assert!(
                (p.x - ex).abs() < 1e-6 && (p.y - ey).abs() < 1e-6,
                "point {id}: ({}, {}) expected ({ex}, {ey})",
                p.x,
                p.y
            );
        }
    }

    #[test]
    fn test_fixed_points_do_not_move_bit_exact() {
        let mut s = sketch();
        let a = s.add_point(0.125, 0.25, true);
        let b = s.add_point(5.0, 5.0, false);
        let c = s.add_point(1.0, 7.0, false);
        s.add_constraint(ConstraintKind::FixedPoint {
            point: c,
            x: 1.0,
            y: 7.0,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::Distance { a, b, value: 3.0 })
            .unwrap();
        s.add_constraint(ConstraintKind::Distance { a: c, b, value: 4.0 })
            .unwrap();

        let result = solve(&mut s);
        assert!(result.converged(), "{}", result.message);
        let pa = s.point(a).unwrap();
        assert_eq!((pa.x, pa.y), (0.125, 0.25));
        let pc = s.point(c).unwrap();
        assert_eq!((pc.x, pc.y), (1.0, 7.0));
    }

    #[test]
    fn test_non_driving_dimension_is_inert_and_refreshed() {
        let mut s = sketch();
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(3.0, 4.0, false);
        let reference = s
            .add_reference_dimension(ConstraintKind::Distance { a, b, value: 999.0 })
            .unwrap();

        let before = *s.point(b).unwrap();
        let result = solve(&mut s);
        assert!(result.converged());
        let after = *s.point(b).unwrap();
        assert_eq!((before.x, before.y), (after.x, after.y));
        // The readout now measures the actual geometry.
        let (value, driving) = s.get_constraint_value(reference).unwrap();
        assert!(!driving);
        assert!((value - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_redundant_constraints_reported_overconstrained() {
        let mut s = sketch();
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(2.9, 0.0, false);
        s.add_constraint(ConstraintKind::DistanceX { a, b, value: 3.0 })
            .unwrap();
        s.add_constraint(ConstraintKind::DistanceX { a, b, value: 3.0 })
            .unwrap();
        s.add_constraint(ConstraintKind::DistanceY { a, b, value: 0.0 })
            .unwrap();

        let result = solve(&mut s);
        assert_eq!(result.status, SolveStatus::Overconstrained, "{}", result.message);
        // The duplicate row is redundant but consistent, so geometry solved.
        assert!((s.point(b).unwrap().x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_conflicting_constraints_hit_iteration_cap() {
        let mut s = sketch();
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(2.0, 0.0, false);
        let before = *s.point(b).unwrap();
        s.add_constraint(ConstraintKind::Distance { a, b, value: 2.0 })
            .unwrap();
        s.add_constraint(ConstraintKind::Distance { a, b, value: 3.0 })
            .unwrap();

        let result = solve(&mut s);
        assert_eq!(result.status, SolveStatus::MaxIterations);
        // Failed solves leave the sketch untouched.
        let after = *s.point(b).unwrap();
        assert_eq!((before.x, before.y), (after.x, after.y));
    }

    #[test]
    fn test_nan_target_reports_numerical_error_without_mutation() {
        let mut s = sketch();
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(2.0, 1.0, false);
        s.add_constraint(ConstraintKind::Distance {
            a,
            b,
            value: f64::NAN,
        })
        .unwrap();

        let before = *s.point(b).unwrap();
        let result = solve(&mut s);
        assert_eq!(result.status, SolveStatus::NumericalError);
        let after = *s.point(b).unwrap();
        assert_eq!((before.x, before.y), (after.x, after.y));
    }

    #[test]
    fn test_angle_constraint_solves() {
        let mut s = sketch();
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(10.0, 0.0, true);
        let c = s.add_point(0.0, 0.0, true);
        let d = s.add_point(5.0, 4.0, false);
        let l1 = s.add_line(a, b).unwrap();
        let l2 = s.add_line(c, d).unwrap();
        s.add_constraint(ConstraintKind::Angle {
            line_a: l1,
            line_b: l2,
            degrees: 45.0,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::Distance {
            a: c,
            b: d,
            value: 5.0,
        })
        .unwrap();

        let result = solve(&mut s);
        assert!(result.converged(), "{}", result.message);
        let angle = s.measured_angle(l1, l2).unwrap();
        assert!((angle - 45.0).abs() < 1e-5, "angle = {angle}");
        let len = s.measured_distance(c, d).unwrap();
        assert!((len - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_radius_constraint_drives_circle() {
        let mut s = sketch();
        let cc = s.add_point(0.0, 0.0, true);
        let circle = s.add_circle(cc, 3.0).unwrap();
        s.add_constraint(ConstraintKind::Radius {
            entity: circle,
            value: 7.0,
        })
        .unwrap();

        let result = solve(&mut s);
        assert!(result.converged(), "{}", result.message);
        assert!((s.circle_radius(circle).unwrap() - 7.0).abs() < 1e-8);
    }

    #[test]
    fn test_tangent_line_circle() {
        let mut s = sketch();
        let cc = s.add_point(0.0, 0.0, true);
        let circle = s.add_circle(cc, 5.0).unwrap();
        let a = s.add_point(-10.0, 5.6, false);
        let b = s.add_point(10.0, 5.6, false);
        let line = s.add_line(a, b).unwrap();
        // The near-flat line picked up an auto Horizontal constraint.
        assert!(s.line_has_horizontal(line));
        s.add_constraint(ConstraintKind::Tangent { line, circle })
            .unwrap();

        let result = solve(&mut s);
        assert!(result.converged(), "{}", result.message);
        let ya = s.point(a).unwrap().y;
        assert!((ya.abs() - 5.0).abs() < 1e-5, "tangent height = {ya}");
    }

    #[test]
    fn test_solver_is_deterministic() {
        let build = || {
            let mut s = sketch();
            let a = s.add_point(0.0, 0.0, true);
            let b = s.add_point(3.1, 0.2, false);
            let c = s.add_point(2.8, 2.2, false);
            s.add_constraint(ConstraintKind::Distance { a, b, value: 3.0 })
                .unwrap();
            s.add_constraint(ConstraintKind::Distance { a: b, b: c, value: 2.0 })
                .unwrap();
            s.add_constraint(ConstraintKind::DistanceY { a, b, value: 0.0 })
                .unwrap();
            s
        };
        let mut s1 = build();
        let mut s2 = build();
        let r1 = solve(&mut s1);
        let r2 = solve(&mut s2);
        assert_eq!(r1.iterations, r2.iterations);
        for (p, q) in s1.points.iter().zip(s2.points.iter()) {
            assert_eq!((p.x, p.y), (q.x, q.y));
        }
    }
}
