//! The residual and Jacobian table: one scalar equation per enabled driving
//! constraint (two for the two-axis kinds), each `r_i(x) = 0` when
//! satisfied.
//!
//! Jacobian rows are assembled analytically. The Angle family falls back to
//! finite differences: its atan2 derivative is ill-behaved near degenerate
//! directions and the numeric row is accurate everywhere else.

use nalgebra::{DMatrix, DVector};

use caliper_types::{ConstraintKind, Sketch, SketchEntity};

use crate::assembly::VariableSet;

const FD_STEP: f64 = 1e-8;

/// Read access to geometry as a function of the parameter vector: free
/// coordinates come from `x`, pinned ones from the sketch.
pub struct EvalContext<'a> {
    pub sketch: &'a Sketch,
    pub vars: &'a VariableSet,
}

impl EvalContext<'_> {
    pub fn point(&self, x: &DVector<f64>, id: u32) -> (f64, f64) {
        match self.vars.point_cols(id) {
            Some((cx, cy)) => (x[cx], x[cy]),
            None => self
                .sketch
                .point(id)
                .map(|p| (p.x, p.y))
                .unwrap_or((0.0, 0.0)),
        }
    }

    /// Circle radius (variable or stored) or the implied arc radius.
    pub fn radius(&self, x: &DVector<f64>, entity_id: u32) -> f64 {
        match self.sketch.entity(entity_id) {
            Ok(SketchEntity::Circle { radius, .. }) => match self.vars.radius_col(entity_id) {
                Some(col) => x[col],
                None => *radius,
            },
            Ok(SketchEntity::Arc { center, start, .. }) => {
                let c = self.point(x, *center);
                let s = self.point(x, *start);
                ((s.0 - c.0).powi(2) + (s.1 - c.1).powi(2)).sqrt()
            }
            _ => 0.0,
        }
    }

    fn line(&self, x: &DVector<f64>, line: u32) -> Option<((f64, f64), (f64, f64), u32, u32)> {
        let (s, e) = self.sketch.line_endpoints(line).ok()?;
        Some((self.point(x, s), self.point(x, e), s, e))
    }

    /// Characteristic length: line length, or circle/arc radius.
    pub fn entity_length(&self, x: &DVector<f64>, id: u32) -> f64 {
        match self.sketch.entity(id) {
            Ok(SketchEntity::Line { start, end, .. }) => {
                let s = self.point(x, *start);
                let e = self.point(x, *end);
                ((e.0 - s.0).powi(2) + (e.1 - s.1).powi(2)).sqrt()
            }
            _ => self.radius(x, id),
        }
    }
}

/// Scalar residual rows a constraint contributes. FixedPoint pins its point
/// out of the variable set instead of contributing equations.
pub fn residual_rows(kind: &ConstraintKind) -> usize {
    match kind {
        ConstraintKind::Coincident { .. } => 2,
        ConstraintKind::FixedPoint { .. } => 0,
        _ => 1,
    }
}

fn wrap_angle(a: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let mut a = a % tau;
    if a <= -std::f64::consts::PI {
        a += tau;
    } else if a > std::f64::consts::PI {
        a -= tau;
    }
    a
}

/// Append this constraint's residuals to `out`.
pub fn eval_residuals(
    ctx: &EvalContext<'_>,
    x: &DVector<f64>,
    kind: &ConstraintKind,
    out: &mut Vec<f64>,
) {
    match *kind {
        ConstraintKind::Distance { a, b, value }
        | ConstraintKind::FixedDistance { a, b, value } => {
            let pa = ctx.point(x, a);
            let pb = ctx.point(x, b);
            out.push(((pb.0 - pa.0).powi(2) + (pb.1 - pa.1).powi(2)).sqrt() - value);
        }
        ConstraintKind::DistanceX { a, b, value } => {
            out.push(ctx.point(x, b).0 - ctx.point(x, a).0 - value);
        }
        ConstraintKind::DistanceY { a, b, value } => {
            out.push(ctx.point(x, b).1 - ctx.point(x, a).1 - value);
        }
        ConstraintKind::Horizontal { line } => {
            if let Some((s, e, _, _)) = ctx.line(x, line) {
                out.push(e.1 - s.1);
            } else {
                out.push(0.0);
            }
        }
        ConstraintKind::Vertical { line } => {
            if let Some((s, e, _, _)) = ctx.line(x, line) {
                out.push(e.0 - s.0);
            } else {
                out.push(0.0);
            }
        }
        ConstraintKind::Angle {
            line_a,
            line_b,
            degrees,
        }
        | ConstraintKind::FixedAngle {
            line_a,
            line_b,
            degrees,
        } => {
            let da = direction(ctx, x, line_a);
            let db = direction(ctx, x, line_b);
            let cross = da.0 * db.1 - da.1 * db.0;
            let dot = da.0 * db.0 + da.1 * db.1;
            out.push(wrap_angle(cross.atan2(dot) - degrees.to_radians()));
        }
        ConstraintKind::Perpendicular { line_a, line_b } => {
            let da = direction(ctx, x, line_a);
            let db = direction(ctx, x, line_b);
            out.push(da.0 * db.0 + da.1 * db.1);
        }
        ConstraintKind::Parallel { line_a, line_b } => {
            let da = direction(ctx, x, line_a);
            let db = direction(ctx, x, line_b);
            out.push(da.0 * db.1 - da.1 * db.0);
        }
        ConstraintKind::Coincident { a, b } => {
            let pa = ctx.point(x, a);
            let pb = ctx.point(x, b);
            out.push(pb.0 - pa.0);
            out.push(pb.1 - pa.1);
        }
        ConstraintKind::Equal { entity_a, entity_b } => {
            out.push(ctx.entity_length(x, entity_a) - ctx.entity_length(x, entity_b));
        }
        ConstraintKind::Tangent { line, circle } => {
            if let Some((a, b, _, _)) = ctx.line(x, line) {
                let center = circle_center(ctx, x, circle);
                let r = ctx.radius(x, circle);
                let dx = b.0 - a.0;
                let dy = b.1 - a.1;
                let len2 = (dx * dx + dy * dy).max(1e-18);
                let c = (center.0 - a.0) * dy - (center.1 - a.1) * dx;
                // Squared form keeps the residual smooth through zero.
                out.push(c * c / len2 - r * r);
            } else {
                out.push(0.0);
            }
        }
        ConstraintKind::PointOnLine { point, line } => {
            if let Some((a, b, _, _)) = ctx.line(x, line) {
                let p = ctx.point(x, point);
                out.push((p.0 - a.0) * (b.1 - a.1) - (p.1 - a.1) * (b.0 - a.0));
            } else {
                out.push(0.0);
            }
        }
        ConstraintKind::PointOnCircle { point, circle } => {
            let p = ctx.point(x, point);
            let c = circle_center(ctx, x, circle);
            let r = ctx.radius(x, circle);
            out.push(((p.0 - c.0).powi(2) + (p.1 - c.1).powi(2)).sqrt() - r);
        }
        ConstraintKind::FixedPoint { .. } => {
            // Pinned structurally; no equations.
        }
        ConstraintKind::Radius { entity, value } => {
            out.push(ctx.radius(x, entity) - value);
        }
        ConstraintKind::Diameter { entity, value } => {
            out.push(ctx.radius(x, entity) - value * 0.5);
        }
    }
}

fn direction(ctx: &EvalContext<'_>, x: &DVector<f64>, line: u32) -> (f64, f64) {
    match ctx.line(x, line) {
        Some((s, e, _, _)) => (e.0 - s.0, e.1 - s.1),
        None => (1.0, 0.0),
    }
}

fn circle_center(ctx: &EvalContext<'_>, x: &DVector<f64>, entity_id: u32) -> (f64, f64) {
    match ctx.sketch.entity(entity_id) {
        Ok(SketchEntity::Circle { center, .. }) | Ok(SketchEntity::Arc { center, .. }) => {
            ctx.point(x, *center)
        }
        _ => (0.0, 0.0),
    }
}

fn add(jac: &mut DMatrix<f64>, row: usize, col: Option<usize>, v: f64) {
    if let Some(c) = col {
        jac[(row, c)] += v;
    }
}

/// Gradient of the distance between two points, scaled by `factor`.
fn add_dist_grad(
    ctx: &EvalContext<'_>,
    x: &DVector<f64>,
    jac: &mut DMatrix<f64>,
    row: usize,
    a: u32,
    b: u32,
    factor: f64,
) {
    let pa = ctx.point(x, a);
    let pb = ctx.point(x, b);
    let (ca, cb) = (ctx.vars.point_cols(a), ctx.vars.point_cols(b));
    let len = ((pb.0 - pa.0).powi(2) + (pb.1 - pa.1).powi(2)).sqrt();
    let (ux, uy) = if len > 1e-12 {
        ((pb.0 - pa.0) / len, (pb.1 - pa.1) / len)
    } else {
        (1.0, 0.0)
    };
    add(jac, row, ca.map(|c| c.0), -ux * factor);
    add(jac, row, ca.map(|c| c.1), -uy * factor);
    add(jac, row, cb.map(|c| c.0), ux * factor);
    add(jac, row, cb.map(|c| c.1), uy * factor);
}

/// Gradient of an entity's radius, scaled by `factor`. Circles differentiate
/// through the radius column; arcs chain through center and start points.
fn add_radius_grad(
    ctx: &EvalContext<'_>,
    x: &DVector<f64>,
    jac: &mut DMatrix<f64>,
    row: usize,
    entity_id: u32,
    factor: f64,
) {
    match ctx.sketch.entity(entity_id) {
        Ok(SketchEntity::Circle { .. }) => {
            add(jac, row, ctx.vars.radius_col(entity_id), factor);
        }
        Ok(SketchEntity::Arc { center, start, .. }) => {
            add_dist_grad(ctx, x, jac, row, *center, *start, factor);
        }
        _ => {}
    }
}

/// Gradient of an entity's characteristic length, scaled by `factor`.
fn add_length_grad(
    ctx: &EvalContext<'_>,
    x: &DVector<f64>,
    jac: &mut DMatrix<f64>,
    row: usize,
    entity_id: u32,
    factor: f64,
) {
    match ctx.sketch.entity(entity_id) {
        Ok(SketchEntity::Line { start, end, .. }) => {
            add_dist_grad(ctx, x, jac, row, *start, *end, factor);
        }
        _ => add_radius_grad(ctx, x, jac, row, entity_id, factor),
    }
}

/// Write this constraint's Jacobian rows starting at `row`. Returns the
/// number of rows written.
pub fn eval_jacobian(
    ctx: &EvalContext<'_>,
    x: &DVector<f64>,
    kind: &ConstraintKind,
    jac: &mut DMatrix<f64>,
    row: usize,
) -> usize {
    match *kind {
        ConstraintKind::Distance { a, b, .. } | ConstraintKind::FixedDistance { a, b, .. } => {
            add_dist_grad(ctx, x, jac, row, a, b, 1.0);
            1
        }
        ConstraintKind::DistanceX { a, b, .. } => {
            add(jac, row, ctx.vars.point_cols(b).map(|c| c.0), 1.0);
            add(jac, row, ctx.vars.point_cols(a).map(|c| c.0), -1.0);
            1
        }
        ConstraintKind::DistanceY { a, b, .. } => {
            add(jac, row, ctx.vars.point_cols(b).map(|c| c.1), 1.0);
            add(jac, row, ctx.vars.point_cols(a).map(|c| c.1), -1.0);
            1
        }
        ConstraintKind::Horizontal { line } => {
            if let Ok((s, e)) = ctx.sketch.line_endpoints(line) {
                add(jac, row, ctx.vars.point_cols(e).map(|c| c.1), 1.0);
                add(jac, row, ctx.vars.point_cols(s).map(|c| c.1), -1.0);
            }
            1
        }
        ConstraintKind::Vertical { line } => {
            if let Ok((s, e)) = ctx.sketch.line_endpoints(line) {
                add(jac, row, ctx.vars.point_cols(e).map(|c| c.0), 1.0);
                add(jac, row, ctx.vars.point_cols(s).map(|c| c.0), -1.0);
            }
            1
        }
        ConstraintKind::Coincident { a, b } => {
            let (ca, cb) = (ctx.vars.point_cols(a), ctx.vars.point_cols(b));
            add(jac, row, cb.map(|c| c.0), 1.0);
            add(jac, row, ca.map(|c| c.0), -1.0);
            add(jac, row + 1, cb.map(|c| c.1), 1.0);
            add(jac, row + 1, ca.map(|c| c.1), -1.0);
            2
        }
        ConstraintKind::Perpendicular { line_a, line_b } => {
            if let (Some((sa, ea, sai, eai)), Some((sb, eb, sbi, ebi))) =
                (ctx.line(x, line_a), ctx.line(x, line_b))
            {
                let da = (ea.0 - sa.0, ea.1 - sa.1);
                let db = (eb.0 - sb.0, eb.1 - sb.1);
                let (csa, cea) = (ctx.vars.point_cols(sai), ctx.vars.point_cols(eai));
                let (csb, ceb) = (ctx.vars.point_cols(sbi), ctx.vars.point_cols(ebi));
                // r = da . db
                add(jac, row, csa.map(|c| c.0), -db.0);
                add(jac, row, cea.map(|c| c.0), db.0);
                add(jac, row, csa.map(|c| c.1), -db.1);
                add(jac, row, cea.map(|c| c.1), db.1);
                add(jac, row, csb.map(|c| c.0), -da.0);
                add(jac, row, ceb.map(|c| c.0), da.0);
                add(jac, row, csb.map(|c| c.1), -da.1);
                add(jac, row, ceb.map(|c| c.1), da.1);
            }
            1
        }
        ConstraintKind::Parallel { line_a, line_b } => {
            if let (Some((sa, ea, sai, eai)), Some((sb, eb, sbi, ebi))) =
                (ctx.line(x, line_a), ctx.line(x, line_b))
            {
                let da = (ea.0 - sa.0, ea.1 - sa.1);
                let db = (eb.0 - sb.0, eb.1 - sb.1);
                let (csa, cea) = (ctx.vars.point_cols(sai), ctx.vars.point_cols(eai));
                let (csb, ceb) = (ctx.vars.point_cols(sbi), ctx.vars.point_cols(ebi));
                // r = da x db
                add(jac, row, csa.map(|c| c.0), -db.1);
                add(jac, row, cea.map(|c| c.0), db.1);
                add(jac, row, csa.map(|c| c.1), db.0);
                add(jac, row, cea.map(|c| c.1), -db.0);
                add(jac, row, csb.map(|c| c.0), da.1);
                add(jac, row, ceb.map(|c| c.0), -da.1);
                add(jac, row, csb.map(|c| c.1), -da.0);
                add(jac, row, ceb.map(|c| c.1), da.0);
            }
            1
        }
        ConstraintKind::Equal { entity_a, entity_b } => {
            add_length_grad(ctx, x, jac, row, entity_a, 1.0);
            add_length_grad(ctx, x, jac, row, entity_b, -1.0);
            1
        }
        ConstraintKind::Tangent { line, circle } => {
            if let Some((a, b, ai, bi)) = ctx.line(x, line) {
                let q = circle_center(ctx, x, circle);
                let r = ctx.radius(x, circle);
                let dx = b.0 - a.0;
                let dy = b.1 - a.1;
                let len2 = (dx * dx + dy * dy).max(1e-18);
                let c = (q.0 - a.0) * dy - (q.1 - a.1) * dx;

                // res = c^2/len2 - r^2
                let (ca, cb) = (ctx.vars.point_cols(ai), ctx.vars.point_cols(bi));
                let line_term = |dc: f64, dl2: f64| (2.0 * c * dc - (c * c / len2) * dl2) / len2;
                add(jac, row, ca.map(|k| k.0), line_term(q.1 - b.1, -2.0 * dx));
                add(jac, row, ca.map(|k| k.1), line_term(b.0 - q.0, -2.0 * dy));
                add(jac, row, cb.map(|k| k.0), line_term(a.1 - q.1, 2.0 * dx));
                add(jac, row, cb.map(|k| k.1), line_term(q.0 - a.0, 2.0 * dy));

                // Center moves through c only.
                if let Ok(SketchEntity::Circle { center, .. } | SketchEntity::Arc { center, .. }) =
                    ctx.sketch.entity(circle)
                {
                    let cc = ctx.vars.point_cols(*center);
                    add(jac, row, cc.map(|k| k.0), 2.0 * c * dy / len2);
                    add(jac, row, cc.map(|k| k.1), -2.0 * c * dx / len2);
                }
                add_radius_grad(ctx, x, jac, row, circle, -2.0 * r);
            }
            1
        }
        ConstraintKind::PointOnLine { point, line } => {
            if let Some((a, b, ai, bi)) = ctx.line(x, line) {
                let p = ctx.point(x, point);
                let cp = ctx.vars.point_cols(point);
                let (ca, cb) = (ctx.vars.point_cols(ai), ctx.vars.point_cols(bi));
                add(jac, row, cp.map(|c| c.0), b.1 - a.1);
                add(jac, row, cp.map(|c| c.1), -(b.0 - a.0));
                add(jac, row, ca.map(|c| c.0), p.1 - b.1);
                add(jac, row, ca.map(|c| c.1), b.0 - p.0);
                add(jac, row, cb.map(|c| c.0), a.1 - p.1);
                add(jac, row, cb.map(|c| c.1), p.0 - a.0);
            }
            1
        }
        ConstraintKind::PointOnCircle { point, circle } => {
            if let Ok(SketchEntity::Circle { center, .. } | SketchEntity::Arc { center, .. }) =
                ctx.sketch.entity(circle)
            {
                add_dist_grad(ctx, x, jac, row, *center, point, 1.0);
            }
            add_radius_grad(ctx, x, jac, row, circle, -1.0);
            1
        }
        ConstraintKind::Radius { entity, .. } | ConstraintKind::Diameter { entity, .. } => {
            add_radius_grad(ctx, x, jac, row, entity, 1.0);
            1
        }
        ConstraintKind::Angle { .. } | ConstraintKind::FixedAngle { .. } => {
            // Numeric fallback for the angle residual.
            let mut base = Vec::with_capacity(1);
            eval_residuals(ctx, x, kind, &mut base);
            for col in 0..ctx.vars.len() {
                let mut xp = x.clone();
                xp[col] += FD_STEP;
                let mut plus = Vec::with_capacity(1);
                eval_residuals(ctx, &xp, kind, &mut plus);
                if let (Some(r0), Some(r1)) = (base.first(), plus.first()) {
                    jac[(row, col)] = (r1 - r0) / FD_STEP;
                }
            }
            1
        }
        ConstraintKind::FixedPoint { .. } => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::SketchPlane;

    /// Compare every analytic Jacobian row against finite differences.
    fn check_jacobian(sketch: &Sketch) {
        let vars = VariableSet::build(sketch);
        let ctx = EvalContext {
            sketch,
            vars: &vars,
        };
        let x = vars.gather(sketch);
        let active: Vec<_> = sketch
            .constraints
            .iter()
            .filter(|c| c.enabled && c.driving)
            .collect();
        let m: usize = active.iter().map(|c| residual_rows(&c.kind)).sum();
        let n = vars.len();

        let mut jac = DMatrix::zeros(m, n);
        let mut row = 0;
        for c in &active {
            row += eval_jacobian(&ctx, &x, &c.kind, &mut jac, row);
        }
        assert_eq!(row, m);

        let h = 1e-7;
        for col in 0..n {
            let mut xp = x.clone();
            xp[col] += h;
            let mut r0 = Vec::new();
            let mut r1 = Vec::new();
            for c in &active {
                eval_residuals(&ctx, &x, &c.kind, &mut r0);
                eval_residuals(&ctx, &xp, &c.kind, &mut r1);
            }
            for i in 0..m {
                let fd = (r1[i] - r0[i]) / h;
                assert!(
                    (jac[(i, col)] - fd).abs() < 1e-4,
                    "row {i} col {col}: analytic {} vs fd {fd}",
                    jac[(i, col)]
                );
            }
        }
    }

    #[test]
    fn test_jacobian_matches_fd_distance_family() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let a = s.add_point(0.3, 0.7, false);
        let b = s.add_point(4.1, 2.9, false);
        s.add_constraint(ConstraintKind::Distance { a, b, value: 5.0 })
            .unwrap();
        s.add_constraint(ConstraintKind::DistanceX { a, b, value: 3.0 })
            .unwrap();
        s.add_constraint(ConstraintKind::DistanceY { a, b, value: 2.0 })
            .unwrap();
        s.add_constraint(ConstraintKind::Coincident { a, b }).unwrap();
        check_jacobian(&s);
    }

    #[test]
    fn test_jacobian_matches_fd_line_family() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let a = s.add_point(0.0, 0.1, false);
        let b = s.add_point(5.0, 1.3, false);
        let c = s.add_point(1.0, 4.2, false);
        let d = s.add_point(2.5, -1.8, false);
        let l1 = s.add_line(a, b).unwrap();
        let l2 = s.add_line(c, d).unwrap();
        let p = s.add_point(2.0, 2.0, false);
        s.add_constraint(ConstraintKind::Perpendicular {
            line_a: l1,
            line_b: l2,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::Parallel {
            line_a: l1,
            line_b: l2,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::Equal {
            entity_a: l1,
            entity_b: l2,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::PointOnLine { point: p, line: l1 })
            .unwrap();
        check_jacobian(&s);
    }

    #[test]
    fn test_jacobian_matches_fd_circle_family() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let cc = s.add_point(1.0, 1.5, false);
        let circle = s.add_circle(cc, 2.0).unwrap();
        let p = s.add_point(3.5, 1.0, false);
        let a = s.add_point(-2.0, 4.0, false);
        let b = s.add_point(5.0, 4.5, false);
        let line = s.add_line(a, b).unwrap();
        s.add_constraint(ConstraintKind::Radius {
            entity: circle,
            value: 2.5,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::PointOnCircle {
            point: p,
            circle,
        })
        .unwrap();
        s.add_constraint(ConstraintKind::Tangent { line, circle })
            .unwrap();
        check_jacobian(&s);
    }

    #[test]
    fn test_angle_residual_wraps() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let a = s.add_point(0.0, 0.0, false);
        let b = s.add_point(1.0, 0.0, false);
        let c = s.add_point(0.0, 0.0, false);
        let d = s.add_point(-1.0, -1e-9, false);
        let l1 = s.add_line(a, b).unwrap();
        let l2 = s.add_line(c, d).unwrap();
        s.add_constraint(ConstraintKind::Angle {
            line_a: l1,
            line_b: l2,
            degrees: 180.0,
        })
        .unwrap();
        let vars = VariableSet::build(&s);
        let ctx = EvalContext {
            sketch: &s,
            vars: &vars,
        };
        let x = vars.gather(&s);
        let mut out = Vec::new();
        // Only the angle constraint contributes a row among driving ones
        // referencing these lines.
        for cst in s.constraints.iter().filter(|c| {
            matches!(c.kind, ConstraintKind::Angle { .. })
        }) {
            eval_residuals(&ctx, &x, &cst.kind, &mut out);
        }
        assert_eq!(out.len(), 1);
        assert!(out[0].abs() < 1e-6, "wrapped residual, got {}", out[0]);
    }
}
