//! Free-variable assembly: maps sketch geometry onto the solver's
//! parameter vector.
//!
//! Two columns per movable point (x then y), in point order. A circle
//! radius becomes a variable only when some enabled driving constraint
//! couples it (Equal, Radius, Diameter, Tangent, PointOnCircle). Fixed
//! points and points pinned by a FixedPoint constraint get no columns, so
//! the solver cannot move them.

use std::collections::{HashMap, HashSet};

use nalgebra::DVector;

use caliper_types::{ConstraintKind, Sketch, SketchEntity};

/// One solver column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    PointX(u32),
    PointY(u32),
    Radius(u32),
}

/// The ordered free-variable table for one solve.
#[derive(Debug, Clone)]
pub struct VariableSet {
    pub variables: Vec<Variable>,
    point_cols: HashMap<u32, (usize, usize)>,
    radius_cols: HashMap<u32, usize>,
}

impl VariableSet {
    pub fn build(sketch: &Sketch) -> Self {
        let mut pinned: HashSet<u32> = sketch
            .points
            .iter()
            .filter(|p| p.fixed)
            .map(|p| p.id)
            .collect();
        for c in sketch.constraints.iter().filter(|c| c.enabled && c.driving) {
            if let ConstraintKind::FixedPoint { point, .. } = c.kind {
                pinned.insert(point);
            }
        }

        let mut variables = Vec::new();
        let mut point_cols = HashMap::new();
        for p in &sketch.points {
            if pinned.contains(&p.id) {
                continue;
            }
            point_cols.insert(p.id, (variables.len(), variables.len() + 1));
            variables.push(Variable::PointX(p.id));
            variables.push(Variable::PointY(p.id));
        }

        let mut radius_cols = HashMap::new();
        for e in &sketch.entities {
            if let SketchEntity::Circle { id, .. } = e {
                let coupled = sketch
                    .constraints
                    .iter()
                    .filter(|c| c.enabled && c.driving)
                    .any(|c| c.kind.couples_radius_of(*id));
                if coupled {
                    radius_cols.insert(*id, variables.len());
                    variables.push(Variable::Radius(*id));
                }
            }
        }

        Self {
            variables,
            point_cols,
            radius_cols,
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Columns for a point's x and y, or None when the point is pinned.
    pub fn point_cols(&self, id: u32) -> Option<(usize, usize)> {
        self.point_cols.get(&id).copied()
    }

    /// Column for a circle's radius, or None when the radius is not free.
    pub fn radius_col(&self, entity_id: u32) -> Option<usize> {
        self.radius_cols.get(&entity_id).copied()
    }

    /// Read the current sketch state into a parameter vector.
    pub fn gather(&self, sketch: &Sketch) -> DVector<f64> {
        let mut x = DVector::zeros(self.variables.len());
        for (col, var) in self.variables.iter().enumerate() {
            x[col] = match *var {
                Variable::PointX(id) => sketch.point(id).map(|p| p.x).unwrap_or(0.0),
                Variable::PointY(id) => sketch.point(id).map(|p| p.y).unwrap_or(0.0),
                Variable::Radius(id) => sketch.circle_radius(id).unwrap_or(0.0),
            };
        }
        x
    }

    /// Write a parameter vector back into the sketch.
    pub fn scatter(&self, sketch: &mut Sketch, x: &DVector<f64>) {
        for (col, var) in self.variables.iter().enumerate() {
            match *var {
                Variable::PointX(id) => {
                    if let Ok(p) = sketch.point_mut(id) {
                        p.x = x[col];
                    }
                }
                Variable::PointY(id) => {
                    if let Ok(p) = sketch.point_mut(id) {
                        p.y = x[col];
                    }
                }
                Variable::Radius(id) => {
                    for e in &mut sketch.entities {
                        if let SketchEntity::Circle { id: eid, radius, .. } = e {
                            if *eid == id {
                                *radius = x[col];
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caliper_types::SketchPlane;

    #[test]
    fn test_fixed_points_get_no_columns() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let a = s.add_point(0.0, 0.0, true);
        let b = s.add_point(1.0, 2.0, false);
        let vars = VariableSet::build(&s);
        assert_eq!(vars.len(), 2);
        assert!(vars.point_cols(a).is_none());
        assert!(vars.point_cols(b).is_some());
    }

    #[test]
    fn test_fixed_point_constraint_pins_point() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let a = s.add_point(3.0, 4.0, false);
        s.add_constraint(ConstraintKind::FixedPoint {
            point: a,
            x: 3.0,
            y: 4.0,
        })
        .unwrap();
        let vars = VariableSet::build(&s);
        assert_eq!(vars.len(), 0);
    }

    #[test]
    fn test_circle_radius_column_only_when_coupled() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let c = s.add_point(0.0, 0.0, false);
        let circle = s.add_circle(c, 5.0).unwrap();
        let vars = VariableSet::build(&s);
        assert_eq!(vars.len(), 2, "free center only");
        assert!(vars.radius_col(circle).is_none());

        s.add_constraint(ConstraintKind::Radius {
            entity: circle,
            value: 4.0,
        })
        .unwrap();
        let vars = VariableSet::build(&s);
        assert_eq!(vars.len(), 3);
        assert!(vars.radius_col(circle).is_some());
    }

    #[test]
    fn test_gather_scatter_round_trip() {
        let mut s = Sketch::new("t", SketchPlane::xy());
        let a = s.add_point(1.5, -2.5, false);
        let vars = VariableSet::build(&s);
        let mut x = vars.gather(&s);
        assert_eq!(x.as_slice(), &[1.5, -2.5]);
        x[0] = 9.0;
        vars.scatter(&mut s, &x);
        assert_eq!(s.point(a).unwrap().x, 9.0);
    }
}
