//! Profile detection: walks the sketch's line/arc adjacency graph into
//! closed boundary loops and residual open chains.
//!
//! Circles are self-contained closed profiles. For the line/arc network the
//! detector builds directed half-edges, sorts each vertex's departures by
//! angle, and traces minimal faces with the smallest-turn rule, so branch
//! vertices (degree > 2) split into the smallest enclosing loops and every
//! directed edge is consumed once. Interior faces come out counterclockwise;
//! clockwise traversals (the unbounded face and loop mirrors) are dropped.

use std::collections::{HashMap, HashSet};

use caliper_types::{Profile, ProfileKind, Sketch, SketchEntity, EPS_ZERO_LENGTH};

/// Loops enclosing less area than this are rejected as degenerate.
const AREA_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirectedEdge {
    from: u32,
    to: u32,
    entity: u32,
}

/// Extract all profiles from the sketch's enabled geometry.
pub fn detect_profiles(sketch: &Sketch) -> Vec<Profile> {
    let positions: HashMap<u32, (f64, f64)> = sketch
        .points
        .iter()
        .map(|p| (p.id, (p.x, p.y)))
        .collect();

    let mut profiles = Vec::new();

    // Circles stand alone as one-entity closed profiles.
    for e in &sketch.entities {
        if let SketchEntity::Circle { id, center, .. } = e {
            profiles.push(Profile {
                entity_ids: vec![*id],
                point_ids: vec![*center],
                kind: ProfileKind::Closed,
            });
        }
    }

    // Directed half-edges for every non-degenerate line and arc.
    let mut edges: Vec<DirectedEdge> = Vec::new();
    let mut walkable: Vec<u32> = Vec::new();
    for e in &sketch.entities {
        let (id, a, b) = match e {
            SketchEntity::Line { id, start, end } => (*id, *start, *end),
            SketchEntity::Arc {
                id, start, end, ..
            } => (*id, *start, *end),
            SketchEntity::Circle { .. } => continue,
        };
        if a == b {
            continue;
        }
        match (positions.get(&a), positions.get(&b)) {
            (Some(pa), Some(pb)) => {
                let len = ((pb.0 - pa.0).powi(2) + (pb.1 - pa.1).powi(2)).sqrt();
                if len < EPS_ZERO_LENGTH {
                    continue;
                }
            }
            _ => continue,
        }
        walkable.push(id);
        edges.push(DirectedEdge {
            from: a,
            to: b,
            entity: id,
        });
        edges.push(DirectedEdge {
            from: b,
            to: a,
            entity: id,
        });
    }

    if edges.is_empty() {
        return profiles;
    }

    let mut adjacency: HashMap<u32, Vec<DirectedEdge>> = HashMap::new();
    for e in &edges {
        adjacency.entry(e.from).or_default().push(*e);
    }

    let mut used: HashSet<(u32, u32, u32)> = HashSet::new();
    let mut in_closed: HashSet<u32> = HashSet::new();

    for start in &edges {
        if used.contains(&(start.from, start.to, start.entity)) {
            continue;
        }

        let mut face_entities: Vec<u32> = Vec::new();
        let mut face_points: Vec<u32> = Vec::new();
        let mut current = *start;
        let mut closed = false;

        loop {
            if !used.insert((current.from, current.to, current.entity)) {
                break;
            }
            face_entities.push(current.entity);
            face_points.push(current.from);

            match next_half_edge(&adjacency, &current, &positions) {
                Some(next) if next == *start => {
                    closed = true;
                    break;
                }
                Some(next) => current = next,
                None => break,
            }
        }

        if !closed || face_entities.len() < 2 {
            continue;
        }
        remove_spurs(&mut face_entities, &mut face_points);
        if face_entities.len() < 3 {
            continue;
        }
        // Duplicated entities after spur removal mean a self-touching walk;
        // not a usable boundary.
        let distinct: HashSet<u32> = face_entities.iter().copied().collect();
        if distinct.len() != face_entities.len() {
            continue;
        }

        let area = signed_area(&face_points, &positions);
        if area <= AREA_EPS {
            // Clockwise mirrors, the unbounded face, and slivers.
            continue;
        }

        in_closed.extend(face_entities.iter().copied());
        profiles.push(Profile {
            entity_ids: face_entities,
            point_ids: face_points,
            kind: ProfileKind::Closed,
        });
    }

    // Everything not consumed by a closed loop becomes open chains.
    profiles.extend(open_chains(sketch, &walkable, &in_closed));
    profiles
}

/// Whether the sketch has at least one closed profile.
pub fn has_closed_profile(sketch: &Sketch) -> bool {
    detect_profiles(sketch).iter().any(|p| p.is_closed())
}

/// The first closed profile in detection order, if any.
pub fn first_closed_profile(sketch: &Sketch) -> Option<Profile> {
    detect_profiles(sketch).into_iter().find(|p| p.is_closed())
}

/// At `current.to`, pick the departing edge that makes the tightest
/// clockwise turn from the reverse of the arrival direction. Walking the
/// tightest turn traces minimal faces, and interior faces come out
/// counterclockwise. The immediate reverse of `current` is skipped.
fn next_half_edge(
    adjacency: &HashMap<u32, Vec<DirectedEdge>>,
    current: &DirectedEdge,
    positions: &HashMap<u32, (f64, f64)>,
) -> Option<DirectedEdge> {
    let out_edges = adjacency.get(&current.to)?;
    let vertex = positions.get(&current.to)?;
    let from = positions.get(&current.from)?;
    // Direction pointing back along the edge we arrived on.
    let reverse = (from.1 - vertex.1).atan2(from.0 - vertex.0);

    let mut best: Option<DirectedEdge> = None;
    let mut best_delta = f64::MAX;
    for edge in out_edges {
        if edge.to == current.from && edge.entity == current.entity {
            continue;
        }
        let to = match positions.get(&edge.to) {
            Some(p) => p,
            None => continue,
        };
        let angle = (to.1 - vertex.1).atan2(to.0 - vertex.0);
        let mut delta = reverse - angle;
        while delta <= 0.0 {
            delta += std::f64::consts::TAU;
        }
        while delta > std::f64::consts::TAU {
            delta -= std::f64::consts::TAU;
        }
        if delta < best_delta {
            best_delta = delta;
            best = Some(*edge);
        }
    }
    best
}

/// Remove out-and-back spurs: a pair of consecutive equal entities, along
/// with their origin points (the branch re-entry and the dead end).
fn remove_spurs(entities: &mut Vec<u32>, points: &mut Vec<u32>) {
    loop {
        let n = entities.len();
        let mut removed = false;
        for i in 0..n {
            if n >= 2 && entities[i] == entities[(i + 1) % n] {
                let j = (i + 1) % n;
                // Drop the higher index first to keep positions stable.
                let (hi, lo) = if i > j { (i, j) } else { (j, i) };
                entities.remove(hi);
                entities.remove(lo);
                points.remove(hi);
                points.remove(lo);
                removed = true;
                break;
            }
        }
        if !removed {
            break;
        }
    }
}

/// Shoelace area of the polygon through the given point ids.
fn signed_area(point_ids: &[u32], positions: &HashMap<u32, (f64, f64)>) -> f64 {
    if point_ids.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let n = point_ids.len();
    for i in 0..n {
        let (x1, y1) = positions
            .get(&point_ids[i])
            .copied()
            .unwrap_or((0.0, 0.0));
        let (x2, y2) = positions
            .get(&point_ids[(i + 1) % n])
            .copied()
            .unwrap_or((0.0, 0.0));
        area += x1 * y2 - x2 * y1;
    }
    area / 2.0
}

/// Group leftover entities into ordered open chains.
fn open_chains(sketch: &Sketch, walkable: &[u32], in_closed: &HashSet<u32>) -> Vec<Profile> {
    let leftover: Vec<(u32, u32, u32)> = walkable
        .iter()
        .filter(|id| !in_closed.contains(id))
        .filter_map(|id| match sketch.entity(*id) {
            Ok(SketchEntity::Line { start, end, .. }) => Some((*id, *start, *end)),
            Ok(SketchEntity::Arc { start, end, .. }) => Some((*id, *start, *end)),
            _ => None,
        })
        .collect();

    let mut degree: HashMap<u32, usize> = HashMap::new();
    for (_, a, b) in &leftover {
        *degree.entry(*a).or_default() += 1;
        *degree.entry(*b).or_default() += 1;
    }

    let mut unused: Vec<bool> = vec![true; leftover.len()];
    let mut chains = Vec::new();

    // Start chains at loose ends first so the ordering is natural.
    let mut starts: Vec<usize> = (0..leftover.len())
        .filter(|&i| {
            let (_, a, b) = leftover[i];
            degree[&a] == 1 || degree[&b] == 1
        })
        .collect();
    starts.extend(0..leftover.len());

    for &si in &starts {
        if !unused[si] {
            continue;
        }
        let (id, a, b) = leftover[si];
        unused[si] = false;
        let (first, mut tip) = if degree[&b] == 1 { (b, a) } else { (a, b) };
        let mut entity_ids = vec![id];
        let mut point_ids = vec![first, tip];

        loop {
            let next = (0..leftover.len()).find(|&j| {
                unused[j] && (leftover[j].1 == tip || leftover[j].2 == tip)
            });
            match next {
                Some(j) => {
                    let (jid, ja, jb) = leftover[j];
                    unused[j] = false;
                    tip = if ja == tip { jb } else { ja };
                    entity_ids.push(jid);
                    point_ids.push(tip);
                }
                None => break,
            }
        }

        chains.push(Profile {
            entity_ids,
            point_ids,
            kind: ProfileKind::Open,
        });
    }
    chains
}
