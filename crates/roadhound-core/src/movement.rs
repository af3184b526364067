use crate::map::{Direction, Position, Road};

/// Result of constraining a proposed move to the road network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub position: Position,
    /// The proposal was cut short by a road boundary.
    pub clamped: bool,
}

/// Roads whose extended rectangle contains `pos`, in map order.
pub fn roads_containing<'a>(roads: &'a [Road], pos: Position) -> impl Iterator<Item = &'a Road> {
    roads.iter().filter(move |road| road.contains(pos))
}

/// Constrain a dog's proposed tick-end position to the roads it stands on.
///
/// At a junction the dog is limited by the road it is aligned with rather
/// than by a perpendicular road crossing the same point.
pub fn clamp_to_roads(
    current: Position,
    proposed: Position,
    facing: Direction,
    roads: &[Road],
) -> MoveOutcome {
    let mut candidates = 0usize;
    let mut closest: Option<(f64, Position)> = None;

    for road in roads_containing(roads, current) {
        candidates += 1;
        let clipped = road.clip(proposed);
        if clipped == proposed || road.is_aligned_with(facing) {
            return MoveOutcome {
                position: clipped,
                clamped: clipped != proposed,
            };
        }
        let dx = clipped.x - proposed.x;
        let dy = clipped.y - proposed.y;
        let dist = dx * dx + dy * dy;
        if closest.is_none_or(|(best, _)| dist < best) {
            closest = Some((dist, clipped));
        }
    }

    match closest {
        // Several perpendicular roads and none aligned: stay on the one
        // that cuts the move the least.
        Some((_, position)) => MoveOutcome {
            position,
            clamped: true,
        },
        None => {
            if candidates == 0 {
                tracing::debug!(x = current.x, y = current.y, "Dog is not on any road");
            }
            MoveOutcome {
                position: proposed,
                clamped: false,
            }
        },
    }
}
