use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{GameMap, Position, Unit, ORTHOGONAL};

/// Per-cell movement rules the search consults
pub trait MovementRules {
    fn is_passable(&self, pos: Position) -> bool;
    fn move_cost(&self, pos: Position) -> u32;
    /// Zone of control: a cell the mover may enter but not leave this move
    fn stops_here(&self, pos: Position) -> bool;
}

/// Output of one reachability query. Indices are row-major tile indices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReachableResult {
    pub width: u32,
    pub height: u32,
    pub reachable: BTreeSet<usize>,
    /// Accumulated movement cost per visited cell
    pub costs: BTreeMap<usize, u32>,
    /// Path length in tile steps per visited cell; 0 at the start
    pub steps: BTreeMap<usize, u32>,
    /// Every settled `(cost, steps)` pair per cell that no other pair beats
    /// on both counts, cheapest first. `costs` and `steps` hold the first.
    pub labels: BTreeMap<usize, Vec<(u32, u32)>>,
    /// Cells entered under zone of control that did not expand
    pub halts: BTreeSet<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    pos: Position,
    cost: u32,
    steps: u32,
}

impl ReachableResult {
    pub fn index_of(&self, pos: Position) -> Option<usize> {
        if pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    pub fn position_of(&self, index: usize) -> Position {
        let width = self.width as usize;
        Position::new((index % width) as i32, (index / width) as i32)
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.index_of(pos).is_some_and(|i| self.reachable.contains(&i))
    }

    pub fn cost_to(&self, pos: Position) -> Option<u32> {
        self.index_of(pos).and_then(|i| self.costs.get(&i).copied())
    }

    pub fn steps_to(&self, pos: Position) -> Option<u32> {
        self.index_of(pos).and_then(|i| self.steps.get(&i).copied())
    }

    /// Reachable cells in index order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.reachable.iter().map(|&i| self.position_of(i))
    }

    /// Drop cells from the reachable set, keeping their costs so paths may
    /// still pass through them
    pub fn exclude(&mut self, positions: impl IntoIterator<Item = Position>) {
        for pos in positions {
            if let Some(index) = self.index_of(pos) {
                self.reachable.remove(&index);
            }
        }
    }

    /// Walk back from `target` to the start. At each cell the first
    /// orthogonal neighbour (up, down, left, right) holding the label one
    /// step shorter and cheaper by the cell's own entry cost is taken.
    /// `None` means the result is inconsistent with `move_cost`.
    pub fn reconstruct_path(
        &self,
        target: Position,
        move_cost: impl Fn(Position) -> u32,
    ) -> Option<Vec<Position>> {
        let mut index = self.index_of(target)?;
        let mut label = (*self.costs.get(&index)?, *self.steps.get(&index)?);
        let mut path = vec![target];

        while label.1 > 0 {
            let current = self.position_of(index);
            let wanted = (label.0.checked_sub(move_cost(current))?, label.1 - 1);

            let previous = ORTHOGONAL.iter().find_map(|&(dx, dy)| {
                let neighbor = self.index_of(current.offset(dx, dy))?;
                let matches = !self.halts.contains(&neighbor)
                    && self.labels.get(&neighbor).is_some_and(|l| l.contains(&wanted));
                matches.then_some(neighbor)
            })?;

            path.push(self.position_of(previous));
            index = previous;
            label = wanted;
        }

        path.reverse();
        Some(path)
    }
}

fn dominated(labels: Option<&Vec<(u32, u32)>>, (cost, steps): (u32, u32)) -> bool {
    labels.is_some_and(|l| l.iter().any(|&(c, s)| c <= cost && s <= steps))
}

/// Uniform-cost expansion over orthogonal neighbours, bounded by total cost
/// and by step count. A cell keeps every label not beaten on both cost and
/// steps, so a short expensive route survives next to a long cheap one.
pub fn find_reachable(
    width: u32,
    height: u32,
    start: Position,
    max_cost: u32,
    max_steps: u32,
    rules: &impl MovementRules,
) -> ReachableResult {
    let mut result = ReachableResult {
        width,
        height,
        ..Default::default()
    };
    let Some(start_index) = result.index_of(start) else {
        return result;
    };

    // labels queued but not yet settled
    let mut pending: BTreeMap<usize, Vec<(u32, u32)>> = BTreeMap::new();
    pending.insert(start_index, vec![(0, 0)]);
    let mut open = vec![Frontier { pos: start, cost: 0, steps: 0 }];

    while !open.is_empty() {
        let mut best = 0;
        for i in 1..open.len() {
            if (open[i].cost, open[i].steps) < (open[best].cost, open[best].steps) {
                best = i;
            }
        }
        let current = open.remove(best);
        let Some(index) = result.index_of(current.pos) else {
            continue;
        };
        let label = (current.cost, current.steps);

        // stale: pruned by a better label after it was queued
        let Some(queued) = pending.get_mut(&index) else {
            continue;
        };
        let Some(at) = queued.iter().position(|&l| l == label) else {
            continue;
        };
        queued.swap_remove(at);
        if dominated(result.labels.get(&index), label) {
            continue;
        }
        result.labels.entry(index).or_default().push(label);
        if result.reachable.insert(index) {
            result.costs.insert(index, label.0);
            result.steps.insert(index, label.1);
        }

        if index != start_index && rules.stops_here(current.pos) {
            result.halts.insert(index);
            continue;
        }

        for (dx, dy) in ORTHOGONAL {
            let next = current.pos.offset(dx, dy);
            let Some(next_index) = result.index_of(next) else {
                continue;
            };
            if !rules.is_passable(next) {
                continue;
            }

            let next_label = (current.cost + rules.move_cost(next), current.steps + 1);
            if next_label.0 > max_cost || next_label.1 > max_steps {
                continue;
            }
            if dominated(result.labels.get(&next_index), next_label)
                || dominated(pending.get(&next_index), next_label)
            {
                continue;
            }

            let queue = pending.entry(next_index).or_default();
            queue.retain(|&(c, s)| !(next_label.0 <= c && next_label.1 <= s));
            queue.push(next_label);
            open.push(Frontier {
                pos: next,
                cost: next_label.0,
                steps: next_label.1,
            });
        }
    }

    result
}

/// Movement rules for a unit on the live board: enemies block, cells next to
/// an enemy halt movement, allies may be passed through.
pub struct UnitMovement<'a> {
    pub map: &'a GameMap,
    pub units: &'a [Unit],
    pub mover: &'a Unit,
}

impl MovementRules for UnitMovement<'_> {
    fn is_passable(&self, pos: Position) -> bool {
        self.map.in_bounds(pos.x, pos.y)
            && !self
                .units
                .iter()
                .any(|u| u.faction != self.mover.faction && u.position() == pos)
    }

    fn move_cost(&self, pos: Position) -> u32 {
        self.map
            .tile_type(pos.x, pos.y)
            .map(|t| t.movement_cost())
            .unwrap_or(u32::MAX / 2)
    }

    fn stops_here(&self, pos: Position) -> bool {
        self.units
            .iter()
            .any(|u| u.faction != self.mover.faction && u.position().is_adjacent(pos))
    }
}

/// Cells `mover` can end its move on. Bounded by move points and by food,
/// excluding cells held by other units of its own faction.
pub fn unit_movement_range(map: &GameMap, units: &[Unit], mover: &Unit) -> ReachableResult {
    let rules = UnitMovement { map, units, mover };
    let mut range = find_reachable(
        map.width,
        map.height,
        mover.position(),
        mover.move_points,
        mover.food,
        &rules,
    );
    range.exclude(
        units
            .iter()
            .filter(|u| u.faction == mover.faction && u.id != mover.id)
            .map(|u| u.position()),
    );
    range
}

/// Path `mover` would walk to reach `target` inside `range`
pub fn unit_path(map: &GameMap, range: &ReachableResult, target: Position) -> Option<Vec<Position>> {
    range.reconstruct_path(target, |p| {
        map.tile_type(p.x, p.y).map(|t| t.movement_cost()).unwrap_or(0)
    })
}
