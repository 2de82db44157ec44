use fixedbitset::FixedBitSet;
use tinyvec::TinyVec;
use vrptw_structs::{problem::FEAS_TOL, Instance};

use crate::pricing::Duals;

pub type LabelId = u32;
pub const NO_PARENT: LabelId = LabelId::MAX;

/// Non-dominated labels resident at one node.
pub type Frontier = TinyVec<[LabelId; 8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strengthen {
    Off,
    /// Mark customers whose demand no longer fits.
    Load,
    /// Also mark customers whose window is already missed. Only sound when
    /// travel times satisfy the triangle inequality.
    LoadAndTime,
}

/// Which customers a label's visited set tracks.
#[derive(Debug, Clone, Copy)]
pub enum SetRule<'a> {
    Elementary(Strengthen),
    /// Only customers in the critical set; others may repeat, but a path
    /// makes at most one customer visit per customer of the instance.
    Critical(&'a FixedBitSet),
    /// No set at all.
    Relaxed,
}

/// Partial path from the depot, with its resources after serving `node`.
/// `cost` is the reduced cost accumulated so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub node: u32,
    pub cost: f64,
    pub time: f64,
    pub load: f64,
    /// Customer visits so far. Only counted under [`SetRule::Critical`].
    pub visits: u32,
    pub visited: FixedBitSet,
    pub parent: LabelId,
}

impl Label {
    pub fn start(instance: &Instance, duals: &Duals) -> Label {
        Label {
            node: 0,
            cost: -duals.vehicle,
            time: instance.depot().ready,
            load: 0.0,
            visits: 0,
            visited: FixedBitSet::with_capacity(instance.num_nodes()),
            parent: NO_PARENT,
        }
    }

    /// Extends this label (stored as `id`) along the arc to `to`. Returns
    /// `None` when the window of `to` is missed, the capacity is exceeded or
    /// the set rule forbids the visit. The depot carries no demand.
    pub fn extend(
        &self,
        id: LabelId,
        to: usize,
        instance: &Instance,
        duals: &Duals,
        rule: SetRule,
    ) -> Option<Label> {
        let from = self.node as usize;
        if to == from {
            return None;
        }

        let tracked = to != 0
            && match rule {
                SetRule::Elementary(_) => true,
                SetRule::Critical(critical) => critical.contains(to),
                SetRule::Relaxed => false,
            };
        if tracked && self.visited.contains(to) {
            return None;
        }

        let load = if to == 0 {
            self.load
        } else {
            self.load + instance.nodes[to].demand
        };
        if load > instance.capacity + FEAS_TOL {
            return None;
        }
        let visits = match rule {
            SetRule::Critical(_) if to != 0 => self.visits + 1,
            _ => self.visits,
        };
        if visits as usize > instance.num_customers() {
            return None;
        }
        let time = instance.arrival(from, self.time, to)?;

        let mut visited = self.visited.clone();
        if tracked {
            visited.insert(to);
        }
        let mut label = Label {
            node: to as u32,
            cost: self.cost + instance.cost[from][to] - duals.customer[to],
            time,
            load,
            visits,
            visited,
            parent: id,
        };
        if let SetRule::Elementary(strengthen) = rule {
            if to != 0 {
                label.mark_unreachable(instance, strengthen);
            }
        }
        Some(label)
    }

    fn mark_unreachable(&mut self, instance: &Instance, strengthen: Strengthen) {
        if strengthen == Strengthen::Off {
            return;
        }
        let from = self.node as usize;
        for c in instance.customers() {
            if self.visited.contains(c) {
                continue;
            }
            let over_capacity = self.load + instance.nodes[c].demand > instance.capacity + FEAS_TOL;
            let too_late =
                strengthen == Strengthen::LoadAndTime && instance.arrival(from, self.time, c).is_none();
            if over_capacity || too_late {
                self.visited.insert(c);
            }
        }
    }

    /// Non-strict dominance over cost, time, load and visit count, with set
    /// inclusion on the tracked customers. Both labels must rest at the same
    /// node.
    pub fn dominates(&self, other: &Label) -> bool {
        debug_assert_eq!(self.node, other.node);
        self.cost <= other.cost
            && self.time <= other.time
            && self.load <= other.load
            && self.visits <= other.visits
            && self.visited.is_subset(&other.visited)
    }
}

/// Owns every label created during one labeling run. Parents are referenced
/// by index; labels removed from a frontier stay here so paths can still be
/// rebuilt through them, and are flagged so queued copies are skipped.
#[derive(Debug, Default)]
pub struct LabelArena {
    labels: Vec<Label>,
    dominated: FixedBitSet,
}

impl LabelArena {
    pub fn push(&mut self, label: Label) -> LabelId {
        let id = self.labels.len() as LabelId;
        self.labels.push(label);
        self.dominated.grow(self.labels.len());
        id
    }

    pub fn get(&self, id: LabelId) -> &Label {
        &self.labels[id as usize]
    }

    pub fn mark_dominated(&mut self, id: LabelId) {
        self.dominated.insert(id as usize);
    }

    pub fn is_dominated(&self, id: LabelId) -> bool {
        self.dominated.contains(id as usize)
    }

    /// Customers visited by the partial path ending in `id`, depot excluded.
    pub fn path(&self, id: LabelId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while current != NO_PARENT {
            let label = self.get(current);
            if label.node != 0 {
                path.push(label.node as usize);
            }
            current = label.parent;
        }
        path.reverse();
        path
    }
}

/// Adds `new_label` to the frontier unless a resident label dominates it
/// (ties keep the resident). Residents dominated by the new label are
/// removed and flagged in the arena. Returns the id of the inserted label.
pub fn insert_nondominated(front: &mut Frontier, arena: &mut LabelArena, new_label: Label) -> Option<LabelId> {
    if let Some(index) = front.iter().position(|id| arena.get(*id).dominates(&new_label)) {
        // Dominating labels tend to dominate again; move them towards the front.
        if index > 0 {
            front.swap(index, index - 1);
        }
        return None;
    }

    let mut index = 0;
    while index < front.len() {
        let resident = front[index];
        if new_label.dominates(arena.get(resident)) {
            arena.mark_dominated(resident);
            front.swap_remove(index);
        } else {
            index += 1;
        }
    }

    let id = arena.push(new_label);
    front.push(id);
    Some(id)
}
