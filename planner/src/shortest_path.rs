use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::{debug, trace};
use ordered_float::OrderedFloat;
use vrptw_structs::Instance;

use crate::{
    error::PlannerError,
    label::{insert_nondominated, Frontier, Label, LabelArena, LabelId, SetRule},
    pricing::Duals,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct LabelStats {
    pub created: usize,
    pub dominated: usize,
    pub extended: usize,
}

pub struct LabelingResult {
    pub arena: LabelArena,
    pub depot_labels: Frontier,
    pub stats: LabelStats,
}

impl LabelingResult {
    /// Non-dominated depot labels as `(reduced cost, customers)`, cheapest
    /// first. Equal costs are ordered by path so repeated runs agree.
    pub fn sorted_routes(&self) -> Vec<(f64, Vec<usize>)> {
        let mut routes = self
            .depot_labels
            .iter()
            .map(|id| (self.arena.get(*id).cost, self.arena.path(*id)))
            .collect::<Vec<_>>();
        routes.sort_by(|a, b| OrderedFloat(a.0).cmp(&OrderedFloat(b.0)).then_with(|| a.1.cmp(&b.1)));
        routes
    }
}

/// Label-setting search for negative reduced-cost routes from the depot
/// back to the depot. Labels are processed in order of service start time.
///
/// With `max_labels`, creating more labels than the bound fails with
/// [`PlannerError::PricingNonTermination`].
pub fn label_setting(
    instance: &Instance,
    duals: &Duals,
    rule: SetRule,
    max_labels: Option<usize>,
) -> Result<LabelingResult, PlannerError> {
    #[cfg(feature = "prof")]
    let _p = hprof::enter("label setting");

    let n = instance.num_nodes();
    let mut arena = LabelArena::default();
    let mut frontiers: Vec<Frontier> = vec![Frontier::default(); n];
    let mut queue: BinaryHeap<Reverse<(OrderedFloat<f64>, LabelId)>> = BinaryHeap::new();
    let mut stats = LabelStats::default();
    let mut extensions: Vec<Label> = Vec::new();

    let start = arena.push(Label::start(instance, duals));
    queue.push(Reverse((OrderedFloat(arena.get(start).time), start)));

    while let Some(Reverse((_, id))) = queue.pop() {
        if arena.is_dominated(id) {
            continue;
        }

        let label = arena.get(id);
        trace!(
            "Extending label {} at node {} cost={:.3} time={:.2} load={}",
            id,
            label.node,
            label.cost,
            label.time,
            label.load
        );
        stats.extended += 1;

        extensions.clear();
        for to in 0..n {
            if let Some(new_label) = label.extend(id, to, instance, duals, rule) {
                extensions.push(new_label);
            }
        }

        for new_label in extensions.drain(..) {
            stats.created += 1;
            if let Some(bound) = max_labels {
                if stats.created > bound {
                    debug!("Label bound {} exceeded after {} extensions", bound, stats.extended);
                    return Err(PlannerError::PricingNonTermination {
                        created: stats.created,
                        bound,
                    });
                }
            }

            let node = new_label.node as usize;
            let time = new_label.time;
            match insert_nondominated(&mut frontiers[node], &mut arena, new_label) {
                Some(new_id) if node != 0 => queue.push(Reverse((OrderedFloat(time), new_id))),
                Some(_) => {}
                None => stats.dominated += 1,
            }
        }
    }

    let depot_labels = std::mem::take(&mut frontiers[0]);
    debug!(
        "Labeling done: {} labels created, {} dominated on arrival, {} extended, {} at depot",
        stats.created,
        stats.dominated,
        stats.extended,
        depot_labels.len()
    );

    Ok(LabelingResult {
        arena,
        depot_labels,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Strengthen;
    use vrptw_structs::{Node, Point};

    fn node(id: usize, x: f64, y: f64) -> Node {
        Node {
            id,
            pos: Point::new(x, y),
            demand: 1.0,
            ready: 0.0,
            due: 100.0,
            service: 0.0,
        }
    }

    #[test]
    fn test_line_routes() {
        let inst = Instance::euclidean(
            "line",
            10.0,
            2,
            vec![node(0, 0.0, 0.0), node(1, 1.0, 0.0), node(2, 2.0, 0.0)],
        );
        let duals = Duals {
            customer: vec![0.0, 3.0, 3.0],
            vehicle: 0.0,
        };
        let result = label_setting(&inst, &duals, SetRule::Elementary(Strengthen::Off), None).unwrap();
        let routes = result.sorted_routes();
        // 0-1-2-0 costs 4 and collects 6.
        assert_eq!(routes[0], (-2.0, vec![1, 2]));
        assert!(routes.iter().all(|(_, p)| !p.is_empty()));
        assert!(result.stats.created >= result.depot_labels.len());
    }

    #[test]
    fn test_label_bound() {
        let inst = Instance::euclidean(
            "line",
            10.0,
            2,
            vec![node(0, 0.0, 0.0), node(1, 1.0, 0.0), node(2, 2.0, 0.0)],
        );
        let duals = Duals::zero(inst.num_nodes());
        match label_setting(&inst, &duals, SetRule::Relaxed, Some(1)) {
            Err(PlannerError::PricingNonTermination { created, bound }) => {
                assert_eq!(bound, 1);
                assert_eq!(created, 2);
            }
            other => panic!("unexpected {:?}", other.map(|r| r.stats)),
        }
    }
}
