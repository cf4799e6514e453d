use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// Result of ordering `(id, parent)` links so parents precede children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentFirstOrder {
    /// Input indexes in emission order.
    pub ordered: Vec<usize>,
    /// Input indexes that sit on (or below) a parent cycle and were never emitted.
    pub cyclic: Vec<usize>,
}

/// Orders links so every entry whose parent is also present comes after that parent.
///
/// Among entries that are ready at the same time the lower input index wins, so
/// input order survives wherever the parent relation allows it. Parents that are
/// not present in `links` do not constrain ordering. Ids are expected to be unique.
pub fn parent_first_order<K>(links: &[(K, Option<K>)]) -> ParentFirstOrder
where
    K: Eq + Hash + Copy,
{
    let index_of: HashMap<K, usize> = links
        .iter()
        .enumerate()
        .map(|(idx, (id, _))| (*id, idx))
        .collect();

    let mut waiting = vec![false; links.len()];
    let mut children: HashMap<usize, Vec<usize>> = HashMap::with_capacity(links.len());
    for (idx, (_, parent)) in links.iter().enumerate() {
        // Best-effort behavior: a parent outside the input does not hold the child back.
        let Some(parent_idx) = parent.and_then(|parent| index_of.get(&parent).copied()) else {
            continue;
        };
        waiting[idx] = true;
        children.entry(parent_idx).or_default().push(idx);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = waiting
        .iter()
        .enumerate()
        .filter_map(|(idx, waits)| (!waits).then_some(Reverse(idx)))
        .collect();

    let mut emitted = vec![false; links.len()];
    let mut ordered = Vec::with_capacity(links.len());
    while let Some(Reverse(idx)) = ready.pop() {
        emitted[idx] = true;
        ordered.push(idx);
        if let Some(kids) = children.get(&idx) {
            for kid in kids {
                ready.push(Reverse(*kid));
            }
        }
    }

    let cyclic = emitted
        .iter()
        .enumerate()
        .filter_map(|(idx, done)| (!done).then_some(idx))
        .collect();

    ParentFirstOrder { ordered, cyclic }
}

pub fn has_cycle<K>(links: &[(K, Option<K>)]) -> bool
where
    K: Eq + Hash + Copy,
{
    !parent_first_order(links).cyclic.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_move_ahead_of_children() {
        let links = [(3, Some(1)), (1, None), (2, Some(1)), (4, Some(3))];
        let order = parent_first_order(&links);
        assert_eq!(order.ordered, vec![1, 0, 2, 3]);
        assert!(order.cyclic.is_empty());
    }

    #[test]
    fn input_order_is_kept_when_unconstrained() {
        let links = [(5, None), (9, Some(100)), (7, None)];
        let order = parent_first_order(&links);
        assert_eq!(order.ordered, vec![0, 1, 2]);
    }

    #[test]
    fn cycle_members_and_descendants_are_reported() {
        let links = [(1, None), (2, Some(3)), (3, Some(2)), (4, Some(2))];
        let order = parent_first_order(&links);
        assert_eq!(order.ordered, vec![0]);
        assert_eq!(order.cyclic, vec![1, 2, 3]);
        assert!(has_cycle(&links));
    }

    #[test]
    fn self_parent_counts_as_cycle() {
        let links = [(1, Some(1))];
        assert!(has_cycle(&links));
    }
}
