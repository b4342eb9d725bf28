//! Instance selection.

use fleetscale_core::ActiveInstance;

/// Active instances with no running and no pending tasks, in snapshot order.
pub fn idle_instances(active: &[ActiveInstance]) -> impl Iterator<Item = &ActiveInstance> {
    active.iter().filter(|i| i.is_idle())
}

/// The instance with the most free memory; on an exact tie, the one with
/// fewer running tasks. Remaining ties keep the earliest candidate.
///
/// Single pass carrying the best candidate so the two criteria stay visible.
pub fn least_utilized<'a, I>(candidates: I) -> Option<&'a ActiveInstance>
where
    I: IntoIterator<Item = &'a ActiveInstance>,
{
    let mut best: Option<&ActiveInstance> = None;

    for inst in candidates {
        let replace = match best {
            None => true,
            Some(cur) if inst.free_memory > cur.free_memory => true,
            Some(cur) if inst.free_memory == cur.free_memory => {
                inst.running_tasks < cur.running_tasks
            }
            Some(_) => false,
        };
        if replace {
            best = Some(inst);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(id: &str, free: i64, running: u32, pending: u32) -> ActiveInstance {
        ActiveInstance {
            id: id.to_string(),
            running_tasks: running,
            pending_tasks: pending,
            free_memory: free,
            handle: format!("ci/{id}"),
        }
    }

    #[test]
    fn tie_on_memory_prefers_fewer_running() {
        let all = [
            inst("A", 500, 3, 0),
            inst("B", 500, 1, 0),
            inst("C", 400, 0, 0),
        ];
        assert_eq!(least_utilized(&all).unwrap().id, "B");
    }

    #[test]
    fn more_free_memory_always_wins() {
        let all = [inst("C", 400, 0, 0), inst("A", 500, 9, 0)];
        assert_eq!(least_utilized(&all).unwrap().id, "A");
    }

    #[test]
    fn full_tie_keeps_first_seen() {
        let all = [inst("X", 300, 2, 0), inst("Y", 300, 2, 0)];
        assert_eq!(least_utilized(&all).unwrap().id, "X");
    }

    #[test]
    fn order_independent_for_distinct_candidates() {
        let all = [
            inst("C", 400, 0, 0),
            inst("B", 500, 1, 0),
            inst("A", 500, 3, 0),
        ];
        assert_eq!(least_utilized(&all).unwrap().id, "B");
    }

    #[test]
    fn empty_has_no_candidate() {
        let none: &[ActiveInstance] = &[];
        assert!(least_utilized(none).is_none());
    }

    #[test]
    fn idle_needs_zero_pending() {
        let all = [
            inst("idle", 100, 0, 0),
            inst("pending", 100, 0, 1),
            inst("busy", 100, 2, 0),
        ];
        let ids: Vec<_> = idle_instances(&all).map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["idle"]);
    }
}
