//! The per-product traversal of required processes (spec §3, §4.6):
//! either a linear list or a Petri net. `next_possible_processes()` is
//! empty iff the product is complete.

use crate::ids::ProcessId;

#[derive(Debug, Clone)]
pub struct Transition {
    pub name: String,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    /// `None` is the sentinel "skip" transition: it must fire transparently
    /// without ever being offered to a product as a process choice.
    pub label: Option<ProcessId>,
}

#[derive(Debug, Clone)]
pub struct PetriNet {
    pub place_count: usize,
    pub transitions: Vec<Transition>,
    pub marking: Vec<u32>,
}

impl PetriNet {
    pub fn new(place_count: usize, initial_marking: Vec<u32>, transitions: Vec<Transition>) -> Self {
        assert_eq!(initial_marking.len(), place_count);
        PetriNet { place_count, transitions, marking: initial_marking }
    }

    /// Transitions whose every input place holds a token, ordered
    /// deterministically by name (spec §4.6: required for seed-determinism
    /// before any random sampling over them).
    fn enabled(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = self
            .transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.inputs.iter().all(|&p| self.marking[p] > 0))
            .map(|(i, _)| i)
            .collect();
        idx.sort_by(|&a, &b| self.transitions[a].name.cmp(&self.transitions[b].name));
        idx
    }

    fn fire(&mut self, idx: usize) {
        let (inputs, outputs) = (self.transitions[idx].inputs.clone(), self.transitions[idx].outputs.clone());
        for p in inputs {
            self.marking[p] -= 1;
        }
        for p in outputs {
            self.marking[p] += 1;
        }
    }

    /// Fire every enabled unlabeled ("skip") transition, in deterministic
    /// order, until none remain enabled; return the (possibly empty) set
    /// of labeled transitions left enabled.
    fn settle(&mut self) -> Vec<usize> {
        loop {
            let enabled = self.enabled();
            match enabled.iter().find(|&&i| self.transitions[i].label.is_none()) {
                Some(&i) => self.fire(i),
                None => return enabled,
            }
        }
    }
}

/// A tagged variant over the two ways a product's required work can be
/// described (spec §3, §4.6).
#[derive(Debug, Clone)]
pub enum ProcessModel {
    List { processes: Vec<ProcessId>, cursor: usize },
    PetriNet(PetriNet),
}

impl ProcessModel {
    pub fn list(processes: Vec<ProcessId>) -> Self {
        ProcessModel::List { processes, cursor: 0 }
    }

    pub fn petri_net(net: PetriNet) -> Self {
        ProcessModel::PetriNet(net)
    }

    /// Processes reachable in one step from the current position,
    /// deterministically ordered. Empty iff the product is complete (or,
    /// for a Petri net, deadlocked at an unreachable final marking).
    pub fn next_possible_processes(&mut self) -> Vec<ProcessId> {
        match self {
            ProcessModel::List { processes, cursor } => {
                if *cursor < processes.len() {
                    vec![processes[*cursor]]
                } else {
                    Vec::new()
                }
            }
            ProcessModel::PetriNet(net) => {
                net.settle().into_iter().filter_map(|i| net.transitions[i].label).collect()
            }
        }
    }

    /// Record that `chosen` was the process the product will perform next:
    /// advance the list cursor, or fire the matching enabled transition.
    pub fn update_marking(&mut self, chosen: ProcessId) {
        match self {
            ProcessModel::List { cursor, .. } => *cursor += 1,
            ProcessModel::PetriNet(net) => {
                let enabled = net.enabled();
                if let Some(&idx) = enabled.iter().find(|&&i| net.transitions[i].label == Some(chosen)) {
                    net.fire(idx);
                }
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_model_walks_to_completion() {
        let mut model = ProcessModel::list(vec![ProcessId(0), ProcessId(1)]);
        assert_eq!(model.next_possible_processes(), vec![ProcessId(0)]);
        model.update_marking(ProcessId(0));
        assert_eq!(model.next_possible_processes(), vec![ProcessId(1)]);
        model.update_marking(ProcessId(1));
        assert!(model.next_possible_processes().is_empty());
    }

    #[test]
    fn petri_net_fires_skip_transitions_transparently() {
        // p0 --(skip)--> p1 --(A)--> p2
        let net = PetriNet::new(
            3,
            vec![1, 0, 0],
            vec![
                Transition { name: "skip".into(), inputs: vec![0], outputs: vec![1], label: None },
                Transition { name: "a".into(), inputs: vec![1], outputs: vec![2], label: Some(ProcessId(0)) },
            ],
        );
        let mut model = ProcessModel::petri_net(net);
        assert_eq!(model.next_possible_processes(), vec![ProcessId(0)]);
    }

    #[test]
    fn petri_net_deadlock_is_empty_not_an_error() {
        let net = PetriNet::new(2, vec![0, 0], vec![]);
        let mut model = ProcessModel::petri_net(net);
        assert!(model.next_possible_processes().is_empty());
    }
}
