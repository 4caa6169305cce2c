use super::state::*;
use super::*;
use crate::config::UctConfig;
use log::*;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Upper bound on plies simulated by a single playout.
pub const MAX_PLAYOUT_STEPS: u32 = 256;

/// Tree node stored in a flat arena; links are indices into it.
struct UctNode {
    parent: Option<usize>,
    /// Joint move leading into this node, made by `mover`. Empty for the root and for passes.
    joint: JointMove,
    mover: Option<Side>,
    /// Side to move in this node's state.
    to_move: Option<Side>,
    children: Vec<usize>,
    /// Joint moves not expanded yet. `None` until the node is first expanded.
    untried: Option<Vec<JointMove>>,
    visits: u32,
    /// Sum of playout values from the friendly side's point of view.
    total_value: f64,
}

impl UctNode {
    fn new(parent: Option<usize>, joint: JointMove, mover: Option<Side>, to_move: Option<Side>) -> UctNode {
        UctNode {
            parent,
            joint,
            mover,
            to_move,
            children: Vec::new(),
            untried: None,
            visits: 0,
            total_value: 0.0,
        }
    }

    fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_value / self.visits as f64
        }
    }
}

/// Duration-aware Monte-Carlo tree search with UCB1 selection and scripted playouts.
pub struct UctSearch {
    budget: Duration,
    max_traversals: u32,
    exploration: f64,
    playout_horizon: f32,
    rules: SearchRules,
    rng: ChaCha8Rng,
}

impl UctSearch {
    pub fn new(config: &UctConfig) -> UctSearch {
        UctSearch {
            budget: Duration::from_millis(config.time_budget_ms),
            max_traversals: config.max_traversals.max(1),
            exploration: config.exploration as f64,
            playout_horizon: config.playout_horizon,
            rules: SearchRules::from_uct(config),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        }
    }

    fn untried_moves(&self, state: &CombatState, side: Side) -> Vec<JointMove> {
        let moves = state.joint_moves(side, &self.rules);

        if moves.is_empty() {
            vec![Vec::new()]
        } else {
            moves
        }
    }

    fn select_child(&self, nodes: &[UctNode], parent: usize) -> Option<usize> {
        let node = &nodes[parent];
        let log_visits = (node.visits.max(1) as f64).ln();
        let hostile = node.to_move == Some(Side::Hostile);

        node.children
            .iter()
            .copied()
            .map(|child| {
                let child_node = &nodes[child];
                let mean = if hostile { 1.0 - child_node.mean() } else { child_node.mean() };
                let visits = child_node.visits.max(1) as f64;

                (child, mean + self.exploration * (log_visits / visits).sqrt())
            })
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(child, _)| child)
    }

    fn playout(&self, state: &mut CombatState, deadline: Instant) -> f32 {
        let horizon = state.time() + self.playout_horizon;
        let mut steps = 0;

        while !state.is_terminal() && state.time() < horizon && steps < MAX_PLAYOUT_STEPS {
            if steps % 16 == 0 && Instant::now() >= deadline {
                break;
            }

            let Some(side) = state.side_to_move() else {
                break;
            };

            let joint = state.scripted_move(side, &self.rules);
            state.apply(side, &joint, &self.rules);

            steps += 1;
        }

        state.win_value()
    }
}

impl SearchStrategy for UctSearch {
    fn name(&self) -> &'static str {
        "uct"
    }

    fn rules(&self) -> &SearchRules {
        &self.rules
    }

    fn search(&mut self, root: &CombatState) -> SearchOutcome {
        let start = Instant::now();
        let deadline = start + self.budget;

        if root.side_to_move() != Some(Side::Friendly) || root.joint_moves(Side::Friendly, &self.rules).is_empty() {
            return SearchOutcome::default();
        }

        let mut nodes = vec![UctNode::new(None, Vec::new(), None, Some(Side::Friendly))];
        let mut traversals: u64 = 0;
        let mut timed_out = false;

        while traversals < self.max_traversals as u64 {
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }

            let mut state = root.clone();
            let mut current = 0;

            // Selection and expansion.
            loop {
                if state.is_terminal() {
                    break;
                }

                let Some(side) = nodes[current].to_move else {
                    break;
                };

                if nodes[current].untried.is_none() {
                    let moves = self.untried_moves(&state, side);
                    nodes[current].untried = Some(moves);
                }

                let untried_count = nodes[current].untried.as_ref().map_or(0, |moves| moves.len());

                if untried_count > 0 {
                    let pick = self.rng.gen_range(0..untried_count);
                    let joint = match nodes[current].untried.as_mut() {
                        Some(moves) => moves.swap_remove(pick),
                        None => break,
                    };

                    state.apply(side, &joint, &self.rules);

                    let child = nodes.len();
                    nodes.push(UctNode::new(Some(current), joint, Some(side), state.side_to_move()));
                    nodes[current].children.push(child);
                    current = child;

                    break;
                }

                let Some(child) = self.select_child(&nodes, current) else {
                    break;
                };

                if let Some(mover) = nodes[child].mover {
                    state.apply(mover, &nodes[child].joint, &self.rules);
                }

                current = child;
            }

            let value = self.playout(&mut state, deadline) as f64;

            let mut walk = Some(current);
            while let Some(index) = walk {
                nodes[index].visits += 1;
                nodes[index].total_value += value;
                walk = nodes[index].parent;
            }

            traversals += 1;
        }

        // Most promising root child; visit count breaks ties.
        let best = nodes[0]
            .children
            .iter()
            .copied()
            .max_by(|a, b| {
                let (a, b) = (&nodes[*a], &nodes[*b]);
                a.mean().total_cmp(&b.mean()).then(a.visits.cmp(&b.visits))
            });

        let (best_move, score) = match best {
            Some(child) => (root.to_move(&nodes[child].joint), nodes[child].mean() as f32),
            None => {
                // Not even one traversal fit in the budget.
                let fallback = root.joint_moves(Side::Friendly, &self.rules).into_iter().next().unwrap_or_default();
                (root.to_move(&fallback), root.win_value())
            }
        };

        let stats = SearchStats {
            nodes: nodes.len() as u64,
            depth: 0,
            traversals,
            elapsed: start.elapsed(),
            score,
            timed_out,
        };

        debug!(
            "UCT ran {} traversals over {} nodes in {:?}, win value {:.3}",
            stats.traversals, stats.nodes, stats.elapsed, stats.score
        );

        SearchOutcome { best_move, stats }
    }
}
