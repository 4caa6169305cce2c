use super::state::*;
use super::*;
use crate::config::AlphaBetaConfig;
use log::*;
use std::time::{Duration, Instant};

/// Iterative-deepening alpha-beta over duration-aware joint moves.
///
/// Every ply is one side's joint move; the simulated clock then jumps to the
/// next completed action, so a ply can cover anything from a fraction of a
/// second to a full weapon period. The best move of the previous iteration is
/// searched first. Once the deadline passes, the result of the deepest fully
/// completed iteration is returned.
pub struct AlphaBetaSearch {
    budget: Duration,
    max_depth: u32,
    rules: SearchRules,
    nodes: u64,
    deadline: Instant,
    timed_out: bool,
}

impl AlphaBetaSearch {
    pub fn new(config: &AlphaBetaConfig) -> AlphaBetaSearch {
        AlphaBetaSearch {
            budget: Duration::from_millis(config.time_budget_ms),
            max_depth: config.max_depth.max(1),
            rules: SearchRules::from_alpha_beta(config),
            nodes: 0,
            deadline: Instant::now(),
            timed_out: false,
        }
    }

    fn out_of_time(&mut self) -> bool {
        if !self.timed_out && Instant::now() >= self.deadline {
            self.timed_out = true;
        }

        self.timed_out
    }

    fn search_root(&mut self, root: &CombatState, moves: &[JointMove], order: &[usize], depth: u32) -> Option<(usize, f32)> {
        let mut alpha = f32::NEG_INFINITY;
        let mut best: Option<(usize, f32)> = None;

        for &index in order {
            if self.out_of_time() {
                break;
            }

            let mut child = root.clone();
            child.apply(Side::Friendly, &moves[index], &self.rules);

            let value = self.alpha_beta(&child, depth - 1, alpha, f32::INFINITY);

            // A subtree cut short by the deadline is only trusted when nothing else is known.
            if self.timed_out && best.is_some() {
                break;
            }

            if best.map_or(true, |(_, best_value)| value > best_value) {
                best = Some((index, value));
            }

            alpha = alpha.max(value);
        }

        best
    }

    fn alpha_beta(&mut self, state: &CombatState, depth: u32, mut alpha: f32, mut beta: f32) -> f32 {
        self.nodes += 1;

        if depth == 0 || state.is_terminal() || self.out_of_time() {
            return state.evaluate();
        }

        let Some(side) = state.side_to_move() else {
            return state.evaluate();
        };

        let moves = state.joint_moves(side, &self.rules);

        if moves.is_empty() {
            let mut child = state.clone();
            child.pass(side, &self.rules);

            return self.alpha_beta(&child, depth - 1, alpha, beta);
        }

        match side {
            Side::Friendly => {
                let mut value = f32::NEG_INFINITY;

                for joint in &moves {
                    let mut child = state.clone();
                    child.apply(side, joint, &self.rules);

                    value = value.max(self.alpha_beta(&child, depth - 1, alpha, beta));
                    alpha = alpha.max(value);

                    if alpha >= beta {
                        break;
                    }
                }

                value
            }
            Side::Hostile => {
                let mut value = f32::INFINITY;

                for joint in &moves {
                    let mut child = state.clone();
                    child.apply(side, joint, &self.rules);

                    value = value.min(self.alpha_beta(&child, depth - 1, alpha, beta));
                    beta = beta.min(value);

                    if alpha >= beta {
                        break;
                    }
                }

                value
            }
        }
    }
}

impl SearchStrategy for AlphaBetaSearch {
    fn name(&self) -> &'static str {
        "alpha-beta"
    }

    fn rules(&self) -> &SearchRules {
        &self.rules
    }

    fn search(&mut self, root: &CombatState) -> SearchOutcome {
        let start = Instant::now();

        self.deadline = start + self.budget;
        self.nodes = 0;
        self.timed_out = false;

        if root.side_to_move() != Some(Side::Friendly) {
            return SearchOutcome::default();
        }

        let moves = root.joint_moves(Side::Friendly, &self.rules);

        if moves.is_empty() {
            return SearchOutcome::default();
        }

        let mut order: Vec<usize> = (0..moves.len()).collect();
        let mut best: Option<(usize, f32)> = None;
        let mut reached = 0;

        for depth in 1..=self.max_depth {
            let result = self.search_root(root, &moves, &order, depth);

            if let Some(result) = result {
                if !self.timed_out || best.is_none() {
                    best = Some(result);
                    reached = depth;
                }
            }

            if self.timed_out {
                break;
            }

            if let Some((index, _)) = best {
                order.retain(|candidate| *candidate != index);
                order.insert(0, index);
            }
        }

        let (index, score) = best.unwrap_or((0, root.evaluate()));

        let stats = SearchStats {
            nodes: self.nodes,
            depth: reached,
            traversals: 0,
            elapsed: start.elapsed(),
            score,
            timed_out: self.timed_out,
        };

        debug!(
            "Alpha-beta searched {} nodes to depth {} in {:?}, score {:.2}",
            stats.nodes, stats.depth, stats.elapsed, stats.score
        );

        SearchOutcome {
            best_move: root.to_move(&moves[index]),
            stats,
        }
    }
}
