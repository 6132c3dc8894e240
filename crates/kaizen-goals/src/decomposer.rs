//! Goal decomposer: turns a `Goal` into a concrete `Decomposition` (C6).

use crate::templates::templates_for;
use crate::types::{Decomposition, Goal, SubGoal};
use kaizen_common::{Error, Result};
use std::collections::{HashMap, HashSet};

const COMPLEXITY_REDUCERS: &[&str] = &["fix", "update", "small", "simple", "quick"];
const COMPLEXITY_RAISERS: &[&str] = &[
    "system",
    "architecture",
    "complete",
    "comprehensive",
    "multiple",
    "oauth",
    "2fa",
    "session",
];

/// Turns goals into ordered, dependency-wired subgoal plans.
#[derive(Debug, Default)]
pub struct Decomposer;

impl Decomposer {
    pub fn new() -> Self {
        Self
    }

    pub fn decompose(&self, goal: &Goal) -> Result<Decomposition> {
        if goal.id.trim().is_empty() || goal.description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "InvalidGoal: goal id and description must be non-empty".to_string(),
            ));
        }

        let complexity = complexity_score(&goal.description);
        let templates = templates_for(goal.goal_type);
        let scale = complexity as f64 / 5.0;

        let n = templates.len();
        let boundary1 = (n as f64 * 0.3).round() as usize;
        let boundary2 = (n as f64 * 0.7).round() as usize;

        let mut subgoals = Vec::with_capacity(n);
        for (i, template) in templates.iter().enumerate() {
            let priority = if i < boundary1 {
                goal.priority
            } else if i < boundary2 {
                goal.priority.saturating_add(1).min(3)
            } else {
                3
            };
            let hours = (template.hours * scale).max(0.5);
            subgoals.push(SubGoal {
                id: format!("{}-sub-{}", goal.id, i + 1),
                description: template.description.to_string(),
                priority,
                estimated_hours: hours,
                success_criteria: template.success_criteria.iter().map(|s| s.to_string()).collect(),
                dependencies: Vec::new(),
            });
        }

        wire_dependencies(goal, &mut subgoals);

        let mut total: f64 = subgoals.iter().map(|s| s.estimated_hours).sum();
        if let Some(constraints) = &goal.constraints {
            if let Some(max_hours) = constraints.max_hours {
                if total > max_hours && total > 0.0 {
                    let factor = max_hours / total;
                    for subgoal in &mut subgoals {
                        subgoal.estimated_hours = (subgoal.estimated_hours * factor).max(0.5);
                    }
                    total = subgoals.iter().map(|s| s.estimated_hours).sum();
                }
            }
        }

        let dependencies: HashMap<String, Vec<String>> = subgoals
            .iter()
            .map(|s| (s.id.clone(), s.dependencies.clone()))
            .collect();

        Ok(Decomposition {
            goal_id: goal.id.clone(),
            subgoals,
            dependencies,
            total_estimated_hours: total,
        })
    }
}

fn wire_dependencies(goal: &Goal, subgoals: &mut [SubGoal]) {
    use crate::types::GoalType::*;
    match goal.goal_type {
        Development | Deployment | Workflow | Process => {
            for i in 1..subgoals.len() {
                let prev_id = subgoals[i - 1].id.clone();
                subgoals[i].dependencies.push(prev_id);
            }
        }
        Quality | Optimization => {
            if let Some((last, earlier)) = subgoals.split_last_mut() {
                last.dependencies = earlier.iter().map(|s| s.id.clone()).collect();
            }
        }
        Testing | Documentation => {}
    }
}

/// Complexity score starting at 3, adjusted by keyword and length/word
/// count heuristics, clamped to `[1, 10]`.
fn complexity_score(description: &str) -> u32 {
    let lower = description.to_lowercase();
    let mut score: i32 = 3;

    if COMPLEXITY_REDUCERS.iter().any(|k| lower.contains(k)) {
        score -= 1;
    }
    if COMPLEXITY_RAISERS.iter().any(|k| lower.contains(k)) {
        score += 4;
    }

    let len = description.chars().count();
    if len > 100 {
        score += 2;
    } else if len < 30 {
        score -= 1;
    }

    let word_count = description.split_whitespace().count();
    if word_count > 15 {
        score += 2;
    } else if word_count < 5 {
        score -= 1;
    }

    score.clamp(1, 10) as u32
}

/// Iterative DFS cycle detection over the dependency adjacency map.
pub fn has_circular_dependencies(decomposition: &Decomposition) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut colors: HashMap<&str, Color> = decomposition
        .subgoals
        .iter()
        .map(|s| (s.id.as_str(), Color::White))
        .collect();

    for start in &decomposition.subgoals {
        if colors[start.id.as_str()] != Color::White {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(start.id.as_str(), 0)];
        colors.insert(start.id.as_str(), Color::Gray);

        while let Some((node, child_idx)) = stack.pop() {
            let deps = decomposition.dependencies.get(node).map(|v| v.as_slice()).unwrap_or(&[]);
            if child_idx < deps.len() {
                let next = deps[child_idx].as_str();
                stack.push((node, child_idx + 1));
                match colors.get(next).copied() {
                    Some(Color::Gray) => return true,
                    Some(Color::White) => {
                        colors.insert(next, Color::Gray);
                        stack.push((next, 0));
                    }
                    _ => {}
                }
            } else {
                colors.insert(node, Color::Black);
            }
        }
    }
    false
}

/// Post-order DFS topological sort, stable across duplicate references
/// to the same node (each node appears exactly once, at the position of
/// its first full visit).
pub fn topological_sort(decomposition: &Decomposition) -> Vec<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();

    fn visit(
        node: &str,
        decomposition: &Decomposition,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) {
        if visited.contains(node) {
            return;
        }
        visited.insert(node.to_string());
        if let Some(deps) = decomposition.dependencies.get(node) {
            for dep in deps {
                visit(dep, decomposition, visited, order);
            }
        }
        order.push(node.to_string());
    }

    for subgoal in &decomposition.subgoals {
        visit(&subgoal.id, decomposition, &mut visited, &mut order);
    }
    order
}
