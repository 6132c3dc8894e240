//! Fixed per-goal-type subgoal templates used by the decomposer.

use crate::types::GoalType;

pub struct SubGoalTemplate {
    pub description: &'static str,
    pub hours: f64,
    pub success_criteria: &'static [&'static str],
}

const DEVELOPMENT: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Design the solution and confirm the approach",
        hours: 2.0,
        success_criteria: &["Design reviewed", "Approach confirmed"],
    },
    SubGoalTemplate {
        description: "Implement the core change",
        hours: 4.0,
        success_criteria: &["Code compiles", "Core logic implemented"],
    },
    SubGoalTemplate {
        description: "Write tests covering the change",
        hours: 2.0,
        success_criteria: &["Tests pass", "Edge cases covered"],
    },
    SubGoalTemplate {
        description: "Review and merge",
        hours: 1.0,
        success_criteria: &["Review approved", "Merged to main"],
    },
];

const TESTING: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Identify coverage gaps",
        hours: 1.0,
        success_criteria: &["Gaps documented"],
    },
    SubGoalTemplate {
        description: "Write missing unit tests",
        hours: 3.0,
        success_criteria: &["New tests added", "Tests pass"],
    },
    SubGoalTemplate {
        description: "Write integration tests",
        hours: 2.0,
        success_criteria: &["Integration tests pass"],
    },
];

const DOCUMENTATION: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Outline the documentation structure",
        hours: 1.0,
        success_criteria: &["Outline approved"],
    },
    SubGoalTemplate {
        description: "Write the documentation content",
        hours: 3.0,
        success_criteria: &["Content drafted"],
    },
    SubGoalTemplate {
        description: "Review and publish",
        hours: 1.0,
        success_criteria: &["Reviewed", "Published"],
    },
];

const DEPLOYMENT: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Prepare the release artifact",
        hours: 1.0,
        success_criteria: &["Artifact built"],
    },
    SubGoalTemplate {
        description: "Deploy to staging and verify",
        hours: 2.0,
        success_criteria: &["Staging verified"],
    },
    SubGoalTemplate {
        description: "Deploy to production",
        hours: 1.0,
        success_criteria: &["Production deployment confirmed"],
    },
    SubGoalTemplate {
        description: "Monitor post-deployment health",
        hours: 1.0,
        success_criteria: &["No new alerts within the monitoring window"],
    },
];

const OPTIMIZATION: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Profile current behavior",
        hours: 2.0,
        success_criteria: &["Baseline profile captured"],
    },
    SubGoalTemplate {
        description: "Implement the optimization",
        hours: 3.0,
        success_criteria: &["Optimization implemented"],
    },
    SubGoalTemplate {
        description: "Measure improvement against baseline",
        hours: 1.0,
        success_criteria: &["Improvement quantified"],
    },
];

const QUALITY: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Audit the current state against the quality bar",
        hours: 2.0,
        success_criteria: &["Audit complete"],
    },
    SubGoalTemplate {
        description: "Address identified quality issues",
        hours: 3.0,
        success_criteria: &["Issues resolved"],
    },
    SubGoalTemplate {
        description: "Verify the quality bar is met",
        hours: 1.0,
        success_criteria: &["Quality checks pass"],
    },
];

const WORKFLOW: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Map the current workflow",
        hours: 1.0,
        success_criteria: &["Workflow mapped"],
    },
    SubGoalTemplate {
        description: "Implement the workflow change",
        hours: 3.0,
        success_criteria: &["Change implemented"],
    },
    SubGoalTemplate {
        description: "Validate the new workflow end to end",
        hours: 1.0,
        success_criteria: &["End-to-end run succeeds"],
    },
];

const PROCESS: &[SubGoalTemplate] = &[
    SubGoalTemplate {
        description: "Document the current process",
        hours: 1.0,
        success_criteria: &["Process documented"],
    },
    SubGoalTemplate {
        description: "Implement the process change",
        hours: 2.0,
        success_criteria: &["Change implemented"],
    },
    SubGoalTemplate {
        description: "Roll out and confirm adoption",
        hours: 1.0,
        success_criteria: &["Rollout confirmed"],
    },
];

pub fn templates_for(goal_type: GoalType) -> &'static [SubGoalTemplate] {
    match goal_type {
        GoalType::Development => DEVELOPMENT,
        GoalType::Testing => TESTING,
        GoalType::Documentation => DOCUMENTATION,
        GoalType::Deployment => DEPLOYMENT,
        GoalType::Optimization => OPTIMIZATION,
        GoalType::Quality => QUALITY,
        GoalType::Workflow => WORKFLOW,
        GoalType::Process => PROCESS,
    }
}
