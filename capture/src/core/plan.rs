//! Plan validation and the last-resort single-step plan.

use crate::core::types::{Plan, PlanProvenance, Step};

/// Check that a summarizer returned a usable step sequence.
///
/// Steps are never reordered or deduplicated; a sequence that is empty, has a
/// blank instruction, or whose ordinals do not strictly increase is rejected.
pub fn validate_steps(steps: &[Step]) -> Result<(), String> {
    if steps.is_empty() {
        return Err("plan has no steps".to_string());
    }
    let mut prev: Option<u32> = None;
    for step in steps {
        if step.instruction.trim().is_empty() {
            return Err(format!("step {} has a blank instruction", step.ordinal));
        }
        if let Some(prev) = prev
            && step.ordinal <= prev
        {
            return Err(format!(
                "step ordinals must strictly increase (got {} after {prev})",
                step.ordinal
            ));
        }
        prev = Some(step.ordinal);
    }
    Ok(())
}

/// Build a plan after validating its steps.
pub fn plan_from_steps(steps: Vec<Step>, provenance: PlanProvenance) -> Result<Plan, String> {
    validate_steps(&steps)?;
    Ok(Plan { steps, provenance })
}

/// Hand the whole task to the agent as one step.
pub fn single_step_plan(task_text: &str) -> Plan {
    Plan {
        steps: vec![Step::new(1, task_text.trim())],
        provenance: PlanProvenance::OnDemandFallback,
    }
}
