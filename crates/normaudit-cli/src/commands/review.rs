//! Approve, reject and edit commands.

use super::resolve_fragment_id;
use crate::cli::{DecisionArgs, EditArgs};
use crate::error::{CliError, Result};
use crate::session::{Oracle, Session};
use normaudit_domain::{FragmentId, FragmentPatch, FragmentStatus};
use normaudit_gatekeeper::ReviewOutcome;

/// Execute the approve command.
pub fn execute_approve<L: Oracle>(args: DecisionArgs, session: &Session<L>) -> Result<()> {
    decide(args, session, FragmentStatus::Approved)
}

/// Execute the reject command.
pub fn execute_reject<L: Oracle>(args: DecisionArgs, session: &Session<L>) -> Result<()> {
    decide(args, session, FragmentStatus::Rejected)
}

fn decide<L: Oracle>(args: DecisionArgs, session: &Session<L>, decision: FragmentStatus) -> Result<()> {
    let outcomes = session.with_store(|store| {
        let ids = args
            .ids
            .iter()
            .map(|id| resolve_fragment_id(store, id))
            .collect::<Result<Vec<FragmentId>>>()?;
        let gate = session.gate();
        Ok(match decision {
            FragmentStatus::Rejected => gate.reject_many(store, &ids, session.reviewer()),
            _ => gate.approve_many(store, &ids, session.reviewer()),
        })
    })?;

    println!("{}", session.formatter().format_review_outcomes(&outcomes)?);
    check_outcomes(&outcomes)
}

/// Turn partial failure of a bulk decision into an error.
pub fn check_outcomes(outcomes: &[ReviewOutcome]) -> Result<()> {
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Partial {
            failed,
            total: outcomes.len(),
        })
    }
}

/// Execute the edit command.
pub fn execute_edit<L: Oracle>(args: EditArgs, session: &Session<L>) -> Result<()> {
    let patch = FragmentPatch {
        tags: if args.clear_tags {
            Some(Vec::new())
        } else if args.tags.is_empty() {
            None
        } else {
            Some(args.tags)
        },
        check_method: args.check_method.map(Into::into),
    };
    if patch.is_empty() {
        return Err(CliError::InvalidInput(
            "nothing to edit; pass --tag, --clear-tags or --check-method".to_string(),
        ));
    }

    let fragment = session.with_store(|store| {
        let id = resolve_fragment_id(store, &args.id)?;
        Ok(session.gate().edit_metadata(store, id, patch)?)
    })?;
    println!("{}", session.formatter().format_fragment_detail(&fragment));
    Ok(())
}
