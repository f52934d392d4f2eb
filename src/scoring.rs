//! Score aggregation and standings
//!
//! The response log is the source of truth for scores. [`recalculate`]
//! rebuilds every participant's cached totals from a full scan of the log,
//! so a missed or double-applied incremental update can always be repaired
//! after the fact. Standings use competition ranking: participants with an
//! identical (score, correct-count) pair share a rank, and the next
//! distinct pair resumes at its positional index.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    Error,
    model::{Id, Participant},
    store::StateStore,
};

/// One ranked row of the leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    /// 1-based competition rank; tied participants share it
    pub rank: usize,
    /// The ranked participant, with up-to-date totals
    pub participant: Participant,
}

/// Rebuilds all cached participant totals of a quiz from the response log
///
/// Participants without any response are reset to zero, so the rebuild also
/// repairs totals that were corrupted upward. Returns the participants with
/// their fresh totals.
///
/// # Errors
///
/// Propagates store failures; partial progress may have been written, in
/// which case re-running completes the repair.
pub fn recalculate<S: StateStore>(store: &S, quiz_id: Id) -> Result<Vec<Participant>, Error> {
    let mut totals: HashMap<Id, (u64, u64)> = HashMap::new();
    for response in store.responses(quiz_id)? {
        let entry = totals.entry(response.participant_id).or_default();
        entry.0 += response.points_earned;
        entry.1 += u64::from(response.is_correct);
    }

    let mut participants = store.participants(quiz_id)?;
    for participant in &mut participants {
        let (total_score, total_correct) =
            totals.get(&participant.id).copied().unwrap_or_default();
        if participant.total_score != total_score || participant.total_correct != total_correct {
            store.set_participant_totals(participant.id, total_score, total_correct)?;
        }
        participant.total_score = total_score;
        participant.total_correct = total_correct;
    }

    debug!(
        "quiz {quiz_id}: recalculated totals for {} participants",
        participants.len()
    );
    Ok(participants)
}

/// Ranks participants by score, breaking ties by correct-answer count
///
/// Fully tied participants share a rank and the next distinct pair gets its
/// positional index, so two leaders on 10 points are both rank 1 and the
/// runner-up is rank 3.
pub fn standings(participants: Vec<Participant>) -> Vec<Standing> {
    let mut previous: Option<(u64, u64)> = None;
    let mut rank = 0;
    participants
        .into_iter()
        .sorted_by_key(|p| (std::cmp::Reverse(p.total_score), std::cmp::Reverse(p.total_correct)))
        .enumerate()
        .map(|(index, participant)| {
            let key = (participant.total_score, participant.total_correct);
            if previous != Some(key) {
                rank = index + 1;
                previous = Some(key);
            }
            Standing { rank, participant }
        })
        .collect_vec()
}
