//! Council member trait and roster types
//!
//! Every specialist implements `CouncilMember`. A sport council seats exactly one
//! member per `MemberRole`, held in roster order so that member `i` lines up with
//! weight `i` of the sport's ensemble vector.

use anyhow::{bail, Result};
use async_trait::async_trait;
use common::{CouncilMemberOpinion, MemberRole, Sport, UserQuery, COUNCIL_SIZE};
use std::sync::Arc;

/// Base trait that all council specialists must implement
///
/// Members are pure with respect to each other: an opinion depends only on the
/// query and the sport, never on another member's output.
#[async_trait]
pub trait CouncilMember: Send + Sync {
    /// The seat this member occupies
    fn role(&self) -> MemberRole;

    /// Produce an opinion for one query.
    ///
    /// An error excludes this member from the current aggregation only.
    async fn opine(&self, sport: Sport, query: &UserQuery) -> Result<CouncilMemberOpinion>;
}

/// A full council, one member per role in `MemberRole::ALL` order
pub type Roster = [Arc<dyn CouncilMember>; COUNCIL_SIZE];

/// Check that each seat is held by the member for that role
pub fn validate_roster(roster: &Roster) -> Result<()> {
    for (seat, member) in MemberRole::ALL.iter().zip(roster.iter()) {
        if member.role() != *seat {
            bail!(
                "Roster seat {} is held by a {} member",
                seat,
                member.role()
            );
        }
    }
    Ok(())
}
