use uuid::Uuid;

pub type UserId = Uuid;
pub type TargetId = Uuid;
/// Posts are the only targets that may carry a poll.
pub type PostId = Uuid;
pub type VoteId = Uuid;
pub type OptionId = Uuid;
pub type PollVoteId = Uuid;
pub type CommunityId = Uuid;
pub type MembershipId = Uuid;
