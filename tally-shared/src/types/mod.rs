mod ids;
mod member_count_key;
mod membership;
mod poll;
mod poll_state;
mod target;
mod vote;

pub use ids::{CommunityId, MembershipId, OptionId, PollVoteId, PostId, TargetId, UserId, VoteId};
pub use member_count_key::{MEMBER_COUNT_KEY_PATTERN, MEMBER_COUNT_KEY_PREFIX, member_count_key, parse_member_count_key};
pub use membership::{Community, Membership};
pub use poll::{Poll, PollMetaUpdate, PollOption, PollVote};
pub use poll_state::{PollOptionState, PollState};
pub use target::{AggregateScore, ScoreDelta, Target, TargetType};
pub use vote::Vote;
