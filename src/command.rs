//! Write commands applied by [`crate::db::Database::apply`] inside one transaction.
//!
//! Planning functions here are pure: they look at what the caller already read
//! from the store and decide which rows to insert and which counters to move.

use serde::Serialize;

use crate::hash::{CompoundHash, UrlHash};
use crate::id::{FeedId, UrlId, UserId, UserUrlId};
use crate::label::LabelRef;
use crate::model::Metadata;
use crate::reconcile::reconcile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Increment,
    Decrement,
}

impl Step {
    /// Applies the step to a stored counter, saturating at both ends.
    pub fn apply(self, value: u32) -> u32 {
        match self {
            Step::Increment => value.saturating_add(1),
            Step::Decrement => value.saturating_sub(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileCounter {
    Urls,
    /// Likes given by the user.
    Likes,
    /// Likes received on the user's URLs.
    Liked,
    Followers,
    Following,
}

impl ProfileCounter {
    pub fn column(&self) -> &'static str {
        match self {
            ProfileCounter::Urls => "urls_count",
            ProfileCounter::Likes => "likes_count",
            ProfileCounter::Liked => "liked_count",
            ProfileCounter::Followers => "followers_count",
            ProfileCounter::Following => "following_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    InsertUrl {
        id: UrlId,
        compound_hash: CompoundHash,
        metadata: Metadata,
    },
    BumpUrlHash {
        compound_hash: CompoundHash,
    },
    InsertUrlHash {
        compound_hash: CompoundHash,
        url_hash: UrlHash,
    },
    /// Inserts the variant row with 1 or increments the existing one.
    BumpUrlHashVariants {
        url_hash: UrlHash,
    },
    InsertUserUrl {
        id: UserUrlId,
        user_id: UserId,
        url_id: UrlId,
    },
    Attach {
        user_url_id: UserUrlId,
        label: LabelRef,
        order: u32,
    },
    Detach {
        user_url_id: UserUrlId,
        label: LabelRef,
    },
    AdjustUsage {
        label: LabelRef,
        step: Step,
    },
    AdjustProfile {
        user_id: UserId,
        counter: ProfileCounter,
        step: Step,
    },
    AdjustLikes {
        user_url_id: UserUrlId,
        step: Step,
    },
    InsertLike {
        user_url_id: UserUrlId,
        user_id: UserId,
    },
    DeleteLike {
        user_url_id: UserUrlId,
        user_id: UserId,
    },
    InsertFollow {
        follower_id: UserId,
        following_id: UserId,
    },
    DeleteFollow {
        follower_id: UserId,
        following_id: UserId,
    },
    InsertFeedEntry {
        id: FeedId,
        user_id: UserId,
        user_url_id: UserUrlId,
    },
}

/// How a submission relates to what is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// First time this compound hash is seen.
    Created,
    /// Same link saved before with different metadata.
    CreatedVariant,
    /// Identical snapshot already stored; the existing row is reused.
    Reused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub url_id: UrlId,
    pub outcome: SaveOutcome,
    pub commands: Vec<Command>,
}

/// Content-addressing policy for one submission.
///
/// `existing` is the row already holding this compound hash, if any;
/// `variants_known` tells whether the URL hash has been observed before.
pub fn plan_save(
    existing: Option<UrlId>,
    variants_known: bool,
    metadata: &Metadata,
    compound_hash: &CompoundHash,
    url_hash: &UrlHash,
) -> SavePlan {
    if let Some(url_id) = existing {
        return SavePlan {
            url_id,
            outcome: SaveOutcome::Reused,
            commands: vec![Command::BumpUrlHash {
                compound_hash: compound_hash.clone(),
            }],
        };
    }

    let url_id = UrlId::generate();
    SavePlan {
        url_id: url_id.clone(),
        outcome: if variants_known {
            SaveOutcome::CreatedVariant
        } else {
            SaveOutcome::Created
        },
        commands: vec![
            Command::InsertUrl {
                id: url_id,
                compound_hash: compound_hash.clone(),
                metadata: metadata.clone(),
            },
            Command::InsertUrlHash {
                compound_hash: compound_hash.clone(),
                url_hash: url_hash.clone(),
            },
            Command::BumpUrlHashVariants {
                url_hash: url_hash.clone(),
            },
        ],
    }
}

/// Commands creating a user's save of `url_id` with its initial labels and
/// fanning it out to the author's and followers' feeds.
pub fn plan_user_url<T, C>(
    user_url_id: &UserUrlId,
    user_id: &UserId,
    url_id: &UrlId,
    tag_ids: &[T],
    category_ids: &[C],
    followers: &[UserId],
) -> Vec<Command>
where
    T: Clone + PartialEq + Into<LabelRef>,
    C: Clone + PartialEq + Into<LabelRef>,
{
    let mut commands = vec![Command::InsertUserUrl {
        id: user_url_id.clone(),
        user_id: user_id.clone(),
        url_id: url_id.clone(),
    }];

    commands.extend(reconcile(&[], tag_ids).to_commands(user_url_id, 0));
    commands.extend(reconcile(&[], category_ids).to_commands(user_url_id, 0));

    commands.push(Command::AdjustProfile {
        user_id: user_id.clone(),
        counter: ProfileCounter::Urls,
        step: Step::Increment,
    });

    for recipient in std::iter::once(user_id).chain(followers.iter().filter(|f| *f != user_id)) {
        commands.push(Command::InsertFeedEntry {
            id: FeedId::generate(),
            user_id: recipient.clone(),
            user_url_id: user_url_id.clone(),
        });
    }

    commands
}

/// Like/unlike of `user_url_id` (owned by `owner_id`) by `user_id`.
pub fn plan_like_toggle(
    user_url_id: &UserUrlId,
    owner_id: &UserId,
    user_id: &UserId,
    currently_liked: bool,
) -> Vec<Command> {
    let step = if currently_liked { Step::Decrement } else { Step::Increment };
    let edge = if currently_liked {
        Command::DeleteLike {
            user_url_id: user_url_id.clone(),
            user_id: user_id.clone(),
        }
    } else {
        Command::InsertLike {
            user_url_id: user_url_id.clone(),
            user_id: user_id.clone(),
        }
    };

    vec![
        edge,
        Command::AdjustLikes {
            user_url_id: user_url_id.clone(),
            step,
        },
        Command::AdjustProfile {
            user_id: owner_id.clone(),
            counter: ProfileCounter::Liked,
            step,
        },
        Command::AdjustProfile {
            user_id: user_id.clone(),
            counter: ProfileCounter::Likes,
            step,
        },
    ]
}

/// Follow (`step = Increment`) or unfollow (`Decrement`) with counter updates.
pub fn plan_follow(follower_id: &UserId, following_id: &UserId, step: Step) -> Vec<Command> {
    let edge = match step {
        Step::Increment => Command::InsertFollow {
            follower_id: follower_id.clone(),
            following_id: following_id.clone(),
        },
        Step::Decrement => Command::DeleteFollow {
            follower_id: follower_id.clone(),
            following_id: following_id.clone(),
        },
    };

    vec![
        edge,
        Command::AdjustProfile {
            user_id: follower_id.clone(),
            counter: ProfileCounter::Following,
            step,
        },
        Command::AdjustProfile {
            user_id: following_id.clone(),
            counter: ProfileCounter::Followers,
            step,
        },
    ]
}
