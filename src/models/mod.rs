mod client;
mod interaction;
mod statistics;
mod user;
pub mod validation;

pub use client::{Client, ClientChanges, ClientPayload, NewClient, Stage};
pub use interaction::{
    ClientInteraction, InteractionChanges, InteractionPayload, InteractionType, NewInteraction,
};
pub use statistics::{recent_since, StageCounts, Statistics, StatisticsCounts, RECENT_WINDOW_DAYS};
pub use user::{generate_token, hash_token, NewUser, User};
pub use validation::{Completeness, FieldErrors};
