pub mod replay_downloads;
pub mod replay_favourites;
pub mod replay_players;
pub mod replay_ratings;
pub mod replays;
pub mod searches;
pub mod users;
