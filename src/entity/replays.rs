use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "replays")]
pub struct Model {
    /// Dota 2 match id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub state: String,
    pub league_id: Option<i64>,
    pub game_mode: Option<i32>,
    /// Match length in seconds
    pub duration: Option<i64>,
    /// Unix timestamp the match started at
    pub start_time: Option<i64>,
    pub radiant_win: Option<bool>,
    pub ugcid: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::replay_players::Entity")]
    Players,
    #[sea_orm(has_many = "super::replay_favourites::Entity")]
    Favourites,
    #[sea_orm(has_many = "super::replay_ratings::Entity")]
    Ratings,
    #[sea_orm(has_many = "super::replay_downloads::Entity")]
    Downloads,
}

impl Related<super::replay_players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Players.def()
    }
}

impl Related<super::replay_favourites::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favourites.def()
    }
}

impl Related<super::replay_ratings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ratings.def()
    }
}

impl Related<super::replay_downloads::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Downloads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
