use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "replay_players")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub replay_id: i64,
    /// Null for anonymous players
    pub account_id: Option<i64>,
    pub hero_id: Option<i64>,
    pub player_slot: i16,
    pub kills: Option<i32>,
    pub deaths: Option<i32>,
    pub assists: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::replays::Entity",
        from = "Column::ReplayId",
        to = "super::replays::Column::Id"
    )]
    Replay,
}

impl Related<super::replays::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Replay.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
