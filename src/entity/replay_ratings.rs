use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "replay_ratings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub replay_id: i64,
    pub user_id: i64,
    /// Thumbs up (`true`) or down (`false`)
    pub positive: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::replays::Entity",
        from = "Column::ReplayId",
        to = "super::replays::Column::Id"
    )]
    Replay,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::replays::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Replay.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
