use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========== USERS ==========
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string_len(64).not_null())
                    .col(ColumnDef::new(Users::Email).string_len(254))
                    .col(
                        ColumnDef::new(Users::ShowAds)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::IsAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::FirstSeen)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .col(
                        ColumnDef::new(Users::LastSeen)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .to_owned(),
            )
            .await?;

        // ========== REPLAYS ==========
        manager
            .create_table(
                Table::create()
                    .table(Replays::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Replays::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Replays::State)
                            .string_len(32)
                            .not_null()
                            .default("WAITING_GC"),
                    )
                    .col(ColumnDef::new(Replays::LeagueId).big_integer())
                    .col(ColumnDef::new(Replays::GameMode).integer())
                    .col(ColumnDef::new(Replays::Duration).big_integer())
                    .col(ColumnDef::new(Replays::StartTime).big_integer())
                    .col(ColumnDef::new(Replays::RadiantWin).boolean())
                    .col(ColumnDef::new(Replays::Ugcid).big_integer())
                    .col(
                        ColumnDef::new(Replays::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_replays_start_time")
                    .table(Replays::Table)
                    .col(Replays::StartTime)
                    .to_owned(),
            )
            .await?;

        // ========== REPLAY PLAYERS ==========
        manager
            .create_table(
                Table::create()
                    .table(ReplayPlayers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReplayPlayers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReplayPlayers::ReplayId).big_integer().not_null())
                    .col(ColumnDef::new(ReplayPlayers::AccountId).big_integer())
                    .col(ColumnDef::new(ReplayPlayers::HeroId).big_integer())
                    .col(
                        ColumnDef::new(ReplayPlayers::PlayerSlot)
                            .small_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReplayPlayers::Kills).integer())
                    .col(ColumnDef::new(ReplayPlayers::Deaths).integer())
                    .col(ColumnDef::new(ReplayPlayers::Assists).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_replay_players_replay")
                            .from(ReplayPlayers::Table, ReplayPlayers::ReplayId)
                            .to(Replays::Table, Replays::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_replay_players_account")
                    .table(ReplayPlayers::Table)
                    .col(ReplayPlayers::AccountId)
                    .to_owned(),
            )
            .await?;

        // ========== USER ACTIVITY ==========
        // Favourites and downloads share a shape; ratings add a verdict.
        for (table, fk_replay, fk_user, index) in [
            (
                Activity::ReplayFavourites,
                "fk_replay_favourites_replay",
                "fk_replay_favourites_user",
                "idx_replay_favourites_user_created",
            ),
            (
                Activity::ReplayDownloads,
                "fk_replay_downloads_replay",
                "fk_replay_downloads_user",
                "idx_replay_downloads_user_created",
            ),
            (
                Activity::ReplayRatings,
                "fk_replay_ratings_replay",
                "fk_replay_ratings_user",
                "idx_replay_ratings_user_created",
            ),
        ] {
            let mut create = Table::create();
            create
                .table(table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Activity::Id)
                        .big_integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Activity::ReplayId).big_integer().not_null())
                .col(ColumnDef::new(Activity::UserId).big_integer().not_null())
                .col(
                    ColumnDef::new(Activity::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .extra("DEFAULT NOW()"),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name(fk_replay)
                        .from(table, Activity::ReplayId)
                        .to(Replays::Table, Replays::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name(fk_user)
                        .from(table, Activity::UserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                );

            if matches!(table, Activity::ReplayRatings) {
                create.col(
                    ColumnDef::new(Activity::Positive)
                        .boolean()
                        .not_null(),
                );
            }

            manager.create_table(create.to_owned()).await?;

            manager
                .create_index(
                    Index::create()
                        .name(index)
                        .table(table)
                        .col(Activity::UserId)
                        .col(Activity::CreatedAt)
                        .to_owned(),
                )
                .await?;
        }

        // ========== SEARCHES ==========
        manager
            .create_table(
                Table::create()
                    .table(Searches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Searches::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Searches::UserId).big_integer())
                    .col(ColumnDef::new(Searches::MatchId).big_integer().not_null())
                    .col(ColumnDef::new(Searches::ReplayId).big_integer())
                    .col(ColumnDef::new(Searches::IpAddress).string_len(45))
                    .col(
                        ColumnDef::new(Searches::Success)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Searches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_searches_user")
                            .from(Searches::Table, Searches::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_searches_replay")
                            .from(Searches::Table, Searches::ReplayId)
                            .to(Replays::Table, Replays::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_searches_user_created")
                    .table(Searches::Table)
                    .col(Searches::UserId)
                    .col(Searches::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Searches::Table).if_exists().to_owned())
            .await?;
        for table in [
            Activity::ReplayRatings,
            Activity::ReplayDownloads,
            Activity::ReplayFavourites,
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        manager
            .drop_table(
                Table::drop()
                    .table(ReplayPlayers::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Replays::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Name,
    Email,
    ShowAds,
    Enabled,
    IsAdmin,
    FirstSeen,
    LastSeen,
}

#[derive(DeriveIden)]
pub enum Replays {
    Table,
    Id,
    State,
    LeagueId,
    GameMode,
    Duration,
    StartTime,
    RadiantWin,
    Ugcid,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum ReplayPlayers {
    Table,
    Id,
    ReplayId,
    AccountId,
    HeroId,
    PlayerSlot,
    Kills,
    Deaths,
    Assists,
}

/// Tables and columns shared by the per-user activity tables.
#[derive(DeriveIden, Clone, Copy)]
pub enum Activity {
    ReplayFavourites,
    ReplayDownloads,
    ReplayRatings,
    Id,
    ReplayId,
    UserId,
    Positive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Searches {
    Table,
    Id,
    UserId,
    MatchId,
    ReplayId,
    IpAddress,
    Success,
    CreatedAt,
}
