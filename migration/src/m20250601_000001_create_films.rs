use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Films::Table)
                    .if_not_exists()
                    .col(pk_auto(Films::Id))
                    .col(integer(Films::TmdbId))
                    .col(string(Films::Title))
                    .col(string(Films::PosterPath).default(""))
                    .col(string(Films::BackdropPath).default(""))
                    .col(text(Films::Overview).default(""))
                    .col(string(Films::ReleaseDate).default(""))
                    .col(double(Films::VoteAverage).default(0.0))
                    .col(integer(Films::Runtime).default(0))
                    .col(text(Films::Genres).default("[]"))
                    .col(text(Films::OriginCountry).default("[]"))
                    .col(string(Films::TrailerKey).default(""))
                    .col(big_integer(Films::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Duplicates are rejected by the add action, so this index is not unique.
        manager
            .create_index(
                Index::create()
                    .name("idx_films_tmdb_id")
                    .table(Films::Table)
                    .col(Films::TmdbId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_films_created_at")
                    .table(Films::Table)
                    .col(Films::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Films::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Films {
    Table,
    Id,
    TmdbId,
    Title,
    PosterPath,
    BackdropPath,
    Overview,
    ReleaseDate,
    VoteAverage,
    Runtime,
    Genres,
    OriginCountry,
    TrailerKey,
    CreatedAt,
}
