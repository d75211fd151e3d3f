use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "films")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tmdb_id: i32,
    pub title: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub overview: String,
    pub release_date: String,
    pub vote_average: f64,
    pub runtime: i32,
    /// JSON array of strings.
    pub genres: String,
    /// JSON array of strings.
    pub origin_country: String,
    pub trailer_key: String,
    /// Unix milliseconds.
    pub created_at: i64,
    /// JSON array of strings. The column is optional in deployed schemas.
    pub storage_locations: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
