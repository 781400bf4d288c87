use sea_orm::entity::prelude::*;

/// One administrative or end-user account. Geography is stored one column
/// per level; permission tags and assigned regions are JSON string arrays.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub role: String,
    pub designation: Option<String>,
    pub level: i16,
    pub country: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub block: Option<String>,
    pub area: Option<String>,
    pub permissions: Json,
    pub assigned_regions: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
