//! `SeaORM` entity for directory companies

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "company")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub rating: f64,
    pub trust_score: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::spotlight::Entity")]
    Spotlight,
}

impl Related<super::spotlight::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Spotlight.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
