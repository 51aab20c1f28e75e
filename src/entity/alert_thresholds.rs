use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_thresholds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tank_id: i32,
    pub sensor_type: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub is_active: bool,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tanks::Entity",
        from = "Column::TankId",
        to = "super::tanks::Column::Id"
    )]
    Tank,
}

impl Related<super::tanks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tank.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
