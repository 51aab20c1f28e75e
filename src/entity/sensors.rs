use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sensors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tank_id: i32,
    /// Categorical kind of measurement (temperature, oxygen, pH, ...)
    pub sensor_type: String,
    /// Hardware identifier reported by the field device
    pub device_id: Option<String>,
    pub unit: String,
    pub is_active: bool,
    pub last_reading: Option<f64>,
    pub last_reading_time: Option<DateTimeWithTimeZone>,
    pub calibration_date: Option<Date>,
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
    #[sea_orm(has_many = "super::sensor_readings::Entity")]
    Readings,
    #[sea_orm(has_many = "super::alerts::Entity")]
    Alerts,
}

impl Related<super::tanks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tank.def()
    }
}

impl Related<super::sensor_readings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Readings.def()
    }
}

impl Related<super::alerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
