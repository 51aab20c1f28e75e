use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========== TANKS ==========
        manager
            .create_table(
                Table::create()
                    .table(Tanks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tanks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tanks::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Tanks::Description).text())
                    .col(ColumnDef::new(Tanks::Capacity).double())
                    .col(ColumnDef::new(Tanks::Location).string_len(256))
                    .col(ColumnDef::new(Tanks::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Tanks::CreatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .col(
                        ColumnDef::new(Tanks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .to_owned(),
            )
            .await?;

        // ========== SENSORS ==========
        manager
            .create_table(
                Table::create()
                    .table(Sensors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sensors::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sensors::TankId).integer().not_null())
                    .col(ColumnDef::new(Sensors::SensorType).string_len(64).not_null())
                    .col(ColumnDef::new(Sensors::DeviceId).string_len(64))
                    .col(
                        ColumnDef::new(Sensors::Unit)
                            .string_len(32)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Sensors::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Sensors::LastReading).double())
                    .col(ColumnDef::new(Sensors::LastReadingTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Sensors::CalibrationDate).date())
                    .col(
                        ColumnDef::new(Sensors::CreatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .col(
                        ColumnDef::new(Sensors::UpdatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sensors_tank")
                            .from(Sensors::Table, Sensors::TankId)
                            .to(Tanks::Table, Tanks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sensors_tank_type")
                    .table(Sensors::Table)
                    .col(Sensors::TankId)
                    .col(Sensors::SensorType)
                    .to_owned(),
            )
            .await?;

        // ========== SENSOR READINGS ==========
        // Append-only; rows are never updated by the ingestion path
        manager
            .create_table(
                Table::create()
                    .table(SensorReadings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SensorReadings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SensorReadings::SensorId).integer().not_null())
                    .col(ColumnDef::new(SensorReadings::Value).double().not_null())
                    .col(
                        ColumnDef::new(SensorReadings::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sensor_readings_sensor")
                            .from(SensorReadings::Table, SensorReadings::SensorId)
                            .to(Sensors::Table, Sensors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE INDEX idx_sensor_readings_sensor_time ON sensor_readings (sensor_id, timestamp DESC)",
        )
        .await?;

        // ========== ALERT THRESHOLDS ==========
        manager
            .create_table(
                Table::create()
                    .table(AlertThresholds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AlertThresholds::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AlertThresholds::TankId).integer().not_null())
                    .col(
                        ColumnDef::new(AlertThresholds::SensorType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AlertThresholds::MinValue).double())
                    .col(ColumnDef::new(AlertThresholds::MaxValue).double())
                    .col(
                        ColumnDef::new(AlertThresholds::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AlertThresholds::CreatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .col(
                        ColumnDef::new(AlertThresholds::UpdatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alert_thresholds_tank")
                            .from(AlertThresholds::Table, AlertThresholds::TankId)
                            .to(Tanks::Table, Tanks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Upsert target: one threshold row per (tank, sensor type)
        manager
            .create_index(
                Index::create()
                    .name("idx_alert_thresholds_tank_type")
                    .table(AlertThresholds::Table)
                    .col(AlertThresholds::TankId)
                    .col(AlertThresholds::SensorType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ========== ALERTS ==========
        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alerts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alerts::TankId).integer().not_null())
                    .col(ColumnDef::new(Alerts::SensorId).integer().not_null())
                    .col(ColumnDef::new(Alerts::AlertType).string_len(16).not_null())
                    .col(ColumnDef::new(Alerts::Message).text().not_null())
                    .col(ColumnDef::new(Alerts::Severity).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Alerts::IsResolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alerts::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Alerts::ResolvedBy).string_len(128))
                    .col(
                        ColumnDef::new(Alerts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_tank")
                            .from(Alerts::Table, Alerts::TankId)
                            .to(Tanks::Table, Tanks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_sensor")
                            .from(Alerts::Table, Alerts::SensorId)
                            .to(Sensors::Table, Sensors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one unresolved alert per sensor, enforced by the database
        db.execute_unprepared(
            "CREATE UNIQUE INDEX alerts_one_open_per_sensor ON alerts (sensor_id) WHERE is_resolved = false",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX idx_alerts_tank_created ON alerts (tank_id, created_at DESC)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alerts::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(AlertThresholds::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(SensorReadings::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Sensors::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tanks::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Tanks {
    Table,
    Id,
    Name,
    Description,
    Capacity,
    Location,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Sensors {
    Table,
    Id,
    TankId,
    SensorType,
    DeviceId,
    Unit,
    IsActive,
    LastReading,
    LastReadingTime,
    CalibrationDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum SensorReadings {
    Table,
    Id,
    SensorId,
    Value,
    Timestamp,
}

#[derive(DeriveIden)]
enum AlertThresholds {
    Table,
    Id,
    TankId,
    SensorType,
    MinValue,
    MaxValue,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
    TankId,
    SensorId,
    AlertType,
    Message,
    Severity,
    IsResolved,
    ResolvedAt,
    ResolvedBy,
    CreatedAt,
}
