mod handlers;
mod types;

pub use handlers::{create_tank, delete_tank, get_tank, get_tank_stats, list_tanks, update_tank};
pub use types::{CreateTankRequest, SensorSnapshot, TankResponse, TankStatsResponse, UpdateTankRequest};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{
    __path_create_tank, __path_delete_tank, __path_get_tank, __path_get_tank_stats,
    __path_list_tanks, __path_update_tank,
};
