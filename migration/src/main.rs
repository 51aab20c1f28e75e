//! Schema CLI for the fishery monitor database, e.g. `cargo run -p migration -- up`.
//! `DATABASE_URL` is read from the environment or a `.env` file.

use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    cli::run_cli(migration::Migrator).await;
}
