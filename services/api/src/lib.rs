mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use mansion_tax::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
