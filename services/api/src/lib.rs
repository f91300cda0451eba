mod cli;
mod infra;
mod routes;
mod server;

use ship_and_weigh::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
