use log::error;
use std::process::ExitCode;

use clientpnl_core::db;
use clientpnl_core::refresh::RefreshService;

fn run() -> clientpnl_core::Result<()> {
    let db_path = db::get_db_path()?;
    db::init(&db_path)?;
    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;

    let service = RefreshService::with_defaults(pool);
    service.run_full_load()?;

    // Machine-readable trailer for the invoking scheduler
    let status = service.refresh_status()?;
    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
