use freightdesk_db::{CallRecordRepository, SqlCallRecordRepository};

use crate::commands::{load_config, migrated_pool, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("clear") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("clear") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let deleted = SqlCallRecordRepository::new(pool.clone())
            .clear()
            .await
            .map_err(|error| ("clear_execution", error.to_string(), 5u8));
        pool.close().await;
        deleted
    });

    match result {
        Ok(deleted) => CommandResult::success("clear", format!("deleted {deleted} call records")),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("clear", error_class, message, exit_code)
        }
    }
}
