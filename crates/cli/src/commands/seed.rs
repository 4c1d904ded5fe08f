use chrono::Utc;
use freightdesk_db::{SampleCallDataset, SeededCall, SqlCallRecordRepository};

use crate::commands::{load_config, migrated_pool, runtime, CommandResult, Failure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let repo = SqlCallRecordRepository::new(pool.clone());

        // Newest sample lands at the current hour so dashboards show recent activity.
        let seed_result = SampleCallDataset::load(&repo, Utc::now())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = SampleCallDataset::verify(&repo)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<Vec<SeededCall>, Failure> = if verification.all_present {
            Ok(seed_result.calls_seeded)
        } else {
            Err(("seed_verification", verification_message(&verification.checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(calls) => {
            let lines: Vec<String> = calls
                .iter()
                .map(|call| format!("  - {}: {} ({})", call.call_id, call.carrier_name, call.outcome))
                .collect();
            let message =
                format!("loaded {} sample calls:\n{}", calls.len(), lines.join("\n"));
            CommandResult::success("seed", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message(checks: &[(&str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some sample calls failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
