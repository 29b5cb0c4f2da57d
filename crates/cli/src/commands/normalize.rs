use canteen_db::{run_legacy_price_policy, LegacyPolicySummary, SqlPurchaseRequestRepository};

use crate::commands::{connect_and_migrate, prepare, CommandResult, StepFailure};

const CORRELATION_ID: &str = "cli-normalize";

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("normalize") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;
        let repository = SqlPurchaseRequestRepository::new(pool.clone());

        let summary: Result<LegacyPolicySummary, StepFailure> =
            run_legacy_price_policy(&repository, CORRELATION_ID)
                .await
                .map_err(|error| ("legacy_policy", error.to_string(), 6u8));

        pool.close().await;
        summary
    });

    match result {
        Ok(summary) => {
            let message = summary_message(&summary);
            match serde_json::to_value(&summary) {
                Ok(details) => CommandResult::success_with_details("normalize", message, details),
                Err(_) => CommandResult::success("normalize", message),
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("normalize", error_class, message, exit_code)
        }
    }
}

fn summary_message(summary: &LegacyPolicySummary) -> String {
    if summary.reclassified == 0 {
        format!("scanned {} purchase requests; nothing to reclassify", summary.scanned)
    } else {
        format!(
            "scanned {} purchase requests; reclassified {} zero-price approvals: {}",
            summary.scanned,
            summary.reclassified,
            summary.reclassified_ids.join(", ")
        )
    }
}
