use crate::api::error_preview;
use crate::checkin::BatchResult;

pub const RESULT_TITLE: &str = "AnyRouter check-in result";
pub const ERROR_TITLE: &str = "AnyRouter check-in error";

/// Human readable summary sent to the notification channels.
pub fn build_summary(batch: &BatchResult, executed_at: &str) -> String {
    let mut lines = vec![format!("[TIME] Executed at: {}", executed_at), String::new()];

    for result in &batch.results {
        let status = if result.success { "[SUCCESS]" } else { "[FAIL]" };
        let mut line = format!("{} {}", status, result.account);
        if let Some(info) = &result.user_info {
            line.push('\n');
            line.push_str(info);
        }
        if let Some(error) = &result.error {
            line.push_str(&format!(" - {}...", error_preview(error)));
        }
        lines.push(line);
    }

    let failed = batch.total_count - batch.success_count;
    lines.push(String::new());
    lines.push("[STATS] Check-in summary:".to_string());
    lines.push(format!(
        "[SUCCESS] Succeeded: {}/{}",
        batch.success_count, batch.total_count
    ));
    lines.push(format!("[FAIL] Failed: {}/{}", failed, batch.total_count));
    lines.push(
        if batch.success_count == batch.total_count {
            "[SUCCESS] All accounts checked in!"
        } else if batch.success_count > 0 {
            "[WARN] Some accounts checked in"
        } else {
            "[ERROR] All accounts failed to check in"
        }
        .to_string(),
    );

    lines.join("\n")
}

pub fn error_body(error: &anyhow::Error) -> String {
    format!("An error occurred during check-in:\n{:#}", error)
}
