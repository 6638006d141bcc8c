use crate::types::{Report, Result, User};
use async_trait::async_trait;
use tracing::info;

/// Delivery collaborator. A failure here means the orchestrator must not mark
/// the report's items as seen; the transport itself is out of scope.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, report: &Report, user: &User) -> Result<()>;
}

/// Renders the report to stdout. Stands in for a real transport.
pub struct ConsoleDelivery;

#[async_trait]
impl Delivery for ConsoleDelivery {
    async fn deliver(&self, report: &Report, user: &User) -> Result<()> {
        println!("{}", render_report(report, user));
        info!(
            "delivered report with {} items to {}",
            report.items.len(),
            user.email
        );
        Ok(())
    }
}

pub fn render_report(report: &Report, user: &User) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "Digest for {} <{}> generated {}\n\n",
        user.name,
        user.email,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if report.items.is_empty() {
        text.push_str("No new items matched your interests.\n");
        return text;
    }

    for (i, result) in report.items.iter().enumerate() {
        text.push_str(&format!(
            "{}. {} ({})\n",
            i + 1,
            result.item.title,
            result.item.published.format("%Y-%m-%d")
        ));
        text.push_str(&format!("   Source: {}\n", result.item.source));
        text.push_str(&format!(
            "   Matched: {} (score {:.0})\n\n",
            result.matched_keywords.join(", "),
            result.score
        ));
    }

    text
}
