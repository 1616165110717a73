use serde::Serialize;

use linear_timeline::error::Result;
use linear_timeline::{EndDateBasis, LinearClient, TimelineService};

use crate::output;

#[derive(Serialize)]
struct EstimateReport<'a> {
    id: &'a str,
    name: &'a str,
    end_date: Option<chrono::NaiveDate>,
    basis: EndDateBasis,
    start_date: Option<chrono::NaiveDate>,
    issue_count: usize,
    completed_issues: usize,
}

pub async fn show(service: &TimelineService<LinearClient>, project_id: &str) -> Result<()> {
    let snapshot = service.get_projects(false).await?;
    let enriched = snapshot.require_project(project_id)?;

    let report = EstimateReport {
        id: &enriched.project.id,
        name: &enriched.project.name,
        end_date: enriched.effective_end_date,
        basis: enriched.end_date_basis,
        start_date: enriched.effective_start_date,
        issue_count: enriched.issue_count,
        completed_issues: enriched.completed_issue_count,
    };

    output::print_item(&report, |r| {
        println!("{} ({})", r.name, r.id);
        println!("  Start:    {}", output::format_date(r.start_date));
        println!("  End:      {}", output::format_date(r.end_date));
        println!("  Based on: {}", r.basis);
        println!("  Issues:   {}/{} done", r.completed_issues, r.issue_count);
        if r.basis.is_fallback() {
            println!("  Not enough completed work to project from velocity.");
        }
    });

    Ok(())
}
