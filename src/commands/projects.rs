use chrono::Local;
use tabled::Tabled;

use linear_timeline::error::Result;
use linear_timeline::{LinearClient, TimelineEntry, TimelineService};

use crate::cli::ProjectsArgs;
use crate::output;

#[derive(Tabled)]
struct TimelineRow {
    #[tabled(rename = "Project")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Progress")]
    progress: String,
    #[tabled(rename = "Issues")]
    issues: String,
    #[tabled(rename = "Lead")]
    lead: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<&TimelineEntry> for TimelineRow {
    fn from(entry: &TimelineEntry) -> Self {
        let mut end = output::format_date(entry.end);
        if entry.estimated && entry.end.is_some() {
            end.push_str(" (est.)");
        }
        if entry.is_overdue {
            end = format!("{end} overdue");
        }

        Self {
            name: output::paint(&output::truncate(&entry.name, 40), entry.color.as_deref()),
            status: entry.status.colored(),
            start: output::format_date(entry.start),
            end,
            progress: output::progress_bar(entry.progress, 10),
            issues: format!("{}/{}", entry.completed_issues, entry.issue_count),
            lead: entry.lead.clone().unwrap_or_else(|| "-".to_string()),
            id: entry.id.clone(),
        }
    }
}

pub async fn list(service: &TimelineService<LinearClient>, args: ProjectsArgs) -> Result<()> {
    let snapshot = service.get_projects(args.refresh).await?;
    let today = Local::now().date_naive();

    let entries = snapshot.timeline(today, args.team.as_deref(), args.from, args.to);

    output::print_table(&entries, |e| TimelineRow::from(e));
    output::print_warnings(&snapshot.warnings);

    Ok(())
}
