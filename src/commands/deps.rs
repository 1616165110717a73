use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use linear_timeline::error::Result;
use linear_timeline::{LinearClient, Snapshot, TimelineService};

use crate::output;

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Blocked by")]
    blocker: String,
    #[tabled(rename = "In cycle")]
    in_cycle: String,
}

#[derive(Serialize)]
struct DepsReport<'a> {
    edges: Vec<Edge<'a>>,
    cycles: &'a [Vec<String>],
    valid: bool,
    order: Option<Vec<String>>,
}

#[derive(Serialize)]
struct Edge<'a> {
    project: &'a str,
    blocked_by: &'a str,
    in_cycle: bool,
}

fn project_name<'a>(snapshot: &'a Snapshot, id: &'a str) -> &'a str {
    snapshot
        .project(id)
        .map(|p| p.project.name.as_str())
        .unwrap_or(id)
}

pub async fn show(service: &TimelineService<LinearClient>, refresh: bool) -> Result<()> {
    let snapshot = service.get_projects(refresh).await?;
    let graph = &snapshot.graph;

    let report = DepsReport {
        edges: graph
            .edges()
            .map(|(project, blocker)| Edge {
                project,
                blocked_by: blocker,
                in_cycle: graph.in_cycle_edge(project, blocker),
            })
            .collect(),
        cycles: graph.cycles(),
        valid: graph.is_valid(),
        order: graph.topological_order(),
    };

    output::print_item(&report, |report| {
        if report.edges.is_empty() {
            println!("No blocking relations between projects.");
        } else {
            output::print_table(&report.edges, |edge| EdgeRow {
                project: project_name(&snapshot, edge.project).to_string(),
                blocker: project_name(&snapshot, edge.blocked_by).to_string(),
                in_cycle: if edge.in_cycle {
                    "yes".red().bold().to_string()
                } else {
                    String::new()
                },
            });
        }

        for cycle in report.cycles {
            let names: Vec<&str> = cycle.iter().map(|id| project_name(&snapshot, id)).collect();
            println!("{} {}", "cycle:".red().bold(), names.join(" -> "));
        }

        if let Some(order) = &report.order {
            println!("\nSuggested order (blockers first):");
            for (i, id) in order.iter().enumerate() {
                println!("  {:>3}. {}", i + 1, project_name(&snapshot, id));
            }
        }
    });

    output::print_warnings(&snapshot.warnings);
    Ok(())
}
