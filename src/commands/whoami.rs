use linear_timeline::error::Result;
use linear_timeline::{LinearClient, TimelineService};

use crate::output;

pub async fn run(service: &TimelineService<LinearClient>) -> Result<()> {
    let viewer = service.validate_credentials().await?;

    output::print_item(&viewer, |v| {
        println!("Authenticated as {}", v.name.as_deref().unwrap_or(&v.id));
        if let Some(email) = &v.email {
            println!("  Email: {email}");
        }
        println!("  Requests left this hour: {}", service.remaining_requests());
    });

    Ok(())
}
