use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use wpmigrate::{config::Config, wxr::{scan, XmlSummary}};

use super::resolve_export;

pub fn scan_export(config: Config, file: Option<PathBuf>, json: bool) -> Result<()> {
    let path = resolve_export(&config, file)?;
    info!("Scanning {}", path.display());

    let summary =
        scan(&path).with_context(|| format!("Failed to scan export {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

pub fn print_summary(summary: &XmlSummary) {
    let requirements = summary.requirements();
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    println!("\nExport Summary");
    println!("==============");
    println!("Site:              {}", summary.base_url);
    println!("Domain:            {}", summary.domain);
    println!("Authors:           {}", summary.authors.len());
    println!("Posts:             {}", summary.posts);
    println!("Pages:             {}", summary.pages);
    println!("Attachments:       {}", summary.attachments.len());
    println!("Categories:        {}", summary.categories.len());
    println!("Tags:              {}", summary.tags.len());
    println!("Approved comments: {}", summary.approved_comment_count);
    println!("Largest item:      {} bytes", summary.peak_item_bytes);

    println!("\nRequirements:");
    println!("  users:    {}", yes_no(requirements.needs_users));
    println!("  media:    {}", yes_no(requirements.needs_media));
    println!("  taxonomy: {}", yes_no(requirements.needs_taxonomy));
    println!("  comments: {}", yes_no(requirements.needs_comments));
}
