use anyhow::{Context, Result};
use wpmigrate::{cache::MappingCache, config::Config};

pub fn show_status(config: Config) -> Result<()> {
    let path = config.cache_path();
    let cache = MappingCache::load(&path)
        .with_context(|| format!("Failed to read mapping cache {}", path.display()))?;

    println!("\nMapping Cache");
    println!("=============");
    println!("File: {}", path.display());

    if cache.is_empty() {
        println!("\nNothing imported yet.");
        println!("\nTo start a migration, run:");
        println!("  wpmigrate import --dry-run");
        return Ok(());
    }

    let sizes = cache.table_sizes();
    println!("Users:      {}", sizes.users);
    println!("Media:      {}", sizes.media);
    println!("Categories: {}", sizes.terms_cat);
    println!("Tags:       {}", sizes.terms_tag);
    println!("Nodes:      {}", sizes.nodes);
    println!("Comments:   {}", sizes.comments);
    Ok(())
}
