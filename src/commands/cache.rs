use colored::*;
use teto::error::TetoResult;
use teto::tts::cache::TtsCache;

pub fn info() -> TetoResult<()> {
    let cache = TtsCache::new(TtsCache::resolve_root(None));
    let info = cache.info()?;
    println!(
        "{} {} entries, {} bytes",
        "cache:".bold(),
        info.entry_count,
        info.bytes_used
    );
    Ok(())
}

pub fn clear(older_than_days: Option<u64>) -> TetoResult<()> {
    let cache = TtsCache::new(TtsCache::resolve_root(None));
    let older_than = older_than_days.map(|d| std::time::Duration::from_secs(d * 86400));
    let removed = cache.clear(older_than)?;
    println!("{} removed {} entries", "cache:".bold(), removed);
    Ok(())
}
