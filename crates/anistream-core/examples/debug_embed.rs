//! Debug script to inspect how an embed page is unwrapped
//!
//! Run with: cargo run --example debug_embed -p anistream-core -- <embed url> [referer]

use anistream_core::parser::{expand_packed, is_packed};
use anistream_core::{Accept, EntryPoint, HttpClient, PlayerResolver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: debug_embed <embed url> [referer]");
        return Ok(());
    };
    let referer = args.next();

    let http = HttpClient::new()?;
    let html = http.get_text(&url, Accept::Html, referer.as_deref()).await?;
    std::fs::write("debug_embed.html", &html)?;
    println!("HTML saved to debug_embed.html ({} bytes)", html.len());

    if is_packed(&html) {
        let expanded = expand_packed(&html);
        println!("\n=== Unpacked script tail ===\n");
        let tail = expanded.len().saturating_sub(2000);
        println!("{}", expanded.get(tail..).unwrap_or(&expanded));
    }

    let resolver = PlayerResolver::new(http);
    println!("\nStrategies: {:?}", resolver.strategy_names());

    let mut entry = EntryPoint::embed(&url, "debug");
    if let Some(referer) = referer {
        entry = entry.with_referer(referer);
    }
    for source in resolver.resolve(&entry).await {
        println!("  {:>18}  hls={:<5}  {}", source.quality_label, source.is_hls, source.url);
    }

    Ok(())
}
