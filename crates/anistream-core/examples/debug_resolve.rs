//! Debug script to walk the provider chain for one episode
//!
//! Run with: cargo run --example debug_resolve -p anistream-core -- "Frieren" 1

use anistream_core::{ResolutionService, ResolveRequest, ResolverConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let title = args.next().unwrap_or_else(|| "Frieren".to_string());
    let episode: f64 = args.next().as_deref().unwrap_or("1").parse()?;
    let provider = args.next();

    let service = ResolutionService::from_config(&ResolverConfig::default())?;
    println!("Registry:");
    for p in service.providers() {
        println!("  {} (priority {}, {:?})", p.id, p.priority, p.kind);
    }

    let mut request = ResolveRequest::new(&title, episode);
    if let Some(provider) = provider {
        request = request.with_provider(provider);
    }

    println!("\nResolving '{}' episode {}...\n", title, episode);
    match service.resolve(&request).await {
        Ok(result) => {
            println!("✓ Served by {}", result.provider_used);
            for source in &result.sources {
                println!(
                    "  {:>18}  hls={:<5}  {}",
                    source.quality_label, source.is_hls, source.url
                );
            }
        }
        Err(e) => {
            println!("✗ {}", e);
            for attempt in e.attempts() {
                println!("  - {}", attempt);
            }
        }
    }

    Ok(())
}
