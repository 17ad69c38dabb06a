/// Headless feed watcher
///
/// Selects the instrument given as the first CLI argument (default:
/// bitcoin) and prints the smoothed price and series depth on every
/// change notification.
use chartfeed::{FeedConfig, MarketFeed};
use rustls::crypto::ring::default_provider;

#[tokio::main]
async fn main() {
    let _ = default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let instrument = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bitcoin".to_string());

    let feed = MarketFeed::new(FeedConfig::default());
    let mut changes = feed.subscribe_changes().await;
    feed.select(Some(&instrument)).await;

    loop {
        if changes.changed().await.is_err() {
            break;
        }
        let snapshot = feed.snapshot().await;
        match feed.current_price().await {
            Some(price) => println!(
                "{instrument}: {price:.2} ({} points, {} bars)",
                snapshot.points.len(),
                snapshot.bars.len()
            ),
            None if feed.is_loading().await => println!("{instrument}: loading..."),
            None => println!("{instrument}: no live price available"),
        }
    }
}
