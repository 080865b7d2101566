use std::time::{Duration, Instant};

use tuner_proto::directory::{HttpDirectory, StationSource};
use tuner_proto::location::Location;

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::test]
#[ignore = "network diagnostic harness; set ICETUNE_SERVER and run with --ignored --nocapture"]
async fn probe_live_icecast_directory() {
    let Ok(server) = std::env::var("ICETUNE_SERVER") else {
        eprintln!("ICETUNE_SERVER not set, nothing to probe");
        return;
    };
    let rounds = env_u64("ICETUNE_PROBE_ROUNDS", 3).max(1);
    let pause = Duration::from_millis(env_u64("ICETUNE_PROBE_PAUSE_MS", 2000));

    let location = Location::parse(&server).expect("ICETUNE_SERVER must be an http(s) url");
    let dir = HttpDirectory::new(location.base()).expect("http client");
    eprintln!("probing {}", dir.status_url());

    for round in 0..rounds {
        let started = Instant::now();
        match dir.fetch_stations().await {
            Ok(stations) => {
                eprintln!(
                    "round {} ok: {} station(s) in {:?}",
                    round,
                    stations.len(),
                    started.elapsed()
                );
                for st in &stations {
                    eprintln!(
                        "  {:<20} {:<24} {:?} -> {}",
                        st.id,
                        st.name,
                        st.title,
                        location.stream_url(&st.id)
                    );
                }
                if let Some(id) = location.fragment() {
                    let hit = stations.iter().any(|s| s.id == id);
                    eprintln!("  fragment '{}' {}", id, if hit { "found" } else { "missing" });
                }
            }
            Err(e) => eprintln!("round {} failed after {:?}: {}", round, started.elapsed(), e),
        }
        if round + 1 < rounds {
            tokio::time::sleep(pause).await;
        }
    }
}
