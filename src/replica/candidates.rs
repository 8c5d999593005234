//! Candidate server list for one refresh cycle.

use rand::seq::SliceRandom;
use rand::Rng;

/// Order in which servers are asked for a newer snapshot.
///
/// A gateway is the only candidate when present. Otherwise the configured
/// servers are shuffled to spread load, the master is appended as a last
/// resort when not already listed, and this replica's own URL is dropped.
pub fn resolve_candidates<R: Rng + ?Sized>(
    gateway: Option<String>,
    servers: &[String],
    master: Option<&str>,
    own_url: Option<&str>,
    rng: &mut R,
) -> Vec<String> {
    if let Some(gateway) = gateway {
        return vec![gateway];
    }

    let own = own_url.map(normalize);
    let mut candidates: Vec<String> = Vec::with_capacity(servers.len() + 1);
    for server in servers {
        let key = normalize(server);
        if own.as_deref() == Some(key.as_str()) || candidates.iter().any(|c| normalize(c) == key) {
            continue;
        }
        candidates.push(server.trim().to_string());
    }
    candidates.shuffle(rng);

    if let Some(master) = master {
        let key = normalize(master);
        if own.as_deref() != Some(key.as_str()) && !candidates.iter().any(|c| normalize(c) == key) {
            candidates.push(master.trim().to_string());
        }
    }
    candidates
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn servers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_gateway_short_circuits() {
        let mut rng = StdRng::seed_from_u64(1);
        let list = resolve_candidates(
            Some("http://gw".into()),
            &servers(&["http://a", "http://b"]),
            Some("http://m"),
            None,
            &mut rng,
        );
        assert_eq!(list, vec!["http://gw"]);
    }

    #[test]
    fn test_master_appended_and_self_excluded() {
        let mut rng = StdRng::seed_from_u64(2);
        let list = resolve_candidates(
            None,
            &servers(&["http://a", "http://me/", "http://b", "http://a/"]),
            Some("http://m"),
            Some("http://me"),
            &mut rng,
        );
        assert_eq!(list.len(), 3);
        assert_eq!(list[2], "http://m");
        let mut head = list[..2].to_vec();
        head.sort();
        assert_eq!(head, vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_master_not_duplicated() {
        let mut rng = StdRng::seed_from_u64(3);
        let list = resolve_candidates(None, &servers(&["http://m"]), Some("http://m/"), None, &mut rng);
        assert_eq!(list, vec!["http://m"]);
    }

    #[test]
    fn test_order_is_randomized() {
        let list = servers(&["http://a", "http://b", "http://c", "http://d", "http://e"]);
        let mut rng = StdRng::seed_from_u64(4);
        let firsts: std::collections::HashSet<String> = (0..50)
            .map(|_| resolve_candidates(None, &list, None, None, &mut rng)[0].clone())
            .collect();
        assert!(firsts.len() > 1);
    }

    #[test]
    fn test_nothing_configured() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(resolve_candidates(None, &[], None, None, &mut rng).is_empty());
    }
}
