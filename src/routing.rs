//! Multi-hop route enumeration and route cost estimation.
//!
//! Route discovery is static: it works over catalogue symbols and an
//! optional set of known-tradeable pairs, never over live chain state.
//! Fees along a route compound multiplicatively; the naive sum
//! overstates the cost for every multi-hop route.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::types::Route;
use anyhow::{bail, Result};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::warn;

pub const MAX_TOKEN_UNIVERSE: usize = 50;
pub const MAX_GENERATED_PATHS: usize = 1000;

/// Cost summary for a candidate route.
#[derive(Debug, Clone)]
pub struct RouteCost {
    pub hops: usize,
    pub total_gas: u64,
    pub total_fee_pct: Decimal,
}

/// Compounded fee percentage across `hops` sequential swaps at the same
/// per-hop fee: (1 - (1 - fee)^hops) * 100.
pub fn compounded_fee_pct(hops: usize, fee_per_hop: Decimal) -> Decimal {
    let keep = Decimal::ONE - fee_per_hop;
    let mut kept = Decimal::ONE;
    for _ in 0..hops {
        kept *= keep;
    }
    (Decimal::ONE - kept) * Decimal::from(100)
}

/// Enumerates candidate routes between token pairs through configured
/// bridge tokens.
pub struct MultiHopRouter {
    bridge_tokens: Vec<String>,
    max_paths: usize,
}

impl MultiHopRouter {
    pub fn new(bridge_tokens: Vec<String>) -> Self {
        Self {
            bridge_tokens,
            max_paths: MAX_GENERATED_PATHS,
        }
    }

    #[cfg(test)]
    fn with_max_paths(bridge_tokens: Vec<String>, max_paths: usize) -> Self {
        Self {
            bridge_tokens,
            max_paths,
        }
    }

    /// All candidate routes from `token_in` to `token_out` with at most
    /// `max_hops` hops (1..=3). Direct route first, then 2-hop via single
    /// bridges, then 3-hop via ordered distinct bridge pairs. Routes are
    /// deduplicated; when `available_pairs` is given, every leg must be a
    /// known pair (either direction). Capped at the path limit, keeping
    /// what was generated so far.
    pub fn find_routes(
        &self,
        token_in: &str,
        token_out: &str,
        max_hops: usize,
        available_pairs: Option<&[(String, String)]>,
    ) -> Result<Vec<Route>> {
        if token_in.is_empty() || token_out.is_empty() {
            bail!("route endpoints must be non-empty");
        }
        if token_in == token_out {
            bail!("route endpoints must be distinct");
        }
        if !(1..=3).contains(&max_hops) {
            bail!("max_hops must be between 1 and 3, got {}", max_hops);
        }

        let mut seen = HashSet::new();
        let mut routes = Vec::new();

        let mut push = |candidate: Option<Route>, routes: &mut Vec<Route>| -> bool {
            if routes.len() >= self.max_paths {
                return false;
            }
            if let Some(route) = candidate {
                if leg_check(&route, available_pairs) && seen.insert(route.clone()) {
                    routes.push(route);
                }
            }
            true
        };

        push(Route::direct(token_in, token_out), &mut routes);

        if max_hops >= 2 {
            for bridge in &self.bridge_tokens {
                let candidate = Route::new(vec![
                    token_in.to_string(),
                    bridge.clone(),
                    token_out.to_string(),
                ]);
                if !push(candidate, &mut routes) {
                    warn!("route cap reached for {}->{}", token_in, token_out);
                    return Ok(routes);
                }
            }
        }

        if max_hops >= 3 {
            for b1 in &self.bridge_tokens {
                for b2 in &self.bridge_tokens {
                    if b1 == b2 {
                        continue;
                    }
                    let candidate = Route::new(vec![
                        token_in.to_string(),
                        b1.clone(),
                        b2.clone(),
                        token_out.to_string(),
                    ]);
                    if !push(candidate, &mut routes) {
                        warn!("route cap reached for {}->{}", token_in, token_out);
                        return Ok(routes);
                    }
                }
            }
        }

        Ok(routes)
    }

    /// Fewest-hops route among the candidates, preserving generation order
    /// within the same hop count.
    pub fn find_best_route(
        &self,
        token_in: &str,
        token_out: &str,
        max_hops: usize,
        available_pairs: Option<&[(String, String)]>,
    ) -> Result<Option<Route>> {
        let routes = self.find_routes(token_in, token_out, max_hops, available_pairs)?;
        Ok(routes.into_iter().min_by_key(|r| r.hops()))
    }

    /// Gas and fee cost of a route under flat per-swap assumptions.
    pub fn estimate_route_cost(
        &self,
        route: &Route,
        gas_per_swap: u64,
        fee_per_hop: Decimal,
    ) -> RouteCost {
        let hops = route.hops();
        RouteCost {
            hops,
            total_gas: gas_per_swap * hops as u64,
            total_fee_pct: compounded_fee_pct(hops, fee_per_hop),
        }
    }

    /// Circular paths starting and ending at `start` with `max_hops` in
    /// [2, 4], over a bounded token universe. Used for circular arbitrage
    /// discovery; capped at the path limit.
    pub fn find_arbitrage_paths(
        &self,
        start: &str,
        max_hops: usize,
        universe: &[String],
    ) -> Result<Vec<Route>> {
        if start.is_empty() {
            bail!("start token must be non-empty");
        }
        if !(2..=4).contains(&max_hops) {
            bail!("circular max_hops must be between 2 and 4, got {}", max_hops);
        }
        let universe: Vec<&String> = universe
            .iter()
            .filter(|t| t.as_str() != start)
            .take(MAX_TOKEN_UNIVERSE)
            .collect();

        let mut paths = Vec::new();

        // 2-hop: start -> X -> start
        for x in &universe {
            if paths.len() >= self.max_paths {
                warn!("circular path cap reached from {}", start);
                return Ok(paths);
            }
            if let Some(route) =
                Route::closed(vec![start.to_string(), (*x).clone(), start.to_string()])
            {
                paths.push(route);
            }
        }

        // 3-hop: start -> X -> Y -> start
        if max_hops >= 3 {
            for x in &universe {
                for y in &universe {
                    if x == y {
                        continue;
                    }
                    if paths.len() >= self.max_paths {
                        warn!("circular path cap reached from {}", start);
                        return Ok(paths);
                    }
                    if let Some(route) = Route::closed(vec![
                        start.to_string(),
                        (*x).clone(),
                        (*y).clone(),
                        start.to_string(),
                    ]) {
                        paths.push(route);
                    }
                }
            }
        }

        // 4-hop: start -> X -> Y -> Z -> start
        if max_hops >= 4 {
            for x in &universe {
                for y in &universe {
                    for z in &universe {
                        if x == y || y == z || x == z {
                            continue;
                        }
                        if paths.len() >= self.max_paths {
                            warn!("circular path cap reached from {}", start);
                            return Ok(paths);
                        }
                        if let Some(route) = Route::closed(vec![
                            start.to_string(),
                            (*x).clone(),
                            (*y).clone(),
                            (*z).clone(),
                            start.to_string(),
                        ]) {
                            paths.push(route);
                        }
                    }
                }
            }
        }

        Ok(paths)
    }
}

fn leg_check(route: &Route, available_pairs: Option<&[(String, String)]>) -> bool {
    let Some(pairs) = available_pairs else {
        return true;
    };
    route.legs().all(|(a, b)| {
        pairs
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    })
}
