use metrics::{counter, gauge, histogram};

pub fn record_node_registered(region: &str) {
    counter!("cohere_nodes_registered_total", "region" => region.to_string()).increment(1);
}

pub fn record_node_evicted() {
    counter!("cohere_nodes_evicted_total").increment(1);
}

pub fn set_live_nodes(count: usize) {
    gauge!("cohere_nodes_live").set(count as f64);
}

pub fn record_request(op: &'static str, outcome: &'static str) {
    counter!("cohere_requests_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_health_sweep(duration_ms: f64) {
    histogram!("cohere_health_sweep_duration_ms").record(duration_ms);
}
