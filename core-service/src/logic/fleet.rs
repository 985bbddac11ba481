//! Mock fleet - telemetry for a small office network, for demos.

use rand::Rng;
use serde_json::{json, Value};

struct MockDevice {
    id: &'static str,
    ip: &'static str,
    os: &'static str,
    vulnerability: f64,
    threat: f64,
    criticality: f64,
    access_level: f64,
}

const FLEET: &[MockDevice] = &[
    MockDevice { id: "server-01", ip: "192.168.1.10", os: "Ubuntu 20.04", vulnerability: 0.7, threat: 0.3, criticality: 0.8, access_level: 3.0 },
    MockDevice { id: "db-01", ip: "192.168.1.20", os: "Windows Server 2019", vulnerability: 0.9, threat: 0.6, criticality: 0.95, access_level: 4.0 },
    MockDevice { id: "workstation-15", ip: "192.168.1.50", os: "Windows 10", vulnerability: 0.5, threat: 0.2, criticality: 0.3, access_level: 1.0 },
    MockDevice { id: "router-01", ip: "192.168.1.1", os: "Cisco IOS", vulnerability: 0.3, threat: 0.1, criticality: 0.9, access_level: 5.0 },
    MockDevice { id: "switch-01", ip: "192.168.1.2", os: "Cisco IOS", vulnerability: 0.4, threat: 0.15, criticality: 0.7, access_level: 2.0 },
    MockDevice { id: "fileserver-01", ip: "192.168.1.30", os: "Windows Server 2019", vulnerability: 0.8, threat: 0.45, criticality: 0.85, access_level: 3.0 },
];

const ATTACK_TYPES: &[&str] = &["Ransomware", "DDoS", "Data Theft", "None"];
const PORTS: &[u16] = &[22, 80, 443, 445, 3389];

/// One telemetry message per mock device, with randomized traffic figures.
pub fn mock_fleet<R: Rng>(rng: &mut R) -> Vec<Value> {
    FLEET
        .iter()
        .map(|d| {
            let suspicious = rng.gen_bool(d.threat);
            let protocol = if rng.gen_bool(0.5) { "TCP" } else { "UDP" };
            let port = PORTS[rng.gen_range(0..PORTS.len())];
            let attack_type = ATTACK_TYPES[rng.gen_range(0..ATTACK_TYPES.len())];
            json!({
                "deviceId": d.id,
                "ipAddress": d.ip,
                "os": d.os,
                "status": "active",
                "vulnerabilityScore": d.vulnerability.to_string(),
                "patchLevel": rng.gen_range(0..=10).to_string(),
                "protocol": protocol,
                "port": port,
                "trafficVolume": rng.gen_range(100..50_000),
                "latency": rng.gen_range(1..250),
                "suspiciousFlag": i64::from(suspicious),
                "attackType": attack_type,
                "attackProbability": rng.gen_range(0..=100),
                "connections": rng.gen_range(5..1200),
                "uptime": rng.gen_range(1..8760),
                "criticality": d.criticality,
                "networkSegment": rng.gen_range(0..4),
                "accessLevel": d.access_level,
            })
        })
        .collect()
}
