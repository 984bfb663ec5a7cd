use cname_steering::{Asn, Engine, Metric, MonitorId, RequestContext, Snapshot, Stage};
use rand::{rngs::SmallRng, SeedableRng};
use std::{collections::BTreeMap, env, fs, io::stdin, time::Instant};
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: simulator <config.json> [country|-] [continent|-] [asn|-] < telemetry.csv";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let config_path = args.next().expect(USAGE);
    let config = fs::read_to_string(&config_path).expect("read config");
    let engine = Engine::from_json(&config).expect("load config");

    // "-" leaves a request dimension unknown.
    let mut next_arg = || args.next().filter(|arg| arg != "-");
    let context = RequestContext {
        country: next_arg().map(|arg| arg.parse().expect("country")),
        continent: next_arg().map(|arg| arg.parse().expect("continent")),
        asn: next_arg().map(|arg| {
            let number = arg.trim_start_matches("AS").trim_start_matches("as");
            Asn(number.parse().expect("asn"))
        }),
    };

    let header = "record,subject,scope,value";
    let mut telemetry = Snapshot::default();
    for line in stdin().lines() {
        let line = line.unwrap();
        if line.starts_with(header) || line.trim().is_empty() {
            continue;
        }
        let fields = line.split(',').map(str::trim).collect::<Vec<&str>>();
        let metric = match fields[0] {
            "monitor" => {
                let monitor = MonitorId(fields[1].parse().expect("monitor"));
                telemetry.set_monitor(monitor, fields[3].parse().expect("monitor state"));
                continue;
            }
            "uptime" => Metric::Uptime,
            "performance" => Metric::Performance,
            record => panic!("unknown record {record:?}"),
        };
        telemetry.set_metric(
            metric,
            fields[1].into(),
            fields[2].parse().expect("scope"),
            fields[3].parse().expect("value"),
        );
    }

    for fault in engine.audit() {
        println!("fault: {fault}");
    }

    let mut rng = SmallRng::from_entropy();
    let total_decisions = 10_000;
    let mut total_decision_μs = 0;
    let mut addresses: BTreeMap<String, u64> = BTreeMap::new();
    let mut stages: BTreeMap<Stage, u64> = BTreeMap::new();
    for _ in 0..total_decisions {
        let t0 = Instant::now();
        let decision = engine.decide(&context, &telemetry, &mut rng);
        total_decision_μs += Instant::now().duration_since(t0).as_micros();

        let address = decision.address.unwrap_or_else(|| "<none>".to_string());
        *addresses.entry(address).or_default() += 1;
        *stages.entry(decision.stage).or_default() += 1;
    }

    println!(
        "avg_decision_μs: {}",
        total_decision_μs as f64 / total_decisions as f64
    );
    for (address, count) in &addresses {
        println!(
            "address {address}: {:.4}",
            *count as f64 / total_decisions as f64
        );
    }
    for (stage, count) in &stages {
        println!("stage {stage}: {count}");
    }
}
