use std::thread;

use anyhow::Context;
use tilemint_store::tilemint::{
    Alphabet, DateSource, Error, FrontendOutcome, FrontendRequest, GenerationRequest, LocalClock,
    LotSummary, Orchestrator, RunFailure, RunOutcome, SerialCodec, SerialPattern, SerialState,
    issue_frontend,
};
use tilemint_store::{MemoryStore, StaticConfig};

use super::config::{Command, RunConfig};

/// Runs the selected command and returns what should be printed.
pub fn execute(config: &RunConfig) -> anyhow::Result<String> {
    match &config.command {
        Command::Generate {
            customer,
            product,
            version,
            step,
            lot,
            qty,
            env,
        } => {
            let request = GenerationRequest {
                customer: customer.clone(),
                product: product.clone(),
                version: version.clone(),
                step: step.clone(),
                lot_number: lot.clone(),
                sub_batch_qty: *qty,
                environment: env.clone(),
            };
            let outcome = generate(config, &request)?;
            Ok(render_outcome(&outcome))
        }
        Command::Serial {
            pattern,
            charset,
            exclude,
            from,
            length,
            count,
        } => {
            let pattern: SerialPattern = pattern.parse()?;
            let codec = SerialCodec::new(pattern, Alphabet::new(charset, exclude)?);
            let serials = serials(&codec, from.as_deref(), *length, *count)?;
            Ok(serials.join("\n"))
        }
        Command::Frontend {
            lot,
            qty,
            product_no,
            equipment,
            checkout,
        } => {
            let request = FrontendRequest {
                lot_number: lot.clone(),
                product_no: product_no.clone(),
                equipment: equipment.clone(),
                qty: *qty,
                checkout: checkout.unwrap_or_else(|| LocalClock.now()),
            };
            let outcome = frontend(config, &request)?;
            Ok(render_frontend(&outcome))
        }
    }
}

/// Runs `request`, retrying while another writer holds its scope.
fn generate(config: &RunConfig, request: &GenerationRequest) -> anyhow::Result<RunOutcome> {
    let settings = load_settings(config)?;
    let store = open_store(config)?;
    let orchestrator = Orchestrator::new(settings, store);
    Ok(retrying(
        config,
        || orchestrator.run(request),
        RunFailure::is_retryable,
    )?)
}

/// Issues frontend codes for `request`, retrying like [`generate`].
fn frontend(config: &RunConfig, request: &FrontendRequest) -> anyhow::Result<FrontendOutcome> {
    let tables = load_settings(config)?.frontend;
    let store = open_store(config)?;
    Ok(retrying(
        config,
        || issue_frontend(&store, &tables, request, &LocalClock),
        Error::is_retryable,
    )?)
}

fn load_settings(config: &RunConfig) -> anyhow::Result<StaticConfig> {
    StaticConfig::load(&config.config_path)
        .with_context(|| format!("loading {}", config.config_path.display()))
}

fn open_store(config: &RunConfig) -> anyhow::Result<MemoryStore> {
    MemoryStore::open(&config.store_path)
        .with_context(|| format!("opening {}", config.store_path.display()))
}

/// Calls `run` until it succeeds, fails for good or runs out of attempts,
/// doubling the backoff after every retryable failure.
fn retrying<T, E>(
    config: &RunConfig,
    mut run: impl FnMut() -> Result<T, E>,
    retryable: impl Fn(&E) -> bool,
) -> Result<T, E> {
    let mut backoff = config.backoff;
    let mut attempt = 1;
    loop {
        match run() {
            Err(e) if retryable(&e) && attempt < config.max_attempts => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "scope busy, retrying"
                );
                thread::sleep(backoff);
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// The next `count` serials after `from` (or the pattern's seed).
fn serials(
    codec: &SerialCodec,
    from: Option<&str>,
    length: usize,
    count: usize,
) -> anyhow::Result<Vec<String>> {
    let mut state = match from {
        Some(from) => SerialState::new(from),
        None => codec.seed(length),
    };
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        state = codec.next(state)?;
        out.push(state.as_str().to_owned());
    }
    Ok(out)
}

fn render_outcome(outcome: &RunOutcome) -> String {
    let back = outcome.back.iter().flat_map(|b| &b.summaries);
    let lines = outcome.front.summaries.iter().chain(back).map(render_summary);
    std::iter::once(outcome.result.clone())
        .chain(lines)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_frontend(outcome: &FrontendOutcome) -> String {
    outcome
        .identifiers
        .iter()
        .map(|id| id.primary.clone())
        .chain(std::iter::once(render_summary(&outcome.summary)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_summary(summary: &LotSummary) -> String {
    format!(
        "{} {} {} {}..{} serial={} count={} at {} {}",
        summary.side,
        summary.lot,
        summary.product_name,
        summary.first,
        summary.terminal,
        summary.final_serial,
        summary.count,
        summary.created_date,
        summary.created_time,
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;

    const CONFIG: &str = r#"{
        "templates": {
            "P1-A-LM": { "front": { "tile_fields": ["TXT=AB,SN1"] } }
        },
        "policies": { "C1": {} },
        "frontend": {
            "machine": { "EQ01": "M" },
            "year": { "2025": "Y" },
            "month": { "3": "C" },
            "day": { "7": "G" }
        }
    }"#;

    fn run_config(dir: &tempfile::TempDir, command: Command) -> RunConfig {
        let config_path = dir.path().join("tilemint.json");
        std::fs::write(&config_path, CONFIG).unwrap();
        RunConfig {
            config_path,
            store_path: dir.path().join("records.json"),
            max_attempts: 1,
            backoff: Duration::ZERO,
            command,
        }
    }

    fn generate_command(lot: &str) -> Command {
        Command::Generate {
            customer: "C1".into(),
            product: "P1".into(),
            version: "A".into(),
            step: "LM".into(),
            lot: lot.into(),
            qty: 1,
            env: String::new(),
        }
    }

    #[test]
    fn generate_persists_between_invocations() {
        let dir = tempfile::tempdir().unwrap();

        let out = execute(&run_config(&dir, generate_command("L1"))).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("AB00005"));
        assert!(lines.next().unwrap().starts_with("front L1 P1-TOP AB00001..AB00005 serial=00005 count=5"));

        let out = execute(&run_config(&dir, generate_command("L2"))).unwrap();
        assert!(out.starts_with("AB0001A\n"));
        assert!(dir.path().join("records.json").exists());
    }

    #[test]
    fn generate_reports_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = run_config(&dir, generate_command("L1"));
        config.config_path = dir.path().join("missing.json");
        assert!(execute(&config).is_err());
    }

    #[test]
    fn serial_steps_from_value_or_seed() {
        let dir = tempfile::tempdir().unwrap();
        let command = Command::Serial {
            pattern: "A000".into(),
            charset: "ABC0123456789".into(),
            exclude: String::new(),
            from: Some("A998".into()),
            length: 4,
            count: 3,
        };
        assert_eq!(
            execute(&run_config(&dir, command)).unwrap(),
            "A999\nB001\nB002"
        );

        let command = Command::Serial {
            pattern: String::new(),
            charset: "0123456789".into(),
            exclude: String::new(),
            from: None,
            length: 3,
            count: 2,
        };
        assert_eq!(execute(&run_config(&dir, command)).unwrap(), "001\n002");
    }

    #[test]
    fn serial_rejects_unknown_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let command = Command::Serial {
            pattern: "B00".into(),
            charset: "0123456789".into(),
            exclude: String::new(),
            from: None,
            length: 3,
            count: 1,
        };
        assert!(execute(&run_config(&dir, command)).is_err());
    }

    fn frontend_command(lot: &str, qty: usize) -> Command {
        Command::Frontend {
            lot: lot.into(),
            qty,
            product_no: "7".into(),
            equipment: "EQ01".into(),
            checkout: NaiveDate::from_ymd_opt(2025, 3, 7)
                .unwrap()
                .and_hms_opt(14, 0, 0),
        }
    }

    #[test]
    fn frontend_continues_from_the_store() {
        let dir = tempfile::tempdir().unwrap();

        let out = execute(&run_config(&dir, frontend_command("F1", 2))).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "000000000000007MYCG001");
        assert_eq!(lines[1], "000000000000007MYCG002");
        assert!(lines[2].starts_with("front F1 7 000000000000007MYCG001..000000000000007MYCG002 serial=002 count=2"));

        let out = execute(&run_config(&dir, frontend_command("F2", 1))).unwrap();
        assert!(out.starts_with("000000000000007MYCG003\n"));
    }

    #[test]
    fn busy_store_gives_up_after_max_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = run_config(&dir, generate_command("L1"));
        config.max_attempts = 2;

        let held = MemoryStore::open(&config.store_path).unwrap();
        let _txn = tilemint_store::tilemint::store::RecordStore::begin(
            &held,
            &GenerationRequest {
                customer: "C1".into(),
                product: "P1".into(),
                version: "A".into(),
                step: "LM".into(),
                lot_number: "L0".into(),
                sub_batch_qty: 1,
                environment: String::new(),
            }
            .scope(),
        )
        .unwrap();

        let err = execute(&config).unwrap_err();
        assert!(format!("{err:#}").contains("concurrent writer"), "{err:#}");
    }
}
