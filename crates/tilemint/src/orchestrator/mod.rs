//! The batch orchestrator: one allocation run from the last-issued lookup to
//! the persisted lot summaries.
//!
//! A run walks [`RunState`] in order:
//!
//! 1. `ResolveLastSerial` loads the product template and customer policy,
//!    opens the scope's transaction and finds the serial to continue from.
//! 2. `GenerateFront` expands the front side once per unit and checks the
//!    first and last identifiers against history.
//! 3. `PersistFront` writes the batch and a summary per lot table.
//! 4. `GenerateBack` and `PersistBack` repeat the above for the back side
//!    of two-sided products, without the history check.
//! 5. `Done` commits the transaction.
//!
//! Any error stops the run and is reported as a [`RunFailure`] carrying the
//! stage it happened in. Nothing is committed unless the run reaches `Done`.

mod state;

use std::collections::HashSet;

pub use state::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::store::{ConfigSource, RecordStore, Transaction};
use crate::{
    BackSeed, CustomerPolicy, DateCodeTable, DateParts, DateSource, Error, GeneratedIdentifier,
    GenerationRequest, LocalClock, LotSummary, PredicateContext, ProductTemplate, ResolveContext,
    Result, SerialCodec, SerialState, Side, SideTemplate, lot_tables, terminal_identifier,
};

/// Runs allocation requests against a configuration source and a record
/// store.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new(config, store);
/// let outcome = orchestrator.run(&request)?;
/// println!("last identifier: {}", outcome.result);
/// ```
#[derive(Clone, Debug)]
pub struct Orchestrator<C, S, D = LocalClock> {
    config: C,
    store: S,
    clock: D,
}

impl<C, S> Orchestrator<C, S, LocalClock> {
    /// Creates an orchestrator reading dates from the local wall clock.
    pub fn new(config: C, store: S) -> Self {
        Self::with_clock(config, store, LocalClock)
    }
}

impl<C, S, D> Orchestrator<C, S, D> {
    pub fn with_clock(config: C, store: S, clock: D) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Configuration resolved for one run.
struct Plan {
    template: ProductTemplate,
    policy: CustomerPolicy,
    codec: SerialCodec,
    codes: DateCodeTable,
    date: DateParts,
    count: usize,
    split: bool,
}

impl<C, S, D> Orchestrator<C, S, D>
where
    C: ConfigSource,
    S: RecordStore,
    D: DateSource,
{
    /// Allocates, checks and persists the identifiers for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] naming the stage that failed. Only failures
    /// wrapping [`Error::Conflict`] are worth retrying.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, request),
            fields(scope = %request.scope(), lot = %request.lot_number)
        )
    )]
    pub fn run(&self, request: &GenerationRequest) -> Result<RunOutcome, RunFailure> {
        let mut state = RunState::ResolveLastSerial;
        match self.drive(request, &mut state) {
            Ok(outcome) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    result = %outcome.result,
                    units = outcome.front.identifiers.len(),
                    two_sided = outcome.back.is_some(),
                    "run complete"
                );
                Ok(outcome)
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%state, %error, retryable = error.is_retryable(), "run failed");
                Err(RunFailure { state, error })
            }
        }
    }

    fn drive(&self, request: &GenerationRequest, state: &mut RunState) -> Result<RunOutcome> {
        let plan = self.plan(request)?;
        let ctx = ResolveContext {
            lot_number: &request.lot_number,
            date_codes: &plan.codes,
            date: plan.date,
            codec: &plan.codec,
        };

        let mut txn = self.store.begin(&request.scope())?;
        let original = resolve_last_serial(&mut txn, &plan, &ctx)?;

        transition(state, RunState::GenerateFront);
        let (identifiers, final_serial) =
            generate_side(&plan.template.front, &ctx, original.clone(), plan.count)?;
        check_history(&mut txn, &request.customer, &identifiers)?;

        transition(state, RunState::PersistFront);
        let summaries = persist_side(&mut txn, request, &plan, Side::Front, &identifiers, &final_serial)?;
        let front = SideBatch {
            identifiers,
            final_serial,
            summaries,
        };

        let back = if plan.template.is_two_sided() {
            transition(state, RunState::GenerateBack);
            let seed = match plan.template.back_seed {
                BackSeed::Original => original,
                BackSeed::ContinueFront => front.final_serial.clone(),
            };
            let (identifiers, final_serial) =
                generate_side(&plan.template.back, &ctx, seed, plan.count)?;

            transition(state, RunState::PersistBack);
            let summaries =
                persist_side(&mut txn, request, &plan, Side::Back, &identifiers, &final_serial)?;
            Some(SideBatch {
                identifiers,
                final_serial,
                summaries,
            })
        } else {
            None
        };

        txn.commit()?;
        transition(state, RunState::Done);

        let result = front
            .last()
            .map(|id| id.primary.clone())
            .unwrap_or_default();
        Ok(RunOutcome {
            result,
            front,
            back,
        })
    }

    fn plan(&self, request: &GenerationRequest) -> Result<Plan> {
        let key = request.product_key();
        let template = self
            .config
            .load_product_template(&key)?
            .ok_or_else(|| Error::config(format!("no product template for `{key}`")))?;
        template.validate()?;
        let policy = self
            .config
            .load_customer_policy(&request.customer)?
            .ok_or_else(|| {
                Error::config(format!("no policy for customer `{}`", request.customer))
            })?;
        let split = self.config.is_split_step(&request.step)?;

        Ok(Plan {
            codec: policy.codec()?,
            codes: template.date_codes()?,
            count: template.iteration_count(request.sub_batch_qty)?,
            date: DateParts::capture(&self.clock),
            template,
            policy,
            split,
        })
    }
}

fn transition(state: &mut RunState, next: RunState) {
    #[cfg(feature = "tracing")]
    tracing::debug!(from = %state, to = %next, "run state transition");
    *state = next;
}

fn resolve_last_serial<T: Transaction>(
    txn: &mut T,
    plan: &Plan,
    ctx: &ResolveContext<'_>,
) -> Result<SerialState> {
    let field = plan
        .template
        .front
        .primary_field()
        .ok_or_else(|| Error::config("front side template has no tile field"))?;
    let prefix = field.prefix(ctx);
    let predicate = plan.policy.select_template().render(&PredicateContext {
        prefix: &prefix,
        date_codes: &plan.codes,
        date: plan.date,
    });

    let last = txn.find_last_issued(&predicate)?;
    let seed = match &last {
        Some(last) => {
            last.check_consistent()?;
            match last.serial() {
                Some(serial) => SerialState::new(serial),
                None => plan.codec.seed(plan.policy.serial_length),
            }
        }
        None => plan.codec.seed(plan.policy.serial_length),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        %predicate,
        lot = last.as_ref().map(|l| l.lot.as_str()),
        seed = %seed,
        "resolved last serial"
    );
    Ok(seed)
}

/// Expands `side` `count` times, rejecting a repeated primary identifier.
fn generate_side(
    side: &SideTemplate,
    ctx: &ResolveContext<'_>,
    seed: SerialState,
    count: usize,
) -> Result<(Vec<GeneratedIdentifier>, SerialState)> {
    let mut seen = HashSet::with_capacity(count);
    let mut identifiers = Vec::with_capacity(count);
    let mut state = seed;

    for _ in 0..count {
        let (expansion, next) = side.expand(ctx, state)?;
        state = next;

        let primary = expansion.primary().to_owned();
        if !seen.insert(primary.clone()) {
            return Err(Error::Duplicate {
                value: primary,
                lot: None,
            });
        }
        identifiers.push(GeneratedIdentifier {
            primary,
            tile_fields: expansion.tile,
            cell_fields: expansion.cell,
            mark_date: ctx.date.mark_date(),
            mark_time: ctx.date.mark_time(),
        });
    }
    Ok((identifiers, state))
}

/// Checks the batch's first and last primary identifiers against history.
fn check_history<T: Transaction>(
    txn: &mut T,
    customer: &str,
    identifiers: &[GeneratedIdentifier],
) -> Result<()> {
    let (Some(first), Some(last)) = (identifiers.first(), identifiers.last()) else {
        return Ok(());
    };
    let candidates = if first.primary == last.primary {
        vec![&first.primary]
    } else {
        vec![&first.primary, &last.primary]
    };
    for candidate in candidates {
        let length = candidate.chars().count();
        if let Some(lot) = txn.check_historical_duplicate(length, customer, candidate)? {
            return Err(Error::Duplicate {
                value: candidate.clone(),
                lot: Some(lot),
            });
        }
    }
    Ok(())
}

fn persist_side<T: Transaction>(
    txn: &mut T,
    request: &GenerationRequest,
    plan: &Plan,
    side: Side,
    identifiers: &[GeneratedIdentifier],
    final_serial: &SerialState,
) -> Result<Vec<LotSummary>> {
    let first = identifiers
        .first()
        .map(|id| id.primary.clone())
        .unwrap_or_default();
    let terminal = terminal_identifier(identifiers)
        .unwrap_or_default()
        .to_owned();

    let tables = lot_tables(&request.product, &request.lot_number, side, plan.split);
    let mut summaries = Vec::with_capacity(tables.len());
    for table in tables {
        txn.persist_batch(&table.name, identifiers)?;
        let summary = LotSummary {
            lot: table.name,
            customer: request.customer.clone(),
            product_name: table.product_name,
            side,
            first: first.clone(),
            terminal: terminal.clone(),
            final_serial: final_serial.as_str().to_owned(),
            count: identifiers.len(),
            created_date: plan.date.summary_date(),
            created_time: plan.date.summary_time(),
        };
        txn.persist_lot_summary(&summary)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(lot = %summary.lot, %side, count = summary.count, "persisted lot");
        summaries.push(summary);
    }
    Ok(summaries)
}
