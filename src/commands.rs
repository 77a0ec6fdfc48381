use crate::{
    Result,
    cache::{
        Clock,
        StatusCache,
        SystemClock,
    },
    error::{
        CompletedStep,
        Error,
        ValidationError,
    },
    normalize::{
        JsonRecord,
        cli_value,
        format_timestamp,
        normalize_timestamp,
        string_of,
        to_array,
    },
    transport::{
        ApiRequest,
        Transport,
        request_json,
    },
    views::{
        admin::{
            expected_gas_figures,
            verification_gas,
        },
        treasury::TreasuryDistribution,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Value,
    json,
};
use std::{
    fmt,
    sync::Arc,
};

pub const ASSUME_YES: &str = "--assume-yes";
pub const UNKNOWN_TX_HASH: &str = "unknown";
pub const FULL_DISTRIBUTION_BPS: u64 = 10_000;

const TX_HASH_PREFIX: &str = "0x";
const TX_HASH_HEX_LEN: usize = 64;

/// What the command endpoint reports for one invocation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub returncode: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub tx_hash: String,
    pub submitted_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub module: String,
    pub description: String,
}

/// Entries missing any of the three fields are dropped; the rest are sorted
/// by name.
pub fn derive_command_info(entries: &[Value]) -> Vec<CommandInfo> {
    entries
        .iter()
        .filter_map(|entry| {
            let text = |key: &str| {
                entry
                    .get(key)
                    .and_then(string_of)
                    .filter(|value| !value.is_empty())
            };
            Some(CommandInfo {
                name: text("name")?,
                module: text("module")?,
                description: text("description")?,
            })
        })
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect()
}

/// Structured result printed by a command, either as the whole stdout or as
/// its last line that starts with `{` and parses.
fn parse_envelope(stdout: &str) -> Option<JsonRecord> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(record)) = serde_json::from_str::<Value>(trimmed) {
        return Some(record);
    }
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .rev()
        .find_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => Some(record),
            _ => None,
        })
}

/// First `0x` followed by 64 hex digits in any of `sources`, in order.
fn scan_tx_hash<'a>(sources: impl IntoIterator<Item = &'a str>) -> Option<String> {
    sources.into_iter().find_map(|source| {
        source.match_indices(TX_HASH_PREFIX).find_map(|(start, _)| {
            let digits_start = start + TX_HASH_PREFIX.len();
            let digits = source
                .as_bytes()
                .get(digits_start..digits_start + TX_HASH_HEX_LEN)?;
            hex::decode(digits).ok()?;
            let digits = std::str::from_utf8(digits).ok()?;
            Some(format!("{TX_HASH_PREFIX}{digits}"))
        })
    })
}

fn envelope_text<'a>(envelope: Option<&'a JsonRecord>, key: &str) -> Option<&'a str> {
    envelope?.get(key)?.as_str()
}

#[derive(Debug, PartialEq, Eq)]
enum CommandOutcome {
    Succeeded(MutationResult),
    Failed { returncode: i32, detail: String },
}

/// Two-stage reading of a command response: the structured envelope first,
/// then a scan of the raw output streams for a transaction hash.
fn interpret_response(
    command: &str,
    response: &CommandResponse,
    now: DateTime<Utc>,
) -> CommandOutcome {
    let envelope = parse_envelope(&response.stdout);
    let envelope = envelope.as_ref();

    if response.returncode != 0 {
        let detail = [
            envelope_text(envelope, "stderr"),
            Some(response.stderr.as_str()),
            Some(response.stdout.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .unwrap_or("no output captured, see the command logs")
        .to_string();
        return CommandOutcome::Failed {
            returncode: response.returncode,
            detail,
        };
    }

    let structured_hash = envelope_text(envelope, "tx_hash")
        .map(str::trim)
        .filter(|hash| !hash.is_empty())
        .map(str::to_string);
    let tx_hash = structured_hash.or_else(|| {
        scan_tx_hash(
            [
                envelope_text(envelope, "stdout"),
                envelope_text(envelope, "stderr"),
                Some(response.stdout.as_str()),
                Some(response.stderr.as_str()),
            ]
            .into_iter()
            .flatten(),
        )
    });
    let tx_hash = tx_hash.unwrap_or_else(|| {
        tracing::warn!("could not extract a tx hash from the output of {command}");
        UNKNOWN_TX_HASH.to_string()
    });
    let submitted_at = envelope
        .and_then(|record| record.get("submitted_at"))
        .and_then(normalize_timestamp)
        .unwrap_or_else(|| format_timestamp(now));

    CommandOutcome::Succeeded(MutationResult {
        tx_hash,
        submitted_at,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CommandStep {
    command: &'static str,
    args: Vec<String>,
}

impl CommandStep {
    fn new(command: &'static str, flags: Vec<(&str, String)>) -> Self {
        let mut args = flags
            .into_iter()
            .flat_map(|(flag, value)| [flag.to_string(), value])
            .collect::<Vec<_>>();
        args.push(ASSUME_YES.to_string());
        Self { command, args }
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::post(["commands", self.command], json!({ "args": self.args }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OrchestrationState {
    Validating,
    Executing { step: usize, total: usize },
    Succeeded,
    Failed { step: usize },
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationState::Validating => write!(f, "validating"),
            OrchestrationState::Executing { step, total } => {
                write!(f, "executing step {step}/{total}")
            }
            OrchestrationState::Succeeded => write!(f, "succeeded"),
            OrchestrationState::Failed { step } => write!(f, "failed at step {step}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasConfigUpdate {
    pub max_gas_fee: u64,
    pub min_balance: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VrfConfigUpdate {
    pub max_gas_price: String,
    pub max_gas_limit: String,
    pub callback_gas_price: String,
    pub callback_gas_limit: String,
    pub requested_rng_count: u32,
    pub client_seed: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientWhitelistRecord {
    pub max_gas_price: String,
    pub max_gas_limit: String,
    pub min_balance_limit: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerWhitelistRecord {
    pub callback_gas_price: String,
    pub callback_gas_limit: String,
}

/// Turns one administrative intent into an ordered list of command
/// invocations.
///
/// Inputs are validated before anything is sent. Steps run strictly in order
/// and a failing step stops the sequence. The status cache is invalidated
/// once remote state may have changed.
pub struct CommandOrchestrator<T, C = SystemClock> {
    transport: Arc<T>,
    cache: StatusCache<T, C>,
}

impl<T, C> Clone for CommandOrchestrator<T, C> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<T: Transport, C: Clock> CommandOrchestrator<T, C> {
    pub fn new(transport: Arc<T>, cache: StatusCache<T, C>) -> Self {
        Self { transport, cache }
    }

    pub async fn list_commands(&self) -> Result<Vec<CommandInfo>> {
        let body: Value =
            request_json(self.transport.as_ref(), ApiRequest::get(["commands"])).await?;
        Ok(derive_command_info(to_array(&body)))
    }

    /// Both figures are calculated by the monitor; the caller has to confirm
    /// them exactly before `set-minimum-balance` is sent.
    pub async fn update_gas_config(&self, input: GasConfigUpdate) -> Result<MutationResult> {
        log_state("set-minimum-balance", OrchestrationState::Validating);
        let status = self.cache.refresh_status().await?;
        let expected = expected_gas_figures(&status);
        let expected_fee = expected
            .max_gas_fee
            .ok_or(ValidationError::MissingExpectation { field: "maxGasFee" })?;
        let expected_balance = expected
            .min_balance
            .ok_or(ValidationError::MissingExpectation { field: "minBalance" })?;

        let mut mismatches = [
            ("maxGasFee", expected_fee, u128::from(input.max_gas_fee)),
            ("minBalance", expected_balance, u128::from(input.min_balance)),
        ]
        .into_iter()
        .filter(|(_, expected, supplied)| expected != supplied)
        .map(|(field, expected, supplied)| ValidationError::FieldMismatch {
            field,
            expected,
            supplied,
        })
        .collect::<Vec<_>>();
        match mismatches.len() {
            0 => {}
            1 => return Err(mismatches.remove(0).into()),
            _ => return Err(ValidationError::Mismatches(mismatches).into()),
        }

        self.run(vec![CommandStep::new(
            "set-minimum-balance",
            vec![
                ("--expected-min-balance", expected_balance.to_string()),
                ("--expected-max-gas-fee", expected_fee.to_string()),
            ],
        )])
        .await
    }

    /// `configure-vrf-gas` followed by `configure-vrf-request`.
    pub async fn update_vrf_config(&self, input: VrfConfigUpdate) -> Result<MutationResult> {
        log_state("configure-vrf", OrchestrationState::Validating);
        let status = self.cache.get_status().await?;

        let mut gas_flags = vec![
            ("--max-gas-price", cli_value("maxGasPrice", &input.max_gas_price)?),
            ("--max-gas-limit", cli_value("maxGasLimit", &input.max_gas_limit)?),
            (
                "--callback-gas-price",
                cli_value("callbackGasPrice", &input.callback_gas_price)?,
            ),
            (
                "--callback-gas-limit",
                cli_value("callbackGasLimit", &input.callback_gas_limit)?,
            ),
        ];
        if let Some(gas) = verification_gas(&status) {
            gas_flags.push(("--verification-gas", gas));
        }

        self.run(vec![
            CommandStep::new("configure-vrf-gas", gas_flags),
            CommandStep::new(
                "configure-vrf-request",
                vec![
                    ("--rng-count", input.requested_rng_count.to_string()),
                    ("--client-seed", input.client_seed.to_string()),
                ],
            ),
        ])
        .await
    }

    pub async fn update_treasury_distribution(
        &self,
        input: TreasuryDistribution,
    ) -> Result<MutationResult> {
        log_state("configure-treasury-distribution", OrchestrationState::Validating);
        let total = input.total();
        if total != FULL_DISTRIBUTION_BPS {
            return Err(ValidationError::DistributionSum { total }.into());
        }
        self.run(vec![CommandStep::new(
            "configure-treasury-distribution",
            vec![
                ("--bp-jackpot", input.jackpot.to_string()),
                ("--bp-prize", input.prize.to_string()),
                ("--bp-treasury", input.treasury.to_string()),
                ("--bp-marketing", input.marketing.to_string()),
                ("--bp-community", "0".to_string()),
                ("--bp-team", "0".to_string()),
                ("--bp-partners", "0".to_string()),
            ],
        )])
        .await
    }

    pub async fn record_client_whitelist(
        &self,
        input: ClientWhitelistRecord,
    ) -> Result<MutationResult> {
        log_state("record-client-whitelist", OrchestrationState::Validating);
        let step = CommandStep::new(
            "record-client-whitelist",
            vec![
                ("--max-gas-price", cli_value("maxGasPrice", &input.max_gas_price)?),
                ("--max-gas-limit", cli_value("maxGasLimit", &input.max_gas_limit)?),
                (
                    "--min-balance-limit",
                    cli_value("minBalanceLimit", &input.min_balance_limit)?,
                ),
            ],
        );
        self.run(vec![step]).await
    }

    pub async fn record_consumer_whitelist(
        &self,
        input: ConsumerWhitelistRecord,
    ) -> Result<MutationResult> {
        log_state("record-consumer-whitelist", OrchestrationState::Validating);
        let step = CommandStep::new(
            "record-consumer-whitelist",
            vec![
                (
                    "--callback-gas-price",
                    cli_value("callbackGasPrice", &input.callback_gas_price)?,
                ),
                (
                    "--callback-gas-limit",
                    cli_value("callbackGasLimit", &input.callback_gas_limit)?,
                ),
            ],
        );
        self.run(vec![step]).await
    }

    /// Executes `steps` in order and returns the result of the last one.
    async fn run(&self, steps: Vec<CommandStep>) -> Result<MutationResult> {
        let total = steps.len();
        let mut completed: Vec<CompletedStep> = Vec::with_capacity(total);

        for (index, step) in steps.into_iter().enumerate() {
            let number = index + 1;
            log_state(
                step.command,
                OrchestrationState::Executing {
                    step: number,
                    total,
                },
            );
            match self.execute(&step, number, total, &completed).await {
                Ok(result) => completed.push(CompletedStep {
                    command: step.command.to_string(),
                    result,
                }),
                Err(e) => {
                    log_state(step.command, OrchestrationState::Failed { step: number });
                    if !completed.is_empty() {
                        self.cache.invalidate();
                    }
                    return Err(e);
                }
            }
        }

        self.cache.invalidate();
        match completed.pop() {
            Some(last) => {
                log_state(&last.command, OrchestrationState::Succeeded);
                Ok(last.result)
            }
            None => Err(ValidationError::invalid("command", "no steps to execute").into()),
        }
    }

    async fn execute(
        &self,
        step: &CommandStep,
        number: usize,
        total: usize,
        completed: &[CompletedStep],
    ) -> Result<MutationResult> {
        let response: CommandResponse =
            match request_json(self.transport.as_ref(), step.request()).await {
                Ok(response) => response,
                Err(cause) if !completed.is_empty() => {
                    return Err(Error::PartiallyApplied {
                        step: number,
                        total,
                        command: step.command.to_string(),
                        cause: Box::new(cause),
                        completed: completed.to_vec(),
                    });
                }
                Err(cause) => return Err(cause),
            };
        match interpret_response(step.command, &response, self.cache.now()) {
            CommandOutcome::Succeeded(result) => {
                tracing::info!("{} submitted tx {}", step.command, result.tx_hash);
                Ok(result)
            }
            CommandOutcome::Failed { returncode, detail } => Err(Error::CommandExecution {
                step: number,
                total,
                command: step.command.to_string(),
                returncode,
                detail,
                completed: completed.to_vec(),
            }),
        }
    }
}

fn log_state(command: &str, state: OrchestrationState) {
    match state {
        OrchestrationState::Failed { .. } => tracing::warn!("{command}: {state}"),
        _ => tracing::info!("{command}: {state}"),
    }
}
