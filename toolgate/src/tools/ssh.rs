//! Remote command tool, gated by the exact-match allow-list

use super::require_str;
use crate::error::Result;
use crate::sandbox::{CommandPolicy, CommandRunner};
use serde_json::Value;

pub(super) async fn exec(
    commands: &CommandPolicy,
    runner: &CommandRunner,
    args: &Value,
    timeout_secs: u64,
) -> Result<Value> {
    let command = require_str(args, "command")?;
    commands.authorize(command)?;

    let result = runner.run(command, timeout_secs).await?;
    Ok(serde_json::to_value(result)?)
}
