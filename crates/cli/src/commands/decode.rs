//! `authflow decode`: print the claims of a compact token

use clap::Args;

use crate::output::{self, OutputFormat};

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Compact token (`header.payload.signature`)
    pub token: String,
}

pub fn execute(args: DecodeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let claims = authflow_e2e::token::decode(args.token.trim())?;
    output::print_value(&claims, format);
    Ok(())
}
