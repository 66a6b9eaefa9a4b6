//! `authflow list`: show discovered scenarios

use clap::Args;
use serde::Serialize;

use super::SourceArgs;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Serialize)]
struct ScenarioSummary {
    name: String,
    tags: Vec<String>,
    steps: usize,
    cleanup: usize,
    description: String,
}

impl TableDisplay for ScenarioSummary {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Tags", "Steps", "Cleanup", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.join(", "),
            self.steps.to_string(),
            self.cleanup.to_string(),
            self.description.clone(),
        ]
    }
}

pub fn execute(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let summaries: Vec<ScenarioSummary> = args
        .source
        .load()?
        .into_iter()
        .map(|s| ScenarioSummary {
            steps: s.steps.len(),
            cleanup: s.cleanup.len(),
            name: s.name,
            tags: s.tags,
            description: s.description.trim().to_string(),
        })
        .collect();

    output::print_list(&summaries, format);
    Ok(())
}
